//! Azure Storage REST provider for blob listing and table entity reads.
//!
//! Requests are authorized with Shared Key (HMAC-SHA256 over the canonical
//! request) or by appending a SAS token. Only the read operations the
//! gateway needs are implemented.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use futures::{StreamExt, TryStreamExt, stream};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use reqwest::{RequestBuilder, StatusCode, Url};
use sha2::Sha256;
use std::time::SystemTime;
use tracing::debug;

use super::connection::{ConnectionString, Credential};
use super::{BlobNames, BlobStore, StorageError, TableEntity, TableStore};

pub const AZURE_API_VERSION: &str = "2023-11-03";

/// Everything except RFC 3986 unreserved characters.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

type HmacSha256 = Hmac<Sha256>;

pub struct AzureStorage {
    client: reqwest::Client,
    account: String,
    credential: Credential,
    blob_endpoint: String,
    table_endpoint: String,
}

/// One page of a List Blobs response.
#[derive(Debug, Default, PartialEq)]
pub struct ListPage {
    pub names: Vec<String>,
    pub next_marker: Option<String>,
}

impl AzureStorage {
    pub fn new(connection: ConnectionString) -> Self {
        Self::with_client(reqwest::Client::new(), connection)
    }

    pub fn with_client(client: reqwest::Client, connection: ConnectionString) -> Self {
        Self {
            client,
            account: connection.account_name,
            credential: connection.credential,
            blob_endpoint: connection.blob_endpoint,
            table_endpoint: connection.table_endpoint,
        }
    }

    fn container_url(&self, container: &str, params: &[(&str, &str)]) -> Result<Url, StorageError> {
        let raw = format!(
            "{}/{}",
            self.blob_endpoint,
            utf8_percent_encode(container, PATH_SEGMENT)
        );
        let mut url = Url::parse(&raw)
            .map_err(|e| StorageError::Decode(format!("invalid blob endpoint '{raw}': {e}")))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params.iter().copied());
        }
        Ok(url)
    }

    fn entity_url(&self, table: &str, partition_key: &str, row_key: &str) -> Result<Url, StorageError> {
        let raw = format!("{}/{}", self.table_endpoint, entity_path(table, partition_key, row_key));
        Url::parse(&raw).map_err(|e| StorageError::Decode(format!("invalid table endpoint '{raw}': {e}")))
    }

    fn blob_get(&self, mut url: Url, params: &[(&str, &str)]) -> Result<RequestBuilder, StorageError> {
        let date = rfc1123_date();
        let authorization = match &self.credential {
            Credential::SharedKey(key) => {
                let resource = canonical_blob_resource(&self.account, &url, params);
                let string_to_sign = format!(
                    "GET\n\n\n\n\n\n\n\n\n\n\n\nx-ms-date:{date}\nx-ms-version:{AZURE_API_VERSION}\n{resource}"
                );
                Some(format!("SharedKey {}:{}", self.account, sign(key, &string_to_sign)?))
            }
            Credential::Sas(token) => {
                append_sas(&mut url, token);
                None
            }
        };

        let mut req = self
            .client
            .get(url)
            .header("x-ms-date", &date)
            .header("x-ms-version", AZURE_API_VERSION);
        if let Some(value) = authorization {
            req = req.header("Authorization", value);
        }
        Ok(req)
    }

    fn table_get(&self, mut url: Url) -> Result<RequestBuilder, StorageError> {
        let date = rfc1123_date();
        let authorization = match &self.credential {
            Credential::SharedKey(key) => {
                let resource = format!("/{}{}", self.account, url.path());
                let string_to_sign = format!("GET\n\n\n{date}\n{resource}");
                Some(format!("SharedKey {}:{}", self.account, sign(key, &string_to_sign)?))
            }
            Credential::Sas(token) => {
                append_sas(&mut url, token);
                None
            }
        };

        let mut req = self
            .client
            .get(url)
            .header("x-ms-date", &date)
            .header("x-ms-version", AZURE_API_VERSION)
            .header("Accept", "application/json;odata=nometadata")
            .header("DataServiceVersion", "3.0;NetFx")
            .header("MaxDataServiceVersion", "3.0;NetFx");
        if let Some(value) = authorization {
            req = req.header("Authorization", value);
        }
        Ok(req)
    }

    async fn list_page(&self, container: &str, marker: Option<&str>) -> Result<ListPage, StorageError> {
        let mut params = vec![("restype", "container"), ("comp", "list")];
        if let Some(marker) = marker {
            params.push(("marker", marker));
        }
        let url = self.container_url(container, &params)?;
        debug!(container, marker, "listing blob page");

        let resp = self.blob_get(url, &params)?.send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound);
        }
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(StorageError::Status { status, body });
        }
        Ok(parse_list_page(&body))
    }
}

#[async_trait]
impl BlobStore for AzureStorage {
    async fn container_exists(&self, container: &str) -> Result<bool, StorageError> {
        let params = [("restype", "container")];
        let url = self.container_url(container, &params)?;
        let resp = self.blob_get(url, &params)?.send().await?;

        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(StorageError::Status {
                status,
                body: resp.text().await.unwrap_or_default(),
            }),
        }
    }

    fn list_blobs<'a>(&'a self, container: &'a str) -> BlobNames<'a> {
        // Cursor: None = exhausted, Some(None) = first page, Some(Some(m)) = continue at m.
        let pages = stream::try_unfold(Some(None), move |cursor: Option<Option<String>>| async move {
            let Some(marker) = cursor else {
                return Ok::<_, StorageError>(None);
            };
            let page = self.list_page(container, marker.as_deref()).await?;
            Ok(Some((page.names, page.next_marker.map(Some))))
        });

        pages
            .map_ok(|names| stream::iter(names.into_iter().map(Ok::<String, StorageError>)))
            .try_flatten()
            .boxed()
    }
}

#[async_trait]
impl TableStore for AzureStorage {
    async fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<TableEntity>, StorageError> {
        let url = self.entity_url(table, partition_key, row_key)?;
        debug!(table, partition_key, row_key, "fetching table entity");

        let resp = self.table_get(url)?.send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound);
        }
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(StorageError::Status { status, body });
        }
        if body.trim().is_empty() {
            return Ok(None);
        }

        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| StorageError::Decode(e.to_string()))?;
        TableEntity::from_json(value).map(Some)
    }
}

fn sign(key: &[u8], string_to_sign: &str) -> Result<String, StorageError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| StorageError::Auth(e.to_string()))?;
    mac.update(string_to_sign.as_bytes());
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

fn rfc1123_date() -> String {
    httpdate::fmt_http_date(SystemTime::now())
}

fn append_sas(url: &mut Url, token: &str) {
    let query = match url.query() {
        Some(existing) if !existing.is_empty() => format!("{existing}&{token}"),
        _ => token.to_string(),
    };
    url.set_query(Some(&query));
}

/// `/{account}{encoded path}` followed by one `\nname:value` line per query
/// parameter, sorted by lowercase name.
fn canonical_blob_resource(account: &str, url: &Url, params: &[(&str, &str)]) -> String {
    let mut resource = format!("/{}{}", account, url.path());
    let mut sorted: Vec<(String, &str)> = params
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), *v))
        .collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, value) in sorted {
        resource.push_str(&format!("\n{name}:{value}"));
    }
    resource
}

/// `{table}(PartitionKey='..',RowKey='..')` with OData quote escaping applied
/// before percent-encoding.
pub fn entity_path(table: &str, partition_key: &str, row_key: &str) -> String {
    let key = |k: &str| utf8_percent_encode(&k.replace('\'', "''"), PATH_SEGMENT).to_string();
    format!(
        "{}(PartitionKey='{}',RowKey='{}')",
        utf8_percent_encode(table, PATH_SEGMENT),
        key(partition_key),
        key(row_key)
    )
}

/// Extract blob names and the continuation marker from a List Blobs XML body.
pub fn parse_list_page(body: &str) -> ListPage {
    let mut page = ListPage {
        next_marker: element_text(body, "NextMarker")
            .map(|(_, text)| unescape_xml(text))
            .filter(|m| !m.is_empty()),
        ..Default::default()
    };

    let mut rest = body;
    while let Some(start) = rest.find("<Blob>") {
        let after = &rest[start + "<Blob>".len()..];
        let Some(end) = after.find("</Blob>") else {
            break;
        };
        if let Some((attrs, name)) = element_text(&after[..end], "Name") {
            let name = unescape_xml(name);
            // Names with characters XML cannot carry arrive percent-encoded.
            if attrs.contains(r#"Encoded="true""#) {
                page.names.push(percent_decode_str(&name).decode_utf8_lossy().into_owned());
            } else {
                page.names.push(name);
            }
        }
        rest = &after[end + "</Blob>".len()..];
    }
    page
}

/// Attributes and text of the first `<tag>` or `<tag attr="..">` element in `xml`.
fn element_text<'x>(xml: &'x str, tag: &str) -> Option<(&'x str, &'x str)> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut search = xml;
    loop {
        let start = search.find(&open)?;
        let after = &search[start + open.len()..];
        // Skip longer tag names sharing the prefix, e.g. <NameX>.
        match after.chars().next() {
            Some('>') | Some(' ') => {
                let attrs_end = after.find('>')?;
                let content = &after[attrs_end + 1..];
                let end = content.find(&close)?;
                return Some((after[..attrs_end].trim(), &content[..end]));
            }
            _ => search = after,
        }
    }
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults ServiceEndpoint="https://demo.blob.core.windows.net/" ContainerName="docs">
  <Blobs>
    <Blob><Name>b.txt</Name><Properties><Content-Length>3</Content-Length></Properties></Blob>
    <Blob><Name>a &amp; c.txt</Name><Properties /></Blob>
  </Blobs>
  <NextMarker>2!88!MDAwMDA</NextMarker>
</EnumerationResults>"#;

    fn shared_key_storage() -> AzureStorage {
        AzureStorage::new(
            ConnectionString::parse("AccountName=demo;AccountKey=c2VjcmV0").unwrap(),
        )
    }

    #[test]
    fn list_page_keeps_provider_order_and_marker() {
        let page = parse_list_page(PAGE);
        assert_eq!(page.names, vec!["b.txt", "a & c.txt"]);
        assert_eq!(page.next_marker.as_deref(), Some("2!88!MDAwMDA"));
    }

    #[test]
    fn encoded_names_are_percent_decoded() {
        let page = parse_list_page(
            r#"<Blobs><Blob><Name Encoded="true">bad%01name.txt</Name></Blob><Blob><Name Encoded="false">50%25.txt</Name></Blob></Blobs>"#,
        );
        assert_eq!(page.names, vec!["bad\u{1}name.txt", "50%25.txt"]);
    }

    #[test]
    fn empty_next_marker_ends_listing() {
        let page = parse_list_page("<EnumerationResults><Blobs /><NextMarker /></EnumerationResults>");
        assert!(page.names.is_empty());
        assert_eq!(page.next_marker, None);
    }

    #[test]
    fn entity_path_escapes_quotes_and_reserved_characters() {
        assert_eq!(
            entity_path("people", "o'brien", "a/b"),
            "people(PartitionKey='o%27%27brien',RowKey='a%2Fb')"
        );
    }

    #[test]
    fn canonical_resource_sorts_query_parameters() {
        let storage = shared_key_storage();
        let params = [("restype", "container"), ("comp", "list")];
        let url = storage.container_url("docs", &params).unwrap();
        assert_eq!(
            canonical_blob_resource("demo", &url, &params),
            "/demo/docs\ncomp:list\nrestype:container"
        );
    }

    #[test]
    fn emulator_paths_include_account_segment() {
        let storage = AzureStorage::new(ConnectionString::development());
        let url = storage.container_url("docs", &[]).unwrap();
        assert_eq!(
            canonical_blob_resource("devstoreaccount1", &url, &[]),
            "/devstoreaccount1/devstoreaccount1/docs"
        );
    }

    #[test]
    fn signature_is_stable_base64() {
        let a = sign(b"secret", "GET\n").unwrap();
        let b = sign(b"secret", "GET\n").unwrap();
        assert_eq!(a, b);
        assert_eq!(BASE64_STANDARD.decode(&a).unwrap().len(), 32);
    }

    #[test]
    fn sas_token_is_appended_to_query() {
        let mut url = Url::parse("https://demo.blob.core.windows.net/docs?restype=container").unwrap();
        append_sas(&mut url, "sv=1&sig=x");
        assert_eq!(url.query(), Some("restype=container&sv=1&sig=x"));
    }

    #[test]
    fn rfc1123_date_format() {
        let date = rfc1123_date();
        assert!(date.ends_with("GMT"));
        assert!(date.contains(','));
    }
}
