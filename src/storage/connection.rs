use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use thiserror::Error;

const DEV_ACCOUNT_NAME: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";
const DEV_TABLE_ENDPOINT: &str = "http://127.0.0.1:10002/devstoreaccount1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionStringError {
    #[error("connection string is empty")]
    Empty,
    #[error("malformed connection string segment '{0}'")]
    Malformed(String),
    #[error("connection string has no AccountName")]
    MissingAccountName,
    #[error("connection string has neither AccountKey nor SharedAccessSignature")]
    MissingCredential,
    #[error("AccountKey is not valid base64: {0}")]
    InvalidAccountKey(String),
}

#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    SharedKey(Vec<u8>),
    /// Query string without the leading `?`.
    Sas(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::SharedKey(_) => f.write_str("SharedKey(..)"),
            Credential::Sas(_) => f.write_str("Sas(..)"),
        }
    }
}

/// Parsed storage account connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub account_name: String,
    pub credential: Credential,
    pub blob_endpoint: String,
    pub table_endpoint: String,
}

impl ConnectionString {
    pub fn parse(raw: &str) -> Result<Self, ConnectionStringError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConnectionStringError::Empty);
        }

        let mut account_name = None;
        let mut account_key = None;
        let mut sas = None;
        let mut protocol = None;
        let mut suffix = None;
        let mut blob_endpoint = None;
        let mut table_endpoint = None;

        for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment
                .split_once('=')
                .ok_or_else(|| ConnectionStringError::Malformed(segment.to_string()))?;
            let value = value.trim().to_string();

            match key.trim().to_ascii_lowercase().as_str() {
                "usedevelopmentstorage" if value.eq_ignore_ascii_case("true") => {
                    return Ok(Self::development());
                }
                "accountname" => account_name = Some(value),
                "accountkey" => account_key = Some(value),
                "sharedaccesssignature" => sas = Some(value),
                "defaultendpointsprotocol" => protocol = Some(value),
                "endpointsuffix" => suffix = Some(value),
                "blobendpoint" => blob_endpoint = Some(value),
                "tableendpoint" => table_endpoint = Some(value),
                _ => {}
            }
        }

        let account_name = account_name.ok_or(ConnectionStringError::MissingAccountName)?;

        let credential = match (account_key, sas) {
            (Some(key), _) => Credential::SharedKey(
                BASE64_STANDARD
                    .decode(&key)
                    .map_err(|e| ConnectionStringError::InvalidAccountKey(e.to_string()))?,
            ),
            (None, Some(token)) => Credential::Sas(token.trim_start_matches('?').to_string()),
            (None, None) => return Err(ConnectionStringError::MissingCredential),
        };

        let protocol = protocol.unwrap_or_else(|| "https".to_string());
        let suffix = suffix.unwrap_or_else(|| "core.windows.net".to_string());
        let default_endpoint =
            |service: &str| format!("{protocol}://{account_name}.{service}.{suffix}");

        Ok(Self {
            blob_endpoint: blob_endpoint
                .map(|e| e.trim_end_matches('/').to_string())
                .unwrap_or_else(|| default_endpoint("blob")),
            table_endpoint: table_endpoint
                .map(|e| e.trim_end_matches('/').to_string())
                .unwrap_or_else(|| default_endpoint("table")),
            account_name,
            credential,
        })
    }

    /// Well-known settings of the local storage emulator.
    pub fn development() -> Self {
        Self {
            account_name: DEV_ACCOUNT_NAME.to_string(),
            credential: Credential::SharedKey(
                BASE64_STANDARD
                    .decode(DEV_ACCOUNT_KEY)
                    .unwrap_or_default(),
            ),
            blob_endpoint: DEV_BLOB_ENDPOINT.to_string(),
            table_endpoint: DEV_TABLE_ENDPOINT.to_string(),
        }
    }
}
