//! Terminal chat front end. Reads one message per line from stdin.
//!
//! `/new` starts a fresh conversation, `/quit` exits.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use copilot_starter::{client::ChatClient, message::ChatMessage, telemetry::init_tracing};

const DEFAULT_API_URL: &str = "http://localhost:3000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("warn");

    let base_url = std::env::var("CHAT_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
    let client = ChatClient::new(&base_url);
    let mut conversation_id: Option<String> = None;

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Copilot Chat ({})", client.endpoint());
    loop {
        stdout.write_all(b"you> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let text = line.trim();
        match text {
            "" => continue,
            "/quit" => break,
            "/new" => {
                conversation_id = None;
                println!("-- new conversation --");
                continue;
            }
            _ => {}
        }

        let mut request = ChatMessage::new(text);
        request.conversation_id = conversation_id.clone();

        match client.send_message(&request).await {
            Ok(reply) => {
                conversation_id = Some(reply.conversation_id);
                println!("bot> {}  [{}]", reply.reply, reply.timestamp.format("%H:%M:%S"));
            }
            Err(e) => eprintln!("error: {e}"),
        }
    }
    Ok(())
}
