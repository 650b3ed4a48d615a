//! Socrates terminal client.
//!
//! Usage: `socrates <problem statement>`. Every line typed on stdin is sent as
//! the student's current step and the tutor's hint is streamed back.

use std::io::Write;

use anyhow::Context;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use socrates_client::{listener, ClientConfig, ClientEvent, ResponseAccumulator, TutorClient};
use socrates_protocol::InboundMessage;

const HELP: &str = "Commands: /reset /history /last /connect /help /quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "socrates_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let question = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if question.trim().is_empty() {
        anyhow::bail!("usage: socrates <problem statement>");
    }

    let config = ClientConfig::from_env().context("invalid client configuration")?;
    tracing::info!("Starting Socrates client against {}", config.url);

    let client = TutorClient::new(config);
    let accumulator = ResponseAccumulator::new();
    let _subscription = accumulator.attach(client.registry());
    install_printers(&client);

    if let Err(e) = client.connect().await {
        tracing::warn!("Initial connection failed, retrying in background: {}", e);
    }

    println!("Problem: {question}");
    println!("Type your current step and press enter. {HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let sent = match line.trim() {
            "/quit" => break,
            "/reset" => client.reset_session(),
            "/history" => client.get_history(),
            "/last" => {
                match accumulator.last_completed() {
                    Some(hint) => println!("{hint}"),
                    None => println!("(no hint yet)"),
                }
                continue;
            }
            "/connect" => {
                if let Err(e) = client.connect().await {
                    eprintln!("[connection] {e}");
                }
                continue;
            }
            "/help" => {
                println!("{HELP}");
                continue;
            }
            step => client.send_chat_message(step, &question),
        };
        if !sent {
            eprintln!(
                "[connection] not connected ({}), try again shortly",
                client.state()
            );
        }
    }

    client.disconnect();
    Ok(())
}

fn flush() {
    let _ = std::io::stdout().flush();
}

/// Print server traffic as it arrives.
fn install_printers(client: &TutorClient) {
    client.on(
        ClientEvent::System,
        listener(|data| {
            if let Some(message) = data.text("message") {
                println!("[system] {message}");
            }
        }),
    );
    client.on(
        ClientEvent::Status,
        listener(|data| {
            if let Some(message) = data.text("message") {
                println!("[status] {message}");
            }
        }),
    );
    client.on(
        ClientEvent::AiResponseStart,
        listener(|_| {
            print!("tutor: ");
            flush();
        }),
    );
    client.on(
        ClientEvent::AiResponseChunk,
        listener(|data| {
            print!("{}", data.text("content").unwrap_or_default());
            flush();
        }),
    );
    client.on(ClientEvent::AiResponseEnd, listener(|_| println!()));
    client.on(
        ClientEvent::Error,
        listener(|data| match data.as_fault() {
            Some(fault) => eprintln!("[error] {}: {}", fault.kind.as_str(), fault.detail),
            None => eprintln!(
                "[error] {}",
                data.text("message").unwrap_or("unknown server error")
            ),
        }),
    );
    client.on(
        ClientEvent::History,
        listener(|data| {
            let Some(Value::Object(payload)) = data.payload() else {
                return;
            };
            match InboundMessage::from_object(payload.clone()).history_entries() {
                Ok(entries) if entries.is_empty() => println!("[history] (empty)"),
                Ok(entries) => {
                    for entry in entries {
                        println!("[history] {}: {}", entry.role, entry.content);
                    }
                }
                Err(e) => tracing::warn!("Malformed history message: {}", e),
            }
        }),
    );
    client.on(
        ClientEvent::Message,
        listener(|data| {
            if let Some(payload) = data.payload() {
                println!("[message] {payload}");
            }
        }),
    );
    client.on(
        ClientEvent::Close,
        listener(|_| eprintln!("[connection] closed")),
    );
    client.on(
        ClientEvent::MaxReconnectReached,
        listener(|_| eprintln!("[connection] gave up reconnecting, type /connect to retry")),
    );
}
