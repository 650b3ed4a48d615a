//! Native socket transport using tokio-tungstenite

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::transport::{
    socket_channel, Connector, SocketCommand, SocketEndpoint, SocketEvent, SocketLink,
};

/// Opens real WebSocket connections. Each `open` spawns one task that owns
/// the socket until it closes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl Connector for TungsteniteConnector {
    fn open(&self, url: &str) -> SocketLink {
        let (link, endpoint) = socket_channel();
        tokio::spawn(run_socket(url.to_string(), endpoint));
        link
    }
}

async fn run_socket(url: String, endpoint: SocketEndpoint) {
    let SocketEndpoint {
        events,
        mut commands,
    } = endpoint;

    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            tracing::error!("Failed to connect to {}: {}", url, e);
            let _ = events.send(SocketEvent::Error(e.to_string()));
            let _ = events.send(SocketEvent::Closed);
            return;
        }
    };
    tracing::debug!("Socket handshake with {} complete", url);
    let _ = events.send(SocketEvent::Open);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(SocketEvent::Message(text));
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!("Server closed connection: {:?}", frame);
                    let _ = events.send(SocketEvent::Closing);
                }
                Some(Ok(Message::Binary(_))) => {
                    tracing::debug!("Ignoring binary frame");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!("WebSocket error: {}", e);
                    let _ = events.send(SocketEvent::Error(e.to_string()));
                    break;
                }
                None => break,
            },
            command = commands.recv() => match command {
                Some(SocketCommand::Text(text)) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        tracing::error!("Failed to send message: {}", e);
                        let _ = events.send(SocketEvent::Error(e.to_string()));
                        break;
                    }
                }
                // Close requested, or the manager dropped the link
                Some(SocketCommand::Close) | None => {
                    if let Err(e) = write.close().await {
                        tracing::debug!("Close handshake failed: {}", e);
                    }
                    break;
                }
            },
        }
    }

    let _ = events.send(SocketEvent::Closed);
}
