//! Realtime Tail
//!
//! Connects to the realtime endpoint, joins the given chats and prints every
//! inbound event until interrupted. Useful for checking a backend by hand.
//!
//! # Usage
//!
//! ```bash
//! # Tail with the endpoint from ~/.config/realtime-chat/client.toml
//! realtime-tail general random
//!
//! # Against a local backend with a token
//! REALTIME_ENDPOINT=ws://localhost:3001/realtime REALTIME_TOKEN=abc realtime-tail general
//!
//! # With verbose logging
//! RUST_LOG=debug realtime-tail
//! ```
//!
//! # Environment Variables
//!
//! - `REALTIME_ENDPOINT`: WebSocket URL of the backend
//! - `REALTIME_TOKEN`: Bearer credential sent on connect
//! - `REALTIME_CONNECT_TIMEOUT`: Connect timeout in milliseconds
//! - `REALTIME_RECONNECT_ATTEMPTS`: Automatic reconnect budget
//! - `REALTIME_RECONNECT_DELAY`: Base reconnect delay in milliseconds
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)
//!
//! # Signals
//!
//! - SIGINT: Disconnect and exit

use tokio::signal;
use tracing::{info, warn};

use realtime_core::{load_config, names, RealtimeClient, WebSocketTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("realtime_tail=info".parse()?)
                .add_directive("realtime_core=info".parse()?),
        )
        .with_target(true)
        .init();

    let config = load_config()?;
    info!(
        endpoint = %config.transport.endpoint,
        source = %config.source(),
        "Starting realtime tail"
    );

    let transport = WebSocketTransport::new(config.transport.clone());
    let client = RealtimeClient::from_config(transport, &config);

    for event in names::INBOUND {
        client.subscribe(*event, move |payload| {
            println!("{event} {payload}");
            Ok(())
        });
    }

    // Rejoin on every (re)connect; rooms are server-side per connection
    let chats: Vec<String> = std::env::args().skip(1).collect();
    if !chats.is_empty() {
        let commands = client.commands().clone();
        client.subscribe(names::CONNECT, move |_| {
            let commands = commands.clone();
            let chats = chats.clone();
            tokio::spawn(async move {
                for chat in &chats {
                    if let Err(e) = commands.join_chat(chat).await {
                        warn!(chat = %chat, error = %e, "Failed to join chat");
                    }
                }
            });
            Ok(())
        });
    }

    let mut diagnostics = client.diagnostics();
    tokio::spawn(async move {
        while let Ok(diagnostic) = diagnostics.recv().await {
            if diagnostic.is_fatal() {
                eprintln!("fatal: {diagnostic}");
            }
        }
    });

    client.connect().await;

    signal::ctrl_c().await?;
    info!("Interrupted, disconnecting");
    client.disconnect().await;

    Ok(())
}
