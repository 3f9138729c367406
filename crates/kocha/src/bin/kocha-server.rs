use std::time::Duration;

use clap::Parser;
use kocha::DEFAULT_PORT;
use kocha::prelude::*;
use kocha_protocol::DEFAULT_MAX_FRAME_LEN;
use tracing_subscriber::EnvFilter;

/// KOCHA chat server
#[derive(Parser, Debug)]
#[command(name = "kocha-server", version, about = "KOCHA chat server")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "KOCHA_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "KOCHA_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Read timeout in milliseconds; also bounds how long shutdown waits per session
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    /// Largest accepted frame body in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_LEN)]
    max_frame_len: usize,

    /// Tell the sender when a /dm names nobody who is online
    #[arg(long)]
    notify_unknown_recipient: bool,

    /// Tell remaining members when someone leaves
    #[arg(long)]
    announce_departures: bool,

    /// Close a connection after this many rejected logins
    #[arg(long)]
    max_login_attempts: Option<u32>,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind_addr: format!("{}:{}", self.host, self.port),
            read_timeout: Duration::from_millis(self.timeout_ms),
            max_frame_len: self.max_frame_len,
            notify_unknown_recipient: self.notify_unknown_recipient,
            announce_departures: self.announce_departures,
            max_login_attempts: self.max_login_attempts,
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), KochaError> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let server = ChatServer::builder().config(args.into_config()).build().await?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => shutdown.shutdown(),
            Err(e) => tracing::warn!(error = %e, "cannot listen for Ctrl-C"),
        }
    });

    server.run().await
}
