use std::process::ExitCode;

use chrono::Local;
use clap::Parser;
use kocha::DEFAULT_PORT;
use kocha::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Line-oriented KOCHA chat client
#[derive(Parser, Debug)]
#[command(name = "kocha-client", version, about = "KOCHA chat client")]
struct Args {
    /// Alias to log in with
    alias: String,

    /// Server host
    #[arg(long, env = "KOCHA_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, env = "KOCHA_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,
}

fn render(message: &ChatMessage) -> String {
    let at = message.sent_at().with_timezone(&Local).format("%H:%M:%S");
    format!("[{at}] {message}")
}

#[tokio::main]
async fn main() -> Result<ExitCode, KochaError> {
    let args = Args::parse();

    // Diagnostics go to stderr so they never interleave with chat lines.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut client =
        ChatClient::connect((args.host.as_str(), args.port), ClientConfig::default()).await?;

    match client.login(&args.alias).await? {
        LoginOutcome::Accepted { welcome } => println!("{welcome}"),
        LoginOutcome::Rejected { reason } => {
            eprintln!("{reason}");
            client.close().await;
            return Ok(ExitCode::FAILURE);
        }
    }

    let mut handle = client.into_receiver(|message| println!("{}", render(&message)));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.is_empty() {
                    continue;
                }
                handle.send(&line).await?;
                if line == "/q" || line == "/quit" {
                    break;
                }
            }
            _ = handle.disconnected() => {
                eprintln!("Disconnected from server.");
                break;
            }
        }
    }

    handle.close().await;
    Ok(ExitCode::SUCCESS)
}
