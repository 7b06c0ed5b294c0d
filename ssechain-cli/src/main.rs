mod client;
mod render;

use clap::{Parser, Subcommand, ValueEnum};
use ssechain_core::logging::init_tracing;
use ssechain_core::origin::Pacing;
use ssechain_core::RelayConfig;
use ssechain_http::{start_origin_server, start_relay_server, OriginConfig, RelayServerConfig};
use std::time::Duration;

use client::ClientOptions;

#[derive(Parser, Debug)]
#[command(name = "ssechain")]
#[command(version, about = "Server-Sent Events streamed from an origin, through a relay, to a terminal client", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the origin service that produces the event streams
    Origin {
        #[arg(long, default_value = "0.0.0.0:8001")]
        addr: String,

        /// Maximum concurrent streams, 0 for unlimited
        #[arg(long, default_value_t = 100)]
        max_sessions: usize,

        /// Stream without artificial typing and token delays
        #[arg(long)]
        no_delay: bool,
    },
    /// Run the relay service that proxies origin streams
    Relay {
        #[arg(long, default_value = "0.0.0.0:8000")]
        addr: String,

        /// Origin service base URL
        #[arg(long, default_value = "http://localhost:8001")]
        upstream: String,

        /// Seconds without an upstream event before the stream is failed
        #[arg(long, default_value_t = 60)]
        idle_timeout_secs: u64,

        /// Maximum concurrent streams, 0 for unlimited
        #[arg(long, default_value_t = 100)]
        max_sessions: usize,
    },
    /// Open a stream on the relay and render it
    Test {
        #[arg(value_enum)]
        mode: TestMode,

        /// Search query or chat question
        #[arg(short, long)]
        query: Option<String>,

        /// Relay service base URL
        #[arg(long, default_value = "http://localhost:8000")]
        backend: String,

        #[arg(long, default_value_t = 60)]
        idle_timeout_secs: u64,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TestMode {
    Search,
    Chat,
}

fn session_limit(max_sessions: usize) -> Option<usize> {
    (max_sessions > 0).then_some(max_sessions)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Origin {
            addr,
            max_sessions,
            no_delay,
        } => {
            init_tracing("ssechain=info", cli.log_json);
            let pacing = if no_delay { Pacing::none() } else { Pacing::default() };
            let config = OriginConfig::new(addr)
                .with_pacing(pacing)
                .with_max_sessions(session_limit(max_sessions));
            start_origin_server(config)
                .await
                .map_err(|e| anyhow::anyhow!("origin service failed: {}", e))?;
        }
        Command::Relay {
            addr,
            upstream,
            idle_timeout_secs,
            max_sessions,
        } => {
            init_tracing("ssechain=info", cli.log_json);
            let relay = RelayConfig::default().with_idle_timeout(Duration::from_secs(idle_timeout_secs));
            let config = RelayServerConfig::new(addr, upstream)
                .with_relay(relay)
                .with_max_sessions(session_limit(max_sessions));
            start_relay_server(config)
                .await
                .map_err(|e| anyhow::anyhow!("relay service failed: {}", e))?;
        }
        Command::Test {
            mode,
            query,
            backend,
            idle_timeout_secs,
        } => {
            // keep the terminal for the rendered stream
            init_tracing("warn", cli.log_json);
            let options = ClientOptions {
                backend,
                relay: RelayConfig::default().with_idle_timeout(Duration::from_secs(idle_timeout_secs)),
            };
            match mode {
                TestMode::Search => {
                    let query = query.unwrap_or_else(|| "homes near me".to_string());
                    client::stream_search(&options, &query).await?;
                }
                TestMode::Chat => {
                    let question = query.unwrap_or_else(|| "Tell me about this property".to_string());
                    client::stream_chat(&options, &question).await?;
                }
            }
        }
    }

    Ok(())
}
