//! Line-oriented orchestration host.
//!
//! Usage:
//!
//! ```text
//! concierge --config config/host.toml [--session <uuid>] [--log <filter>]
//! ```
//!
//! Each stdin line is one user turn: either plain text, or a JSON
//! [`InboundTurn`] such as
//!
//! ```json
//! {"intent": {"text": "email me my meetings", "parameters": {"user_email": "me@example.com"}}}
//! ```
//!
//! Every reply is written to stdout as one line of JSON. Logs go to stderr.

use clap::Parser;
use concierge::config::HostConfig;
use concierge::dispatch::adapters::HttpAgentTransport;
use concierge::host::Host;
use concierge::orchestrator::domain::InboundTurn;
use concierge::routing::domain::Intent;
use concierge::session::domain::SessionId;
use concierge::telemetry;
use eyre::{Result, WrapErr, eyre};
use mockable::DefaultClock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "concierge", about = "Route user turns to mail, calendar and task agents")]
struct Cli {
    /// Host configuration file.
    #[arg(long, env = "CONCIERGE_CONFIG", default_value = "config/host.toml")]
    config: PathBuf,

    /// Session to continue; a new one is started when omitted.
    #[arg(long)]
    session: Option<SessionId>,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, default_value = telemetry::DEFAULT_FILTER)]
    log: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(&cli.log)?;

    let config = HostConfig::load(&cli.config)
        .wrap_err_with(|| format!("loading {}", cli.config.display()))?;
    let transport = Arc::new(HttpAgentTransport::new(CONNECT_TIMEOUT)?);
    let host = Host::from_config(&config, transport, Arc::new(DefaultClock))?;

    let report = host.housekeeper().run_once().await;
    for (agent_id, status) in &report.probed {
        info!(agent_id = %agent_id, status = %status, "initial probe");
    }
    let shutdown = CancellationToken::new();
    let housekeeping = host.spawn_housekeeping(shutdown.clone());

    let session_id = cli.session.unwrap_or_default();
    info!(session_id = %session_id, "ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let turn = match parse_turn(trimmed, session_id) {
            Ok(turn) => turn,
            Err(err) => {
                warn!(error = %err, "ignoring malformed turn");
                continue;
            }
        };
        let reply = host.orchestrator().handle_turn(turn).await;
        let mut encoded = serde_json::to_vec(&reply)?;
        encoded.push(b'\n');
        stdout.write_all(&encoded).await?;
        stdout.flush().await?;
    }

    shutdown.cancel();
    housekeeping
        .await
        .map_err(|err| eyre!("housekeeping task failed: {err}"))?;
    Ok(())
}

fn parse_turn(line: &str, default_session: SessionId) -> Result<InboundTurn> {
    if !line.starts_with('{') {
        return Ok(InboundTurn::new(Intent::from_text(line)).in_session(default_session));
    }
    let turn: InboundTurn = serde_json::from_str(line).wrap_err("decoding JSON turn")?;
    let session_id = turn.session_id.unwrap_or(default_session);
    Ok(turn.in_session(session_id))
}
