use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use council::attachment::Attachment;
use council::config::{load_config, load_env_file, Credentials};
use council::error::SessionError;
use council::session::{Relay, SessionEntrypoint, SessionOutcome, SessionRequest};
use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "council",
    about = "Multi-agent investment advice: stock trends, news, sentiment, and a final decision"
)]
struct Cli {
    /// Stock to analyze. Without it, one task is read per line from stdin.
    stock: Option<String>,

    /// Attach a PDF or text file to the task (repeatable)
    #[arg(short, long, requires = "stock")]
    attach: Vec<PathBuf>,

    /// Path to an optional TOML tuning file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit relayed messages and the session summary as JSON lines
    #[arg(long)]
    json: bool,
}

/// Prints relayed messages to stdout.
struct StdoutRelay {
    json: bool,
}

#[async_trait]
impl Relay for StdoutRelay {
    async fn deliver(&self, text: &str) -> Result<(), SessionError> {
        if self.json {
            let line = serde_json::json!({ "message": text });
            println!("{line}");
        } else {
            println!("{text}\n");
        }
        Ok(())
    }
}

fn print_summary(outcome: &SessionOutcome, json: bool) {
    let SessionOutcome::Completed(outcome) = outcome else {
        return;
    };
    if json {
        let summary = serde_json::json!({
            "session_id": outcome.session_id,
            "stop_reason": outcome.stop_reason,
            "messages": outcome.transcript.len(),
            "turns": outcome.turns,
            "elapsed_ms": outcome.elapsed_ms,
            "verdict": outcome.verdict(),
        });
        println!("{summary}");
    } else if let Some(signal) = outcome.verdict() {
        match signal.current_price {
            Some(price) => eprintln!("Verdict: {} (price {price})", signal.verdict.label()),
            None => eprintln!("Verdict: {}", signal.verdict.label()),
        }
    }
}

/// Next stdin line, or `None` at end of input or once the token is cancelled.
async fn next_task<R>(
    lines: &mut tokio::io::Lines<R>,
    cancel: &CancellationToken,
) -> Result<Option<String>>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(None),
        line = lines.next_line() => line.context("Failed to read from stdin"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    load_env_file();
    let credentials = Credentials::from_env().context("Missing Azure configuration")?;
    let config = load_config(cli.config.as_deref()).context("Failed to load config")?;

    let entrypoint: SessionEntrypoint = council::build_entrypoint(&config, &credentials)
        .context("Failed to build session entrypoint")?;
    let relay = StdoutRelay { json: cli.json };

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Received interrupt, cancelling session");
        shutdown.cancel();
    });

    if let Some(stock) = cli.stock {
        let attachments = cli
            .attach
            .iter()
            .map(|path| Attachment::from_path(path))
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read attachment")?;

        let request = SessionRequest::new(stock).with_attachments(attachments);
        let outcome = entrypoint.handle(request, &relay, &cancel).await;
        print_summary(&outcome, cli.json);
        if !outcome.is_completed() {
            anyhow::bail!("Session failed");
        }
        return Ok(());
    }

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = next_task(&mut lines, &cancel).await? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let outcome = entrypoint
            .handle(SessionRequest::new(input), &relay, &cancel)
            .await;
        print_summary(&outcome, cli.json);
    }

    Ok(())
}
