//! onliner: keep many gateway accounts online at once.
//!
//! Reads one token per line, gives each account a randomly drawn presence,
//! and runs a supervised gateway session per account until interrupted.

mod banner;
mod config;
mod credentials;
mod presence;
mod report;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use onliner_client::transport::validate_url;
use onliner_client::{Assignment, FleetReport, SessionSupervisor, WebSocketConnector};

use crate::config::Config;
use crate::presence::PresenceConfig;
use crate::report::ConsoleReporter;

/// onliner: gateway presence keeper
#[derive(Parser)]
#[command(name = "onliner", version, about = "Keep multiple gateway accounts online with a custom presence")]
struct Cli {
    /// Token file, one token per line
    #[arg(long, default_value = "tokens.txt")]
    tokens: PathBuf,

    /// Presence config (JSON)
    #[arg(long, default_value = "config.json")]
    presence: PathBuf,

    /// Settings file path [default: ~/.onliner/config.toml]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Gateway URL, overrides the settings file
    #[arg(long)]
    gateway_url: Option<String>,

    /// Do not print the startup banner
    #[arg(long)]
    no_banner: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Explicit tracing filter, e.g. "onliner_client=trace"
    #[arg(long)]
    log_filter: Option<String>,
}

fn init_tracing(cli: &Cli) {
    let (filter, with_target) = match (&cli.log_filter, cli.verbose) {
        (Some(filter), _) => (filter.clone(), true),
        (None, true) => (
            "onliner=debug,onliner_cli=debug,onliner_client=debug,onliner_core=debug".to_string(),
            true,
        ),
        (None, false) => (
            "onliner=warn,onliner_cli=warn,onliner_client=warn".to_string(),
            false,
        ),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(with_target)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("onliner: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(config::default_path);
    let mut cfg = Config::load(&config_path)?;
    if let Some(url) = &cli.gateway_url {
        cfg.gateway.url = url.clone();
    }
    validate_url(&cfg.gateway.url)?;

    let tokens = credentials::load(&cli.tokens)?;
    let presence = PresenceConfig::load(&cli.presence)?;
    let assignments = assign(tokens, &presence)?;

    if !cli.no_banner {
        banner::print(assignments.len());
    }

    let supervisor = SessionSupervisor::new(
        Arc::new(WebSocketConnector),
        cfg.session_config(),
        cfg.backoff_policy(),
        Arc::new(ConsoleReporter::new()),
    );
    let fleet = supervisor.spawn(assignments);
    let canceller = fleet.canceller();

    let wait = fleet.wait();
    tokio::pin!(wait);

    let finished = tokio::select! {
        report = &mut wait => Some(report),
        _ = shutdown_signal() => None,
    };
    let report = match finished {
        Some(report) => {
            warn!("every account was rejected, nothing left to run");
            report
        }
        None => {
            info!("shutdown signal received, closing sessions");
            canceller.trigger();
            wait.await
        }
    };

    print_summary(&report);
    Ok(())
}

/// Pair every token with a freshly drawn presence.
fn assign(
    tokens: Vec<onliner_core::Credential>,
    presence: &PresenceConfig,
) -> Result<Vec<Assignment>> {
    let mut rng = rand::thread_rng();
    let mut assignments = Vec::with_capacity(tokens.len());
    for credential in tokens {
        let drawn = presence.choose(&mut rng)?;
        assignments.push(Assignment::new(credential, drawn));
    }
    Ok(assignments)
}

fn print_summary(report: &FleetReport) {
    println!();
    println!(
        "{} accounts, {} rejected, {} restarts",
        report.units.len(),
        report.rejected().count(),
        report.total_restarts()
    );
    for unit in &report.units {
        let last = unit.last_reason.map(|r| r.as_str()).unwrap_or("-");
        println!(
            "{}",
            report::format_line(
                "·",
                &format!("{:?}", unit.state),
                unit.label(),
                &format!("attempts={} last={last}", unit.attempts)
            )
        );
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                ctrl_c.await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onliner_core::Credential;

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["onliner"]);
        assert_eq!(cli.tokens, PathBuf::from("tokens.txt"));
        assert_eq!(cli.presence, PathBuf::from("config.json"));
        assert!(cli.config.is_none());
        assert!(!cli.no_banner);
    }

    #[test]
    fn cli_overrides() {
        let cli = Cli::parse_from([
            "onliner",
            "--tokens",
            "/tmp/t.txt",
            "--gateway-url",
            "ws://localhost:9000",
            "--no-banner",
            "-v",
        ]);
        assert_eq!(cli.tokens, PathBuf::from("/tmp/t.txt"));
        assert_eq!(cli.gateway_url.as_deref(), Some("ws://localhost:9000"));
        assert!(cli.no_banner);
        assert!(cli.verbose);
    }

    #[test]
    fn every_token_gets_one_presence() {
        let presence = PresenceConfig::from_json(
            r#"{
                "choose_random_online_status_from": ["dnd"],
                "choose_random_activity_type_from": ["watching"],
                "watching": {"choose_random_name_from": ["YouTube"]}
            }"#,
        )
        .unwrap();
        let tokens = vec![Credential::new("a"), Credential::new("b")];

        let assignments = assign(tokens, &presence).unwrap();
        assert_eq!(assignments.len(), 2);
        assert_eq!(assignments[1].credential.expose(), "b");
        assert!(assignments
            .iter()
            .all(|a| a.presence.activities.len() == 1));
    }
}
