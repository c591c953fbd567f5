#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{error, info, warn};
use warden_lib::config::{load_from_path, Config, EndpointClass};
use warden_lib::replay::replay;
use warden_lib::telemetry::{encode_metrics, init_metrics, init_tracing};
use warden_lib::{AbuseDetector, Result};

#[derive(Parser, Debug)]
#[command(author, version, about = "Warden adaptive rate limiter and abuse detector")]
struct Cli {
    /// Path to configuration TOML file (built-in defaults when omitted)
    #[arg(short, long, value_name = "FILE", global = true, env = "WARDEN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load and validate the configuration, then print a summary
    CheckConfig,
    /// Replay `client path timestamp` events and print one JSON decision per line
    Replay {
        /// Event file; reads stdin when omitted
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,
        /// Print Prometheus metrics to stdout after the replay
        #[arg(long)]
        metrics: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => {
            // the configured logging is unavailable, fall back to defaults
            if let Err(tracing_err) = init_tracing(&Default::default(), &Default::default()) {
                eprintln!("failed to initialize tracing: {tracing_err}");
            }
            error!(%err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    if let Err(err) = init_tracing(&cfg.logging, &cfg.telemetry) {
        eprintln!("failed to initialize tracing: {err}");
        std::process::exit(1);
    }

    let outcome = match cli.command {
        Command::CheckConfig => {
            check_config(&cfg);
            Ok(())
        }
        Command::Replay { input, metrics } => run_replay(cfg, input, metrics).await,
    };

    if let Err(err) = outcome {
        error!(%err, "warden exited with error");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_from_path(path),
        None => Ok(Config::default()),
    }
}

fn check_config(cfg: &Config) {
    for class in EndpointClass::ALL {
        let limits = cfg.limits.for_class(class);
        info!(
            class = %class,
            per_minute = limits.per_minute,
            per_hour = limits.per_hour,
            "endpoint limits"
        );
    }
    info!(
        rules = cfg.rules.len(),
        exempt = cfg.exempt.len(),
        suspicious_patterns = cfg.suspicious_patterns.len(),
        block_threshold = cfg.reputation.block_threshold,
        base_block_secs = cfg.blocking.base_secs,
        "configuration loaded"
    );
    println!("configuration OK");
}

async fn run_replay(cfg: Config, input: Option<PathBuf>, print_metrics: bool) -> Result<()> {
    let registry = if print_metrics && cfg.telemetry.metrics_enabled {
        Some(init_metrics()?)
    } else {
        if print_metrics {
            warn!("metrics requested but disabled in [telemetry]");
        }
        None
    };

    let mut detector = AbuseDetector::new(cfg)?;
    if let Some((metrics, _)) = &registry {
        detector = detector.with_metrics(Arc::clone(metrics));
    }

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match input {
        Some(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };
    let mut stdout = tokio::io::stdout();

    let summary = tokio::select! {
        summary = replay(&detector, reader, &mut stdout) => summary?,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, stopping replay");
            return Ok(());
        }
    };

    info!(
        events = summary.events,
        skipped = summary.skipped,
        tracked_clients = summary.stats.tracked_clients,
        allowed = summary.stats.allowed_total,
        rate_limited = summary.stats.rate_limited_total,
        blocked = summary.stats.blocked_total,
        "replay finished"
    );

    if let Some((_, registry)) = &registry {
        print!("{}", encode_metrics(registry)?);
    }

    Ok(())
}
