//! uudev: user-space udev automation daemon
//!
//! Matches udev hotplug events against user-defined rules and runs a
//! command per match, debounced per rule. Rules live in
//! `~/.config/uudev/config.yaml` as a stream of YAML documents; see
//! `uudev -t` for a template.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use uudev_dispatch::Dispatcher;
use uudev_monitor::UdevMonitor;
use uudev_rules::{load_rules, HumanDuration, RuleSpec};

mod engine;
mod pidfile;

use engine::Engine;
use pidfile::PidFile;

#[derive(Parser)]
#[command(name = "uudev", about = "User-space udev automation daemon")]
struct Cli {
    /// Log every matched event together with the rule that matched it
    #[arg(short, long)]
    debug: bool,

    /// Kill a previously running instance instead of refusing to start
    #[arg(short, long)]
    force: bool,

    /// Print a rule template and exit
    #[arg(short, long)]
    template: bool,

    /// Print parsed udev events to stdout instead of running rules
    #[arg(long)]
    monitor: bool,

    /// Path to the rule file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.debug)?;

    if cli.template {
        print!("{}", serde_yaml::to_string(&RuleSpec::template())?);
        return Ok(());
    }

    if cli.monitor {
        return monitor_events().await;
    }

    let _pidfile = PidFile::acquire(cli.force)?;

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let content = fs::read_to_string(&config_path)
        .with_context(|| format!("rule file not found ({})", config_path.display()))?;

    info!(path = %config_path.display(), "loading rules");
    let rules = load_rules(&content).context("failed to load rules")?;
    for rule in &rules {
        info!(
            name = rule.name(),
            run = rule.command(),
            delay = %HumanDuration::from(rule.delay()),
            "rule loaded"
        );
    }

    let (_monitor, events) = UdevMonitor::spawn()?;
    let engine = Engine::new(rules, Dispatcher::new(), cli.debug);

    info!("monitoring udev events");
    tokio::select! {
        _ = engine.run(events) => {}
        result = shutdown_signal() => {
            result?;
            info!("shutting down");
        }
    }

    Ok(())
}

/// Print every parsed udev event as pretty JSON, matched or not.
async fn monitor_events() -> Result<()> {
    let (_monitor, mut events) = UdevMonitor::spawn()?;
    while let Some(event) = events.recv().await {
        println!("{}", serde_json::to_string_pretty(&event)?);
    }
    Ok(())
}

/// Resolve until SIGINT or SIGTERM arrives.
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for SIGINT")?;
        }
        _ = terminate.recv() => {}
    }
    Ok(())
}

fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("cannot determine home directory")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("uudev")
        .join("config.yaml"))
}

fn init_tracing(debug: bool) -> Result<()> {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;
    Ok(())
}
