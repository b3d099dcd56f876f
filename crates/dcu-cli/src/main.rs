//! DeCleanup Network CLI
//!
//! Runs transaction scripts against an in-memory network.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dcu_core::prelude::*;
use dcu_economics::constants;
use dcu_node::config::LoggingConfig;
use dcu_node::network::Receipt;
use dcu_node::{Account, Network, NetworkConfig, Transaction};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "dcu")]
#[command(author = "DeCleanup Network")]
#[command(version = "0.1.0")]
#[command(about = "DeCleanup Network - reward, accounting and verification engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a transaction script against a fresh network
    Simulate {
        /// Script file (JSON)
        #[arg(short, long)]
        script: PathBuf,

        /// Print receipts as JSON lines
        #[arg(long)]
        json: bool,

        /// Stop at the first reverted transaction
        #[arg(long)]
        fail_fast: bool,
    },

    /// Print the effective configuration
    Config,

    /// Print protocol constants
    Constants,
}

/// Transaction script
#[derive(Deserialize)]
struct Script {
    /// Block time before the first step
    #[serde(default)]
    start: Timestamp,

    steps: Vec<Step>,

    /// Accounts summarized after the run
    #[serde(default)]
    report: Vec<Account>,
}

#[derive(Deserialize)]
struct Step {
    /// Block time of this step; defaults to the previous step's time
    #[serde(default)]
    at: Option<Timestamp>,
    sender: Account,
    tx: Transaction,
}

fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.is_json() {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_script(path: &Path) -> anyhow::Result<Script> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading script {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing script {}", path.display()))
}

fn print_receipt(step: usize, receipt: &Receipt, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(receipt)?);
        return Ok(());
    }
    let status = match &receipt.error {
        None => "ok".to_string(),
        Some(failure) => format!("REVERTED [{}] {}", failure.code, failure.message),
    };
    println!(
        "#{:<3} t={:<9} {} {} -> {}",
        step, receipt.block_time, receipt.sender, receipt.action, status
    );
    for record in &receipt.events {
        println!("       {} {}", record.emitter, record.event.signature());
    }
    Ok(())
}

fn simulate(config: NetworkConfig, script: &Path, json: bool, fail_fast: bool) -> anyhow::Result<()> {
    let script = load_script(script)?;
    let clock = ManualClock::new(script.start);
    let network = Network::new(config, Arc::new(clock.clone()))?;

    tracing::info!("╔══════════════════════════════════════════════════════════════╗");
    tracing::info!("║           DECLEANUP NETWORK SIMULATOR v0.1.0                 ║");
    tracing::info!("╚══════════════════════════════════════════════════════════════╝");
    tracing::info!("Network: {}", network.config().network.name);
    tracing::info!("Steps: {}", script.steps.len());

    let mut reverted = 0usize;
    for (index, step) in script.steps.into_iter().enumerate() {
        if let Some(at) = step.at {
            if at < clock.now() {
                bail!("step {} goes back in time ({} < {})", index, at, clock.now());
            }
            clock.set(at);
        }
        let receipt = network.apply(&step.sender.0, step.tx);
        print_receipt(index, &receipt, json)?;
        if !receipt.success {
            reverted += 1;
            if fail_fast {
                bail!("step {} reverted", index);
            }
        }
    }

    tracing::info!(events = network.events().len(), reverted, "simulation finished");
    for account in &script.report {
        println!("{}", serde_json::to_string_pretty(&network.summary(&account.0))?);
    }
    Ok(())
}

fn print_constants() {
    println!("Token:                        {} ({} decimals)", constants::SYMBOL, DECIMALS);
    println!("Max NFT level:                {}", constants::MAX_LEVEL);
    println!("Impact per level:             {}", constants::IMPACT_PER_LEVEL);
    println!("Max reward amount:            {} DCU", format_dcu(constants::MAX_REWARD_AMOUNT));
    println!(
        "Impact product claim reward:  {} DCU",
        format_dcu(constants::DEFAULT_IMPACT_PRODUCT_CLAIM_REWARD)
    );
    println!("Referral reward:              {} DCU", format_dcu(constants::DEFAULT_REFERRAL_REWARD));
    println!("Streak reward:                {} DCU", format_dcu(constants::DEFAULT_STREAK_REWARD));
    println!("Streak window:                {} days", constants::STREAK_WINDOW_SECS / SECONDS_PER_DAY);
    println!("Submission reward:            {} DCU", format_dcu(constants::DEFAULT_SUBMISSION_REWARD));
    println!("Minimum verifier stake:       {} DCU", format_dcu(constants::MINIMUM_STAKE));
    println!(
        "Unstaking delay:              {} days",
        constants::UNSTAKING_DELAY_SECS / SECONDS_PER_DAY
    );
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = NetworkConfig::load(cli.config.as_deref())?;
    init_logging(cli.verbose, &config.logging);

    match cli.command {
        Commands::Simulate { script, json, fail_fast } => simulate(config, &script, json, fail_fast)?,
        Commands::Config => print!("{}", config.to_toml()?),
        Commands::Constants => print_constants(),
    }

    Ok(())
}
