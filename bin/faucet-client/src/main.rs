mod cli;
mod config_loader;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use faucet_common::utils::logging::init_logging;
use faucet_common::utils::metrics::ClientMetrics;
use faucet_common::{format_units, Address};
use faucet_coordinator::{format_wait, ClaimCoordinator, UiState};
use faucet_gateway::{build_gateway, ChainGateway};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

const DEFAULT_DECIMALS: u8 = 18;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI
    let args = cli::Cli::parse();

    // 2. Load Config
    let config = config_loader::load_client_config(&args.config, &args)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    // 3. Setup Logging
    init_logging(&config.logging).map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;
    info!("Starting faucet client v{}", env!("CARGO_PKG_VERSION"));

    // 4. Build gateway and session
    let gateway = build_gateway(&config.gateway).context("Failed to build chain gateway")?;
    let metrics = Arc::new(ClientMetrics::new()?);
    let coordinator = ClaimCoordinator::new(gateway.clone(), config.coordinator.clone())
        .with_metrics(metrics.clone());

    // 5. Run the command unless interrupted
    let outcome = tokio::select! {
        result = run(args.command, gateway.as_ref(), &coordinator, config.coordinator.cooldown_secs) => result,
        _ = shutdown_signal() => Err(anyhow!("Interrupted")),
    };
    coordinator.shutdown();

    if args.metrics {
        print!("{}", metrics.gather()?);
    }

    outcome
}

async fn run(
    command: cli::Commands,
    gateway: &dyn ChainGateway,
    coordinator: &ClaimCoordinator,
    cooldown_secs: u64,
) -> Result<()> {
    let decimals = match gateway.token_decimals().await {
        Ok(decimals) => decimals,
        Err(e) => {
            warn!("Could not read token decimals ({}), assuming {}", e, DEFAULT_DECIMALS);
            DEFAULT_DECIMALS
        }
    };

    match command {
        cli::Commands::Connect => {
            coordinator.connect().await?;
            print_session(&coordinator.snapshot().await, decimals);
        }
        cli::Commands::Status { address } => {
            let account = match address {
                Some(account) => account,
                None => gateway.connect().await?,
            };
            print_status(gateway, account, decimals, cooldown_secs).await?;
        }
        cli::Commands::Claim => {
            coordinator.connect().await?;
            let result = coordinator.request_claim().await;
            let state = coordinator.snapshot().await;
            print_session(&state, decimals);
            result?;
        }
        cli::Commands::Pause { paused } => {
            let account = gateway.connect().await?;
            info!("Setting paused={} as {}", paused, account);
            let tx_hash = gateway.set_paused(paused).await?;
            println!("Faucet {} — tx: {}", if paused { "paused" } else { "unpaused" }, tx_hash);
        }
        cli::Commands::Addresses => {
            let addresses = gateway.contract_addresses();
            println!("{}", serde_json::to_string_pretty(&addresses)?);
        }
    }
    Ok(())
}

fn format_timestamp(timestamp: u64) -> String {
    if timestamp == 0 {
        return "never".to_string();
    }
    DateTime::<Utc>::from_timestamp(timestamp as i64, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| timestamp.to_string())
}

fn print_session(state: &UiState, decimals: u8) {
    if let Some(message) = &state.message {
        println!("{}", message.text);
    }
    let Some(address) = state.address else {
        println!("Not connected");
        return;
    };
    println!("Connected: {}", address.short());
    println!("Token balance: {}", format_units(state.token_balance, decimals));
    println!("Eligible to claim: {}", state.eligible);
    println!(
        "Remaining allowance: {}",
        format_units(state.remaining_allowance, decimals)
    );
    println!("Last claim: {}", format_timestamp(state.last_claim_at));
    if state.can_request() {
        println!("Run `faucet-client claim` to request tokens");
    }
}

async fn print_status(
    gateway: &dyn ChainGateway,
    account: Address,
    decimals: u8,
    cooldown_secs: u64,
) -> Result<()> {
    let (balance, eligibility, paused, claimed, now) = tokio::try_join!(
        gateway.token_balance(account),
        gateway.eligibility(account),
        gateway.is_paused(),
        gateway.total_claimed(account),
        gateway.chain_time(),
    )?;

    println!("Account: {}", account);
    println!("Token balance: {}", format_units(balance, decimals));
    println!("Total claimed: {}", format_units(claimed, decimals));
    println!(
        "Remaining allowance: {}",
        format_units(eligibility.remaining_allowance, decimals)
    );
    println!("Faucet paused: {}", paused);
    println!("Last claim: {}", format_timestamp(eligibility.last_claim_at));
    println!("Eligible to claim: {}", eligibility.eligible);
    if let Some(next) = eligibility.next_claim_at(cooldown_secs) {
        if !eligibility.eligible && next > now {
            println!("Next claim in: {}", format_wait(next - now));
        }
    }
    Ok(())
}

/// Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "never");
        assert_eq!(format_timestamp(1_700_000_000), "2023-11-14T22:13:20+00:00");
    }
}
