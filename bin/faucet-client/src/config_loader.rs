use crate::cli::Cli;
use anyhow::{Context, Result};
use faucet_common::utils::config::load_config_or_default;
use faucet_common::utils::logging::LoggingConfig;
use faucet_coordinator::CoordinatorConfig;
use faucet_gateway::GatewayConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Client configuration file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub logging: LoggingConfig,
    pub gateway: GatewayConfig,
    pub coordinator: CoordinatorConfig,
}

/// File, then `FAUCET_*` environment, then command line flags
pub fn load_client_config<P: AsRef<Path>>(path: P, cli: &Cli) -> Result<ClientConfig> {
    let mut config: ClientConfig = load_config_or_default(path)?;

    config
        .gateway
        .apply_env()
        .context("Invalid gateway environment")?;
    config
        .coordinator
        .apply_env()
        .context("Invalid coordinator environment")?;

    apply_cli(&mut config, cli);
    Ok(config)
}

fn apply_cli(config: &mut ClientConfig, cli: &Cli) {
    if let Some(backend) = cli.backend {
        config.gateway.backend = backend;
    }

    if let Some(rpc_url) = &cli.rpc_url {
        config.gateway.rpc_url = rpc_url.clone();
    }

    if cli.debug {
        config.logging.level = "debug".to_string();
    }
}
