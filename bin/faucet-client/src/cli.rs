use clap::{ArgAction, Parser, Subcommand};
use faucet_common::Address;
use faucet_gateway::Backend;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "faucet-client")]
#[command(about = "Token faucet client", version, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE", default_value = "faucet.toml")]
    pub config: PathBuf,

    /// Chain backend (rpc or simulated)
    #[arg(long, value_name = "BACKEND")]
    pub backend: Option<Backend>,

    /// RPC endpoint of the chain node
    #[arg(long, value_name = "URL")]
    pub rpc_url: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Print client metrics before exiting
    #[arg(long)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect the wallet and show the session state
    Connect,

    /// Read-only eligibility report
    Status {
        /// Account to inspect; defaults to the wallet account
        address: Option<Address>,
    },

    /// Connect and request tokens
    Claim,

    /// Pause or unpause the faucet (owner only)
    Pause {
        #[arg(action = ArgAction::Set, value_name = "true|false")]
        paused: bool,
    },

    /// Show the configured contract addresses
    Addresses,
}
