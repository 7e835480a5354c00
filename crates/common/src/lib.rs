//! Shared building blocks for the faucet client: chain primitives,
//! the common error type, logging, configuration loading and metrics.

pub mod error;
pub mod types;
pub mod utils;

pub use error::{CommonError, Result};
pub use types::{format_units, Address, Amount, TxHash, ADDRESS_LENGTH, HASH_LENGTH};
