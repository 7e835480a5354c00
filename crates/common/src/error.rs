use thiserror::Error;

/// Errors shared by every faucet client crate
#[derive(Error, Debug)]
pub enum CommonError {
    /// Malformed account address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Malformed transaction hash
    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Metrics registry errors
    #[error("Metrics error: {0}")]
    Metrics(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, CommonError>;

impl From<toml::de::Error> for CommonError {
    fn from(err: toml::de::Error) -> Self {
        CommonError::Config(format!("TOML parsing error: {}", err))
    }
}

impl From<config::ConfigError> for CommonError {
    fn from(err: config::ConfigError) -> Self {
        CommonError::Config(format!("Configuration error: {}", err))
    }
}

impl From<prometheus::Error> for CommonError {
    fn from(err: prometheus::Error) -> Self {
        CommonError::Metrics(err.to_string())
    }
}
