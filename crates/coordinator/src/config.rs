//! Coordinator configuration

use crate::error::{CoordinatorError, CoordinatorResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Lifetime of validation and claim outcome messages (milliseconds)
    pub message_ttl_ms: u64,

    /// Lifetime of connection failure messages (milliseconds)
    pub connection_message_ttl_ms: u64,

    /// Cooldown assumed when estimating the next claim time (seconds)
    pub cooldown_secs: u64,

    /// Event channel capacity
    pub event_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            message_ttl_ms: 4_000,
            connection_message_ttl_ms: 6_000,
            cooldown_secs: 24 * 60 * 60,
            event_capacity: 64,
        }
    }
}

impl CoordinatorConfig {
    /// Override fields from `FAUCET_*` environment variables
    pub fn apply_env(&mut self) -> CoordinatorResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> CoordinatorResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(cooldown) = lookup("FAUCET_COOLDOWN_SECS") {
            self.cooldown_secs = cooldown
                .trim()
                .parse()
                .map_err(|e| CoordinatorError::Config(format!("FAUCET_COOLDOWN_SECS: {}", e)))?;
        }
        Ok(())
    }

    pub fn message_ttl(&self) -> Duration {
        Duration::from_millis(self.message_ttl_ms)
    }

    pub fn connection_message_ttl(&self) -> Duration {
        Duration::from_millis(self.connection_message_ttl_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.message_ttl(), Duration::from_secs(4));
        assert_eq!(config.connection_message_ttl(), Duration::from_secs(6));
        assert_eq!(config.cooldown_secs, 86_400);
    }

    #[test]
    fn test_cooldown_override() {
        let mut config = CoordinatorConfig::default();
        config
            .apply_overrides(|key| (key == "FAUCET_COOLDOWN_SECS").then(|| "60".to_string()))
            .unwrap();
        assert_eq!(config.cooldown_secs, 60);

        assert!(matches!(
            config.apply_overrides(|_| Some("a day".to_string())),
            Err(CoordinatorError::Config(_))
        ));
    }
}
