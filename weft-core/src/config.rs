//! Runtime Configuration
//!
//! Limits that turn runaway re-triggering into a loud failure instead of a
//! hang. Both limits are generous; a healthy graph never gets near them.

use serde::{Deserialize, Serialize};

use crate::error::{ReactiveError, Result};

/// Tunables for a [`Runtime`](crate::reactive::Runtime).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of trigger-class callbacks one drain may run before
    /// its dependants are released.
    pub max_drain_steps: usize,

    /// Maximum number of extra passes a single computation may queue for
    /// itself in one unfold loop.
    pub max_unfold_passes: usize,
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every limit is usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_drain_steps == 0 {
            return Err(ReactiveError::InvalidConfig(
                "max_drain_steps must be greater than zero".into(),
            ));
        }
        if self.max_unfold_passes == 0 {
            return Err(ReactiveError::InvalidConfig(
                "max_unfold_passes must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_drain_steps: 1_000_000,
            max_unfold_passes: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(RuntimeConfig::default().validate().is_ok());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config = RuntimeConfig::from_json(r#"{ "max_drain_steps": 32 }"#).unwrap();
        assert_eq!(config.max_drain_steps, 32);
        assert_eq!(
            config.max_unfold_passes,
            RuntimeConfig::default().max_unfold_passes
        );
    }

    #[test]
    fn zero_limits_are_rejected() {
        let err = RuntimeConfig::from_json(r#"{ "max_unfold_passes": 0 }"#).unwrap_err();
        assert!(matches!(err, ReactiveError::InvalidConfig(_)));
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = RuntimeConfig::from_json("{ max_drain_steps").unwrap_err();
        assert!(matches!(err, ReactiveError::Config(_)));
    }
}
