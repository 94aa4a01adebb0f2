//! Node configuration.

use flux_redux_core::{ReduxError, ReduxResult, TokenGridPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables of the Redux node, deserializable with defaults so an empty
/// config section yields the reference behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Upper bound on the dependent-model install wait, in seconds.
    ///
    /// Sized for a multi-gigabyte encoder download.
    pub install_timeout_secs: u64,
    /// How the transform treats token counts that do not form a square grid.
    pub token_grid_policy: TokenGridPolicy,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            install_timeout_secs: 600,
            token_grid_policy: TokenGridPolicy::default(),
        }
    }
}

impl NodeConfig {
    /// Range-check the configuration.
    pub fn validate(&self) -> ReduxResult<()> {
        if self.install_timeout_secs == 0 {
            return Err(ReduxError::InvalidParameter {
                name: "install_timeout_secs",
                value: self.install_timeout_secs.to_string(),
                expected: "a positive number of seconds",
            });
        }
        Ok(())
    }

    /// The install wait bound as a duration.
    #[must_use]
    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_reference_timeout() {
        let config = NodeConfig::default();
        assert_eq!(config.install_timeout(), Duration::from_secs(600));
        assert_eq!(config.token_grid_policy, TokenGridPolicy::Strict);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_json_section_deserializes_to_defaults() {
        let config: NodeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, NodeConfig::default());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let config = NodeConfig {
            install_timeout_secs: 0,
            ..NodeConfig::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            ReduxError::InvalidParameter {
                name: "install_timeout_secs",
                ..
            }
        ));
    }

    #[test]
    fn test_policy_deserializes_from_snake_case() {
        let config: NodeConfig =
            serde_json::from_str(r#"{"token_grid_policy": "legacy_truncate"}"#).unwrap();
        assert_eq!(config.token_grid_policy, TokenGridPolicy::LegacyTruncate);
    }
}
