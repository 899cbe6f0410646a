//! Governor ceilings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configured ceilings for one interpreter.
///
/// Each ceiling is independently optional; `None` means unlimited.
/// Structural ceilings (operations, depth, chain depth, entities, timeout)
/// abort the call. Resource ceilings (damage, spawns) clamp instead.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GovernorLimits {
    /// Total operation dispatches per call, across targets, repeats and nesting.
    pub max_operations: Option<u32>,

    /// Nesting of conditional/repeat/chain/trigger bodies.
    pub max_depth: Option<u32>,

    /// Nesting of `chain_effect` specifically.
    pub max_chain_depth: Option<u32>,

    /// Distinct entities operated on per call.
    pub max_entities_affected: Option<u32>,

    /// Cumulative damage per call.
    pub max_damage_per_effect: Option<f64>,

    /// Cumulative spawns per call.
    pub max_spawns_per_effect: Option<u32>,

    /// Wall-clock budget for the whole call, in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl GovernorLimits {
    /// No ceilings at all.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Every ceiling set to the values the content pipeline enforces.
    #[must_use]
    pub fn production() -> Self {
        Self {
            max_operations: Some(1_000),
            max_depth: Some(16),
            max_chain_depth: Some(5),
            max_entities_affected: Some(100),
            max_damage_per_effect: Some(10_000.0),
            max_spawns_per_effect: Some(50),
            timeout_ms: Some(50),
        }
    }

    #[must_use]
    pub fn with_max_operations(mut self, limit: u32) -> Self {
        self.max_operations = Some(limit);
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, limit: u32) -> Self {
        self.max_depth = Some(limit);
        self
    }

    #[must_use]
    pub fn with_max_chain_depth(mut self, limit: u32) -> Self {
        self.max_chain_depth = Some(limit);
        self
    }

    #[must_use]
    pub fn with_max_entities_affected(mut self, limit: u32) -> Self {
        self.max_entities_affected = Some(limit);
        self
    }

    #[must_use]
    pub fn with_max_damage(mut self, limit: f64) -> Self {
        self.max_damage_per_effect = Some(limit);
        self
    }

    #[must_use]
    pub fn with_max_spawns(mut self, limit: u32) -> Self {
        self.max_spawns_per_effect = Some(limit);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// The timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unlimited() {
        let limits = GovernorLimits::default();
        assert!(limits.max_operations.is_none());
        assert!(limits.timeout().is_none());
    }

    #[test]
    fn test_builders() {
        let limits = GovernorLimits::unlimited()
            .with_max_operations(10)
            .with_max_damage(50.0)
            .with_timeout(Duration::from_millis(20));
        assert_eq!(limits.max_operations, Some(10));
        assert_eq!(limits.max_damage_per_effect, Some(50.0));
        assert_eq!(limits.timeout(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn test_json_camel_case() {
        let limits: GovernorLimits =
            serde_json::from_str(r#"{"maxSpawnsPerEffect": 3, "timeoutMs": 5}"#).unwrap();
        assert_eq!(limits.max_spawns_per_effect, Some(3));
        assert_eq!(limits.timeout(), Some(Duration::from_millis(5)));
        assert!(limits.max_depth.is_none());
    }
}
