//! Runtime Configuration
//!
//! Knobs for the behaviours the propagation core leaves open: what happens
//! when a subscriber fails, when a computation re-enters itself, and whether
//! dependencies no longer read are dropped between runs.
//!
//! Every field has a default, so a partial JSON document is enough:
//!
//! ```rust,ignore
//! let config = RuntimeConfig::from_json(r#"{"failure_policy": "continue"}"#)?;
//! let rt = Runtime::with_config(config);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What `trigger` does when one subscriber fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the fan-out and return the error to the writer.
    #[default]
    Abort,
    /// Run the remaining subscribers, then report every failure at once.
    Continue,
}

/// What happens when a computation is triggered while it is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReentrancyPolicy {
    /// Ignore the nested trigger.
    #[default]
    Skip,
    /// Fail the nested trigger with `ReactiveError::Reentrant`.
    Error,
    /// Re-run anyway. A self-feeding computation recurses without bound.
    Allow,
}

/// How a computation's dependency record evolves across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PruningPolicy {
    /// Drop automatically tracked subscriptions that a run did not touch.
    #[default]
    Prune,
    /// Keep every subscription ever recorded.
    Accumulate,
}

/// Configuration for a [`Runtime`](crate::reactive::Runtime).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub failure_policy: FailurePolicy,
    pub reentrancy: ReentrancyPolicy,
    pub pruning: PruningPolicy,
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_reentrancy(mut self, policy: ReentrancyPolicy) -> Self {
        self.reentrancy = policy;
        self
    }

    pub fn with_pruning(mut self, policy: PruningPolicy) -> Self {
        self.pruning = policy;
        self
    }
}
