//! Bridge configuration.

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

/// Import namespace the guest toolchain links against.
pub const DEFAULT_NAMESPACE: &str = "zig-js";

/// Re-reads of a reference whose NaN payload lacks the reserved prefix
/// before it is decoded as the NaN slot.
pub const DEFAULT_DECODE_RETRIES: u32 = 3;

/// Per-bridge settings. Missing fields take their defaults, so `{}` is a
/// valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Module name under which the imports are registered.
    pub namespace: String,
    /// Bounded retry count for the NaN canonicalization hazard.
    pub decode_retries: u32,
}

impl BridgeConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> BridgeResult<Self> {
        serde_json::from_str(json).map_err(|e| BridgeError::Config(e.to_string()))
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_decode_retries(mut self, retries: u32) -> Self {
        self.decode_retries = retries;
        self
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            decode_retries: DEFAULT_DECODE_RETRIES,
        }
    }
}
