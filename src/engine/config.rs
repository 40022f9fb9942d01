//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Tunables for [`BitemporalEngine`](super::BitemporalEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of versions a single history read returns.
    pub history_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_limit: Self::DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl EngineConfig {
    /// Default for `history_limit`.
    pub const DEFAULT_HISTORY_LIMIT: usize = 100;

    /// Sets `history_limit`. Checked by [`validate`](Self::validate).
    #[must_use]
    pub const fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Checks the configuration, returning it unchanged when usable.
    ///
    /// # Errors
    ///
    /// `ValidationError::InvalidHistoryLimit` if `history_limit` is zero.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.history_limit == 0 {
            return Err(ValidationError::InvalidHistoryLimit {
                limit: self.history_limit,
            });
        }
        Ok(self)
    }
}
