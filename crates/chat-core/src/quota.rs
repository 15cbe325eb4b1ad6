//! Free-tier quota guard.
//!
//! A lifetime counter of messages sent without a token, compared against a
//! fixed ceiling. There is no time window and no reset: the count only goes
//! down when the persisted store is cleared.

use serde::{Deserialize, Serialize};
use chat_types::{ChatError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaGuard {
    used: u32,
    limit: u32,
}

impl QuotaGuard {
    pub fn new(limit: u32) -> Self {
        Self { used: 0, limit }
    }

    /// Counter restored from storage.
    pub fn with_used(limit: u32, used: u32) -> Self {
        Self { used, limit }
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }

    /// Count one anonymous message, or refuse once the limit is reached.
    pub fn try_consume(&mut self) -> Result<()> {
        if self.is_exhausted() {
            return Err(ChatError::QuotaExceeded { limit: self.limit });
        }
        self.used += 1;
        Ok(())
    }
}
