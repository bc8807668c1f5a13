//! The result of one rate limit check.

use serde::{Deserialize, Serialize};

/// Outcome of a single `get` call. Computed fresh each time, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Maximum requests allowed in the window
    pub limit: u64,
    /// Requests left in the current window, never negative
    pub remaining: u64,
    /// Unix timestamp (seconds) at which the window resets
    pub reset_at: i64,
    /// Whether the identifier has gone past its limit
    pub reached: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_serializes_to_json() {
        let decision = Decision {
            limit: 3,
            remaining: 0,
            reset_at: 1_700_000_060,
            reached: true,
        };

        let json = serde_json::to_value(decision).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "limit": 3,
                "remaining": 0,
                "reset_at": 1_700_000_060,
                "reached": true,
            })
        );
    }
}
