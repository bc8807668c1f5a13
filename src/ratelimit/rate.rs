//! Rates: a request limit per fixed period.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{LimiterError, Result};

/// A request limit over a fixed window.
///
/// The limit is at least 1 and the period at least one second; both are
/// enforced at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rate {
    limit: u64,
    period: Duration,
}

impl Rate {
    /// Create a rate of `limit` requests per `period`.
    pub fn new(limit: u64, period: Duration) -> Result<Self> {
        if limit == 0 {
            return Err(LimiterError::InvalidRate(
                "limit must be at least 1".to_string(),
            ));
        }
        if period < Duration::from_secs(1) {
            return Err(LimiterError::InvalidRate(format!(
                "period must be at least one second, got {:?}",
                period
            )));
        }
        Ok(Self { limit, period })
    }

    pub fn per_second(limit: u64) -> Result<Self> {
        Self::new(limit, Duration::from_secs(1))
    }

    pub fn per_minute(limit: u64) -> Result<Self> {
        Self::new(limit, Duration::from_secs(60))
    }

    pub fn per_hour(limit: u64) -> Result<Self> {
        Self::new(limit, Duration::from_secs(3600))
    }

    pub fn per_day(limit: u64) -> Result<Self> {
        Self::new(limit, Duration::from_secs(86400))
    }

    /// Maximum requests allowed in one window.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Length of one window.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Window length in whole seconds, as sent to the store's expiry command.
    pub fn period_secs(&self) -> u64 {
        self.period.as_secs()
    }
}

/// 100 requests per minute.
impl Default for Rate {
    fn default() -> Self {
        Self {
            limit: 100,
            period: Duration::from_secs(60),
        }
    }
}

/// Parses `<limit>-<unit>` where unit is `S`, `M`, `H` or `D`, e.g. `1000-H`.
impl FromStr for Rate {
    type Err = LimiterError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || LimiterError::InvalidRate(format!("expected <limit>-<S|M|H|D>, got {:?}", s));

        let (limit, unit) = s.trim().split_once('-').ok_or_else(invalid)?;
        let limit: u64 = limit.parse().map_err(|_| invalid())?;
        let period = match unit.to_ascii_uppercase().as_str() {
            "S" => Duration::from_secs(1),
            "M" => Duration::from_secs(60),
            "H" => Duration::from_secs(3600),
            "D" => Duration::from_secs(86400),
            _ => return Err(invalid()),
        };

        Self::new(limit, period)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match (self.period.as_secs(), self.period.subsec_nanos()) {
            (1, 0) => "S",
            (60, 0) => "M",
            (3600, 0) => "H",
            (86400, 0) => "D",
            _ => return write!(f, "{} per {:?}", self.limit, self.period),
        };
        write!(f, "{}-{}", self.limit, unit)
    }
}

impl Serialize for Rate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
