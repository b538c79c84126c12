//! Subscription plan tiers and their request budgets.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Safety margin applied on top of the nominal per-request spacing.
pub const SPACING_MARGIN: f64 = 1.1;

/// Subscription plan tier of the remote API.
///
/// Each tier maps to a fixed requests-per-minute budget shared by every
/// client in the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    /// Free tier.
    #[default]
    Free,
    /// Light tier.
    Light,
    /// Standard tier.
    Standard,
    /// Premium tier.
    Premium,
}

impl PlanTier {
    /// Returns the requests-per-minute budget of this tier.
    #[must_use]
    pub const fn requests_per_minute(&self) -> u32 {
        match self {
            Self::Free => 5,
            Self::Light => 60,
            Self::Standard => 120,
            Self::Premium => 500,
        }
    }

    /// Returns the minimum spacing between two dispatched requests, in milliseconds.
    #[must_use]
    pub fn min_interval_ms(&self) -> u64 {
        min_interval_ms(self.requests_per_minute())
    }

    /// Returns the minimum spacing between two dispatched requests.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms())
    }

    /// Returns the tier as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Light => "light",
            Self::Standard => "standard",
            Self::Premium => "premium",
        }
    }

    /// Returns all known tiers, cheapest first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Free, Self::Light, Self::Standard, Self::Premium]
    }
}

/// Computes `ceil((60_000 / requests_per_minute) * 1.1)`.
///
/// A budget of zero is treated as one request per minute.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn min_interval_ms(requests_per_minute: u32) -> u64 {
    let rpm = f64::from(requests_per_minute.max(1));
    ((60_000.0 / rpm) * SPACING_MARGIN).ceil() as u64
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = PlanTierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "light" => Ok(Self::Light),
            "standard" => Ok(Self::Standard),
            "premium" => Ok(Self::Premium),
            _ => Err(PlanTierParseError(s.to_string())),
        }
    }
}

/// Error returned when parsing an invalid plan tier string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanTierParseError(String);

impl std::fmt::Display for PlanTierParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid plan tier '{}', expected one of: free, light, standard, premium",
            self.0
        )
    }
}

impl std::error::Error for PlanTierParseError {}
