use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper bound for any score or rating.
pub const MAX_REPUTATION: u64 = 1000;

/// Lower bound for any score. Scores and ratings are unsigned, so this is never enforced explicitly.
pub const MIN_REPUTATION: u64 = 0;

/// Score assigned on registration and reset, and reported for unknown addresses.
pub const INITIAL_REPUTATION: u64 = 500;

/// Stored reputation state for one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationRecord {
    /// Current score, always within `[MIN_REPUTATION, MAX_REPUTATION]`.
    pub score: u64,
    /// Number of ratings folded into the running average.
    pub total_ratings: u64,
    /// `false` only for the implicit default record.
    pub is_registered: bool,
}

impl ReputationRecord {
    /// A freshly registered record.
    pub const fn registered() -> Self {
        Self {
            score: INITIAL_REPUTATION,
            total_ratings: 0,
            is_registered: true,
        }
    }

    /// The record reported for addresses that were never registered.
    pub const fn unregistered() -> Self {
        Self {
            score: INITIAL_REPUTATION,
            total_ratings: 0,
            is_registered: false,
        }
    }
}

impl Default for ReputationRecord {
    fn default() -> Self {
        Self::unregistered()
    }
}

/// Result of a total lookup: either a materialised record or the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordView {
    Stored(ReputationRecord),
    Default,
}

impl RecordView {
    pub fn is_stored(&self) -> bool {
        matches!(self, RecordView::Stored(_))
    }

    /// The stored record, or the unregistered default.
    pub fn record(&self) -> ReputationRecord {
        match self {
            RecordView::Stored(record) => *record,
            RecordView::Default => ReputationRecord::unregistered(),
        }
    }

    pub fn score(&self) -> u64 {
        self.record().score
    }
}

/// Fixed ratings offered as shortcuts for the common cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingPreset {
    Positive,
    Negative,
    Neutral,
}

impl RatingPreset {
    pub const fn value(self) -> u64 {
        match self {
            RatingPreset::Positive => 800,
            RatingPreset::Negative => 200,
            RatingPreset::Neutral => 500,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            RatingPreset::Positive => "positive",
            RatingPreset::Negative => "negative",
            RatingPreset::Neutral => "neutral",
        }
    }
}

impl fmt::Display for RatingPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RatingPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "positive" => Ok(RatingPreset::Positive),
            "negative" => Ok(RatingPreset::Negative),
            "neutral" => Ok(RatingPreset::Neutral),
            other => Err(format!(
                "unknown rating preset '{}', expected positive, negative or neutral",
                other
            )),
        }
    }
}

/// Read-only view of the registry bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationConstants {
    pub max_reputation: u64,
    pub min_reputation: u64,
    pub initial_reputation: u64,
}

impl Default for ReputationConstants {
    fn default() -> Self {
        Self {
            max_reputation: MAX_REPUTATION,
            min_reputation: MIN_REPUTATION,
            initial_reputation: INITIAL_REPUTATION,
        }
    }
}
