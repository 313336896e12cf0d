//! Append-only record of resolution attempts for one run.
//!
//! The ledger is a cheap `Clone` handle; every clone appends to the same
//! log. Statistics are derived from the log on demand, never kept as
//! counters, so concurrent resolvers cannot lose updates.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::testgen::candidate::SelectorDescriptor;

/* ============================================================
   Entries
   ============================================================ */

/// Which tier resolved a target, or that none did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TierOutcome {
    Tier(u8),
    Failed,
}

impl TierOutcome {
    pub fn is_healed(self) -> bool {
        matches!(self, TierOutcome::Tier(t) if t > 1)
    }

    /// Key used in tier tallies: `"1"`..`"6"` or `"failed"`.
    pub fn key(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TierOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierOutcome::Tier(t) => write!(f, "{t}"),
            TierOutcome::Failed => f.write_str("failed"),
        }
    }
}

impl Serialize for TierOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TierOutcome::Tier(t) => serializer.serialize_u8(*t),
            TierOutcome::Failed => serializer.serialize_str("failed"),
        }
    }
}

impl<'de> Deserialize<'de> for TierOutcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Tier(u8),
            Label(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Tier(t) => Ok(TierOutcome::Tier(t)),
            Raw::Label(s) if s == "failed" => Ok(TierOutcome::Failed),
            Raw::Label(s) => Err(serde::de::Error::custom(format!("unknown tier {s:?}"))),
        }
    }
}

/// What was being resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HealingSubject {
    Selectors(SelectorDescriptor),
    Endpoint(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealingAttempt {
    #[serde(flatten)]
    pub subject: HealingSubject,
    pub tier: TierOutcome,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl HealingAttempt {
    pub fn new(subject: HealingSubject, tier: TierOutcome) -> Self {
        Self {
            subject,
            success: tier != TierOutcome::Failed,
            tier,
            timestamp: Utc::now(),
        }
    }
}

/* ============================================================
   Ledger
   ============================================================ */

#[derive(Debug, Clone, Default)]
pub struct HealingLedger {
    entries: Arc<Mutex<Vec<HealingAttempt>>>,
}

impl HealingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, attempt: HealingAttempt) {
        self.lock().push(attempt);
    }

    pub fn snapshot(&self) -> Vec<HealingAttempt> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Clears the log between runs.
    pub fn reset(&self) {
        self.lock().clear();
    }

    pub fn stats(&self) -> HealingStats {
        HealingStats::from_attempts(&self.lock())
    }

    // A panicking resolver must not take the ledger down with it.
    fn lock(&self) -> MutexGuard<'_, Vec<HealingAttempt>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/* ============================================================
   Statistics
   ============================================================ */

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealingStats {
    pub attempts: usize,
    pub successes: usize,
    /// Successes at any tier after the first.
    pub healed: usize,
    /// `healed / attempts`, 0 when nothing was attempted.
    pub healing_rate: f64,
    pub by_tier: BTreeMap<String, usize>,
}

impl HealingStats {
    pub fn from_attempts(attempts: &[HealingAttempt]) -> Self {
        let mut stats = HealingStats {
            attempts: attempts.len(),
            ..Default::default()
        };

        for a in attempts {
            if a.success {
                stats.successes += 1;
            }
            if a.tier.is_healed() {
                stats.healed += 1;
            }
            *stats.by_tier.entry(a.tier.key()).or_insert(0) += 1;
        }

        if stats.attempts > 0 {
            stats.healing_rate = stats.healed as f64 / stats.attempts as f64;
        }
        stats
    }
}
