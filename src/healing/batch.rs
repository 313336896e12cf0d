//! Resolve a whole target list on the worker pool.
//!
//! Targets are independent: one failing never stops the others, and
//! every target yields exactly one outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::detectors::impact::HttpMethod;
use crate::executor::run_ordered;
use crate::healing::element::{ElementResolver, UiSurface};
use crate::healing::endpoint::{EndpointResolver, Transport};
use crate::healing::ledger::{HealingLedger, HealingStats};
use crate::healing::ResolveOptions;
use crate::testgen::candidate::{TargetKind, TestTarget};

/// Live collaborators. A missing one leaves its targets untested.
#[derive(Clone, Copy, Default)]
pub struct Collaborators<'a> {
    pub surface: Option<&'a dyn UiSurface>,
    pub transport: Option<&'a dyn Transport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum TargetOutcome {
    Resolved { tier: u8 },
    Healed { tier: u8 },
    Failed { error: String },
    NotTested { reason: String },
}

impl TargetOutcome {
    fn from_tier(tier: u8) -> Self {
        if tier > 1 {
            TargetOutcome::Healed { tier }
        } else {
            TargetOutcome::Resolved { tier }
        }
    }

    fn not_tested(reason: &str) -> Self {
        TargetOutcome::NotTested {
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetReport {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TargetKind,
    #[serde(flatten)]
    pub outcome: TargetOutcome,
}

/// Contents of `healing-report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealingReport {
    pub generated_at: DateTime<Utc>,
    pub stats: HealingStats,
    pub targets: Vec<TargetReport>,
}

impl HealingReport {
    pub fn new(ledger: &HealingLedger, targets: Vec<TargetReport>) -> Self {
        Self {
            generated_at: Utc::now(),
            stats: ledger.stats(),
            targets,
        }
    }
}

pub fn resolve_targets(
    targets: &[TestTarget],
    collaborators: Collaborators<'_>,
    ledger: &HealingLedger,
    options: ResolveOptions,
    workers: usize,
) -> Vec<TargetReport> {
    let reports = run_ordered(targets.iter().collect::<Vec<_>>(), workers, |target| TargetReport {
        id: target.id(),
        name: target.name.clone(),
        kind: target.kind,
        outcome: resolve_one(target, collaborators, ledger, options),
    });

    let healed = reports
        .iter()
        .filter(|r| matches!(r.outcome, TargetOutcome::Healed { .. }))
        .count();
    info!(targets = reports.len(), healed, "resolution finished");

    reports
}

fn resolve_one(
    target: &TestTarget,
    collaborators: Collaborators<'_>,
    ledger: &HealingLedger,
    options: ResolveOptions,
) -> TargetOutcome {
    match target.kind {
        TargetKind::Visual => TargetOutcome::not_tested("visual comparison is not resolved"),
        TargetKind::Ui => {
            let (Some(surface), Some(selectors)) = (collaborators.surface, &target.selectors) else {
                return TargetOutcome::not_tested("no UI surface or selectors");
            };
            match ElementResolver::new(surface, ledger.clone(), options).resolve(selectors) {
                Ok(found) => TargetOutcome::from_tier(found.tier),
                Err(e) => TargetOutcome::Failed { error: e.to_string() },
            }
        }
        TargetKind::Api => {
            let (Some(transport), Some(endpoint)) = (collaborators.transport, &target.endpoint) else {
                return TargetOutcome::not_tested("no transport or endpoint");
            };
            let method = target.method.unwrap_or(HttpMethod::Get);
            match EndpointResolver::new(transport, ledger.clone(), options).resolve(method, endpoint) {
                Ok(res) => TargetOutcome::from_tier(res.tier),
                Err(e) => TargetOutcome::Failed { error: e.to_string() },
            }
        }
    }
}
