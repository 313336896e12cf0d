//! Self-healing resolution of UI elements and API endpoints.

use std::time::Duration;

pub mod batch;
pub mod element;
pub mod endpoint;
pub mod ledger;

pub use batch::{resolve_targets, Collaborators, HealingReport, TargetOutcome, TargetReport};
pub use element::{ElementHandle, ElementResolver, Locator, UiSurface};
pub use endpoint::{EndpointResolution, EndpointResolver, ReqwestTransport, Transport};
pub use ledger::{HealingAttempt, HealingLedger, HealingStats, TierOutcome};

/// Per-call knobs handed to collaborators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Bound on a single tier's query. Expiry is a tier miss.
    pub tier_timeout: Option<Duration>,
}
