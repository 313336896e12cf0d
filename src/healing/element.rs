//! Tiered element resolution.
//!
//! Tiers run strictly in order. A tier succeeds only when one of its
//! locators matches exactly one element; zero or several matches, a
//! surface error and a timeout all mean "try the next tier".

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{ResolveError, SurfaceError};
use crate::healing::ledger::{HealingAttempt, HealingLedger, HealingSubject, TierOutcome};
use crate::healing::ResolveOptions;
use crate::testgen::candidate::SelectorDescriptor;

/* ============================================================
   Surface collaborator
   ============================================================ */

/// One concrete query against the live UI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    TestId(String),
    Id(String),
    Css { selector: String, within: Option<String> },
    XPath(String),
    Text(String),
    /// Case-insensitive substring.
    PartialText(String),
    Role { role: String, name: Option<String> },
    Label(String),
    Placeholder(String),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::TestId(v) => write!(f, "[data-testid={v:?}]"),
            Locator::Id(v) => write!(f, "#{v}"),
            Locator::Css { selector, within: Some(scope) } => write!(f, "{scope} {selector}"),
            Locator::Css { selector, within: None } => f.write_str(selector),
            Locator::XPath(v) => write!(f, "xpath={v}"),
            Locator::Text(v) => write!(f, "text={v:?}"),
            Locator::PartialText(v) => write!(f, "text~={v:?}"),
            Locator::Role { role, name: Some(name) } => write!(f, "role={role}[name={name:?}]"),
            Locator::Role { role, name: None } => write!(f, "role={role}"),
            Locator::Label(v) => write!(f, "label={v:?}"),
            Locator::Placeholder(v) => write!(f, "placeholder={v:?}"),
        }
    }
}

/// Opaque reference to an element, meaningful only to the surface that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

/// A live UI automation surface (browser driver, test double, ...).
pub trait UiSurface: Send + Sync {
    /// Every element matching `locator`. `timeout` bounds the query.
    fn query(&self, locator: &Locator, timeout: Option<Duration>) -> Result<Vec<ElementHandle>, SurfaceError>;
}

/* ============================================================
   Tiers
   ============================================================ */

type TierLocators = fn(&SelectorDescriptor) -> Vec<Locator>;

/// Most specific first. Index + 1 is the tier number.
const TIERS: [TierLocators; 6] = [
    identity_tier,
    css_tier,
    xpath_tier,
    text_tier,
    role_tier,
    description_tier,
];

pub const TIER_COUNT: usize = TIERS.len();

fn identity_tier(d: &SelectorDescriptor) -> Vec<Locator> {
    let mut out = Vec::new();
    if let Some(v) = &d.test_id {
        out.push(Locator::TestId(v.clone()));
    }
    if let Some(v) = &d.id {
        out.push(Locator::Id(v.clone()));
    }
    out
}

fn css_tier(d: &SelectorDescriptor) -> Vec<Locator> {
    d.css
        .iter()
        .map(|css| Locator::Css {
            selector: css.clone(),
            within: d.context.clone(),
        })
        .collect()
}

fn xpath_tier(d: &SelectorDescriptor) -> Vec<Locator> {
    d.xpath.iter().cloned().map(Locator::XPath).collect()
}

fn text_tier(d: &SelectorDescriptor) -> Vec<Locator> {
    let mut out = Vec::new();
    if let Some(v) = &d.text {
        out.push(Locator::Text(v.clone()));
    }
    if let Some(v) = &d.partial_text {
        out.push(Locator::PartialText(v.clone()));
    }
    out
}

fn role_tier(d: &SelectorDescriptor) -> Vec<Locator> {
    d.role
        .iter()
        .map(|role| Locator::Role {
            role: role.clone(),
            name: d.name.clone(),
        })
        .collect()
}

fn description_tier(d: &SelectorDescriptor) -> Vec<Locator> {
    match &d.description {
        Some(desc) => vec![
            Locator::Text(desc.clone()),
            Locator::Label(desc.clone()),
            Locator::Placeholder(desc.clone()),
        ],
        None => Vec::new(),
    }
}

/* ============================================================
   Resolver
   ============================================================ */

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedElement {
    pub handle: ElementHandle,
    pub tier: u8,
    pub locator: Locator,
}

impl ResolvedElement {
    pub fn healed(&self) -> bool {
        self.tier > 1
    }
}

pub struct ElementResolver<'a, S: UiSurface + ?Sized> {
    surface: &'a S,
    ledger: HealingLedger,
    options: ResolveOptions,
}

impl<'a, S: UiSurface + ?Sized> ElementResolver<'a, S> {
    pub fn new(surface: &'a S, ledger: HealingLedger, options: ResolveOptions) -> Self {
        Self {
            surface,
            ledger,
            options,
        }
    }

    pub fn resolve(&self, descriptor: &SelectorDescriptor) -> Result<ResolvedElement, ResolveError> {
        for (idx, tier_locators) in TIERS.iter().enumerate() {
            let tier = idx as u8 + 1;

            for locator in tier_locators(descriptor) {
                let Some(handle) = self.unique_match(tier, &locator) else {
                    continue;
                };

                if tier > 1 {
                    info!(tier, %locator, "element healed");
                }
                self.ledger.record(HealingAttempt::new(
                    HealingSubject::Selectors(descriptor.clone()),
                    TierOutcome::Tier(tier),
                ));
                return Ok(ResolvedElement { handle, tier, locator });
            }
        }

        warn!(%descriptor, "element not found at any tier");
        self.ledger.record(HealingAttempt::new(
            HealingSubject::Selectors(descriptor.clone()),
            TierOutcome::Failed,
        ));
        Err(ResolveError::ElementNotFound {
            descriptor: Box::new(descriptor.clone()),
        })
    }

    fn unique_match(&self, tier: u8, locator: &Locator) -> Option<ElementHandle> {
        match self.surface.query(locator, self.options.tier_timeout) {
            Ok(mut found) if found.len() == 1 => found.pop(),
            Ok(found) if found.is_empty() => {
                debug!(tier, %locator, "no match");
                None
            }
            Ok(found) => {
                debug!(tier, %locator, matches = found.len(), "ambiguous, skipping");
                None
            }
            Err(e) => {
                debug!(tier, %locator, error = %e, "query failed");
                None
            }
        }
    }
}
