use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use changescope::detectors::impact::HttpMethod;
use changescope::error::{ResolveError, SurfaceError, TransportError};
use changescope::healing::endpoint::{EndpointRequest, EndpointResponse};
use changescope::healing::{
    resolve_targets, Collaborators, ElementHandle, ElementResolver, EndpointResolver, HealingLedger, HealingReport,
    Locator, ResolveOptions, TargetOutcome, TierOutcome, Transport, UiSurface,
};
use changescope::persistence;
use changescope::testgen::{generate_test_targets, SelectorDescriptor};
use changescope::{ChangeRecord, ChangeType, FileChange, LineChangeSet};

/* ---------- doubles ---------- */

#[derive(Default)]
struct RecordingSurface {
    counts: HashMap<Locator, usize>,
    slow: Vec<Locator>,
    queries: Mutex<Vec<Locator>>,
}

impl UiSurface for RecordingSurface {
    fn query(&self, locator: &Locator, timeout: Option<Duration>) -> Result<Vec<ElementHandle>, SurfaceError> {
        self.queries.lock().unwrap().push(locator.clone());
        if timeout.is_some() && self.slow.contains(locator) {
            return Err(SurfaceError::Timeout);
        }
        let n = self.counts.get(locator).copied().unwrap_or(0);
        Ok((0..n).map(|i| ElementHandle(format!("{locator}@{i}"))).collect())
    }
}

#[derive(Default)]
struct RecordingTransport {
    live: HashMap<String, u16>,
    requests: Mutex<Vec<String>>,
}

impl Transport for RecordingTransport {
    fn send(&self, request: &EndpointRequest) -> Result<EndpointResponse, TransportError> {
        self.requests.lock().unwrap().push(request.path.clone());
        match self.live.get(&request.path) {
            Some(&status) => Ok(EndpointResponse { status }),
            None => Err(TransportError::Network {
                url: request.path.clone(),
                reason: "connection refused".into(),
            }),
        }
    }
}

fn css(selector: &str) -> Locator {
    Locator::Css {
        selector: selector.into(),
        within: None,
    }
}

/* ---------- element tiers ---------- */

#[test]
fn missing_test_id_heals_through_css() {
    let surface = RecordingSurface {
        counts: HashMap::from([(css(".y"), 1)]),
        ..Default::default()
    };
    let ledger = HealingLedger::new();
    let resolver = ElementResolver::new(&surface, ledger.clone(), ResolveOptions::default());

    let found = resolver.resolve(&SelectorDescriptor::test_id("x").with_css(".y")).unwrap();
    assert_eq!(found.tier, 2);

    let log = ledger.snapshot();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].tier, TierOutcome::Tier(2));
    assert!(log[0].success);
}

#[test]
fn ambiguous_match_is_never_returned() {
    let surface = RecordingSurface {
        counts: HashMap::from([(Locator::TestId("row".into()), 4), (css(".row.selected"), 1)]),
        ..Default::default()
    };
    let ledger = HealingLedger::new();
    let resolver = ElementResolver::new(&surface, ledger.clone(), ResolveOptions::default());

    let found = resolver
        .resolve(&SelectorDescriptor::test_id("row").with_css(".row.selected"))
        .unwrap();
    assert_eq!(found.tier, 2);
    assert_eq!(found.locator, css(".row.selected"));

    let only_ambiguous = SelectorDescriptor::test_id("row");
    assert!(matches!(
        resolver.resolve(&only_ambiguous),
        Err(ResolveError::ElementNotFound { .. })
    ));
    assert_eq!(ledger.stats().by_tier.get("failed"), Some(&1));
}

#[test]
fn timed_out_tier_moves_on() {
    let surface = RecordingSurface {
        counts: HashMap::from([(Locator::TestId("x".into()), 1), (css(".y"), 1)]),
        slow: vec![Locator::TestId("x".into())],
        ..Default::default()
    };
    let options = ResolveOptions {
        tier_timeout: Some(Duration::from_millis(50)),
    };
    let resolver = ElementResolver::new(&surface, HealingLedger::new(), options);

    let found = resolver.resolve(&SelectorDescriptor::test_id("x").with_css(".y")).unwrap();
    assert_eq!(found.tier, 2);
    assert_eq!(surface.queries.lock().unwrap().len(), 2);
}

/* ---------- endpoint tiers ---------- */

#[test]
fn working_exact_path_sends_one_request() {
    let transport = RecordingTransport {
        live: HashMap::from([("/users".to_string(), 200), ("/api/users".to_string(), 200)]),
        ..Default::default()
    };
    let resolver = EndpointResolver::new(&transport, HealingLedger::new(), ResolveOptions::default());

    let res = resolver.resolve(HttpMethod::Get, "/users").unwrap();
    assert_eq!(res.tier, 1);
    assert_eq!(transport.requests.lock().unwrap().len(), 1);
}

#[test]
fn singular_resource_heals_by_pluralizing() {
    let transport = RecordingTransport {
        live: HashMap::from([("/widgets".to_string(), 200)]),
        ..Default::default()
    };
    let ledger = HealingLedger::new();
    let resolver = EndpointResolver::new(&transport, ledger.clone(), ResolveOptions::default());

    let res = resolver.resolve(HttpMethod::Get, "/widget").unwrap();
    assert!(res.healed);
    assert_eq!(res.tier, 6);
    assert_eq!(res.resolved_path, "/widgets");

    let stats = ledger.stats();
    assert_eq!(stats.healed, 1);
    assert_eq!(stats.by_tier.get("6"), Some(&1));

    ledger.reset();
    assert_eq!(ledger.stats().attempts, 0);
}

#[test]
fn version_prefix_is_reported() {
    let transport = RecordingTransport {
        live: HashMap::from([("/v2/orders".to_string(), 404)]),
        ..Default::default()
    };
    let resolver = EndpointResolver::new(&transport, HealingLedger::new(), ResolveOptions::default());

    let res = resolver.resolve(HttpMethod::Delete, "/orders").unwrap();
    assert_eq!(res.tier, 4);
    assert_eq!(res.version.as_deref(), Some("v2"));
    assert_eq!(res.status, 404);
}

/* ---------- batch over generated targets ---------- */

#[test]
fn generated_targets_resolve_into_a_report() {
    let mut functions = ChangeRecord::new();
    functions.insert("getWidget", ChangeType::Modified);
    let api_file = FileChange {
        file: "src/api/widget.js".into(),
        lines: LineChangeSet {
            modified: [3].into_iter().collect(),
            ..Default::default()
        },
        impact: vec!["API endpoints".into(), "GET requests".into()],
        functions,
        hunks: vec![],
    };

    let targets = generate_test_targets(&[api_file]);
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].endpoint.as_deref(), Some("/widget"));

    let transport = RecordingTransport {
        live: HashMap::from([("/widgets".to_string(), 200)]),
        ..Default::default()
    };
    let ledger = HealingLedger::new();
    let collaborators = Collaborators {
        surface: None,
        transport: Some(&transport as &dyn Transport),
    };
    let reports = resolve_targets(&targets, collaborators, &ledger, ResolveOptions::default(), 2);
    assert_eq!(reports[0].outcome, TargetOutcome::Healed { tier: 6 });

    let dir = tempfile::tempdir().unwrap();
    let path = persistence::save_healing_report(dir.path(), &HealingReport::new(&ledger, reports)).unwrap();
    let json: serde_json::Value = persistence::read_json(&path).unwrap();
    assert_eq!(json["stats"]["healed"], 1);
    assert_eq!(json["stats"]["byTier"]["6"], 1);
    assert_eq!(json["targets"][0]["status"], "healed");
}
