//! Tiered endpoint resolution.
//!
//! Each tier rewrites the requested path and issues one real request.
//! The first request that produces any HTTP response resolves the
//! endpoint; judging the status code is left to the caller.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::detectors::impact::HttpMethod;
use crate::error::{ResolveError, TransportError};
use crate::healing::ledger::{HealingAttempt, HealingLedger, HealingSubject, TierOutcome};
use crate::healing::ResolveOptions;

/* ============================================================
   Transport collaborator
   ============================================================ */

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRequest {
    pub method: HttpMethod,
    pub path: String,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointResponse {
    pub status: u16,
}

/// Sends one request. Only network-level failures are errors; a 404 or
/// 500 is still a response.
pub trait Transport: Send + Sync {
    fn send(&self, request: &EndpointRequest) -> Result<EndpointResponse, TransportError>;
}

/// Blocking HTTP transport rooted at a base URL.
pub struct ReqwestTransport {
    client: Client,
    base: Url,
}

impl ReqwestTransport {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let invalid = |reason: String| TransportError::InvalidUrl {
            url: base_url.to_string(),
            reason,
        };

        // Joining drops the last segment of a base without a trailing slash.
        let mut base = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .build()
            .map_err(|e| invalid(e.to_string()))?;

        Ok(Self { client, base })
    }

    fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| TransportError::InvalidUrl {
                url: path.to_string(),
                reason: e.to_string(),
            })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &EndpointRequest) -> Result<EndpointResponse, TransportError> {
        let url = self.url_for(&request.path)?;
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, url.clone());
        if let Some(t) = request.timeout {
            builder = builder.timeout(t);
        }

        let resp = builder.send().map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout { url: url.to_string() }
            } else {
                TransportError::Network {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        Ok(EndpointResponse {
            status: resp.status().as_u16(),
        })
    }
}

/* ============================================================
   Tiers
   ============================================================ */

type PathRewrite = fn(&str) -> String;

/// Tier number is index + 1. The label names the API version a
/// prefix tier tried.
const TIERS: [(PathRewrite, Option<&str>); 6] = [
    (exact, None),
    (api_prefixed, Some("api")),
    (v1_prefixed, Some("v1")),
    (v2_prefixed, Some("v2")),
    (strip_trailing_slash, None),
    (pluralize_resource, None),
];

fn exact(path: &str) -> String {
    path.to_string()
}

fn api_prefixed(path: &str) -> String {
    format!("/api{path}")
}

fn v1_prefixed(path: &str) -> String {
    format!("/v1{path}")
}

fn v2_prefixed(path: &str) -> String {
    format!("/v2{path}")
}

fn strip_trailing_slash(path: &str) -> String {
    match path.trim_end_matches('/') {
        "" => "/".to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// Pluralizes the last segment that is not a `:param`.
pub fn pluralize_resource(path: &str) -> String {
    let mut segments: Vec<String> = path.split('/').map(str::to_string).collect();

    if let Some(seg) = segments
        .iter_mut()
        .rev()
        .find(|s| !s.is_empty() && !s.starts_with(':'))
    {
        *seg = pluralize(seg);
    }

    segments.join("/")
}

fn pluralize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix('y') {
        format!("{stem}ies")
    } else if word.ends_with('s') {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

fn normalize(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/* ============================================================
   Resolver
   ============================================================ */

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointResolution {
    pub requested: String,
    pub resolved_path: String,
    pub tier: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub healed: bool,
    pub status: u16,
}

pub struct EndpointResolver<'a, T: Transport + ?Sized> {
    transport: &'a T,
    ledger: HealingLedger,
    options: ResolveOptions,
}

impl<'a, T: Transport + ?Sized> EndpointResolver<'a, T> {
    pub fn new(transport: &'a T, ledger: HealingLedger, options: ResolveOptions) -> Self {
        Self {
            transport,
            ledger,
            options,
        }
    }

    pub fn resolve(&self, method: HttpMethod, path: &str) -> Result<EndpointResolution, ResolveError> {
        let requested = normalize(path);
        let mut tried: Vec<String> = Vec::with_capacity(TIERS.len());
        let mut last_error = None;

        for (idx, (rewrite, version)) in TIERS.iter().enumerate() {
            let tier = idx as u8 + 1;
            let candidate = rewrite(&requested);
            if tried.contains(&candidate) {
                debug!(tier, %candidate, "same path as an earlier tier, skipping");
                continue;
            }

            let request = EndpointRequest {
                method,
                path: candidate.clone(),
                timeout: self.options.tier_timeout,
            };
            tried.push(candidate.clone());

            match self.transport.send(&request) {
                Ok(resp) => {
                    if tier > 1 {
                        info!(tier, from = %requested, to = %candidate, "endpoint healed");
                    }
                    self.ledger.record(HealingAttempt::new(
                        HealingSubject::Endpoint(requested.clone()),
                        TierOutcome::Tier(tier),
                    ));
                    return Ok(EndpointResolution {
                        requested,
                        resolved_path: candidate,
                        tier,
                        version: version.map(str::to_string),
                        healed: tier > 1,
                        status: resp.status,
                    });
                }
                Err(e) => {
                    debug!(tier, %candidate, error = %e, "tier failed");
                    last_error = Some(e);
                }
            }
        }

        warn!(path = %requested, tiers = tried.len(), "endpoint unresolved");
        self.ledger.record(HealingAttempt::new(
            HealingSubject::Endpoint(requested.clone()),
            TierOutcome::Failed,
        ));

        let source = last_error.unwrap_or_else(|| TransportError::Network {
            url: requested.clone(),
            reason: "no request issued".into(),
        });
        Err(ResolveError::EndpointUnresolved {
            path: requested,
            tiers: tried.len(),
            source,
        })
    }
}
