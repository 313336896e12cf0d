//! detectors/impact.rs
//!
//! Path and name heuristics mapping a changed file to impact tags, plus
//! endpoint/method inference for service-like files. Every heuristic is
//! an ordered table so the mapping stays data.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::state::ChangeRecord;

pub const UI_RENDERING: &str = "UI rendering";
pub const USER_INTERACTIONS: &str = "User interactions";
pub const API_ENDPOINTS: &str = "API endpoints";
pub const APPLICATION_STATE: &str = "Application state";
pub const NAVIGATION: &str = "Navigation";

/* ============================================================
   Rule tables
   ============================================================ */

/// Path substrings (case-sensitive) and the tag they add.
const PATH_RULES: &[(&[&str], &str)] = &[
    (&["components/", "pages/"], UI_RENDERING),
    (&["api/", "services/"], API_ENDPOINTS),
    (&["store/", "redux/", "context/"], APPLICATION_STATE),
    (&["routes", "router"], NAVIGATION),
];

/// Declaration-name keywords that mark user interaction handlers.
const INTERACTION_KEYWORDS: &[&str] = &["handle", "on"];

/// Per-declaration request tags for API files, first match wins.
const REQUEST_RULES: &[(&[&str], &str)] = &[
    (&["get"], "GET requests"),
    (&["post"], "POST requests"),
    (&["put", "update"], "PUT requests"),
    (&["delete"], "DELETE requests"),
];

/// Name keywords → HTTP method, first match wins, default GET.
const METHOD_RULES: &[(&[&str], HttpMethod)] = &[
    (&["get", "fetch", "find"], HttpMethod::Get),
    (&["post", "create", "add"], HttpMethod::Post),
    (&["put", "update"], HttpMethod::Put),
    (&["patch"], HttpMethod::Patch),
    (&["delete", "remove"], HttpMethod::Delete),
];

/// Name markers (case-sensitive) for a single-resource endpoint.
const ID_MARKERS: &[&str] = &["ById", "Id"];

/* ============================================================
   Types
   ============================================================ */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(format!("unknown http method: {other}")),
        }
    }
}

/// Endpoint inferred for one declaration of a service-like file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointHint {
    pub function: String,
    pub endpoint: String,
    pub method: HttpMethod,
}

/* ============================================================
   Classification
   ============================================================ */

/// Impact tags for a changed file, deduplicated in first-occurrence order.
pub fn classify_impact(file: &str, functions: &ChangeRecord) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    let mut push = |tag: &str| {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    };

    for &(segments, tag) in PATH_RULES {
        if !segments.iter().any(|s| file.contains(s)) {
            continue;
        }
        push(tag);

        match tag {
            UI_RENDERING => {
                if functions.names().any(|n| matches_any(n, INTERACTION_KEYWORDS)) {
                    push(USER_INTERACTIONS);
                }
            }
            API_ENDPOINTS => {
                for name in functions.names() {
                    if let Some(request) = first_match(name, REQUEST_RULES) {
                        push(request);
                    }
                }
            }
            _ => {}
        }
    }

    tags
}

pub fn is_ui_file(file: &str) -> bool {
    path_matches(file, UI_RENDERING)
}

pub fn is_api_file(file: &str) -> bool {
    path_matches(file, API_ENDPOINTS)
}

fn path_matches(file: &str, tag: &str) -> bool {
    PATH_RULES
        .iter()
        .any(|(segments, t)| *t == tag && segments.iter().any(|s| file.contains(s)))
}

/// `/` + the file's stem, with `/:id` appended for single-resource names.
pub fn infer_endpoint(file: &str, function: &str) -> String {
    let resource = Path::new(file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file);

    let mut endpoint = format!("/{resource}");
    if ID_MARKERS.iter().any(|m| function.contains(m)) {
        endpoint.push_str("/:id");
    }
    endpoint
}

pub fn infer_method(function: &str) -> HttpMethod {
    first_match(function, METHOD_RULES).unwrap_or(HttpMethod::Get)
}

/// Endpoint hints for every declaration of an API file, in record order.
pub fn endpoint_hints(file: &str, functions: &ChangeRecord) -> Vec<EndpointHint> {
    if !is_api_file(file) {
        return Vec::new();
    }

    functions
        .names()
        .map(|name| EndpointHint {
            function: name.to_string(),
            endpoint: infer_endpoint(file, name),
            method: infer_method(name),
        })
        .collect()
}

/* ============================================================
   Keyword matching
   ============================================================ */

/// Keyword tables match against the lowercased name.
pub(crate) fn matches_any(name: &str, keywords: &[&str]) -> bool {
    let lower = name.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

pub(crate) fn first_match<T: Copy>(name: &str, rules: &[(&[&str], T)]) -> Option<T> {
    rules
        .iter()
        .find(|(keywords, _)| matches_any(name, keywords))
        .map(|(_, value)| *value)
}
