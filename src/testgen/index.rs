//! Flat indexes written to `test-targets.json`.

use serde::{Deserialize, Serialize};

use crate::detectors::impact::endpoint_hints;
use crate::state::{ChangeType, FileChange};

const PAGES_DIR: &str = "pages/";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestTargetsIndex {
    pub ui_paths: Vec<String>,
    pub api_endpoints: Vec<String>,
    pub impacted_areas: Vec<String>,
    pub specific_functions: Vec<String>,
}

impl TestTargetsIndex {
    pub fn is_empty(&self) -> bool {
        self.ui_paths.is_empty()
            && self.api_endpoints.is_empty()
            && self.impacted_areas.is_empty()
            && self.specific_functions.is_empty()
    }
}

/// Every list is deduplicated and keeps first-occurrence order.
pub fn build_index(files: &[FileChange]) -> TestTargetsIndex {
    let mut index = TestTargetsIndex::default();

    for f in files {
        if let Some(route) = page_route(&f.file) {
            push_unique(&mut index.ui_paths, route);
        }

        for hint in endpoint_hints(&f.file, &f.functions) {
            if f.functions.get(&hint.function) == Some(ChangeType::Deleted) {
                continue;
            }
            push_unique(&mut index.api_endpoints, format!("{} {}", hint.method, hint.endpoint));
        }

        for tag in &f.impact {
            push_unique(&mut index.impacted_areas, tag.clone());
        }

        for name in f.functions.names() {
            push_unique(&mut index.specific_functions, format!("{}::{}", f.file, name));
        }
    }

    index
}

/// `src/pages/users/index.jsx` → `/users`, `pages/index.tsx` → `/`.
pub fn page_route(file: &str) -> Option<String> {
    let start = if file.starts_with(PAGES_DIR) {
        0
    } else {
        file.find(&format!("/{PAGES_DIR}"))? + 1
    };
    let rest = &file[start + PAGES_DIR.len()..];

    let stem = match rest.rfind('.') {
        Some(dot) => &rest[..dot],
        None => rest,
    };
    let route = match stem.strip_suffix("index") {
        Some(dir) if dir.is_empty() || dir.ends_with('/') => dir.trim_end_matches('/'),
        _ => stem,
    };

    Some(format!("/{route}"))
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}
