use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::error::PersistError;
use crate::healing::HealingReport;
use crate::state::ChangeAnalysis;
use crate::testgen::TestTargetsIndex;

pub const CHANGE_ANALYSIS_FILE: &str = "change-analysis.json";
pub const TEST_TARGETS_FILE: &str = "test-targets.json";
pub const HEALING_REPORT_FILE: &str = "healing-report.json";

pub fn save_change_analysis(dir: &Path, analysis: &ChangeAnalysis) -> Result<PathBuf, PersistError> {
    save(dir, CHANGE_ANALYSIS_FILE, analysis)
}

pub fn load_change_analysis(path: &Path) -> Result<ChangeAnalysis, PersistError> {
    read_json(path)
}

pub fn save_test_targets(dir: &Path, index: &TestTargetsIndex) -> Result<PathBuf, PersistError> {
    save(dir, TEST_TARGETS_FILE, index)
}

pub fn save_healing_report(dir: &Path, report: &HealingReport) -> Result<PathBuf, PersistError> {
    save(dir, HEALING_REPORT_FILE, report)
}

fn save<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<PathBuf, PersistError> {
    let path = dir.join(name);
    write_json(&path, value)?;
    info!(path = %path.display(), "wrote artifact");
    Ok(path)
}

/// Pretty JSON, parent directories created, existing file overwritten.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| PersistError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let text = serde_json::to_string_pretty(value).map_err(|source| PersistError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    fs::write(path, text).map_err(|source| PersistError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PersistError> {
    let raw = fs::read_to_string(path).map_err(|source| PersistError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&raw).map_err(|source| PersistError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ChangeRecord, ChangeType, FileChange, LineChangeSet};

    fn analysis() -> ChangeAnalysis {
        let mut functions = ChangeRecord::new();
        functions.insert("getUsers", ChangeType::Modified);
        functions.insert("addUser", ChangeType::Added);

        ChangeAnalysis::new(
            vec![FileChange {
                file: "src/api/users.js".into(),
                lines: LineChangeSet {
                    modified: [4].into_iter().collect(),
                    ..Default::default()
                },
                functions,
                hunks: vec![],
                impact: vec!["API endpoints".into()],
            }],
            false,
        )
    }

    #[test]
    fn change_analysis_survives_disk() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/out");

        let path = save_change_analysis(&out, &analysis()).unwrap();
        assert_eq!(path, out.join(CHANGE_ANALYSIS_FILE));

        let back = load_change_analysis(&path).unwrap();
        assert_eq!(back, analysis());
    }

    #[test]
    fn artifact_is_keyed_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_change_analysis(dir.path(), &analysis()).unwrap();

        let raw: serde_json::Value = read_json(&path).unwrap();
        let file = &raw["files"]["src/api/users.js"];
        assert_eq!(file["functions"]["getUsers"], "modified");
        assert_eq!(raw["summary"]["totalChanges"], 2);
        assert!(raw.get("fallback").is_none());
    }

    #[test]
    fn bad_json_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CHANGE_ANALYSIS_FILE);
        fs::write(&path, "{ not json").unwrap();

        match load_change_analysis(&path) {
            Err(PersistError::Json { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            load_change_analysis(&dir.path().join("missing.json")),
            Err(PersistError::Read { .. })
        ));
    }
}
