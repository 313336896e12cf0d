//! Layered configuration.
//!
//! defaults → user config file → project `changescope.toml` → environment.
//! CLI flags are applied on top by the binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

pub const PROJECT_FILE: &str = "changescope.toml";
pub const DEFAULT_OUTPUT_DIR: &str = ".changescope";

pub const ENV_UI_BASE_URL: &str = "UI_BASE_URL";
pub const ENV_API_BASE_URL: &str = "API_BASE_URL";
pub const ENV_BASE_REF: &str = "CHANGESCOPE_BASE_REF";
pub const ENV_WORKERS: &str = "CHANGESCOPE_WORKERS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub root: PathBuf,
    pub output_dir: PathBuf,
    /// Revision to diff against; detected from the repository when unset.
    pub base_ref: Option<String>,
    /// Page origin for the caller's `UiSurface` implementation. Nothing in
    /// this crate opens pages, so it is resolved here and passed through.
    pub ui_base_url: Option<String>,
    pub api_base_url: Option<String>,
    pub workers: usize,
    pub tier_timeout: Option<Duration>,
    /// Glob patterns (relative to `root`) never analyzed.
    pub exclude: Vec<String>,
}

/// On-disk shape; every field optional so files can be layered.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    output_dir: Option<PathBuf>,
    base_ref: Option<String>,
    ui_base_url: Option<String>,
    api_base_url: Option<String>,
    workers: Option<usize>,
    tier_timeout_ms: Option<u64>,
    #[serde(default)]
    exclude: Vec<String>,
}

impl Config {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            output_dir: root.join(DEFAULT_OUTPUT_DIR),
            root,
            base_ref: None,
            ui_base_url: None,
            api_base_url: None,
            workers: default_workers(),
            tier_timeout: None,
            exclude: Vec::new(),
        }
    }

    /// Full layered load for `root`, reading the process environment.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let mut cfg = Self::with_root(root);

        if let Some(user) = user_config_path() {
            cfg.merge_file(&user)?;
        }
        let project = cfg.root.join(PROJECT_FILE);
        cfg.merge_file(&project)?;

        cfg.merge_env(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    /// Merge a TOML file if it exists. Relative paths resolve against `root`.
    pub fn merge_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            return Ok(());
        }

        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FileConfig = toml::from_str(&raw).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(dir) = file.output_dir {
            self.output_dir = self.root.join(dir);
        }
        if file.base_ref.is_some() {
            self.base_ref = file.base_ref;
        }
        if file.ui_base_url.is_some() {
            self.ui_base_url = file.ui_base_url;
        }
        if file.api_base_url.is_some() {
            self.api_base_url = file.api_base_url;
        }
        if let Some(w) = file.workers {
            self.workers = w.max(1);
        }
        if let Some(ms) = file.tier_timeout_ms {
            self.tier_timeout = Some(Duration::from_millis(ms));
        }
        self.exclude.extend(file.exclude);

        Ok(())
    }

    /// Apply environment overrides through `lookup`.
    pub fn merge_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty(ENV_UI_BASE_URL) {
            self.ui_base_url = Some(v);
        }
        if let Some(v) = non_empty(ENV_API_BASE_URL) {
            self.api_base_url = Some(v);
        }
        if let Some(v) = non_empty(ENV_BASE_REF) {
            self.base_ref = Some(v);
        }
        if let Some(v) = non_empty(ENV_WORKERS) {
            let workers: usize = v.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_WORKERS.into(),
                value: v.clone(),
            })?;
            self.workers = workers.max(1);
        }

        Ok(())
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("changescope").join("config.toml"))
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_rooted() {
        let cfg = Config::with_root("/repo");
        assert_eq!(cfg.output_dir, PathBuf::from("/repo/.changescope"));
        assert!(cfg.workers >= 1);
        assert!(cfg.ui_base_url.is_none());
    }

    #[test]
    fn project_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(PROJECT_FILE),
            r#"
output_dir = "out"
api_base_url = "http://file.local"
workers = 2
tier_timeout_ms = 1500
exclude = ["src/legacy/**"]
"#,
        )
        .unwrap();

        let mut cfg = Config::with_root(dir.path());
        cfg.merge_file(&dir.path().join(PROJECT_FILE)).unwrap();

        assert_eq!(cfg.output_dir, dir.path().join("out"));
        assert_eq!(cfg.api_base_url.as_deref(), Some("http://file.local"));
        assert_eq!(cfg.workers, 2);
        assert_eq!(cfg.tier_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(cfg.exclude, vec!["src/legacy/**".to_string()]);

        let env: HashMap<&str, &str> = [
            (ENV_API_BASE_URL, "http://env.local"),
            (ENV_UI_BASE_URL, "http://ui.local"),
            (ENV_WORKERS, "6"),
        ]
        .into_iter()
        .collect();
        cfg.merge_env(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(cfg.api_base_url.as_deref(), Some("http://env.local"));
        assert_eq!(cfg.ui_base_url.as_deref(), Some("http://ui.local"));
        assert_eq!(cfg.workers, 6);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PROJECT_FILE);
        fs::write(&path, "colour = \"blue\"\n").unwrap();

        let mut cfg = Config::with_root(dir.path());
        assert!(matches!(cfg.merge_file(&path), Err(ConfigError::Toml { .. })));
    }

    #[test]
    fn bad_worker_count_is_an_error() {
        let mut cfg = Config::with_root("/repo");
        let err = cfg
            .merge_env(|k| (k == ENV_WORKERS).then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn missing_file_is_ignored() {
        let mut cfg = Config::with_root("/repo");
        cfg.merge_file(Path::new("/definitely/not/here.toml")).unwrap();
        assert_eq!(cfg, Config::with_root("/repo"));
    }
}
