use std::fs;
use std::path::Path;

use glob::Pattern;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::detectors::ast::ast::parse_source;
use crate::detectors::ast::declarations::index_declarations;
use crate::detectors::attribution::{assume_modified, attribute_changes};
use crate::detectors::impact::classify_impact;
use crate::detectors::language::{is_ignored, is_test_file, Language};
use crate::detectors::line_changes::{parse_line_changes, split_diff_by_file, FileDiff};
use crate::error::AnalysisError;
use crate::executor::run_ordered;
use crate::git;
use crate::state::{ChangeAnalysis, ChangeRecord, Declaration, FileChange, LineChangeSet};

/* ============================================================
   Public entry
   ============================================================ */

/// Analyze the working tree of `cfg.root` against its base revision.
///
/// Without reachable history every testable file is treated as modified.
pub fn analyze_repository(cfg: &Config) -> Result<ChangeAnalysis, AnalysisError> {
    let filter = FileFilter::new(&cfg.exclude);

    match repository_diffs(cfg, &filter) {
        Ok(diffs) => {
            let files = analyze_file_diffs(diffs, cfg.workers, |path| {
                fs::read_to_string(cfg.root.join(path)).ok()
            });
            info!(files = files.len(), "analyzed diff");
            Ok(ChangeAnalysis::new(files, false))
        }
        Err(AnalysisError::Unavailable(reason)) => {
            warn!(%reason, "source control unavailable, treating every testable file as modified");
            let files = fallback_analysis(&cfg.root, &filter, cfg.workers)?;
            Ok(ChangeAnalysis::new(files, true))
        }
        Err(e) => Err(e),
    }
}

fn base_revision(cfg: &Config) -> Result<String, AnalysisError> {
    if !git::is_git_repo(&cfg.root) {
        return Err(AnalysisError::Unavailable(format!(
            "{} is not a git work tree",
            cfg.root.display()
        )));
    }

    let base = cfg
        .base_ref
        .clone()
        .unwrap_or_else(|| git::detect_base_branch(&cfg.root));

    match git::merge_base(&cfg.root, &base) {
        Ok(rev) => Ok(rev),
        Err(e) => {
            debug!(%base, error = %e, "no merge base, diffing against ref directly");
            Ok(base)
        }
    }
}

/// Changed testable files, each diffed on its own. Paths come from git's
/// file list, never from parsing diff headers.
fn repository_diffs(cfg: &Config, filter: &FileFilter) -> Result<Vec<FileDiff>, AnalysisError> {
    let rev = base_revision(cfg)?;

    let paths: Vec<String> = git::changed_files(&cfg.root, &rev)?
        .into_iter()
        .filter(|p| filter.is_testable(p))
        .collect();
    debug!(%rev, files = paths.len(), "changed testable files");

    let diffs = run_ordered(paths, cfg.workers, |path| match git::diff_file(&cfg.root, &rev, &path) {
        Ok(body) => Some(FileDiff {
            path,
            body,
            deleted: false,
        }),
        Err(e) => {
            warn!(file = %path, error = %e, "cannot diff file, skipping");
            None
        }
    });

    Ok(diffs.into_iter().flatten().collect())
}

/// Analyze a multi-file unified diff. `load` returns a file's current
/// content. Output follows the diff's file order.
pub fn analyze_diff_text<L>(diff: &str, filter: &FileFilter, workers: usize, load: L) -> Vec<FileChange>
where
    L: Fn(&str) -> Option<String> + Sync,
{
    let files: Vec<_> = split_diff_by_file(diff)
        .into_iter()
        .filter(|f| !f.deleted && filter.is_testable(&f.path))
        .collect();

    analyze_file_diffs(files, workers, load)
}

fn analyze_file_diffs<L>(files: Vec<FileDiff>, workers: usize, load: L) -> Vec<FileChange>
where
    L: Fn(&str) -> Option<String> + Sync,
{
    run_ordered(files, workers, |f| {
        let source = load(&f.path);
        analyze_file(&f.path, &f.body, source.as_deref())
    })
}

/// Every testable file under `root`, all declarations marked modified.
pub fn fallback_analysis(root: &Path, filter: &FileFilter, workers: usize) -> Result<Vec<FileChange>, AnalysisError> {
    if !root.is_dir() {
        return Err(AnalysisError::Io {
            path: root.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "root is not a directory"),
        });
    }

    let mut paths: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            e.path()
                .strip_prefix(root)
                .map(|rel| !is_ignored(rel))
                .unwrap_or(true)
        })
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(root)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .filter(|p| filter.is_testable(p))
        .collect();
    paths.sort();

    Ok(run_ordered(paths, workers, |path| {
        let functions = match fs::read_to_string(root.join(&path)) {
            Ok(source) => declarations_for(&path, &source)
                .map(|d| assume_modified(&d))
                .unwrap_or_default(),
            Err(e) => {
                warn!(file = %path, error = %e, "cannot read file");
                ChangeRecord::new()
            }
        };

        FileChange {
            impact: classify_impact(&path, &functions),
            file: path,
            lines: LineChangeSet::default(),
            functions,
            hunks: Vec::new(),
        }
    }))
}

/* ============================================================
   Core analysis
   ============================================================ */

/// One file: diff body + current source → FileChange.
///
/// A malformed diff yields no changed lines; a missing or unparsable
/// source yields no classified functions. Neither aborts the run.
pub fn analyze_file(file: &str, diff: &str, source: Option<&str>) -> FileChange {
    let (lines, hunks) = parse_line_changes(diff).unwrap_or_else(|e| {
        warn!(%file, error = %e, "unreadable diff, no changes recorded");
        Default::default()
    });

    let functions = match source {
        Some(src) if !lines.is_empty() => declarations_for(file, src)
            .map(|decls| attribute_changes(&decls, &lines))
            .unwrap_or_default(),
        Some(_) => ChangeRecord::new(),
        None => {
            warn!(%file, "source unavailable, functions left empty");
            ChangeRecord::new()
        }
    };

    let impact = classify_impact(file, &functions);
    debug!(%file, functions = functions.len(), ?impact, "file analyzed");

    FileChange {
        file: file.to_string(),
        lines,
        functions,
        hunks,
        impact,
    }
}

fn declarations_for(file: &str, source: &str) -> Option<Vec<Declaration>> {
    let lang = Language::from_path(file)?;
    match parse_source(file, source) {
        Ok(tree) => Some(index_declarations(&tree, source, lang)),
        Err(e) => {
            warn!(%file, error = %e, "syntax tree unavailable");
            None
        }
    }
}

/* ============================================================
   File classification
   ============================================================ */

/// Decides which changed files are worth targeting.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    exclude: Vec<Pattern>,
}

impl FileFilter {
    pub fn new(patterns: &[String]) -> Self {
        let exclude = patterns
            .iter()
            .filter_map(|p| match Pattern::new(p) {
                Ok(pat) => Some(pat),
                Err(e) => {
                    warn!(pattern = %p, error = %e, "ignoring invalid exclude pattern");
                    None
                }
            })
            .collect();
        Self { exclude }
    }

    pub fn is_testable(&self, file: &str) -> bool {
        if file.starts_with('.') || file.split('/').any(|seg| seg.starts_with('.') && seg.len() > 1) {
            return false;
        }

        Language::from_path(file).is_some()
            && !is_ignored(Path::new(file))
            && !is_test_file(file)
            && !self.exclude.iter().any(|p| p.matches(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChangeType;

    const USERS_JS: &str = "\
import http from './http';

export function getUsers() {
  return http.get('/users');
}

export function getUserById(id) {
  const url = `/users/${id}`;
  return http.get(url);
}
";

    const USERS_DIFF: &str = "\
diff --git a/src/api/users.js b/src/api/users.js
index 1111111..2222222 100644
--- a/src/api/users.js
+++ b/src/api/users.js
@@ -7,3 +7,4 @@ export function getUsers() {
 export function getUserById(id) {
-  return http.get(`/users/${id}`);
+  const url = `/users/${id}`;
+  return http.get(url);
 }
";

    #[test]
    fn diff_with_source_classifies_functions() {
        let files = analyze_diff_text(USERS_DIFF, &FileFilter::default(), 1, |_| {
            Some(USERS_JS.to_string())
        });

        assert_eq!(files.len(), 1);
        let f = &files[0];
        assert_eq!(f.file, "src/api/users.js");
        // Line 8 pairs into a modification, line 9 is a pure addition.
        assert_eq!(f.lines.modified.iter().copied().collect::<Vec<_>>(), vec![8]);
        assert_eq!(f.lines.added.iter().copied().collect::<Vec<_>>(), vec![9]);
        assert_eq!(f.functions.get("getUserById"), Some(ChangeType::Added));
        assert_eq!(f.functions.get("getUsers"), None);
        assert_eq!(f.impact, vec!["API endpoints", "GET requests"]);
    }

    #[test]
    fn malformed_diff_records_no_changes() {
        let f = analyze_file("src/api/users.js", "@@ broken @@\n+x\n", Some(USERS_JS));
        assert!(f.lines.is_empty());
        assert!(f.functions.is_empty());
    }

    #[test]
    fn missing_source_keeps_lines_but_no_functions() {
        let f = analyze_file("src/api/users.js", USERS_DIFF, None);
        assert!(!f.lines.is_empty());
        assert!(f.functions.is_empty());
    }

    #[test]
    fn deleted_and_untestable_files_are_skipped() {
        let diff = "\
diff --git a/README.md b/README.md
@@ -1 +1 @@
-a
+b
diff --git a/src/api/old.js b/src/api/old.js
deleted file mode 100644
--- a/src/api/old.js
+++ /dev/null
@@ -1 +0,0 @@
-x
diff --git a/src/api/users.test.js b/src/api/users.test.js
@@ -1 +1 @@
-a
+b
";
        let files = analyze_diff_text(diff, &FileFilter::default(), 2, |_| None);
        assert!(files.is_empty());
    }

    #[test]
    fn exclude_patterns_apply() {
        let filter = FileFilter::new(&["src/legacy/**".to_string(), "[bad".to_string()]);
        assert!(!filter.is_testable("src/legacy/old.js"));
        assert!(filter.is_testable("src/api/users.js"));
        assert!(!filter.is_testable(".github/scripts/x.js"));
        assert!(!filter.is_testable("src/.hidden/x.js"));
    }

    #[test]
    fn fallback_marks_every_declaration_modified() {
        let dir = tempfile::tempdir().unwrap();
        let api = dir.path().join("src/api");
        fs::create_dir_all(&api).unwrap();
        fs::write(api.join("users.js"), USERS_JS).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/x")).unwrap();
        fs::write(dir.path().join("node_modules/x/index.js"), "function x() {}").unwrap();

        let files = fallback_analysis(dir.path(), &FileFilter::default(), 2).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file, "src/api/users.js");
        assert_eq!(
            files[0].functions.iter().collect::<Vec<_>>(),
            vec![("getUsers", ChangeType::Modified), ("getUserById", ChangeType::Modified)]
        );
    }

    #[test]
    fn path_with_space_is_analyzed_under_its_full_name() {
        let diff = USERS_DIFF.replace("src/api/users.js", "src/api/my users.js");
        let files = analyze_diff_text(&diff, &FileFilter::default(), 1, |p| {
            (p == "src/api/my users.js").then(|| USERS_JS.to_string())
        });

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file, "src/api/my users.js");
        assert_eq!(files[0].functions.get("getUserById"), Some(ChangeType::Added));
        assert_eq!(files[0].impact, vec!["API endpoints", "GET requests"]);
    }

    #[test]
    fn repository_changes_come_from_git() {
        if std::process::Command::new("git").arg("--version").output().is_err() {
            return;
        }
        let run = |root: &Path, args: &[&str]| {
            let ok = std::process::Command::new("git")
                .arg("-C")
                .arg(root)
                .args(args)
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false);
            assert!(ok, "git {args:?} failed");
        };

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        run(root, &["init", "-q"]);
        run(root, &["config", "user.email", "ci@example.com"]);
        run(root, &["config", "user.name", "ci"]);

        let before = USERS_JS.replace(
            "  const url = `/users/${id}`;\n  return http.get(url);\n",
            "  return http.get(`/users/${id}`);\n",
        );
        fs::create_dir_all(root.join("src/api")).unwrap();
        fs::write(root.join("src/api/my users.js"), &before).unwrap();
        fs::write(root.join("README.md"), "# app\n").unwrap();
        run(root, &["add", "."]);
        run(root, &["commit", "-q", "-m", "init"]);

        fs::write(root.join("src/api/my users.js"), USERS_JS).unwrap();
        fs::write(root.join("README.md"), "# app, changed\n").unwrap();

        let mut cfg = Config::with_root(root);
        cfg.base_ref = Some("HEAD".into());
        let analysis = analyze_repository(&cfg).unwrap();

        assert!(!analysis.fallback);
        assert_eq!(analysis.files.len(), 1);
        let f = &analysis.files[0];
        assert_eq!(f.file, "src/api/my users.js");
        assert_eq!(f.lines.modified.iter().copied().collect::<Vec<_>>(), vec![8]);
        assert_eq!(f.functions.get("getUserById"), Some(ChangeType::Added));
    }

    #[test]
    fn repository_without_git_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/pages")).unwrap();
        fs::write(
            dir.path().join("src/pages/home.jsx"),
            "export function Home() {\n  return <main />;\n}\n",
        )
        .unwrap();

        let cfg = Config::with_root(dir.path());
        let analysis = analyze_repository(&cfg).unwrap();

        assert!(analysis.fallback);
        assert_eq!(analysis.summary.modified, 1);
        assert_eq!(analysis.files[0].impact, vec!["UI rendering"]);
    }
}
