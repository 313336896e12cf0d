// src/git.rs
//
// Source-control collaborator. Every call runs `git -C <root>` and maps
// any failure to `AnalysisError::Unavailable`.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::error::AnalysisError;

fn git(root: &Path, args: &[&str]) -> Result<String, AnalysisError> {
    debug!(?args, "git");

    let out = Command::new("git")
        .arg("-C")
        .arg(root)
        .args(args)
        .output()
        .map_err(|e| AnalysisError::Unavailable(format!("cannot run git: {e}")))?;

    if !out.status.success() {
        return Err(AnalysisError::Unavailable(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}

pub fn is_git_repo(root: &Path) -> bool {
    git(root, &["rev-parse", "--is-inside-work-tree"])
        .map(|s| s.trim() == "true")
        .unwrap_or(false)
}

/* ============================================================
   Base branch detection
   ============================================================ */

pub fn detect_base_branch(root: &Path) -> String {
    if let Ok(s) = git(root, &["symbolic-ref", "refs/remotes/origin/HEAD"]) {
        if let Some(b) = s.trim().rsplit('/').next() {
            if !b.is_empty() {
                return b.to_string();
            }
        }
    }

    if git(root, &["show-ref", "--verify", "--quiet", "refs/heads/main"]).is_ok() {
        return "main".into();
    }

    "master".into()
}

pub fn merge_base(root: &Path, base: &str) -> Result<String, AnalysisError> {
    let s = git(root, &["merge-base", base, "HEAD"])?;
    let s = s.trim();
    if s.is_empty() {
        Err(AnalysisError::Unavailable(format!("no merge base with {base}")))
    } else {
        Ok(s.to_string())
    }
}

/* ============================================================
   Diffs
   ============================================================ */

/// Added, modified, renamed and copied files since `rev`. Deletions are
/// excluded since there is nothing left to test. NUL-separated output
/// keeps paths with spaces or non-ASCII bytes unquoted.
pub fn changed_files(root: &Path, rev: &str) -> Result<Vec<String>, AnalysisError> {
    let s = git(root, &["diff", "--name-only", "-z", "--diff-filter=AMRC", rev])?;
    Ok(s.split('\0')
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
        .collect())
}

/// Unified diff of one file against `rev`.
pub fn diff_file(root: &Path, rev: &str, path: &str) -> Result<String, AnalysisError> {
    git(root, &["diff", "--no-color", "--no-ext-diff", rev, "--", path])
}
