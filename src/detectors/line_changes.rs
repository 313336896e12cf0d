//! detectors/line_changes.rs
//!
//! Unified diff → changed line numbers and hunks.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use similar::TextDiff;

use crate::error::DiffParseError;
use crate::state::{Hunk, LineChangeSet};

/// Maximum distance between an added and a deleted line for the pair to
/// count as one modified line.
const PAIR_DISTANCE: u32 = 1;

/* ============================================================
   Multi-file diffs
   ============================================================ */

/// One file's slice of a multi-file diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub path: String,
    pub body: String,
    pub deleted: bool,
}

/// Split `git diff` output on `diff --git` headers, keeping input order.
///
/// The path comes from the `+++ b/` header, or `--- a/` when the new side
/// is `/dev/null`. The `diff --git` line only names the file when neither
/// header is present (mode-only or binary changes).
pub fn split_diff_by_file(diff: &str) -> Vec<FileDiff> {
    let mut results = Vec::new();
    let mut current: Option<FileDiff> = None;
    let mut in_hunks = false;

    for line in diff.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            if let Some(done) = current.take() {
                results.push(done);
            }
            in_hunks = false;
            current = Some(FileDiff {
                path: git_header_path(rest).unwrap_or_default().to_string(),
                body: String::new(),
                deleted: false,
            });
            continue;
        }

        let Some(file) = current.as_mut() else {
            continue;
        };

        if line.starts_with("@@") {
            in_hunks = true;
        } else if !in_hunks {
            if line.starts_with("deleted file mode") || line == "+++ /dev/null" {
                file.deleted = true;
            } else if let Some(path) = line.strip_prefix("--- a/") {
                file.path = header_path(path).to_string();
            } else if let Some(path) = line.strip_prefix("+++ b/") {
                file.path = header_path(path).to_string();
            }
        }

        file.body.push_str(line);
        file.body.push('\n');
    }

    if let Some(done) = current {
        results.push(done);
    }

    results
}

/// git appends a tab to `---`/`+++` paths that contain whitespace.
fn header_path(raw: &str) -> &str {
    raw.strip_suffix('\t').unwrap_or(raw)
}

/// `a/<p> b/<p>` → `<p>`. Both halves name the same file unless the file
/// was renamed, so split at the middle rather than on whitespace.
fn git_header_path(rest: &str) -> Option<&str> {
    if rest.len() % 2 == 1 {
        let mid = rest.len() / 2;
        let old = rest.get(..mid)?.strip_prefix("a/")?;
        let new = rest.get(mid + 1..)?.strip_prefix("b/")?;
        if old == new {
            return Some(new);
        }
    }
    rest.rsplit_once(" b/").map(|(_, p)| p)
}

/// Render a unified diff between two versions of `path`.
pub fn diff_sources(path: &str, old: &str, new: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut out = format!("diff --git a/{path} b/{path}\n");
    out.push_str(
        &diff
            .unified_diff()
            .context_radius(3)
            .header(&format!("a/{path}"), &format!("b/{path}"))
            .to_string(),
    );
    out
}

/* ============================================================
   Hunk headers
   ============================================================ */

/// `@@ -a,b +c,d @@` → `(c, d)`; the length defaults to 1 when omitted.
pub fn parse_hunk_header(line: &str) -> Option<(u32, u32)> {
    static HEADER: OnceLock<Option<Regex>> = OnceLock::new();
    let re = HEADER
        .get_or_init(|| Regex::new(r"^@@ -\d+(?:,\d+)? \+(\d+)(?:,(\d+))? @@").ok())
        .as_ref()?;

    let caps = re.captures(line)?;
    let start = caps.get(1)?.as_str().parse().ok()?;
    let len = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 1,
    };
    Some((start, len))
}

/* ============================================================
   Line scan
   ============================================================ */

/// Parse one file's unified diff into reconciled line sets and hunks.
pub fn parse_line_changes(diff: &str) -> Result<(LineChangeSet, Vec<Hunk>), DiffParseError> {
    let mut added = BTreeSet::new();
    let mut deleted = BTreeSet::new();
    let mut hunks: Vec<Hunk> = Vec::new();

    // Cursor is only meaningful once a hunk header has been seen.
    let mut cursor: Option<u32> = None;

    for (idx, line) in diff.lines().enumerate() {
        if line.starts_with("@@") {
            let (start, _) = parse_hunk_header(line).ok_or_else(|| {
                DiffParseError::MalformedHunkHeader {
                    line: idx + 1,
                    header: line.to_string(),
                }
            })?;
            cursor = Some(start);
            hunks.push(Hunk {
                start,
                end: start,
                content: Vec::new(),
            });
            continue;
        }

        // Hunk lines always carry a one-character prefix, so a file header
        // ends the previous hunk.
        if line.starts_with("diff --git ") {
            cursor = None;
            continue;
        }

        let Some(current) = cursor.as_mut() else {
            continue;
        };

        // Inside a hunk "+++x" is an added line whose text starts with "++".
        if line.starts_with('+') {
            added.insert(*current);
            *current += 1;
        } else if line.starts_with('-') {
            deleted.insert(*current);
        } else if line.starts_with('\\') {
            // "\ No newline at end of file"
            continue;
        } else {
            *current += 1;
        }

        if let Some(h) = hunks.last_mut() {
            h.content.push(line.to_string());
            h.end = h.start + h.content.len() as u32;
        }
    }

    Ok((reconcile(added, deleted), hunks))
}

/// Greedy one-pass pairing of deleted lines with nearby added lines.
///
/// Each deleted line (ascending) takes the first still-unpaired added
/// line within `PAIR_DISTANCE`; the pair becomes one modified line at the
/// added line's number.
pub fn reconcile(added: BTreeSet<u32>, deleted: BTreeSet<u32>) -> LineChangeSet {
    let mut unpaired: Vec<u32> = added.into_iter().collect();
    let mut modified = BTreeSet::new();
    let mut remaining_deleted = BTreeSet::new();

    for d in deleted {
        match unpaired.iter().position(|a| a.abs_diff(d) <= PAIR_DISTANCE) {
            Some(pos) => {
                modified.insert(unpaired.remove(pos));
            }
            None => {
                remaining_deleted.insert(d);
            }
        }
    }

    let added: BTreeSet<u32> = unpaired.into_iter().collect();

    // A deleted line number can coincide with a surviving added/modified
    // number once pairing shifted things; the new-file line wins.
    remaining_deleted.retain(|l| !added.contains(l) && !modified.contains(l));

    LineChangeSet {
        added,
        deleted: remaining_deleted,
        modified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(v: &[u32]) -> BTreeSet<u32> {
        v.iter().copied().collect()
    }

    #[test]
    fn single_added_line_in_hunk() {
        let diff = "@@ -10,3 +10,4 @@\n context\n+new line\n context\n context\n";
        let (lines, hunks) = parse_line_changes(diff).unwrap();

        assert_eq!(lines.added, set(&[11]));
        assert!(lines.modified.is_empty());
        assert!(lines.deleted.is_empty());

        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].start, 10);
        assert_eq!(hunks[0].end, 14);
    }

    #[test]
    fn replaced_line_becomes_modified() {
        let diff = "@@ -5,3 +5,3 @@\n a\n-old\n+new\n c\n";
        let (lines, _) = parse_line_changes(diff).unwrap();

        assert_eq!(lines.modified, set(&[6]));
        assert!(lines.added.is_empty());
        assert!(lines.deleted.is_empty());
    }

    #[test]
    fn pure_deletion_stays_deleted() {
        let diff = "@@ -1,4 +1,2 @@\n a\n-b\n-c\n d\n";
        let (lines, _) = parse_line_changes(diff).unwrap();

        assert_eq!(lines.deleted, set(&[2]));
        assert!(lines.added.is_empty());
        assert!(lines.modified.is_empty());
    }

    #[test]
    fn extra_additions_after_a_replacement_stay_added() {
        let diff = "@@ -1,3 +1,4 @@\n a\n-b\n+B\n+C\n d\n";
        let (lines, _) = parse_line_changes(diff).unwrap();

        assert_eq!(lines.modified, set(&[2]));
        assert_eq!(lines.added, set(&[3]));
        assert!(lines.deleted.is_empty());
    }

    #[test]
    fn sets_are_disjoint_after_reconcile() {
        let lines = reconcile(set(&[6]), set(&[5, 6]));
        assert_eq!(lines.modified, set(&[6]));
        assert!(lines.added.is_empty());
        assert!(lines.deleted.is_empty());

        for l in lines.added.iter() {
            assert!(!lines.deleted.contains(l) && !lines.modified.contains(l));
        }
    }

    #[test]
    fn multiple_hunks_reset_the_cursor() {
        let diff = "\
--- a/x.js
+++ b/x.js
@@ -1,2 +1,3 @@
 a
+b
 c
@@ -40,2 +41,3 @@
 x
+y
 z
";
        let (lines, hunks) = parse_line_changes(diff).unwrap();
        assert_eq!(lines.added, set(&[2, 42]));
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[1].start, 41);
    }

    #[test]
    fn no_hunks_means_no_changes() {
        let (lines, hunks) = parse_line_changes("index 123..456 100644\n").unwrap();
        assert!(lines.is_empty());
        assert!(hunks.is_empty());
    }

    #[test]
    fn malformed_header_is_an_error() {
        let err = parse_line_changes("@@ nonsense @@\n+x\n").unwrap_err();
        assert!(matches!(err, DiffParseError::MalformedHunkHeader { line: 1, .. }));
    }

    #[test]
    fn hunk_header_without_length() {
        assert_eq!(parse_hunk_header("@@ -3 +4 @@ fn main()"), Some((4, 1)));
        assert_eq!(parse_hunk_header("@@ -3,0 +4,2 @@"), Some((4, 2)));
        assert_eq!(parse_hunk_header("not a header"), None);
    }

    #[test]
    fn split_skips_nothing_and_flags_deletions() {
        let diff = "\
diff --git a/src/a.js b/src/a.js
--- a/src/a.js
+++ b/src/a.js
@@ -1 +1 @@
-x
+y
diff --git a/src/gone.js b/src/gone.js
deleted file mode 100644
--- a/src/gone.js
+++ /dev/null
@@ -1 +0,0 @@
-z
";
        let files = split_diff_by_file(diff);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "src/a.js");
        assert!(!files[0].deleted);
        assert_eq!(files[1].path, "src/gone.js");
        assert!(files[1].deleted);
    }

    #[test]
    fn lines_that_look_like_file_headers_inside_a_hunk() {
        let diff = "\
--- a/src/counter.js
+++ b/src/counter.js
@@ -1,3 +1,3 @@
 let count = 0;
----count;
++++count;
 export default count;
";
        let (lines, hunks) = parse_line_changes(diff).unwrap();
        assert_eq!(lines.modified, set(&[2]));
        assert!(lines.added.is_empty());
        assert!(lines.deleted.is_empty());
        assert_eq!(hunks[0].content.len(), 4);
    }

    #[test]
    fn paths_with_spaces_come_from_the_file_headers() {
        let diff = "\
diff --git a/src/api/my users.js b/src/api/my users.js
--- a/src/api/my users.js\t
+++ b/src/api/my users.js\t
@@ -1 +1 @@
-x
+y
diff --git a/src/old name.js b/src/old name.js
deleted file mode 100644
--- a/src/old name.js\t
+++ /dev/null
@@ -1 +0,0 @@
-z
diff --git a/bin/run tool b/bin/run tool
old mode 100644
new mode 100755
";
        let files = split_diff_by_file(diff);
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/api/my users.js", "src/old name.js", "bin/run tool"]);
        assert!(!files[0].deleted);
        assert!(files[1].deleted);
        assert!(!files[2].deleted);
    }

    #[test]
    fn added_line_spelling_a_header_keeps_the_path() {
        let diff = "\
diff --git a/src/a.js b/src/a.js
--- a/src/a.js
+++ b/src/a.js
@@ -1 +1,2 @@
 x
+++ b/elsewhere.js
";
        let files = split_diff_by_file(diff);
        assert_eq!(files[0].path, "src/a.js");

        let (lines, _) = parse_line_changes(&files[0].body).unwrap();
        assert_eq!(lines.added, set(&[2]));
    }

    #[test]
    fn unsplit_diff_does_not_bleed_into_the_next_file() {
        let diff = "\
diff --git a/a.js b/a.js
--- a/a.js
+++ b/a.js
@@ -1 +1,2 @@
 x
+y
diff --git a/b.js b/b.js
--- a/b.js
+++ b/b.js
";
        let (lines, hunks) = parse_line_changes(diff).unwrap();
        assert_eq!(lines.added, set(&[2]));
        assert!(lines.deleted.is_empty());
        assert_eq!(hunks[0].content.len(), 2);
    }

    #[test]
    fn rendered_source_diff_parses_back() {
        let old = "function a() {\n  return 1;\n}\n";
        let new = "function a() {\n  return 2;\n}\n";
        let text = diff_sources("src/a.js", old, new);

        let files = split_diff_by_file(&text);
        assert_eq!(files.len(), 1);

        let (lines, _) = parse_line_changes(&files[0].body).unwrap();
        assert_eq!(lines.modified, set(&[2]));
    }
}
