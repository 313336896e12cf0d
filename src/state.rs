use std::collections::BTreeSet;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/* ---------- line changes ---------- */

/// Changed line numbers (1-based, new-file coordinates) for one file.
///
/// After reconciliation a line number belongs to at most one set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineChangeSet {
    pub added: BTreeSet<u32>,
    pub deleted: BTreeSet<u32>,
    pub modified: BTreeSet<u32>,
}

impl LineChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }

    /// Lines that exist in the new file: added plus modified.
    pub fn touched(&self) -> impl Iterator<Item = u32> + '_ {
        self.added.iter().chain(self.modified.iter()).copied()
    }

    /// Union of all three sets in classification scan order:
    /// deleted, then added, then modified.
    pub fn scan_order(&self) -> impl Iterator<Item = (u32, ChangeType)> + '_ {
        self.deleted
            .iter()
            .map(|l| (*l, ChangeType::Deleted))
            .chain(self.added.iter().map(|l| (*l, ChangeType::Added)))
            .chain(self.modified.iter().map(|l| (*l, ChangeType::Modified)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    pub start: u32,
    pub end: u32,
    pub content: Vec<String>,
}

/* ---------- declarations ---------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeclarationKind {
    Function,
    ArrowBound,
    Method,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Declaration {
    pub name: String,
    pub start_line: u32,
    pub end_line: u32,
    pub kind: DeclarationKind,
}

impl Declaration {
    pub fn contains(&self, line: u32) -> bool {
        (self.start_line..=self.end_line).contains(&line)
    }
}

/* ---------- change records ---------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeType::Added => "added",
            ChangeType::Modified => "modified",
            ChangeType::Deleted => "deleted",
        })
    }
}

/// Declaration name → change type, in declaration order.
///
/// Serialized as a JSON object whose key order follows insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeRecord {
    entries: Vec<(String, ChangeType)>,
}

impl ChangeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a classification. The first classification for a name wins.
    pub fn insert(&mut self, name: impl Into<String>, change: ChangeType) -> bool {
        let name = name.into();
        if self.get(&name).is_some() {
            return false;
        }
        self.entries.push((name, change));
        true
    }

    pub fn get(&self, name: &str) -> Option<ChangeType> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| *c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ChangeType)> {
        self.entries.iter().map(|(n, c)| (n.as_str(), *c))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ChangeRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, change) in &self.entries {
            map.serialize_entry(name, change)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ChangeRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = ChangeRecord;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of declaration names to change types")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut record = ChangeRecord::new();
                while let Some((name, change)) = access.next_entry::<String, ChangeType>()? {
                    record.insert(name, change);
                }
                Ok(record)
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

/* ---------- per-file analysis ---------- */

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub file: String,
    pub lines: LineChangeSet,
    pub functions: ChangeRecord,
    pub hunks: Vec<Hunk>,
    pub impact: Vec<String>,
}

impl FileChange {
    pub fn has_impact(&self, tag: &str) -> bool {
        self.impact.iter().any(|t| t == tag)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSummary {
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
    pub total_changes: usize,
}

impl ChangeSummary {
    pub fn from_files(files: &[FileChange]) -> Self {
        let mut s = ChangeSummary::default();
        for (_, change) in files.iter().flat_map(|f| f.functions.iter()) {
            match change {
                ChangeType::Added => s.added += 1,
                ChangeType::Modified => s.modified += 1,
                ChangeType::Deleted => s.deleted += 1,
            }
        }
        s.total_changes = s.added + s.modified + s.deleted;
        s
    }
}

/// Contents of `change-analysis.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeAnalysis {
    #[serde(with = "ordered_files")]
    pub files: Vec<FileChange>,
    pub summary: ChangeSummary,
    /// Set when source control was unreachable and every testable file
    /// was treated as modified.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

impl ChangeAnalysis {
    pub fn new(files: Vec<FileChange>, fallback: bool) -> Self {
        let summary = ChangeSummary::from_files(&files);
        Self {
            files,
            summary,
            fallback,
        }
    }

    pub fn file(&self, path: &str) -> Option<&FileChange> {
        self.files.iter().find(|f| f.file == path)
    }
}

/// `files` is keyed by path on disk but kept as an ordered list in memory.
mod ordered_files {
    use super::*;

    pub fn serialize<S: Serializer>(files: &[FileChange], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(files.len()))?;
        for f in files {
            map.serialize_entry(&f.file, f)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<FileChange>, D::Error> {
        struct FilesVisitor;

        impl<'de> Visitor<'de> for FilesVisitor {
            type Value = Vec<FileChange>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of file paths to file changes")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::new();
                while let Some((path, mut change)) = access.next_entry::<String, FileChange>()? {
                    change.file = path;
                    out.push(change);
                }
                Ok(out)
            }
        }

        deserializer.deserialize_map(FilesVisitor)
    }
}
