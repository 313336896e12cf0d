//! detectors/language.rs
//!
//! Source language detection from file extensions.

use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Language {
    JavaScript,
    Jsx,
    TypeScript,
    Tsx,
    Python,
    Rust,
}

impl Language {
    pub fn from_path(path: &str) -> Option<Language> {
        let ext = Path::new(path).extension().and_then(|e| e.to_str())?;

        match ext {
            "js" | "mjs" | "cjs" => Some(Language::JavaScript),
            "jsx" => Some(Language::Jsx),
            "ts" | "mts" | "cts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            "py" => Some(Language::Python),
            "rs" => Some(Language::Rust),
            _ => None,
        }
    }

    /// Languages sharing the ECMAScript declaration shapes.
    pub fn is_ecmascript(self) -> bool {
        matches!(
            self,
            Language::JavaScript | Language::Jsx | Language::TypeScript | Language::Tsx
        )
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Language::JavaScript => "javascript",
            Language::Jsx => "jsx",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::Python => "python",
            Language::Rust => "rust",
        };
        f.write_str(s)
    }
}

/* ============================================================
   Path filters
   ============================================================ */

/// Directories never worth analyzing.
pub fn is_ignored(path: &Path) -> bool {
    path.components().any(|c| {
        matches!(
            c.as_os_str().to_str(),
            Some("target")
                | Some("node_modules")
                | Some(".git")
                | Some(".venv")
                | Some("dist")
                | Some("build")
                | Some("coverage")
        )
    })
}

/// Test sources are never themselves targets.
pub fn is_test_file(path: &str) -> bool {
    let name = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path);

    name.contains(".test.")
        || name.contains(".spec.")
        || name.starts_with("test_")
        || path.contains("__tests__/")
        || path.starts_with("tests/")
        || path.contains("/tests/")
}
