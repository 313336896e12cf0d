use std::fmt;

use serde::{Deserialize, Serialize};

use crate::detectors::impact::HttpMethod;
use crate::state::ChangeType;

/// What kind of surface a target exercises.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Ui,
    Api,
    Visual,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TargetKind::Ui => "ui",
            TargetKind::Api => "api",
            TargetKind::Visual => "visual",
        })
    }
}

/* ============================================================
   Selector hints
   ============================================================ */

/// Bag of optional locator hints. Resolution tries them in a fixed order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Scope for the css tier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl SelectorDescriptor {
    pub fn test_id(id: impl Into<String>) -> Self {
        Self {
            test_id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn with_css(mut self, css: impl Into<String>) -> Self {
        self.css = Some(css.into());
        self
    }

    fn hints(&self) -> [(&'static str, Option<&str>); 10] {
        [
            ("testId", self.test_id.as_deref()),
            ("id", self.id.as_deref()),
            ("css", self.css.as_deref()),
            ("xpath", self.xpath.as_deref()),
            ("text", self.text.as_deref()),
            ("partialText", self.partial_text.as_deref()),
            ("role", self.role.as_deref()),
            ("name", self.name.as_deref()),
            ("description", self.description.as_deref()),
            ("context", self.context.as_deref()),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.hints().iter().all(|(_, v)| v.is_none())
    }
}

impl fmt::Display for SelectorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        let mut first = true;
        for (key, value) in self.hints() {
            if let Some(v) = value {
                if !first {
                    f.write_str(", ")?;
                }
                write!(f, "{key}={v:?}")?;
                first = false;
            }
        }
        f.write_str("}")
    }
}

/* ============================================================
   Actions and validations
   ============================================================ */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expectation {
    Response,
    Validation,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Action {
    Click,
    Input,
    Submit,
    Verify { expect: Expectation },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Validation {
    Status { expect: u16 },
    HasData,
    HasId,
    DataUpdated,
    AuthCheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaScope {
    Component,
    Partial,
}

/// Region a visual comparison should cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetArea {
    pub selector: String,
    pub scope: AreaScope,
    pub changed_lines: usize,
}

/* ============================================================
   Test target
   ============================================================ */

/// A generated test target. Built once per run, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestTarget {
    pub name: String,
    pub file: String,
    pub function: String,
    pub change_type: ChangeType,
    #[serde(rename = "type")]
    pub kind: TargetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectors: Option<SelectorDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<Action>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validations: Option<Vec<Validation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_area: Option<TargetArea>,
}

impl TestTarget {
    /// Stable identity, safe for logs and report keys.
    pub fn id(&self) -> String {
        format!("{}::{}::{}", self.file, self.function, self.kind)
    }
}
