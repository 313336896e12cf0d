//! generator.rs
//!
//! Change map → ordered list of UI, visual and API test targets.
//! Pure and deterministic: file order, then declaration order.

use std::ops::RangeInclusive;
use std::path::Path;

use crate::detectors::impact::{first_match, infer_endpoint, infer_method, API_ENDPOINTS, UI_RENDERING};
use crate::state::{ChangeType, FileChange};
use crate::testgen::candidate::{
    Action, AreaScope, Expectation, SelectorDescriptor, TargetArea, TargetKind, TestTarget, Validation,
};

/// A UI file needs a visual check once more lines than this changed.
const VISUAL_MIN_LINES: usize = 10;
/// Changed-line span above which the whole component is compared.
const COMPONENT_SPAN: u32 = 50;
/// Modified lines here are assumed to touch auth logic. This is a fixed
/// window, not a detection of where auth code actually lives.
const AUTH_WINDOW: RangeInclusive<u32> = 10..=20;

const DEFAULT_ROLE: &str = "button";

const ROLE_RULES: &[(&[&str], &str)] = &[
    (&["button", "click"], "button"),
    (&["input", "field"], "textbox"),
    (&["select", "dropdown"], "combobox"),
    (&["check"], "checkbox"),
    (&["radio"], "radio"),
    (&["link"], "link"),
];

#[derive(Debug, Clone, Copy)]
enum Interaction {
    Click,
    Input,
    Submit,
}

const ACTION_RULES: &[(&[&str], Interaction)] = &[
    (&["handle", "on"], Interaction::Click),
    (&["validate", "check"], Interaction::Input),
    (&["submit", "save"], Interaction::Submit),
];

#[derive(Debug, Clone, Copy)]
enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

const VALIDATION_RULES: &[(&[&str], Operation)] = &[
    (&["get"], Operation::Read),
    (&["create", "post"], Operation::Create),
    (&["update", "put"], Operation::Update),
    (&["delete"], Operation::Delete),
];

/* ============================================================
   Public entry
   ============================================================ */

pub fn generate_test_targets(files: &[FileChange]) -> Vec<TestTarget> {
    let mut out = Vec::new();

    for f in files {
        if f.has_impact(UI_RENDERING) {
            out.extend(ui_targets(f));
            out.extend(visual_target(f));
        }
        if f.has_impact(API_ENDPOINTS) {
            out.extend(api_targets(f));
        }
    }

    out
}

/* ============================================================
   UI
   ============================================================ */

fn ui_targets(f: &FileChange) -> Vec<TestTarget> {
    let component = component_name(&f.file);

    live_functions(f)
        .map(|(function, change_type)| TestTarget {
            name: format!("{component} - {function}"),
            file: f.file.clone(),
            function: function.to_string(),
            change_type,
            kind: TargetKind::Ui,
            selectors: Some(ui_selectors(component, function)),
            actions: ui_actions(function),
            endpoint: None,
            method: None,
            validations: None,
            target_area: None,
        })
        .collect()
}

pub fn ui_selectors(component: &str, function: &str) -> SelectorDescriptor {
    SelectorDescriptor {
        test_id: Some(format!("{component}-{function}").to_lowercase()),
        css: Some(format!(".{component}")),
        role: Some(first_match(function, ROLE_RULES).unwrap_or(DEFAULT_ROLE).to_string()),
        description: Some(describe(function)),
        ..SelectorDescriptor::default()
    }
}

fn ui_actions(function: &str) -> Option<Vec<Action>> {
    let actions = match first_match(function, ACTION_RULES)? {
        Interaction::Click => vec![Action::Click, Action::Verify { expect: Expectation::Response }],
        Interaction::Input => vec![Action::Input, Action::Verify { expect: Expectation::Validation }],
        Interaction::Submit => vec![Action::Submit, Action::Verify { expect: Expectation::Success }],
    };
    Some(actions)
}

fn visual_target(f: &FileChange) -> Option<TestTarget> {
    let changed = f.lines.added.len() + f.lines.modified.len();
    if changed <= VISUAL_MIN_LINES {
        return None;
    }

    let min = f.lines.touched().min()?;
    let max = f.lines.touched().max()?;
    let scope = if max - min > COMPONENT_SPAN {
        AreaScope::Component
    } else {
        AreaScope::Partial
    };

    let component = component_name(&f.file);
    Some(TestTarget {
        name: format!("{component} - visual"),
        file: f.file.clone(),
        function: component.to_string(),
        change_type: ChangeType::Modified,
        kind: TargetKind::Visual,
        selectors: None,
        actions: None,
        endpoint: None,
        method: None,
        validations: None,
        target_area: Some(TargetArea {
            selector: format!(".{component}"),
            scope,
            changed_lines: changed,
        }),
    })
}

/* ============================================================
   API
   ============================================================ */

fn api_targets(f: &FileChange) -> Vec<TestTarget> {
    let component = component_name(&f.file);
    let touches_auth = f.lines.modified.iter().any(|l| AUTH_WINDOW.contains(l));

    live_functions(f)
        .map(|(function, change_type)| {
            let mut validations = api_validations(function);
            if touches_auth {
                validations.push(Validation::AuthCheck);
            }

            TestTarget {
                name: format!("{component} - {function}"),
                file: f.file.clone(),
                function: function.to_string(),
                change_type,
                kind: TargetKind::Api,
                selectors: None,
                actions: None,
                endpoint: Some(infer_endpoint(&f.file, function)),
                method: Some(infer_method(function)),
                validations: Some(validations),
                target_area: None,
            }
        })
        .collect()
}

fn api_validations(function: &str) -> Vec<Validation> {
    match first_match(function, VALIDATION_RULES) {
        Some(Operation::Read) => vec![Validation::Status { expect: 200 }, Validation::HasData],
        Some(Operation::Create) => vec![Validation::Status { expect: 201 }, Validation::HasId],
        Some(Operation::Update) => vec![Validation::Status { expect: 200 }, Validation::DataUpdated],
        Some(Operation::Delete) => vec![Validation::Status { expect: 204 }],
        None => Vec::new(),
    }
}

/* ============================================================
   Helpers
   ============================================================ */

/// Declarations that still exist in the new file.
fn live_functions(f: &FileChange) -> impl Iterator<Item = (&str, ChangeType)> {
    f.functions
        .iter()
        .filter(|(_, change)| *change != ChangeType::Deleted)
}

fn component_name(file: &str) -> &str {
    Path::new(file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file)
}

/// `UserList.handleSubmit` → `handle submit`.
fn describe(function: &str) -> String {
    let base = function.rsplit('.').next().unwrap_or(function);
    let mut words = String::new();

    for (i, c) in base.chars().enumerate() {
        if c == '_' || c == '-' {
            words.push(' ');
            continue;
        }
        if c.is_uppercase() && i > 0 && !words.ends_with(' ') {
            words.push(' ');
        }
        words.extend(c.to_lowercase());
    }

    words.trim().to_string()
}
