//! Change attribution: diff lines, declarations, classification, impact.

pub mod ast;
pub mod attribution;
pub mod diff_analyzer;
pub mod impact;
pub mod language;
pub mod line_changes;
