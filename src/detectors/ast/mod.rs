#[allow(clippy::module_inception)]
pub mod ast;
pub mod declarations;
