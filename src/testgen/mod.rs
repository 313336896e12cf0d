pub mod candidate;
pub mod generator;
pub mod index;

pub use candidate::{SelectorDescriptor, TargetKind, TestTarget};
pub use generator::generate_test_targets;
pub use index::{build_index, TestTargetsIndex};
