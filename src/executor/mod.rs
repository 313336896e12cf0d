pub mod pool;

pub use pool::run_ordered;
