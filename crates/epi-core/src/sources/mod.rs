//! Built-in source implementations.

pub mod table;

pub use table::{PivotOptions, TableOptions, TableSource};
