//! Health Report export.

mod report;

pub use report::*;
