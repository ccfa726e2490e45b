//! Domain models for Luni triage.

mod analysis;
mod case;
mod message;
mod pet;
mod region;
mod report;

pub use analysis::*;
pub use case::*;
pub use message::*;
pub use pet::*;
pub use region::*;
pub use report::*;
