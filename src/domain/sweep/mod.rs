//! Sweep domain module.
//!
//! Reports produced by one run of the expiration sweep.

mod errors;
mod report;

pub use errors::SweepError;
pub use report::{RevokedEntitlement, SweepFailure, SweepReport};
