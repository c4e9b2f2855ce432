//! Access-key handlers.

mod issue_key;

pub use issue_key::{IssueKeyCommand, IssueKeyHandler, IssueKeyOutcome};
