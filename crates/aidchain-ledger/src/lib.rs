pub mod chain;
pub mod validation;

pub use chain::{Ledger, LedgerConfig};
pub use validation::{validate_link, LedgerFlags, ValidationIssue, ValidationReport};
