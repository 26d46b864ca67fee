pub mod audit;
pub mod block;
pub mod constants;
pub mod error;
pub mod shipment;
pub mod transaction;
pub mod types;
pub mod validator;

pub use audit::{AuditQuery, AuditRecord};
pub use block::*;
pub use constants::*;
pub use error::AidError;
pub use shipment::*;
pub use transaction::*;
pub use types::*;
pub use validator::Validator;
