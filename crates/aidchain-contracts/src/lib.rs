pub mod contract;
pub mod delivery_verification;
pub mod engine;
pub mod shipment_tracking;

pub use contract::{Contract, ContractEvent, ExecutionContext, ExecutionResult};
pub use delivery_verification::DeliveryVerificationContract;
pub use engine::{ContractEngine, ContractMeta};
pub use shipment_tracking::ShipmentTrackingContract;
