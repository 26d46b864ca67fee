pub mod db;
pub mod snapshot;

pub use db::StateDb;
pub use snapshot::{ChainSnapshot, ChainStore, ChainStoreConfig};
