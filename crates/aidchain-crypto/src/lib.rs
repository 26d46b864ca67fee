pub mod ecdsa;
pub mod hash;
pub mod keypair;

pub use ecdsa::{sign, verify};
pub use hash::sha256_hex;
pub use keypair::KeyPair;
