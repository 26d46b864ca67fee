/// Sentinel validator key carried by the genesis block.
pub const GENESIS_VALIDATOR_KEY: &str = "GENESIS";

/// Sentinel previous-hash carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Snapshot schema version written into every chain snapshot file.
pub const SNAPSHOT_VERSION: u32 = 1;

/// PBKDF2-SHA256 iteration count for at-rest key encryption.
pub const KEY_DERIVATION_ITERATIONS: u32 = 10_000;

/// Salt length (bytes) in the encrypted-key container.
pub const KEY_SALT_LEN: usize = 16;

/// IV length (bytes) for AES-256-CBC.
pub const KEY_IV_LEN: usize = 16;

/// Derived AES key length (bytes).
pub const KEY_LEN: usize = 32;

/// Default seconds between sealing-loop ticks.
pub const DEFAULT_BLOCK_INTERVAL_SECS: u64 = 30;

/// Default minimum pool size before the loop seals a block.
pub const DEFAULT_MIN_TXS_PER_BLOCK: usize = 1;

/// Default cap on transactions sealed into one block. The overflow stays
/// pending for the next tick.
pub const DEFAULT_MAX_TXS_PER_BLOCK: usize = 100;

/// Default number of rotated snapshot backups kept on disk.
pub const DEFAULT_MAX_BACKUP_FILES: usize = 5;
