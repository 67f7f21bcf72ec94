pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const ADDRESS_SIZE: usize = 20;
pub const ADDRESS_PREFIX: &str = "0x";

pub const DEFAULT_DIFFICULTY: usize = 4;
pub const DEFAULT_MINING_REWARD: i64 = 50;
/// Keeps a replayed supply far below `Decimal::MAX`.
pub const MAX_MINING_REWARD: i64 = 1_000_000_000;
pub const GENESIS_PREVIOUS_HASH: &str = "0";
pub const COINBASE_SENDER: &str = "COINBASE";
pub const CURRENCY_SYMBOL: &str = "BSC";
pub const GENESIS_MESSAGE: &str = "Genesis Block - BlockSmith ledger";

/// Nonce attempts between two looks at a cancellation token.
pub const CANCEL_CHECK_INTERVAL: u64 = 4096;
/// Nonces handed to one rayon task in a parallel search.
pub const MINING_BATCH: u64 = 16_384;
