//! Single-process Proof-of-Work ledger: blocks, transactions, wallets,
//! an account-balance model and a mempool.

pub mod block;
pub mod config;
pub mod constants;
pub mod error;
pub mod hash;
pub mod ledger;
pub mod merkle;
pub mod mine;
pub mod pow;
pub mod transaction;
pub mod wallet;

pub use block::{Block, BlockHeader, BlockTemplate};
pub use config::LedgerConfig;
pub use error::{ChainViolation, ConfigError, LedgerError, Rejection, ViolationKind, WalletError};
pub use ledger::Ledger;
pub use merkle::merkle_root;
pub use pow::CancelToken;
pub use rust_decimal::Decimal;
pub use transaction::Transaction;
pub use wallet::Wallet;

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch; 0 if the clock reads before it.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
