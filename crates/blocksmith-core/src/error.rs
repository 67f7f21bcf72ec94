use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("difficulty must be between 1 and {max}, got {got}")]
    Difficulty { got: usize, max: usize },
    #[error("mining reward must be positive, got {0}")]
    Reward(Decimal),
    #[error("mining reward must be at most {max}, got {got}")]
    RewardTooLarge { got: Decimal, max: Decimal },
    #[error("{0} must not be empty")]
    EmptySentinel(&'static str),
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
    #[error("wallet {wallet} cannot sign a transaction sent by {sender}")]
    SignatureMismatch { wallet: String, sender: String },
}

/// Why a transaction was kept out of the mempool.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    #[error("transaction is structurally invalid")]
    InvalidTransaction,
    #[error("coinbase transactions can only be created by mining")]
    CoinbaseForgery,
    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },
    #[error("signature verification failed")]
    InvalidSignature,
    #[error("transaction id does not match its content")]
    IdMismatch,
    #[error("transaction {id} is already pending")]
    Duplicate { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    MissingGenesis,
    GenesisIndex,
    GenesisPreviousHash,
    HashMismatch,
    BrokenLink,
    InsufficientDifficulty,
    IndexOutOfSequence,
    MerkleRootMismatch,
    UncommittedData,
    TransactionIdMismatch,
    InvalidTransaction,
    InvalidSignature,
    InvalidCoinbase,
    DuplicateTransaction,
    Overspend,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViolationKind::MissingGenesis => "chain has no genesis block",
            ViolationKind::GenesisIndex => "genesis block index is not 0",
            ViolationKind::GenesisPreviousHash => "genesis previous hash is not the sentinel",
            ViolationKind::HashMismatch => "stored hash does not match recomputed hash",
            ViolationKind::BrokenLink => "previous hash does not match predecessor",
            ViolationKind::InsufficientDifficulty => "hash does not meet difficulty",
            ViolationKind::IndexOutOfSequence => "block index is out of sequence",
            ViolationKind::MerkleRootMismatch => "merkle root does not match transactions",
            ViolationKind::UncommittedData => "transaction block carries data outside its merkle root",
            ViolationKind::TransactionIdMismatch => "transaction id does not match its content",
            ViolationKind::InvalidTransaction => "transaction is structurally invalid",
            ViolationKind::InvalidSignature => "transaction signature does not verify",
            ViolationKind::InvalidCoinbase => "coinbase transaction is misplaced or mis-sized",
            ViolationKind::DuplicateTransaction => "transaction is already confirmed or repeated",
            ViolationKind::Overspend => "transaction spends more than the sender holds",
        };
        f.write_str(s)
    }
}

/// The first failed check found while walking a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[error("block {index}: {kind}")]
pub struct ChainViolation {
    pub index: u64,
    pub kind: ViolationKind,
}

impl ChainViolation {
    pub fn new(index: u64, kind: ViolationKind) -> Self {
        Self { index, kind }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("transaction rejected: {0}")]
    Rejected(#[from] Rejection),
    #[error("chain integrity violation: {0}")]
    Integrity(#[from] ChainViolation),
    #[error("mining was cancelled")]
    MiningCancelled,
}
