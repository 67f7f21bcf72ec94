#![allow(dead_code)]

use blocksmith_core::{Block, Decimal, Ledger, LedgerConfig, Transaction, Wallet};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

pub const FAST_DIFFICULTY: usize = 2;

pub fn fast_config() -> LedgerConfig {
    LedgerConfig::default().with_difficulty(FAST_DIFFICULTY)
}

pub fn fast_ledger() -> Ledger {
    Ledger::new(fast_config()).expect("default config is valid")
}

pub fn reward() -> Decimal {
    fast_config().mining_reward
}

/// A ledger in which `address` holds exactly one mining reward.
pub fn funded_ledger(address: &str) -> Ledger {
    let ledger = fast_ledger();
    ledger
        .mine_pending_transactions(address)
        .expect("mining succeeds");
    ledger
}

/// A second ledger sharing `leader`'s genesis block, for import tests.
pub fn follower_of(leader: &Ledger) -> Ledger {
    let genesis = leader.block(0).expect("genesis exists");
    Ledger::from_blocks_unchecked(leader.config().clone(), vec![genesis])
        .expect("genesis-only ledger")
}

pub fn signed_transfer(wallet: &Wallet, to: &str, amount: i64) -> Transaction {
    let mut tx = Transaction::new(wallet.address(), to, Decimal::from(amount));
    wallet.sign(&mut tx).expect("wallet owns the sender address");
    tx
}

/// Return a copy of `value` with its JSON payload edited by `edit`.
/// Stands in for an attacker rewriting a stored block or transaction.
pub fn corrupt<T, F>(value: &T, edit: F) -> T
where
    T: Serialize + DeserializeOwned,
    F: FnOnce(&mut Value),
{
    let mut json = serde_json::to_value(value).expect("serializable");
    edit(&mut json);
    serde_json::from_value(json).expect("still well-formed")
}

/// Replace `chain[index]` with `block`, returning a ledger over the result.
pub fn ledger_with_replaced(ledger: &Ledger, index: usize, block: Block) -> Ledger {
    let mut blocks = ledger.chain();
    blocks[index] = block;
    Ledger::from_blocks_unchecked(ledger.config().clone(), blocks).expect("non-empty chain")
}

/// Overwrite the stored hash with whatever the (possibly edited) header
/// now hashes to, as an attacker covering their tracks would.
pub fn rehash(block: &Block) -> Block {
    let hash = block.recompute_hash();
    corrupt(block, |json| json["hash"] = Value::String(hash))
}
