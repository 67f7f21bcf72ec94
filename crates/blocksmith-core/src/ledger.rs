//! The chain, the mempool and everything that reads or mutates them.
//!
//! All state sits behind one `RwLock`: every mutation (`add_block`,
//! `submit_transaction`, mining, imports) holds the write half for its whole
//! duration, so an admission decision always sees confirmed balances and
//! pending totals from the same instant. Readers get owned snapshots.

use crate::block::{Block, BlockTemplate};
use crate::config::LedgerConfig;
use crate::error::{ChainViolation, LedgerError, Rejection, ViolationKind};
use crate::pow::CancelToken;
use crate::transaction::Transaction;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct Ledger {
    config: LedgerConfig,
    state: RwLock<LedgerState>,
}

#[derive(Debug)]
struct LedgerState {
    chain: Vec<Block>,
    mempool: Vec<Transaction>,
}

impl Ledger {
    /// Build a ledger holding only a freshly mined genesis block.
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        let mut genesis = BlockTemplate::with_data(
            0,
            config.genesis_message.clone(),
            config.genesis_previous_hash.clone(),
        );
        let elapsed = run_miner(&config, &mut genesis, None).ok_or(LedgerError::MiningCancelled)?;
        let genesis = genesis.seal();
        info!(
            hash = %genesis.hash(),
            nonce = genesis.nonce(),
            elapsed_ms = elapsed.as_millis() as u64,
            "genesis block mined"
        );
        Ok(Self {
            config,
            state: RwLock::new(LedgerState {
                chain: vec![genesis],
                mempool: Vec::new(),
            }),
        })
    }

    /// Rebuild a ledger around an existing block sequence without checking
    /// it. Run [`Ledger::validate_chain`] before trusting the result.
    pub fn from_blocks_unchecked(config: LedgerConfig, blocks: Vec<Block>) -> Result<Self, LedgerError> {
        config.validate()?;
        if blocks.is_empty() {
            return Err(ChainViolation::new(0, ViolationKind::MissingGenesis).into());
        }
        Ok(Self {
            config,
            state: RwLock::new(LedgerState {
                chain: blocks,
                mempool: Vec::new(),
            }),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn chain(&self) -> Vec<Block> {
        self.state.read().chain.clone()
    }

    pub fn chain_len(&self) -> usize {
        self.state.read().chain.len()
    }

    pub fn block(&self, index: usize) -> Option<Block> {
        self.state.read().chain.get(index).cloned()
    }

    pub fn latest_block(&self) -> Block {
        self.state.read().tip().clone()
    }

    pub fn mempool(&self) -> Vec<Transaction> {
        self.state.read().mempool.clone()
    }

    /// Confirmed balance, replayed over every block.
    pub fn balance(&self, address: &str) -> Decimal {
        self.state.read().confirmed_balance(address)
    }

    pub fn pending_outgoing(&self, address: &str) -> Decimal {
        self.state.read().pending_outgoing(address)
    }

    /// What `address` can still commit to new transactions.
    pub fn available_balance(&self, address: &str) -> Decimal {
        let state = self.state.read();
        state
            .confirmed_balance(address)
            .saturating_sub(state.pending_outgoing(address))
    }

    /// Append a transaction-less block carrying `data`.
    pub fn add_block(&self, data: &str) -> Block {
        let mut state = self.state.write();
        let tip = state.tip();
        let mut template = BlockTemplate::with_data(tip.index() + 1, data, tip.hash());
        let elapsed = run_miner(&self.config, &mut template, None)
            .expect("a search without a cancel token runs until it finds a nonce");
        let block = template.seal();
        log_mined(&block, elapsed);
        state.chain.push(block.clone());
        block
    }

    /// `true` if `tx` entered the mempool. See [`Ledger::submit_transaction`]
    /// for the reason when it did not.
    pub fn add_transaction(&self, tx: Transaction) -> bool {
        self.submit_transaction(tx).is_ok()
    }

    pub fn submit_transaction(&self, tx: Transaction) -> Result<(), Rejection> {
        let id = tx.id().to_string();
        let result = self.state.write().admit(tx, &self.config);
        match &result {
            Ok(()) => debug!(%id, "transaction admitted to mempool"),
            Err(reason) => warn!(%id, %reason, "transaction rejected"),
        }
        result
    }

    /// Admit a transaction that came from outside the process: its id is
    /// recomputed and a valid signature is mandatory.
    pub fn import_transaction(&self, tx: Transaction) -> Result<(), Rejection> {
        if !tx.has_valid_id() {
            warn!(id = %tx.id(), "imported transaction id does not match content");
            return Err(Rejection::IdMismatch);
        }
        if !tx.verify_signature(&self.config.coinbase_sender) {
            warn!(id = %tx.id(), "imported transaction signature does not verify");
            return Err(Rejection::InvalidSignature);
        }
        self.submit_transaction(tx)
    }

    /// Mint the reward to `miner`, bundle it with every pending transaction,
    /// mine the block and clear the mempool.
    pub fn mine_pending_transactions(&self, miner: &str) -> Result<Block, LedgerError> {
        self.mine_pending(miner, None)
    }

    /// As [`Ledger::mine_pending_transactions`], abandoning the search once
    /// `cancel` fires. A cancelled attempt leaves chain and mempool as they were.
    pub fn mine_pending_transactions_cancellable(
        &self,
        miner: &str,
        cancel: &CancelToken,
    ) -> Result<Block, LedgerError> {
        self.mine_pending(miner, Some(cancel))
    }

    fn mine_pending(&self, miner: &str, cancel: Option<&CancelToken>) -> Result<Block, LedgerError> {
        if miner.trim().is_empty() {
            return Err(Rejection::InvalidTransaction.into());
        }
        let mut state = self.state.write();
        let coinbase =
            Transaction::coinbase(&self.config.coinbase_sender, miner, self.config.mining_reward);
        let mut txs = Vec::with_capacity(state.mempool.len() + 1);
        txs.push(coinbase);
        txs.extend(state.mempool.iter().cloned());

        let tip = state.tip();
        let mut template = BlockTemplate::new(tip.index() + 1, txs, tip.hash());
        let Some(elapsed) = run_miner(&self.config, &mut template, cancel) else {
            info!(index = template.header().index, "mining cancelled");
            return Err(LedgerError::MiningCancelled);
        };
        let block = template.seal();
        log_mined(&block, elapsed);
        state.chain.push(block.clone());
        state.mempool.clear();
        Ok(block)
    }

    pub fn is_chain_valid(&self) -> bool {
        self.validate_chain().is_ok()
    }

    /// Walk the whole chain and report the first failed check.
    pub fn validate_chain(&self) -> Result<(), ChainViolation> {
        let state = self.state.read();
        let result = validate_blocks(&state.chain, &self.config);
        if let Err(violation) = &result {
            warn!(%violation, "chain validation failed");
        }
        result
    }

    /// Append a block received from elsewhere. Nothing it claims about
    /// itself is trusted: ids, Merkle root and hash are re-derived, every
    /// transaction is checked, and linkage and difficulty are enforced
    /// against the current tip. Mempool entries it confirms, or can no
    /// longer afford, are dropped.
    pub fn import_block(&self, block: Block) -> Result<(), LedgerError> {
        let mut state = self.state.write();
        if let Err(violation) = state.check_candidate(&block, &self.config) {
            warn!(%violation, hash = %block.hash(), "rejected imported block");
            return Err(violation.into());
        }
        info!(
            index = block.index(),
            hash = %block.hash(),
            transactions = block.transactions().len(),
            "imported block"
        );
        state.chain.push(block);
        state.revalidate_mempool(&self.config);
        Ok(())
    }
}

impl LedgerState {
    fn tip(&self) -> &Block {
        self.chain.last().expect("a ledger always holds its genesis block")
    }

    fn confirmed_balance(&self, address: &str) -> Decimal {
        let mut balance = Decimal::ZERO;
        for tx in self.chain.iter().flat_map(Block::transactions) {
            // Saturating: a chain restored unchecked may carry any amounts.
            if tx.recipient() == address {
                balance = balance.saturating_add(tx.amount());
            }
            if tx.sender() == address {
                balance = balance.saturating_sub(tx.amount());
            }
        }
        balance
    }

    fn pending_outgoing(&self, address: &str) -> Decimal {
        self.mempool
            .iter()
            .filter(|tx| tx.sender() == address)
            .map(Transaction::amount)
            .sum()
    }

    fn is_known(&self, id: &str) -> bool {
        self.mempool.iter().any(|tx| tx.id() == id)
            || self
                .chain
                .iter()
                .flat_map(Block::transactions)
                .any(|tx| tx.id() == id)
    }

    fn admit(&mut self, tx: Transaction, config: &LedgerConfig) -> Result<(), Rejection> {
        if !tx.is_valid() {
            return Err(Rejection::InvalidTransaction);
        }
        if tx.is_coinbase(&config.coinbase_sender) {
            return Err(Rejection::CoinbaseForgery);
        }
        if !tx.has_valid_id() {
            return Err(Rejection::IdMismatch);
        }
        if config.require_signatures && !tx.verify_signature(&config.coinbase_sender) {
            return Err(Rejection::InvalidSignature);
        }
        if self.is_known(tx.id()) {
            return Err(Rejection::Duplicate {
                id: tx.id().to_string(),
            });
        }
        let available = self
            .confirmed_balance(tx.sender())
            .saturating_sub(self.pending_outgoing(tx.sender()));
        if tx.amount() > available {
            return Err(Rejection::InsufficientFunds {
                available,
                requested: tx.amount(),
            });
        }
        self.mempool.push(tx);
        Ok(())
    }

    /// Re-admit every pending transaction against the current chain, in
    /// order, dropping the ones that no longer pass.
    fn revalidate_mempool(&mut self, config: &LedgerConfig) {
        for tx in std::mem::take(&mut self.mempool) {
            let id = tx.id().to_string();
            if let Err(reason) = self.admit(tx, config) {
                debug!(%id, %reason, "evicted from mempool");
            }
        }
    }

    fn check_candidate(&self, block: &Block, config: &LedgerConfig) -> Result<(), ChainViolation> {
        let tip = self.tip();
        let index = tip.index() + 1;
        let fail = |kind| Err(ChainViolation::new(index, kind));

        if block.index() != index {
            return fail(ViolationKind::IndexOutOfSequence);
        }
        check_commitments(block, index)?;
        check_transactions(block, index, config)?;
        if block.hash() != block.recompute_hash() {
            return fail(ViolationKind::HashMismatch);
        }
        if block.previous_hash() != tip.hash() {
            return fail(ViolationKind::BrokenLink);
        }
        if !block.meets_difficulty(config.difficulty) {
            return fail(ViolationKind::InsufficientDifficulty);
        }
        // Coinbase ids may legitimately repeat: same miner, reward and millisecond.
        if block
            .transactions()
            .iter()
            .filter(|tx| !tx.is_coinbase(&config.coinbase_sender))
            .any(|tx| self.is_known_confirmed(tx.id()))
        {
            return fail(ViolationKind::DuplicateTransaction);
        }
        self.check_affordable(block, index, config)
    }

    fn is_known_confirmed(&self, id: &str) -> bool {
        self.chain
            .iter()
            .flat_map(Block::transactions)
            .any(|tx| tx.id() == id)
    }

    /// Replay the block in order on top of confirmed balances.
    fn check_affordable(&self, block: &Block, index: u64, config: &LedgerConfig) -> Result<(), ChainViolation> {
        let mut deltas: HashMap<&str, Decimal> = HashMap::new();
        for tx in block.transactions() {
            if !tx.is_coinbase(&config.coinbase_sender) {
                let delta = deltas.get(tx.sender()).copied().unwrap_or_default();
                if tx.amount() > self.confirmed_balance(tx.sender()).saturating_add(delta) {
                    return Err(ChainViolation::new(index, ViolationKind::Overspend));
                }
                let entry = deltas.entry(tx.sender()).or_default();
                *entry = entry.saturating_sub(tx.amount());
            }
            let entry = deltas.entry(tx.recipient()).or_default();
            *entry = entry.saturating_add(tx.amount());
        }
        Ok(())
    }
}

fn run_miner(config: &LedgerConfig, template: &mut BlockTemplate, cancel: Option<&CancelToken>) -> Option<Duration> {
    if config.parallel_mining {
        return template.mine_parallel(config.difficulty, cancel);
    }
    match cancel {
        Some(token) => template.mine_cancellable(config.difficulty, token),
        None => Some(template.mine(config.difficulty)),
    }
}

fn log_mined(block: &Block, elapsed: Duration) {
    info!(
        index = block.index(),
        nonce = block.nonce(),
        hash = %block.hash(),
        transactions = block.transactions().len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "mined block"
    );
}

/// Stored ids and Merkle root must match what the content produces. A block
/// commits to `data` only when it has no transactions.
fn check_commitments(block: &Block, index: u64) -> Result<(), ChainViolation> {
    if !block.transactions().is_empty() && block.data().is_some() {
        return Err(ChainViolation::new(index, ViolationKind::UncommittedData));
    }
    if block.transactions().iter().any(|tx| !tx.has_valid_id()) {
        return Err(ChainViolation::new(index, ViolationKind::TransactionIdMismatch));
    }
    if block.merkle_root() != block.recompute_merkle_root() {
        return Err(ChainViolation::new(index, ViolationKind::MerkleRootMismatch));
    }
    Ok(())
}

/// Structure, signatures and coinbase placement. At most one coinbase, in
/// slot 0, paying exactly the configured reward.
fn check_transactions(block: &Block, index: u64, config: &LedgerConfig) -> Result<(), ChainViolation> {
    let fail = |kind| Err(ChainViolation::new(index, kind));
    let mut seen = HashSet::new();
    for (slot, tx) in block.transactions().iter().enumerate() {
        if !tx.is_valid() {
            return fail(ViolationKind::InvalidTransaction);
        }
        if !seen.insert(tx.id()) {
            return fail(ViolationKind::DuplicateTransaction);
        }
        if tx.is_coinbase(&config.coinbase_sender) {
            if slot != 0 || tx.amount() != config.mining_reward {
                return fail(ViolationKind::InvalidCoinbase);
            }
        } else if !tx.verify_signature(&config.coinbase_sender) {
            return fail(ViolationKind::InvalidSignature);
        }
    }
    Ok(())
}

/// Genesis shape, then for every block: self-consistent hash, link to its
/// predecessor, difficulty, and content matching its commitments.
/// Stops at the first failure.
pub fn validate_blocks(blocks: &[Block], config: &LedgerConfig) -> Result<(), ChainViolation> {
    let Some(genesis) = blocks.first() else {
        return Err(ChainViolation::new(0, ViolationKind::MissingGenesis));
    };
    let fail = |index: usize, kind| Err(ChainViolation::new(index as u64, kind));

    if genesis.index() != 0 {
        return fail(0, ViolationKind::GenesisIndex);
    }
    if genesis.previous_hash() != config.genesis_previous_hash {
        return fail(0, ViolationKind::GenesisPreviousHash);
    }
    if genesis.hash() != genesis.recompute_hash() {
        return fail(0, ViolationKind::HashMismatch);
    }
    if !genesis.meets_difficulty(config.difficulty) {
        return fail(0, ViolationKind::InsufficientDifficulty);
    }
    check_commitments(genesis, 0)?;

    for (i, pair) in blocks.windows(2).enumerate() {
        let (previous, current) = (&pair[0], &pair[1]);
        let position = i + 1;
        if current.hash() != current.recompute_hash() {
            return fail(position, ViolationKind::HashMismatch);
        }
        if current.previous_hash() != previous.hash() {
            return fail(position, ViolationKind::BrokenLink);
        }
        if !current.meets_difficulty(config.difficulty) {
            return fail(position, ViolationKind::InsufficientDifficulty);
        }
        if current.index() != position as u64 {
            return fail(position, ViolationKind::IndexOutOfSequence);
        }
        check_commitments(current, position as u64)?;
    }
    Ok(())
}
