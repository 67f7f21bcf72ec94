use crate::hash::{meets_difficulty, sha256_hex};
use crate::merkle::merkle_root;
use crate::pow::{self, CancelToken, HeaderHasher};
use crate::transaction::Transaction;
use crate::{mine, now_millis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// The fields committed to by a block hash, in hashing order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    pub index: u64,
    pub timestamp: u64,
    pub merkle_root: String,
    pub previous_hash: String,
    pub nonce: u64,
}

impl BlockHeader {
    /// `H(index ‖ timestamp ‖ merkleRoot ‖ previousHash ‖ nonce)`.
    pub fn compute_hash(&self) -> String {
        HeaderHasher::new(self).hash_nonce(self.nonce)
    }
}

/// A block still being mined. `nonce` and `hash` move together until
/// [`BlockTemplate::seal`] freezes it into a [`Block`].
#[derive(Clone, Debug)]
pub struct BlockTemplate {
    header: BlockHeader,
    transactions: Vec<Transaction>,
    data: Option<String>,
    hash: String,
}

impl BlockTemplate {
    /// Takes ownership of `transactions`; the Merkle root is computed once here.
    pub fn new(index: u64, transactions: Vec<Transaction>, previous_hash: impl Into<String>) -> Self {
        let merkle_root = merkle_root(&transactions, "");
        Self::assemble(index, transactions, None, merkle_root, previous_hash.into())
    }

    /// A transaction-less block whose Merkle root is `H(data)`.
    pub fn with_data(index: u64, data: impl Into<String>, previous_hash: impl Into<String>) -> Self {
        let data = data.into();
        let merkle_root = sha256_hex(&data);
        Self::assemble(index, Vec::new(), Some(data), merkle_root, previous_hash.into())
    }

    fn assemble(
        index: u64,
        transactions: Vec<Transaction>,
        data: Option<String>,
        merkle_root: String,
        previous_hash: String,
    ) -> Self {
        let header = BlockHeader {
            index,
            timestamp: now_millis(),
            merkle_root,
            previous_hash,
            nonce: 0,
        };
        let hash = header.compute_hash();
        Self {
            header,
            transactions,
            data,
            hash,
        }
    }

    /// Pin the timestamp, e.g. for reproducible hashes. Resets the nonce.
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.header.timestamp = timestamp;
        self.header.nonce = 0;
        self.hash = self.header.compute_hash();
        self
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn nonce(&self) -> u64 {
        self.header.nonce
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn recompute_hash(&self) -> String {
        self.header.compute_hash()
    }

    /// Increment the nonce until the hash has `difficulty` leading zero hex
    /// digits. Unbounded; each extra digit costs about 16x more attempts.
    pub fn mine(&mut self, difficulty: usize) -> Duration {
        let started = Instant::now();
        if let Some(found) = pow::search(&self.header, self.header.nonce, difficulty, None) {
            self.apply(found);
        }
        started.elapsed()
    }

    /// Like [`BlockTemplate::mine`] but gives up once `cancel` fires.
    /// On `None` the template keeps its previous nonce and hash.
    pub fn mine_cancellable(&mut self, difficulty: usize, cancel: &CancelToken) -> Option<Duration> {
        let started = Instant::now();
        let found = pow::search(&self.header, self.header.nonce, difficulty, Some(cancel))?;
        self.apply(found);
        Some(started.elapsed())
    }

    /// Spread the nonce search over the rayon pool.
    pub fn mine_parallel(&mut self, difficulty: usize, cancel: Option<&CancelToken>) -> Option<Duration> {
        let started = Instant::now();
        let found = mine::search_parallel(&self.header, difficulty, cancel)?;
        self.apply(found);
        Some(started.elapsed())
    }

    fn apply(&mut self, (nonce, hash): (u64, String)) {
        self.header.nonce = nonce;
        self.hash = hash;
    }

    pub fn seal(self) -> Block {
        Block {
            header: self.header,
            transactions: self.transactions,
            data: self.data,
            hash: self.hash,
        }
    }
}

/// A frozen block. There are no setters; a `Block` that disagrees with
/// itself can only come from deserializing untrusted input, and the
/// `recompute_*` methods expose that.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(flatten)]
    header: BlockHeader,
    transactions: Vec<Transaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    hash: String,
}

impl Block {
    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn index(&self) -> u64 {
        self.header.index
    }

    pub fn timestamp(&self) -> u64 {
        self.header.timestamp
    }

    pub fn merkle_root(&self) -> &str {
        &self.header.merkle_root
    }

    pub fn previous_hash(&self) -> &str {
        &self.header.previous_hash
    }

    pub fn nonce(&self) -> u64 {
        self.header.nonce
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    /// Pure function of the current header; never read from `hash`.
    pub fn recompute_hash(&self) -> String {
        self.header.compute_hash()
    }

    pub fn recompute_merkle_root(&self) -> String {
        if self.transactions.is_empty() {
            sha256_hex(self.data.as_deref().unwrap_or(""))
        } else {
            merkle_root(&self.transactions, "")
        }
    }

    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        meets_difficulty(&self.hash, difficulty)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Block{{index={}, timestamp={}, transactions={}, nonce={}, previousHash={}, hash={}",
            self.header.index,
            self.header.timestamp,
            self.transactions.len(),
            self.header.nonce,
            self.header.previous_hash,
            self.hash
        )?;
        if let Some(data) = &self.data {
            write!(f, ", data={data}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::leading_zero_digits;
    use rust_decimal::Decimal;

    fn sample_txs() -> Vec<Transaction> {
        vec![
            Transaction::with_timestamp("Alice", "Bob", Decimal::from(10), 1_600_000_000_000),
            Transaction::with_timestamp("Bob", "Charlie", Decimal::from(5), 1_600_000_100_000),
        ]
    }

    #[test]
    fn template_initial_state() {
        let t = BlockTemplate::new(1, sample_txs(), "previous-hash-123");
        assert_eq!(t.header().index, 1);
        assert_eq!(t.header().previous_hash, "previous-hash-123");
        assert_eq!(t.nonce(), 0);
        assert_eq!(t.hash().len(), 64);
        assert_eq!(t.hash(), t.recompute_hash());
        assert!(t.header().timestamp > 0);
    }

    #[test]
    fn data_block_root_is_hash_of_data() {
        let b = BlockTemplate::with_data(1, "Test data", "prev").seal();
        assert_eq!(b.merkle_root(), sha256_hex("Test data"));
        assert_eq!(b.data(), Some("Test data"));
        assert!(b.transactions().is_empty());
        assert_eq!(b.recompute_merkle_root(), b.merkle_root());
    }

    #[test]
    fn different_data_gives_different_hashes() {
        let a = BlockTemplate::with_data(1, "Test data 1", "prev").with_timestamp(1);
        let b = BlockTemplate::with_data(1, "Test data 2", "prev").with_timestamp(1);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn hash_is_pure_and_follows_nonce() {
        let mut t = BlockTemplate::new(1, sample_txs(), "prev").with_timestamp(1_600_000_200_000);
        assert_eq!(t.recompute_hash(), t.recompute_hash());
        let before = t.hash().to_string();
        t.apply((1, String::new()));
        assert_ne!(t.recompute_hash(), before);
    }

    #[test]
    fn mining_meets_difficulty() {
        for difficulty in 1..=3 {
            let mut t = BlockTemplate::with_data(1, "Test data", "0000previous-hash-123");
            t.mine(difficulty);
            assert!(leading_zero_digits(t.hash()) >= difficulty);
            assert_eq!(t.hash(), t.recompute_hash());
        }
    }

    #[test]
    fn higher_difficulty_more_zeros() {
        let mut low = BlockTemplate::with_data(1, "Test", "prev").with_timestamp(5);
        let mut high = low.clone();
        low.mine(1);
        high.mine(3);
        assert!(leading_zero_digits(low.hash()) >= 1);
        assert!(leading_zero_digits(high.hash()) >= 3);
        assert!(high.nonce() >= low.nonce());
    }

    #[test]
    fn mining_reports_elapsed_time() {
        let mut t = BlockTemplate::with_data(1, "Test", "prev");
        let elapsed = t.mine(1);
        assert!(elapsed < Duration::from_secs(60));
    }

    #[test]
    fn sealed_block_keeps_mined_state() {
        let mut t = BlockTemplate::new(2, sample_txs(), "prev");
        t.mine(2);
        let (nonce, hash) = (t.nonce(), t.hash().to_string());
        let b = t.seal();
        assert_eq!(b.nonce(), nonce);
        assert_eq!(b.hash(), hash);
        assert!(b.meets_difficulty(2));
        assert_eq!(b.recompute_hash(), hash);
        assert_eq!(b.transactions(), sample_txs().as_slice());
    }

    #[test]
    fn cancelled_template_is_left_untouched() {
        let mut t = BlockTemplate::with_data(1, "Test", "prev");
        let before = t.hash().to_string();
        let token = CancelToken::new();
        token.cancel();
        assert!(t.mine_cancellable(64, &token).is_none());
        assert_eq!(t.hash(), before);
        assert_eq!(t.nonce(), 0);
    }

    #[test]
    fn parallel_mining_produces_consistent_block() {
        let mut t = BlockTemplate::new(1, sample_txs(), "prev");
        t.mine_parallel(2, None).unwrap();
        let b = t.seal();
        assert!(b.meets_difficulty(2));
        assert_eq!(b.recompute_hash(), b.hash());
    }

    #[test]
    fn json_payload_is_flat_camel_case() {
        let mut t = BlockTemplate::new(1, sample_txs(), "prev");
        t.mine(1);
        let b = t.seal();
        let json = serde_json::to_value(&b).unwrap();
        for key in ["index", "timestamp", "transactions", "merkleRoot", "previousHash", "nonce", "hash"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert!(json.get("data").is_none());
        let back: Block = serde_json::from_value(json).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn display_contains_key_fields() {
        let b = BlockTemplate::with_data(1, "Test data", "previous-hash-123").seal();
        let s = b.to_string();
        assert!(s.contains("index=1"));
        assert!(s.contains("Test data"));
        assert!(s.contains("previous-hash-123"));
    }
}
