//! Proof-of-Work nonce search.

use crate::block::BlockHeader;
use crate::constants::CANCEL_CHECK_INTERVAL;
use crate::hash::meets_difficulty;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag a caller flips to abandon an in-progress search.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// SHA-256 state pre-seeded with every header field except the nonce.
#[derive(Clone)]
pub struct HeaderHasher {
    prefix: Sha256,
}

impl HeaderHasher {
    pub fn new(header: &BlockHeader) -> Self {
        let mut prefix = Sha256::new();
        prefix.update(header.index.to_string());
        prefix.update(header.timestamp.to_string());
        prefix.update(&header.merkle_root);
        prefix.update(&header.previous_hash);
        Self { prefix }
    }

    pub fn hash_nonce(&self, nonce: u64) -> String {
        let mut hasher = self.prefix.clone();
        hasher.update(nonce.to_string());
        hex::encode(hasher.finalize())
    }
}

/// Walk nonces upward from `start` until one meets `difficulty`.
/// Returns `None` only if `cancel` fires; it is polled every
/// [`CANCEL_CHECK_INTERVAL`] attempts.
pub fn search(
    header: &BlockHeader,
    start: u64,
    difficulty: usize,
    cancel: Option<&CancelToken>,
) -> Option<(u64, String)> {
    let cancelled = || cancel.is_some_and(CancelToken::is_cancelled);
    if cancelled() {
        return None;
    }
    let hasher = HeaderHasher::new(header);
    let mut nonce = start;
    loop {
        let hash = hasher.hash_nonce(nonce);
        if meets_difficulty(&hash, difficulty) {
            return Some((nonce, hash));
        }
        nonce = nonce.wrapping_add(1);
        if nonce % CANCEL_CHECK_INTERVAL == 0 && cancelled() {
            return None;
        }
    }
}
