//! Merkle root over transaction ids.

use crate::hash::{sha256_hex, sha256_hex_concat};
use crate::transaction::Transaction;

/// Root over `txs`, in order.
///
/// - no transactions: `H(data)`
/// - one transaction: that transaction's id, unhashed
/// - otherwise pairwise `H(left ‖ right)` per level, an odd tail paired with itself
pub fn merkle_root(txs: &[Transaction], data: &str) -> String {
    let ids: Vec<&str> = txs.iter().map(Transaction::id).collect();
    merkle_root_from_ids(&ids, data)
}

pub fn merkle_root_from_ids(ids: &[&str], data: &str) -> String {
    match ids {
        [] => sha256_hex(data),
        [only] => (*only).to_string(),
        _ => {
            let mut level: Vec<String> = ids.iter().map(|id| (*id).to_string()).collect();
            while level.len() > 1 {
                level = level
                    .chunks(2)
                    .map(|pair| {
                        let left = pair[0].as_bytes();
                        let right = pair.get(1).map_or(left, |r| r.as_bytes());
                        sha256_hex_concat(&[left, right])
                    })
                    .collect();
            }
            level.swap_remove(0)
        }
    }
}
