use crate::block::BlockHeader;
use crate::constants::MINING_BATCH;
use crate::hash::meets_difficulty;
use crate::pow::{CancelToken, HeaderHasher};
use rayon::prelude::*;

/// Searches nonces in parallel until a header hash has at least `difficulty`
/// leading zero hex digits. Each rayon task takes a batch of
/// [`MINING_BATCH`] nonces and looks at `cancel` before starting it.
///
/// The winning nonce is whichever a worker hits first, not necessarily the
/// smallest valid one.
pub fn search_parallel(
    header: &BlockHeader,
    difficulty: usize,
    cancel: Option<&CancelToken>,
) -> Option<(u64, String)> {
    let hasher = HeaderHasher::new(header);
    (0u64..u64::MAX / MINING_BATCH)
        .into_par_iter()
        .find_map_any(|batch| {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return Some(None);
            }
            let start = batch * MINING_BATCH;
            (start..start + MINING_BATCH)
                .find_map(|nonce| {
                    let hash = hasher.hash_nonce(nonce);
                    meets_difficulty(&hash, difficulty).then_some((nonce, hash))
                })
                .map(Some)
        })
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256_hex;

    fn header() -> BlockHeader {
        BlockHeader {
            index: 3,
            timestamp: 1_700_000_000_000,
            merkle_root: sha256_hex("parallel"),
            previous_hash: "00ab".into(),
            nonce: 0,
        }
    }

    #[test]
    fn parallel_search_finds_valid_nonce() {
        let (nonce, hash) = search_parallel(&header(), 3, None).unwrap();
        assert!(hash.starts_with("000"));
        assert_eq!(HeaderHasher::new(&header()).hash_nonce(nonce), hash);
    }

    #[test]
    fn parallel_search_honours_cancellation() {
        let token = CancelToken::new();
        token.cancel();
        assert!(search_parallel(&header(), 64, Some(&token)).is_none());
    }
}
