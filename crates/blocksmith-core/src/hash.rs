//! SHA-256 digests rendered as lowercase hex.

use sha2::{Digest, Sha256};

/// Hash arbitrary bytes and return the 64-character hex digest.
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data.as_ref()))
}

/// Hash the concatenation of `parts` without building an intermediate buffer.
pub fn sha256_hex_concat(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

/// Number of leading `'0'` characters in a hex digest.
pub fn leading_zero_digits(hash: &str) -> usize {
    hash.bytes().take_while(|b| *b == b'0').count()
}

/// A hash is valid at `difficulty` when it starts with that many `'0'` digits.
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    leading_zero_digits(hash) >= difficulty
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::HASH_HEX_SIZE;

    #[test]
    fn known_vector() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn output_is_lowercase_hex_of_fixed_length() {
        for input in ["", "a", "hello world", &"x".repeat(10_000)] {
            let h = sha256_hex(input);
            assert_eq!(h.len(), HASH_HEX_SIZE);
            assert!(h.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        }
    }

    #[test]
    fn deterministic() {
        assert_eq!(sha256_hex("blocksmith"), sha256_hex("blocksmith"));
    }

    #[test]
    fn concat_matches_single_buffer() {
        assert_eq!(
            sha256_hex_concat(&[b"hello", b"world"]),
            sha256_hex("helloworld")
        );
    }

    #[test]
    fn avalanche_flips_roughly_half_the_bits() {
        let a = hex::decode(sha256_hex("blocksmith")).unwrap();
        let b = hex::decode(sha256_hex("blocksmiti")).unwrap();
        let flipped: u32 = a.iter().zip(&b).map(|(x, y)| (x ^ y).count_ones()).sum();
        // 256 bits, expect ~128; a generous window keeps this stable.
        assert!((64..=192).contains(&flipped), "flipped {flipped} bits");
    }

    #[test]
    fn leading_zero_digit_examples() {
        assert_eq!(leading_zero_digits("abc"), 0);
        assert_eq!(leading_zero_digits("0abc"), 1);
        assert_eq!(leading_zero_digits("0000f"), 4);
        assert_eq!(leading_zero_digits("0000"), 4);
        assert!(meets_difficulty("000a", 3));
        assert!(!meets_difficulty("00a0", 3));
        assert!(meets_difficulty("anything", 0));
    }
}
