//! ECDSA (secp256r1 / P-256) key pairs and address derivation.

use crate::constants::{ADDRESS_PREFIX, ADDRESS_SIZE};
use crate::error::WalletError;
use crate::transaction::Transaction;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;

/// Fresh scalars that fall outside the curve order are redrawn this many times.
const KEYGEN_ATTEMPTS: usize = 8;

/// `"0x"` + hex of the last 20 bytes of SHA-256 over the encoded public key.
pub fn address_from_public_key(public_key: &[u8]) -> String {
    let digest = Sha256::digest(public_key);
    format!(
        "{ADDRESS_PREFIX}{}",
        hex::encode(&digest[digest.len() - ADDRESS_SIZE..])
    )
}

/// Verify `signature` over `message` with a SEC1-encoded public key.
/// Malformed keys or signatures verify as false.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Ok(key) = VerifyingKey::from_sec1_bytes(public_key) else {
        return false;
    };
    let Ok(sig) = Signature::try_from(signature) else {
        return false;
    };
    key.verify(message, &sig).is_ok()
}

/// A signing key plus the address it controls. The private key never
/// leaves this type.
pub struct Wallet {
    signing_key: SigningKey,
    public_key: Vec<u8>,
    address: String,
}

impl Wallet {
    /// Draw a new key pair from the operating system's CSPRNG.
    pub fn generate() -> Result<Self, WalletError> {
        let mut rng = OsRng;
        let mut secret = [0u8; 32];
        for _ in 0..KEYGEN_ATTEMPTS {
            rng.try_fill_bytes(&mut secret)
                .map_err(|e| WalletError::KeyGeneration(e.to_string()))?;
            if let Ok(signing_key) = SigningKey::from_slice(&secret) {
                secret.fill(0);
                return Ok(Self::from_signing_key(signing_key));
            }
        }
        secret.fill(0);
        Err(WalletError::KeyGeneration(
            "no valid scalar produced by the random source".into(),
        ))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key = signing_key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        let address = address_from_public_key(&public_key);
        Self {
            signing_key,
            public_key,
            address,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Uncompressed SEC1 encoding of the public key.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.public_key.clone()
    }

    /// Sign `tx` and attach the signature and public key to it.
    /// Re-signing overwrites the previous signature.
    pub fn sign(&self, tx: &mut Transaction) -> Result<(), WalletError> {
        if tx.sender() != self.address {
            return Err(WalletError::SignatureMismatch {
                wallet: self.address.clone(),
                sender: tx.sender().to_string(),
            });
        }
        let signature: Signature = self.signing_key.sign(tx.signing_payload().as_bytes());
        tx.attach_signature(signature.to_bytes().to_vec(), self.public_key.clone());
        Ok(())
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
