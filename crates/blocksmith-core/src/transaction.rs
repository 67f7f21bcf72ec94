use crate::hash::sha256_hex;
use crate::now_millis;
use crate::wallet;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A value transfer between two addresses.
///
/// `id` is fixed at construction from `sender ‖ recipient ‖ amount ‖ timestamp`.
/// A transaction received from elsewhere keeps whatever `id` it arrived with;
/// [`Transaction::has_valid_id`] recomputes and compares.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    id: String,
    sender: String,
    recipient: String,
    amount: Decimal,
    timestamp: u64,
    #[serde(default, with = "hex_bytes", skip_serializing_if = "Option::is_none")]
    signature: Option<Vec<u8>>,
    #[serde(default, with = "hex_bytes", skip_serializing_if = "Option::is_none")]
    sender_public_key: Option<Vec<u8>>,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: Decimal) -> Self {
        Self::with_timestamp(sender, recipient, amount, now_millis())
    }

    pub fn with_timestamp(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: Decimal,
        timestamp: u64,
    ) -> Self {
        let mut tx = Self {
            id: String::new(),
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
            timestamp,
            signature: None,
            sender_public_key: None,
        };
        tx.id = tx.compute_id();
        tx
    }

    /// Mint `reward` to `miner`. Only the mining flow should call this.
    pub fn coinbase(coinbase_sender: &str, miner: impl Into<String>, reward: Decimal) -> Self {
        Self::new(coinbase_sender, miner, reward)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    pub fn sender_public_key(&self) -> Option<&[u8]> {
        self.sender_public_key.as_deref()
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some() && self.sender_public_key.is_some()
    }

    pub fn is_coinbase(&self, coinbase_sender: &str) -> bool {
        self.sender == coinbase_sender
    }

    /// The exact bytes a wallet signs and a verifier checks.
    pub fn signing_payload(&self) -> String {
        format!(
            "{}{}{}{}",
            self.sender, self.recipient, self.amount, self.timestamp
        )
    }

    pub fn compute_id(&self) -> String {
        sha256_hex(self.signing_payload())
    }

    pub fn has_valid_id(&self) -> bool {
        self.id == self.compute_id()
    }

    /// Structural check only: positive amount and non-blank addresses.
    /// Balance and signature are checked elsewhere.
    pub fn is_valid(&self) -> bool {
        self.amount > Decimal::ZERO
            && !self.sender.trim().is_empty()
            && !self.recipient.trim().is_empty()
    }

    /// Coinbase transactions need no proof. Anything else must carry a
    /// public key whose address is `sender` and a signature over
    /// [`Transaction::signing_payload`] that verifies under it.
    pub fn verify_signature(&self, coinbase_sender: &str) -> bool {
        if self.is_coinbase(coinbase_sender) {
            return true;
        }
        let (Some(signature), Some(public_key)) = (&self.signature, &self.sender_public_key) else {
            return false;
        };
        if wallet::address_from_public_key(public_key) != self.sender {
            return false;
        }
        wallet::verify(public_key, self.signing_payload().as_bytes(), signature)
    }

    pub(crate) fn attach_signature(&mut self, signature: Vec<u8>, public_key: Vec<u8>) {
        self.signature = Some(signature);
        self.sender_public_key = Some(public_key);
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transaction{{id={}..., {} -> {}: {:.2}}}",
            self.id.get(..8).unwrap_or(&self.id),
            self.sender,
            self.recipient,
            self.amount
        )
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_str(&hex::encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| hex::decode(s.strip_prefix("0x").unwrap_or(&s)))
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}
