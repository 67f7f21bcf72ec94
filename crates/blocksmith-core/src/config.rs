use crate::constants::{
    COINBASE_SENDER, CURRENCY_SYMBOL, DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD,
    GENESIS_MESSAGE, GENESIS_PREVIOUS_HASH, HASH_HEX_SIZE, MAX_MINING_REWARD,
};
use crate::error::ConfigError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Parameters a ledger is built with. Passed by value into `Ledger::new`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Leading zero hex digits required of every block hash.
    pub difficulty: usize,
    pub mining_reward: Decimal,
    pub genesis_previous_hash: String,
    pub coinbase_sender: String,
    /// Display only.
    pub currency_symbol: String,
    pub genesis_message: String,
    /// Refuse unsigned transactions at local mempool admission too.
    pub require_signatures: bool,
    pub parallel_mining: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: Decimal::from(DEFAULT_MINING_REWARD),
            genesis_previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            coinbase_sender: COINBASE_SENDER.to_string(),
            currency_symbol: CURRENCY_SYMBOL.to_string(),
            genesis_message: GENESIS_MESSAGE.to_string(),
            require_signatures: false,
            parallel_mining: false,
        }
    }
}

impl LedgerConfig {
    pub fn with_difficulty(mut self, difficulty: usize) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_reward(mut self, reward: Decimal) -> Self {
        self.mining_reward = reward;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty == 0 || self.difficulty > HASH_HEX_SIZE {
            return Err(ConfigError::Difficulty {
                got: self.difficulty,
                max: HASH_HEX_SIZE,
            });
        }
        if self.mining_reward <= Decimal::ZERO {
            return Err(ConfigError::Reward(self.mining_reward));
        }
        let max = Decimal::from(MAX_MINING_REWARD);
        if self.mining_reward > max {
            return Err(ConfigError::RewardTooLarge {
                got: self.mining_reward,
                max,
            });
        }
        if self.genesis_previous_hash.is_empty() {
            return Err(ConfigError::EmptySentinel("genesis_previous_hash"));
        }
        if self.coinbase_sender.trim().is_empty() {
            return Err(ConfigError::EmptySentinel("coinbase_sender"));
        }
        Ok(())
    }

    /// Render an amount with the configured currency symbol.
    pub fn format_amount(&self, amount: Decimal) -> String {
        format!("{:.2} {}", amount, self.currency_symbol)
    }
}
