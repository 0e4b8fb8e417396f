use rand::distributions::{Distribution, Uniform};
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};
use txload_core::{ConfigError, Currency, GeneratorConfig, Transaction};

/// Produces randomized transactions for the validate endpoint.
#[derive(Debug, Clone)]
pub struct TransactionGenerator {
    config: GeneratorConfig,
    amount: Uniform<u64>,
}

impl TransactionGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let amount = Uniform::new_inclusive(config.amount_min, config.amount_max);
        Ok(Self { config, amount })
    }

    pub fn generate(&self) -> Transaction {
        self.generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Transaction {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let suffix = rng.gen_range(0..self.config.id_suffix_bound);
        let transaction_id = format!("{}-{millis}-{suffix}", self.config.id_prefix);

        let currency = self
            .config
            .currencies
            .choose(rng)
            .copied()
            .unwrap_or(Currency::Mxn);

        Transaction {
            amount: self.amount.sample(rng),
            currency,
            sender_account: self.account(rng),
            receiver_account: self.account(rng),
            description: format!("{} {transaction_id}", self.config.description_prefix),
            transaction_id,
        }
    }

    fn account<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        format!(
            "{}{}",
            self.config.account_prefix,
            rng.gen_range(0..self.config.account_space)
        )
    }
}
