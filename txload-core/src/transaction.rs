use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Mxn,
    Usd,
    Eur,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Mxn, Currency::Usd, Currency::Eur];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Mxn => "MXN",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Synthetic payload sent to the validate endpoint.
///
/// `transaction_id` is only best-effort unique: it is built from the wall clock in
/// milliseconds and a bounded random suffix, so two workers may collide within the same
/// millisecond. The target service does not rely on uniqueness for load runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    /// Minor currency units.
    pub amount: u64,
    pub currency: Currency,
    pub sender_account: String,
    pub receiver_account: String,
    pub description: String,
}
