use serde::Serialize;

/// One futures wallet as reported by the venue, reduced to the fields
/// the gateway actually uses.
#[derive(Debug, Clone, Serialize)]
pub struct Wallet {
    pub id: String,
    pub currency: String,
    pub balance: f64,
    pub locked_balance: f64,
}

impl Wallet {
    pub fn new(id: impl Into<String>, currency: impl Into<String>, balance: f64) -> Self {
        Self {
            id: id.into(),
            currency: currency.into().to_uppercase(),
            balance,
            locked_balance: 0.0,
        }
    }
}
