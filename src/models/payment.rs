use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::services::identity::IdentityClaim;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub identity: String,
    pub created_at: i64,
    pub expiration_at: i64,
    pub tx_reference: String,
}

impl PaymentRecord {
    pub fn new(identity: &str, tx_reference: &str, created_at: i64, window: Duration) -> Self {
        Self {
            identity: identity.to_string(),
            created_at,
            expiration_at: created_at + window.num_seconds(),
            tx_reference: tx_reference.to_string(),
        }
    }
}

// Body of `POST /payments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub tx_hash: String,
    #[serde(flatten)]
    pub claim: IdentityClaim,
}
