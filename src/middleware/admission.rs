use crate::{
    error::RelayError,
    models::{tx_reference, Event, TransactionView},
    services::{IdentityClaim, IdentityVerifier, PaymentStore, TransactionSource},
};
use chrono::Utc;
use ethers::types::H256;
use std::str::FromStr;
use std::sync::Arc;

// Serialized events above this size are refused outright.
pub const MAX_EVENT_BYTES: usize = 10_000;

#[derive(Clone)]
pub struct AdmissionController {
    chain: Arc<dyn TransactionSource>,
    verifier: IdentityVerifier,
    payments: PaymentStore,
    max_event_bytes: usize,
}

impl AdmissionController {
    pub fn new(
        chain: Arc<dyn TransactionSource>,
        verifier: IdentityVerifier,
        payments: PaymentStore,
    ) -> Self {
        Self {
            chain,
            verifier,
            payments,
            max_event_bytes: MAX_EVENT_BYTES,
        }
    }

    pub fn with_max_event_bytes(mut self, max_event_bytes: usize) -> Self {
        self.max_event_bytes = max_event_bytes;
        self
    }

    pub fn chain(&self) -> &Arc<dyn TransactionSource> {
        &self.chain
    }

    pub fn payments(&self) -> &PaymentStore {
        &self.payments
    }

    pub async fn verify_payment(
        &self,
        tx_hash: &str,
        claim: &IdentityClaim,
    ) -> Result<TransactionView, RelayError> {
        let hash = H256::from_str(tx_hash.trim())
            .map_err(|e| RelayError::InvalidRequest(format!("invalid tx hash: {e}")))?;

        self.verifier.check_claim_form(claim)?;

        let tx = self.chain.fetch_transaction(hash).await?;
        let verified = self.verifier.verify(&tx, claim)?;

        let record = self
            .payments
            .save(&verified.identity, &tx_reference(&verified.tx_hash), Utc::now().timestamp())
            .await?;

        tracing::info!(
            identity = %record.identity,
            tx = %record.tx_reference,
            value = %tx.value,
            "Payment verified"
        );

        Ok(tx)
    }

    pub async fn should_accept(&self, event: &Event) -> bool {
        self.should_accept_at(event, Utc::now().timestamp()).await
    }

    pub async fn should_accept_at(&self, event: &Event, now: i64) -> bool {
        match event.serialized_len() {
            Ok(len) if len <= self.max_event_bytes => {}
            Ok(len) => {
                tracing::debug!(id = %event.id, len, "Event too large");
                return false;
            }
            Err(e) => {
                tracing::warn!(id = %event.id, "Unable to serialize event: {}", e);
                return false;
            }
        }

        match self.payments.is_entitled(&event.pubkey, now).await {
            Ok(entitled) => {
                if !entitled {
                    tracing::debug!(pubkey = %event.pubkey, "Event from unpaid pubkey");
                }
                entitled
            }
            Err(e) => {
                tracing::error!("unable to fetch payment for accept event: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{payment_store::tests::temp_store, IdentityBindingStrategy};
    use async_trait::async_trait;
    use ethers::types::{Address, U256};

    struct FixedSource(Result<TransactionView, fn() -> RelayError>);

    #[async_trait]
    impl TransactionSource for FixedSource {
        async fn fetch_transaction(&self, _hash: H256) -> Result<TransactionView, RelayError> {
            self.0.clone().map_err(|make| make())
        }

        async fn is_reachable(&self) -> bool {
            true
        }
    }

    fn event_of(pubkey: &str, content_len: usize) -> Event {
        let mut event = Event {
            id: "e1".to_string(),
            pubkey: pubkey.to_string(),
            created_at: 1_700_000_000,
            kind: 1,
            tags: vec![],
            content: String::new(),
            sig: String::new(),
        };
        let base = event.serialized_len().unwrap();
        event.content = "x".repeat(content_len.saturating_sub(base));
        event
    }

    fn controller(store: PaymentStore, source: FixedSource) -> AdmissionController {
        AdmissionController::new(
            Arc::new(source),
            IdentityVerifier::new(
                U256::from(10u64),
                Address::repeat_byte(0x42),
                IdentityBindingStrategy::PublicKey,
            ),
            store,
        )
    }

    #[tokio::test]
    async fn oversized_event_rejected_even_when_paid() {
        let (store, _dir) = temp_store().await;
        let now = 1_700_000_000;
        store.save("paid", "0x01", now).await.unwrap();
        let ctrl = controller(store, FixedSource(Err(|| RelayError::TransactionPending)));

        let at_limit = event_of("paid", MAX_EVENT_BYTES);
        assert_eq!(at_limit.serialized_len().unwrap(), MAX_EVENT_BYTES);
        assert!(ctrl.should_accept_at(&at_limit, now).await);

        let over = event_of("paid", MAX_EVENT_BYTES + 1);
        assert_eq!(over.serialized_len().unwrap(), MAX_EVENT_BYTES + 1);
        assert!(!ctrl.should_accept_at(&over, now).await);
    }

    #[tokio::test]
    async fn unpaid_or_lapsed_pubkey_rejected() {
        let (store, _dir) = temp_store().await;
        let now = 1_700_000_000;
        store.save("paid", "0x01", now).await.unwrap();
        let ctrl = controller(store, FixedSource(Err(|| RelayError::TransactionPending)));

        let tiny = event_of("unpaid", 1);
        assert!(!ctrl.should_accept_at(&tiny, now).await);

        let later = now + 31 * 24 * 3600;
        assert!(!ctrl.should_accept_at(&event_of("paid", 1), later).await);
    }

    #[tokio::test]
    async fn malformed_hash_fails_before_chain_lookup() {
        let (store, _dir) = temp_store().await;
        let ctrl = controller(
            store,
            FixedSource(Err(|| RelayError::ChainUnavailable("unreachable".to_string()))),
        );
        let claim = IdentityClaim::PublicKeyProof {
            pubkey: "02".to_string(),
        };
        let err = ctrl.verify_payment("0x1234", &claim).await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn doubled_hex_prefix_is_malformed() {
        let (store, _dir) = temp_store().await;
        let ctrl = controller(
            store,
            FixedSource(Err(|| RelayError::ChainUnavailable("unreachable".to_string()))),
        );
        let claim = IdentityClaim::PublicKeyProof {
            pubkey: "02".to_string(),
        };
        let hash = format!("0x0x{}", "ab".repeat(32));
        let err = ctrl.verify_payment(&hash, &claim).await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn chain_errors_propagate_unchanged() {
        let (store, _dir) = temp_store().await;
        let ctrl = controller(
            store,
            FixedSource(Err(|| RelayError::Timeout("eth_getTransactionByHash".to_string()))),
        );
        let claim = IdentityClaim::PublicKeyProof {
            pubkey: "02".to_string(),
        };
        let hash = format!("0x{}", "ab".repeat(32));
        let err = ctrl.verify_payment(&hash, &claim).await.unwrap_err();
        assert!(matches!(err, RelayError::Timeout(_)));
    }
}
