use ethers::types::{Address, Transaction, H256, U256};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionView {
    pub hash: H256,
    pub value: U256,
    #[serde(rename = "from")]
    pub sender: Address,
    #[serde(rename = "to")]
    pub recipient: Option<Address>,
    pub pending: bool,
}

impl From<Transaction> for TransactionView {
    fn from(tx: Transaction) -> Self {
        Self {
            hash: tx.hash,
            value: tx.value,
            sender: tx.from,
            recipient: tx.to,
            // Mined transactions always carry the block they landed in.
            pending: tx.block_number.is_none(),
        }
    }
}

// Normalized form of a transaction hash used as the idempotency key.
pub fn tx_reference(hash: &H256) -> String {
    format!("{hash:#x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmined_transaction_is_pending() {
        let tx = Transaction {
            hash: H256::repeat_byte(0xab),
            from: Address::repeat_byte(1),
            to: Some(Address::repeat_byte(2)),
            value: U256::from(5u64),
            ..Default::default()
        };
        let view = TransactionView::from(tx.clone());
        assert!(view.pending);

        let mined = Transaction {
            block_number: Some(17u64.into()),
            ..tx
        };
        let view = TransactionView::from(mined);
        assert!(!view.pending);
        assert_eq!(view.sender, Address::repeat_byte(1));
        assert_eq!(view.recipient, Some(Address::repeat_byte(2)));
    }

    #[test]
    fn reference_is_lowercase_and_prefixed() {
        let hash = H256::repeat_byte(0xAB);
        let reference = tx_reference(&hash);
        assert_eq!(reference.len(), 66);
        assert!(reference.starts_with("0xabab"));
    }
}
