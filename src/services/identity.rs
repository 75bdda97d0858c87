use std::str::FromStr;

use ethers::{
    core::k256::{ecdsa::VerifyingKey, elliptic_curve::sec1::ToEncodedPoint},
    signers::{LocalWallet, Signer},
    types::{Address, H256, U256},
    utils::keccak256,
};
use serde::{Deserialize, Serialize};

use crate::{error::RelayError, models::TransactionView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityBindingStrategy {
    #[default]
    PublicKey,
    Credential,
}

impl FromStr for IdentityBindingStrategy {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pubkey" | "public-key" | "public_key" => Ok(Self::PublicKey),
            "credential" | "pvtkey" | "private-key" => Ok(Self::Credential),
            _ => Err(RelayError::Config(format!("unknown identity binding: {s}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdentityClaim {
    PublicKeyProof { pubkey: String },
    CredentialProof { pvtkey: String },
}

impl IdentityClaim {
    pub fn strategy(&self) -> IdentityBindingStrategy {
        match self {
            IdentityClaim::PublicKeyProof { .. } => IdentityBindingStrategy::PublicKey,
            IdentityClaim::CredentialProof { .. } => IdentityBindingStrategy::Credential,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub identity: String,
    pub tx_hash: H256,
}

#[derive(Debug, Clone)]
pub struct IdentityVerifier {
    required_amount: U256,
    payment_address: Address,
    strategy: IdentityBindingStrategy,
}

impl IdentityVerifier {
    pub fn new(
        required_amount: U256,
        payment_address: Address,
        strategy: IdentityBindingStrategy,
    ) -> Self {
        Self {
            required_amount,
            payment_address,
            strategy,
        }
    }

    // Rejects claims of the form this relay is not configured to take.
    pub fn check_claim_form(&self, claim: &IdentityClaim) -> Result<(), RelayError> {
        if claim.strategy() == self.strategy {
            return Ok(());
        }
        let expected = match self.strategy {
            IdentityBindingStrategy::PublicKey => "pubkey",
            IdentityBindingStrategy::Credential => "pvtkey",
        };
        Err(RelayError::UnsupportedClaim(format!(
            "this relay expects a `{expected}` field"
        )))
    }

    pub fn verify(
        &self,
        tx: &TransactionView,
        claim: &IdentityClaim,
    ) -> Result<VerifiedIdentity, RelayError> {
        if tx.pending {
            return Err(RelayError::TransactionPending);
        }

        if tx.value < self.required_amount {
            return Err(RelayError::InsufficientAmount {
                required: self.required_amount,
                actual: tx.value,
            });
        }

        if tx.recipient != Some(self.payment_address) {
            return Err(RelayError::WrongRecipient {
                expected: self.payment_address,
                actual: tx
                    .recipient
                    .map(|addr| format!("{addr:#x}"))
                    .unwrap_or_else(|| "contract creation".to_string()),
            });
        }

        let identity = match claim {
            IdentityClaim::PublicKeyProof { pubkey } => bind_public_key(pubkey, tx.sender)?,
            IdentityClaim::CredentialProof { pvtkey } => bind_credential(pvtkey, tx.sender)?,
        };

        Ok(VerifiedIdentity {
            identity,
            tx_hash: tx.hash,
        })
    }
}

// Ethereum address of a public key: last 20 bytes of keccak256 over the
// uncompressed point without its 0x04 prefix.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

// x-only encoding of a public key, the form relay messages carry as author.
pub fn x_only_identity(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(true);
    hex::encode(&point.as_bytes()[1..])
}

fn decode_hex(input: &str) -> Result<Vec<u8>, RelayError> {
    let trimmed = input.trim();
    let stripped = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(stripped).map_err(|e| RelayError::InvalidCredential(format!("not hex: {e}")))
}

fn sec1_key(bytes: &[u8]) -> Result<VerifyingKey, RelayError> {
    VerifyingKey::from_sec1_bytes(bytes)
        .map_err(|_| RelayError::InvalidCredential("not a secp256k1 public key".to_string()))
}

// Candidate keys for a submitted public key. x-only keys lose the parity of
// y, so both points are candidates.
fn candidate_keys(pubkey: &str) -> Result<Vec<VerifyingKey>, RelayError> {
    let bytes = decode_hex(pubkey)?;
    match bytes.len() {
        33 | 65 => Ok(vec![sec1_key(&bytes)?]),
        64 => {
            let mut uncompressed = Vec::with_capacity(65);
            uncompressed.push(0x04);
            uncompressed.extend_from_slice(&bytes);
            Ok(vec![sec1_key(&uncompressed)?])
        }
        32 => {
            let keys: Vec<VerifyingKey> = [0x02u8, 0x03]
                .iter()
                .filter_map(|prefix| {
                    let mut compressed = Vec::with_capacity(33);
                    compressed.push(*prefix);
                    compressed.extend_from_slice(&bytes);
                    VerifyingKey::from_sec1_bytes(&compressed).ok()
                })
                .collect();
            if keys.is_empty() {
                return Err(RelayError::InvalidCredential(
                    "x-only key is not on the curve".to_string(),
                ));
            }
            Ok(keys)
        }
        n => Err(RelayError::InvalidCredential(format!(
            "public key has {n} bytes, expected 32, 33, 64 or 65"
        ))),
    }
}

fn bind_public_key(pubkey: &str, sender: Address) -> Result<String, RelayError> {
    let candidates = candidate_keys(pubkey)?;
    if let Some(key) = candidates.iter().find(|key| address_of(key) == sender) {
        return Ok(x_only_identity(key));
    }
    Err(RelayError::IdentityMismatch {
        derived: address_of(&candidates[0]),
        sender,
    })
}

fn bind_credential(pvtkey: &str, sender: Address) -> Result<String, RelayError> {
    let trimmed = pvtkey.trim();
    let wallet = trimmed
        .strip_prefix("0x")
        .unwrap_or(trimmed)
        .parse::<LocalWallet>()
        .map_err(|_| RelayError::InvalidCredential("not a secp256k1 secret key".to_string()))?;

    if wallet.address() != sender {
        return Err(RelayError::IdentityMismatch {
            derived: wallet.address(),
            sender,
        });
    }
    Ok(x_only_identity(wallet.signer().verifying_key()))
}
