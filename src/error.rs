use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("RPC URL is not found for {0}")]
    EndpointNotFound(String),

    #[error("chain unavailable: {0}")]
    ChainUnavailable(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("transaction not found: {0:#x}")]
    TransactionNotFound(H256),

    #[error("tx is still pending")]
    TransactionPending,

    #[error("insufficient amount: {actual} < {required}")]
    InsufficientAmount { required: U256, actual: U256 },

    #[error("tx send to wrong address: expected {expected:#x}, got {actual}")]
    WrongRecipient { expected: Address, actual: String },

    #[error("pubkey's address {derived:#x} does not match tx sender {sender:#x}")]
    IdentityMismatch { derived: Address, sender: Address },

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("unsupported identity claim: {0}")]
    UnsupportedClaim(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("transaction {0} has already been credited")]
    DuplicateTransaction(String),

    #[error("unable to save payment: {0}")]
    Store(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal server error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::EndpointNotFound(_)
            | RelayError::ChainUnavailable(_)
            | RelayError::Timeout(_)
            | RelayError::Store(_)
            | RelayError::Config(_)
            | RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RelayError::EndpointNotFound(_) => "ENDPOINT_NOT_FOUND",
            RelayError::ChainUnavailable(_) => "CHAIN_UNAVAILABLE",
            RelayError::Timeout(_) => "TIMEOUT",
            RelayError::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            RelayError::TransactionPending => "TRANSACTION_PENDING",
            RelayError::InsufficientAmount { .. } => "INSUFFICIENT_AMOUNT",
            RelayError::WrongRecipient { .. } => "WRONG_RECIPIENT",
            RelayError::IdentityMismatch { .. } => "IDENTITY_MISMATCH",
            RelayError::InvalidCredential(_) => "INVALID_CREDENTIAL",
            RelayError::UnsupportedClaim(_) => "UNSUPPORTED_CLAIM",
            RelayError::InvalidRequest(_) => "INVALID_REQUEST",
            RelayError::DuplicateTransaction(_) => "DUPLICATE_TRANSACTION",
            RelayError::Store(_) => "STORE_ERROR",
            RelayError::Config(_) => "CONFIG_ERROR",
            RelayError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
    pub timestamp: chrono::DateTime<Utc>,
    pub request_id: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();
        let status = self.status_code();
        let error_code = self.error_code();

        if status.is_server_error() {
            tracing::error!(error = ?self, error_code, %request_id, "Request failed");
        } else {
            tracing::warn!(error = %self, error_code, %request_id, "Request rejected");
        }

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            error_code: error_code.to_string(),
            timestamp: Utc::now(),
            request_id,
        };

        (status, Json(body)).into_response()
    }
}
