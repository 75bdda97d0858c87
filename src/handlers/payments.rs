use crate::{
    error::RelayError,
    middleware::AdmissionController,
    models::{ApiResponse, PaymentRequest, TransactionView},
};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

pub async fn handle_payment(
    State(admission): State<Arc<AdmissionController>>,
    payload: Result<Json<PaymentRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<TransactionView>>, RelayError> {
    let Json(request) = payload.map_err(|e| {
        RelayError::InvalidRequest(format!("failed to decode request body: {}", e.body_text()))
    })?;

    let tx = admission
        .verify_payment(&request.tx_hash, &request.claim)
        .await?;

    Ok(Json(ApiResponse {
        success: true,
        data: tx,
        timestamp: Utc::now(),
        request_id: Uuid::new_v4().to_string(),
    }))
}
