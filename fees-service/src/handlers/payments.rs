//! Payment operation handlers.
//!
//! Thin adapters: decode the typed body, validate, invoke the fee ledger
//! engine, and wrap the outcome in the uniform envelope.

use admin_core::error::AppError;
use admin_core::response::ApiResponse;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{CreatePaymentRequest, EditPaymentRequest, PaymentCreatedResponse, PendingFeesResponse},
    ledger::{CreatePayment, EditPayment},
    models::Payment,
    AppState,
};

/// Record a payment against a student's pending fees.
pub async fn create_payment(
    State(state): State<AppState>,
    Json(payload): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentCreatedResponse>>), AppError> {
    payload.validate()?;

    tracing::info!(
        user_id = %payload.user_id,
        amount = %payload.amount,
        is_gst = payload.is_gst,
        "Creating payment"
    );

    let created = state
        .engine
        .create_payment(
            CreatePayment {
                user_id: payload.user_id,
                amount: payload.amount,
                is_gst: payload.is_gst,
                mode: payload.mode,
                status: payload.status,
                remark: payload.remark,
                created_by: payload.created_by,
                subject_ids: payload.subject_ids,
                package_ids: payload.package_ids,
            },
            Utc::now(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Payment recorded", created.into())),
    ))
}

/// Fetch a single payment.
pub async fn get_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Payment>>, AppError> {
    let payment = state
        .engine
        .store()
        .payment_by_id(payment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment {} not found", payment_id)))?;

    Ok(Json(ApiResponse::ok("Payment found", payment)))
}

/// Revise a payment's amount and metadata.
pub async fn edit_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Json(payload): Json<EditPaymentRequest>,
) -> Result<Json<ApiResponse<PendingFeesResponse>>, AppError> {
    payload.validate()?;

    tracing::info!(
        payment_id = %payment_id,
        amount = %payload.amount,
        "Editing payment"
    );

    let pending_fees = state
        .engine
        .edit_payment(
            EditPayment {
                payment_id,
                amount: payload.amount,
                mode: payload.mode,
                status: payload.status,
                remark: payload.remark,
                updated_by: payload.updated_by,
            },
            Utc::now(),
        )
        .await?;

    Ok(Json(ApiResponse::ok(
        "Payment updated",
        PendingFeesResponse { pending_fees },
    )))
}

/// Reverse a payment. Mounted only when the deployment explicitly enables
/// payment deletion.
pub async fn delete_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<ApiResponse<PendingFeesResponse>>, AppError> {
    tracing::warn!(payment_id = %payment_id, "Reversing payment");

    let pending_fees = state.engine.delete_payment(payment_id).await?;

    Ok(Json(ApiResponse::ok(
        "Payment reversed",
        PendingFeesResponse { pending_fees },
    )))
}
