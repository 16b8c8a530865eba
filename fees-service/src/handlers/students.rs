//! Student ledger handlers.
//!
//! Enrollment proper lives in the wider admin backend; this surface only
//! registers a ledger row and reads back balances and payment history.

use admin_core::error::AppError;
use admin_core::response::ApiResponse;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::CreateStudentRequest,
    models::{Payment, StudentLedger},
    AppState,
};

/// Register a student ledger with an opening pending-fees balance.
pub async fn create_student(
    State(state): State<AppState>,
    Json(payload): Json<CreateStudentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<StudentLedger>>), AppError> {
    payload.validate()?;

    if payload.pending_fees < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Opening pending fees cannot be negative"
        )));
    }

    let student = StudentLedger {
        id: Uuid::new_v4(),
        user_id: payload.user_id,
        pending_fees: payload.pending_fees,
        enrolled: false,
        created_utc: Utc::now(),
    };

    state.engine.store().create_student(&student).await?;

    tracing::info!(student_id = %student.id, user_id = %student.user_id, "Student ledger registered");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Student ledger created", student)),
    ))
}

/// Fetch a student ledger by owning user.
pub async fn get_student(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<StudentLedger>>, AppError> {
    let student = state
        .engine
        .store()
        .student_by_user(user_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Student not found for user {}", user_id))
        })?;

    Ok(Json(ApiResponse::ok("Student found", student)))
}

/// Payment history for a student, ordered by creation time.
pub async fn list_payments(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Payment>>>, AppError> {
    let store = state.engine.store();

    store.student_by_user(user_id).await?.ok_or_else(|| {
        AppError::NotFound(anyhow::anyhow!("Student not found for user {}", user_id))
    })?;

    let payments = store.payments_for_user(user_id).await?;

    Ok(Json(ApiResponse::ok("Payments found", payments)))
}
