//! Payment record model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A recorded fee payment.
///
/// `pending` is a denormalized snapshot of the student's balance after this
/// payment was applied. It is authoritative only at the moment it was
/// written; editing a later payment does not rewrite earlier snapshots.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub receipt_number: String,
    pub amount: Decimal,
    pub pending: Decimal,
    pub is_gst: bool,
    pub mode: String,
    pub status: String,
    pub remark: Option<String>,
    pub user_id: Uuid,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fully computed payment row ready for insertion.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub id: Uuid,
    pub receipt_number: String,
    pub amount: Decimal,
    pub pending: Decimal,
    pub is_gst: bool,
    pub mode: String,
    pub status: String,
    pub remark: Option<String>,
    pub user_id: Uuid,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// In-place revision of an existing payment. The receipt number is
/// immutable once assigned and is deliberately absent here.
#[derive(Debug, Clone)]
pub struct PaymentUpdate {
    pub payment_id: Uuid,
    pub amount: Decimal,
    pub pending: Decimal,
    pub mode: String,
    pub status: String,
    pub remark: Option<String>,
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}
