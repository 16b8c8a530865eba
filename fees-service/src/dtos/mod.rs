use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::ledger::CreatedPayment;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStudentRequest {
    pub user_id: Uuid,
    pub pending_fees: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    pub user_id: Uuid,
    pub amount: Decimal,
    pub is_gst: bool,
    #[validate(length(min = 1, max = 32))]
    pub mode: String,
    #[validate(length(min = 1, max = 32))]
    pub status: String,
    pub remark: Option<String>,
    pub created_by: Option<Uuid>,
    #[serde(default)]
    pub subject_ids: Vec<Uuid>,
    #[serde(default)]
    pub package_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EditPaymentRequest {
    pub amount: Decimal,
    #[validate(length(min = 1, max = 32))]
    pub mode: String,
    #[validate(length(min = 1, max = 32))]
    pub status: String,
    pub remark: Option<String>,
    pub updated_by: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct PaymentCreatedResponse {
    pub payment_id: Uuid,
    pub receipt_number: String,
    pub pending_fees: Decimal,
}

impl From<CreatedPayment> for PaymentCreatedResponse {
    fn from(created: CreatedPayment) -> Self {
        Self {
            payment_id: created.payment_id,
            receipt_number: created.receipt_number,
            pending_fees: created.pending_fees,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PendingFeesResponse {
    pub pending_fees: Decimal,
}
