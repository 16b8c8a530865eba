//! Student ledger model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-student fee ledger. `pending_fees` is the outstanding balance and
/// must never go negative after a committed payment operation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StudentLedger {
    pub id: Uuid,
    pub user_id: Uuid,
    pub pending_fees: Decimal,
    pub enrolled: bool,
    pub created_utc: DateTime<Utc>,
}
