//! Common test utilities for fees-service integration tests.

use chrono::{DateTime, TimeZone, Utc};
use fees_service::ledger::{CreatePayment, FeeLedger};
use fees_service::models::StudentLedger;
use fees_service::services::{LedgerStore, MemoryLedgerStore};
use rust_decimal::Decimal;
use std::sync::{Arc, Once};
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,fees_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Engine wired to an in-memory gateway.
pub fn spawn_engine() -> (FeeLedger, MemoryLedgerStore) {
    init_tracing();
    let store = MemoryLedgerStore::new();
    let engine = FeeLedger::new(Arc::new(store.clone()));
    (engine, store)
}

/// Seed a student ledger and return the owning user id.
pub async fn seed_student(store: &MemoryLedgerStore, pending_fees: Decimal) -> Uuid {
    let user_id = Uuid::new_v4();
    store
        .create_student(&StudentLedger {
            id: Uuid::new_v4(),
            user_id,
            pending_fees,
            enrolled: false,
            created_utc: Utc::now(),
        })
        .await
        .expect("Failed to seed student");
    user_id
}

/// A create-payment input with test defaults.
pub fn payment(user_id: Uuid, amount: Decimal, is_gst: bool) -> CreatePayment {
    CreatePayment {
        user_id,
        amount,
        is_gst,
        mode: "cash".to_string(),
        status: "completed".to_string(),
        remark: None,
        created_by: None,
        subject_ids: vec![],
        package_ids: vec![],
    }
}

pub fn at(y: i32, mo: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, 10, 0, 0).unwrap()
}
