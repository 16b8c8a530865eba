//! Persistence gateway consumed by the fee ledger engine.
//!
//! The engine never talks to storage directly. It opens a [`LedgerTx`],
//! performs its ordered read/decide/write steps against it, and commits;
//! dropping an uncommitted transaction rolls every step back. Row-level
//! reads inside the transaction (`*_for_update`) must block concurrent
//! writers of the same row until commit.

use admin_core::error::AppError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::ledger::fiscal::FyWindow;
use crate::models::{NewPayment, Payment, PaymentUpdate, StudentLedger};

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open an atomic unit of work.
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, AppError>;

    // Non-transactional reads used by query endpoints.
    async fn create_student(&self, student: &StudentLedger) -> Result<(), AppError>;
    async fn student_by_user(&self, user_id: Uuid) -> Result<Option<StudentLedger>, AppError>;
    async fn payment_by_id(&self, payment_id: Uuid) -> Result<Option<Payment>, AppError>;
    async fn payments_for_user(&self, user_id: Uuid) -> Result<Vec<Payment>, AppError>;
}

#[async_trait]
pub trait LedgerTx: Send {
    /// Fetch and lock a student ledger row by its owning user.
    async fn student_for_update(&mut self, user_id: Uuid)
        -> Result<Option<StudentLedger>, AppError>;

    /// Fetch and lock a payment row.
    async fn payment_for_update(&mut self, payment_id: Uuid) -> Result<Option<Payment>, AppError>;

    /// Receipt carrying the highest issued sequence in the
    /// (GST flag, financial year) partition. Serializes against concurrent
    /// allocators of the same partition until this transaction ends.
    async fn latest_receipt_number(
        &mut self,
        is_gst: bool,
        window: &FyWindow,
    ) -> Result<Option<String>, AppError>;

    async fn insert_payment(&mut self, payment: &NewPayment) -> Result<(), AppError>;

    async fn link_subjects(
        &mut self,
        payment_id: Uuid,
        subject_ids: &[Uuid],
    ) -> Result<(), AppError>;

    async fn link_packages(
        &mut self,
        payment_id: Uuid,
        package_ids: &[Uuid],
    ) -> Result<(), AppError>;

    async fn update_payment(&mut self, update: &PaymentUpdate) -> Result<(), AppError>;

    async fn delete_payment(&mut self, payment_id: Uuid) -> Result<(), AppError>;

    /// Payments still recorded against a user, as visible to this
    /// transaction.
    async fn payments_remaining(&mut self, user_id: Uuid) -> Result<i64, AppError>;

    /// Set the student's pending balance; `enrolled` is updated only when
    /// `Some`.
    async fn update_student_ledger(
        &mut self,
        student_id: Uuid,
        pending_fees: Decimal,
        enrolled: Option<bool>,
    ) -> Result<(), AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
