//! In-memory implementation of the persistence gateway.
//!
//! Used by the engine integration tests and local demos. A transaction
//! takes the single state mutex for its whole lifetime, which gives the
//! same serialization the PostgreSQL implementation gets from row and
//! advisory locks, and stages its writes on a copy so an uncommitted
//! transaction observably rolls back when dropped.

use admin_core::error::AppError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::ledger::fiscal::FyWindow;
use crate::ledger::receipt;
use crate::models::{NewPayment, Payment, PaymentUpdate, StudentLedger};
use crate::services::store::{LedgerStore, LedgerTx};

/// Step at which an injected failure fires, for rollback tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    InsertPayment,
    UpdateStudentLedger,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    /// Keyed by owning user id (unique per student).
    students: HashMap<Uuid, StudentLedger>,
    /// Insertion order doubles as commit order for receipt sequencing.
    payments: Vec<Payment>,
    subject_tags: HashMap<Uuid, Vec<Uuid>>,
    package_tags: HashMap<Uuid, Vec<Uuid>>,
}

#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<AsyncMutex<MemoryState>>,
    fail_on: Arc<Mutex<Option<FailPoint>>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the named step of the next transaction fail once.
    pub fn fail_next(&self, point: FailPoint) {
        *self.fail_on.lock().unwrap() = Some(point);
    }

    async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, AppError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            staged,
            fail_on: self.fail_on.clone(),
        }))
    }

    async fn create_student(&self, student: &StudentLedger) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        if state.students.contains_key(&student.user_id) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "A ledger already exists for user {}",
                student.user_id
            )));
        }
        state.students.insert(student.user_id, student.clone());
        Ok(())
    }

    async fn student_by_user(&self, user_id: Uuid) -> Result<Option<StudentLedger>, AppError> {
        Ok(self.snapshot().await.students.get(&user_id).cloned())
    }

    async fn payment_by_id(&self, payment_id: Uuid) -> Result<Option<Payment>, AppError> {
        Ok(self
            .snapshot()
            .await
            .payments
            .iter()
            .find(|p| p.id == payment_id)
            .cloned())
    }

    async fn payments_for_user(&self, user_id: Uuid) -> Result<Vec<Payment>, AppError> {
        let mut payments: Vec<Payment> = self
            .snapshot()
            .await
            .payments
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
    fail_on: Arc<Mutex<Option<FailPoint>>>,
}

impl MemoryTx {
    fn trip(&mut self, point: FailPoint) -> Result<(), AppError> {
        let mut fail_on = self.fail_on.lock().unwrap();
        if *fail_on == Some(point) {
            fail_on.take();
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "Injected failure at {:?}",
                point
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn student_for_update(
        &mut self,
        user_id: Uuid,
    ) -> Result<Option<StudentLedger>, AppError> {
        Ok(self.staged.students.get(&user_id).cloned())
    }

    async fn payment_for_update(&mut self, payment_id: Uuid) -> Result<Option<Payment>, AppError> {
        Ok(self
            .staged
            .payments
            .iter()
            .find(|p| p.id == payment_id)
            .cloned())
    }

    async fn latest_receipt_number(
        &mut self,
        is_gst: bool,
        window: &FyWindow,
    ) -> Result<Option<String>, AppError> {
        // Highest issued sequence wins, matching the PostgreSQL gateway;
        // rows carry caller timestamps, so neither created_at nor commit
        // order is authoritative.
        Ok(self
            .staged
            .payments
            .iter()
            .filter(|p| p.is_gst == is_gst && window.contains(p.created_at))
            .max_by_key(|p| receipt::sequence_of(&p.receipt_number).unwrap_or(0))
            .map(|p| p.receipt_number.clone()))
    }

    async fn insert_payment(&mut self, payment: &NewPayment) -> Result<(), AppError> {
        self.trip(FailPoint::InsertPayment)?;
        if self
            .staged
            .payments
            .iter()
            .any(|p| p.receipt_number == payment.receipt_number)
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Receipt number '{}' was already allocated",
                payment.receipt_number
            )));
        }
        self.staged.payments.push(Payment {
            id: payment.id,
            receipt_number: payment.receipt_number.clone(),
            amount: payment.amount,
            pending: payment.pending,
            is_gst: payment.is_gst,
            mode: payment.mode.clone(),
            status: payment.status.clone(),
            remark: payment.remark.clone(),
            user_id: payment.user_id,
            created_by: payment.created_by,
            created_at: payment.created_at,
            updated_at: payment.created_at,
        });
        Ok(())
    }

    async fn link_subjects(
        &mut self,
        payment_id: Uuid,
        subject_ids: &[Uuid],
    ) -> Result<(), AppError> {
        self.staged
            .subject_tags
            .entry(payment_id)
            .or_default()
            .extend_from_slice(subject_ids);
        Ok(())
    }

    async fn link_packages(
        &mut self,
        payment_id: Uuid,
        package_ids: &[Uuid],
    ) -> Result<(), AppError> {
        self.staged
            .package_tags
            .entry(payment_id)
            .or_default()
            .extend_from_slice(package_ids);
        Ok(())
    }

    async fn update_payment(&mut self, update: &PaymentUpdate) -> Result<(), AppError> {
        let payment = self
            .staged
            .payments
            .iter_mut()
            .find(|p| p.id == update.payment_id)
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Payment {} not found", update.payment_id))
            })?;
        payment.amount = update.amount;
        payment.pending = update.pending;
        payment.mode = update.mode.clone();
        payment.status = update.status.clone();
        payment.remark = update.remark.clone();
        if update.updated_by.is_some() {
            payment.created_by = update.updated_by;
        }
        payment.updated_at = update.updated_at;
        Ok(())
    }

    async fn delete_payment(&mut self, payment_id: Uuid) -> Result<(), AppError> {
        let before = self.staged.payments.len();
        self.staged.payments.retain(|p| p.id != payment_id);
        if self.staged.payments.len() == before {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Payment {} not found",
                payment_id
            )));
        }
        self.staged.subject_tags.remove(&payment_id);
        self.staged.package_tags.remove(&payment_id);
        Ok(())
    }

    async fn payments_remaining(&mut self, user_id: Uuid) -> Result<i64, AppError> {
        Ok(self
            .staged
            .payments
            .iter()
            .filter(|p| p.user_id == user_id)
            .count() as i64)
    }

    async fn update_student_ledger(
        &mut self,
        student_id: Uuid,
        pending_fees: Decimal,
        enrolled: Option<bool>,
    ) -> Result<(), AppError> {
        self.trip(FailPoint::UpdateStudentLedger)?;
        let student = self
            .staged
            .students
            .values_mut()
            .find(|s| s.id == student_id)
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Student {} not found", student_id))
            })?;
        student.pending_fees = pending_fees;
        if let Some(enrolled) = enrolled {
            student.enrolled = enrolled;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryTx {
            mut guard, staged, ..
        } = *self;
        *guard = staged;
        Ok(())
    }
}
