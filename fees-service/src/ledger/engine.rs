//! Balance reconciliation engine.
//!
//! Each operation is one atomic unit of work: the student row (and, for
//! edit/delete, the payment row) is locked first, validation reads the
//! locked state, and the payment and ledger writes commit or roll back
//! together. Receipt allocation happens inside the same transaction, so a
//! concurrent creator in the same (GST, financial year) partition blocks
//! until this one commits.

use admin_core::error::AppError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::ledger::fiscal::FyWindow;
use crate::ledger::receipt;
use crate::models::{NewPayment, PaymentUpdate};
use crate::services::metrics::PAYMENTS_TOTAL;
use crate::services::store::LedgerStore;

/// Inputs for recording a new payment.
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub user_id: Uuid,
    pub amount: Decimal,
    pub is_gst: bool,
    pub mode: String,
    pub status: String,
    pub remark: Option<String>,
    pub created_by: Option<Uuid>,
    pub subject_ids: Vec<Uuid>,
    pub package_ids: Vec<Uuid>,
}

/// Outcome of a successful create.
#[derive(Debug, Clone)]
pub struct CreatedPayment {
    pub payment_id: Uuid,
    pub receipt_number: String,
    pub pending_fees: Decimal,
}

/// Inputs for revising an existing payment. The receipt number never
/// changes.
#[derive(Debug, Clone)]
pub struct EditPayment {
    pub payment_id: Uuid,
    pub amount: Decimal,
    pub mode: String,
    pub status: String,
    pub remark: Option<String>,
    pub updated_by: Option<Uuid>,
}

#[derive(Clone)]
pub struct FeeLedger {
    store: Arc<dyn LedgerStore>,
}

impl FeeLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Record a payment: allocate the next receipt number in the
    /// (GST, financial year) partition, decrement the student's pending
    /// fees, and mark the student enrolled.
    #[instrument(skip(self, input), fields(user_id = %input.user_id, amount = %input.amount, is_gst = input.is_gst))]
    pub async fn create_payment(
        &self,
        input: CreatePayment,
        now: DateTime<Utc>,
    ) -> Result<CreatedPayment, AppError> {
        if input.amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount must be positive"
            )));
        }

        let mut tx = self.store.begin().await?;

        let student = tx.student_for_update(input.user_id).await?.ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!(
                "Student not found for user {}",
                input.user_id
            ))
        })?;

        if input.amount > student.pending_fees {
            PAYMENTS_TOTAL.with_label_values(&["create", "rejected"]).inc();
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Amount {} exceeds pending fees {}",
                input.amount,
                student.pending_fees
            )));
        }

        let window = FyWindow::containing(now);
        let latest = tx.latest_receipt_number(input.is_gst, &window).await?;
        let sequence = receipt::next_sequence(latest.as_deref())?;
        let receipt_number = receipt::compose(input.is_gst, now, &window, sequence);

        let new_pending = student.pending_fees - input.amount;
        let payment = NewPayment {
            id: Uuid::new_v4(),
            receipt_number: receipt_number.clone(),
            amount: input.amount,
            pending: new_pending,
            is_gst: input.is_gst,
            mode: input.mode,
            status: input.status,
            remark: input.remark,
            user_id: input.user_id,
            created_by: input.created_by,
            created_at: now,
        };

        tx.insert_payment(&payment).await?;
        tx.link_subjects(payment.id, &input.subject_ids).await?;
        tx.link_packages(payment.id, &input.package_ids).await?;
        // A payment alone is sufficient to mark enrollment.
        tx.update_student_ledger(student.id, new_pending, Some(true))
            .await?;
        tx.commit().await?;

        PAYMENTS_TOTAL.with_label_values(&["create", "ok"]).inc();
        info!(
            payment_id = %payment.id,
            receipt_number = %receipt_number,
            pending_fees = %new_pending,
            "Payment recorded"
        );

        Ok(CreatedPayment {
            payment_id: payment.id,
            receipt_number,
            pending_fees: new_pending,
        })
    }

    /// Revise a payment's amount and metadata, reversing its previous
    /// contribution to the student's balance and applying the new one.
    ///
    /// Only this payment's prior amount is reversed; the balance is not
    /// re-derived from the full payment history, so earlier drift persists.
    #[instrument(skip(self, input), fields(payment_id = %input.payment_id, amount = %input.amount))]
    pub async fn edit_payment(
        &self,
        input: EditPayment,
        now: DateTime<Utc>,
    ) -> Result<Decimal, AppError> {
        if input.amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount must be positive"
            )));
        }

        let mut tx = self.store.begin().await?;

        let payment = tx.payment_for_update(input.payment_id).await?.ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Payment {} not found", input.payment_id))
        })?;

        let student = tx.student_for_update(payment.user_id).await?.ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!(
                "Student not found for user {}",
                payment.user_id
            ))
        })?;

        // Deliberate guard: once the ledger is exhausted no edit is
        // permitted, even one that would only reduce the amount.
        if student.pending_fees <= Decimal::ZERO {
            PAYMENTS_TOTAL.with_label_values(&["edit", "rejected"]).inc();
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Student has no pending fees; payment edits are not permitted"
            )));
        }

        let new_pending = student.pending_fees + payment.amount - input.amount;
        if new_pending < Decimal::ZERO {
            PAYMENTS_TOTAL.with_label_values(&["edit", "rejected"]).inc();
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Revised amount {} would overdraw the pending balance",
                input.amount
            )));
        }

        tx.update_payment(&PaymentUpdate {
            payment_id: payment.id,
            amount: input.amount,
            pending: new_pending,
            mode: input.mode,
            status: input.status,
            remark: input.remark,
            updated_by: input.updated_by,
            updated_at: now,
        })
        .await?;
        tx.update_student_ledger(student.id, new_pending, None)
            .await?;
        tx.commit().await?;

        PAYMENTS_TOTAL.with_label_values(&["edit", "ok"]).inc();
        info!(
            payment_id = %payment.id,
            receipt_number = %payment.receipt_number,
            pending_fees = %new_pending,
            "Payment revised"
        );

        Ok(new_pending)
    }

    /// Reverse a payment: restore its amount onto the pending balance and
    /// recompute enrollment as "at least one payment remains".
    ///
    /// Callers gate this behind explicit enablement; the route is not
    /// mounted unless the deployment opts in.
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn delete_payment(&self, payment_id: Uuid) -> Result<Decimal, AppError> {
        let mut tx = self.store.begin().await?;

        let payment = tx.payment_for_update(payment_id).await?.ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Payment {} not found", payment_id))
        })?;

        let student = tx.student_for_update(payment.user_id).await?.ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!(
                "Student not found for user {}",
                payment.user_id
            ))
        })?;

        let restored = student.pending_fees + payment.amount;
        tx.delete_payment(payment.id).await?;
        let remaining = tx.payments_remaining(payment.user_id).await?;
        tx.update_student_ledger(student.id, restored, Some(remaining > 0))
            .await?;
        tx.commit().await?;

        PAYMENTS_TOTAL.with_label_values(&["delete", "ok"]).inc();
        info!(
            payment_id = %payment.id,
            receipt_number = %payment.receipt_number,
            pending_fees = %restored,
            "Payment reversed"
        );

        Ok(restored)
    }
}
