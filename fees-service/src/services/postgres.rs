//! PostgreSQL implementation of the persistence gateway.
//!
//! Every payment operation runs inside one `sqlx` transaction. The student
//! row is taken with `FOR UPDATE`, and receipt allocation additionally
//! holds a per-(GST flag, financial year) advisory lock so that two
//! concurrent creators in the same partition cannot read the same latest
//! receipt. A UNIQUE constraint on `receipt_number` backstops the lock.

use admin_core::error::AppError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, Postgres};
use sqlx::Transaction;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::ledger::fiscal::FyWindow;
use crate::models::{NewPayment, Payment, PaymentUpdate, StudentLedger};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{LedgerStore, LedgerTx};

const STUDENT_COLUMNS: &str = "id, user_id, pending_fees, enrolled, created_utc";
const PAYMENT_COLUMNS: &str = "id, receipt_number, amount, pending, is_gst, mode, status, \
     remark, user_id, created_by, created_at, updated_at";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "fees-service"))]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, AppError> {
        let tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    #[instrument(skip(self, student), fields(user_id = %student.user_id))]
    async fn create_student(&self, student: &StudentLedger) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_student"])
            .start_timer();

        sqlx::query(
            "INSERT INTO students (id, user_id, pending_fees, enrolled, created_utc)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(student.id)
        .bind(student.user_id)
        .bind(student.pending_fees)
        .bind(student.enrolled)
        .bind(student.created_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "A ledger already exists for user {}",
                    student.user_id
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create student: {}", e)),
        })?;

        timer.observe_duration();

        info!(student_id = %student.id, "Student ledger created");
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn student_by_user(&self, user_id: Uuid) -> Result<Option<StudentLedger>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["student_by_user"])
            .start_timer();

        let student = sqlx::query_as::<_, StudentLedger>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get student: {}", e)))?;

        timer.observe_duration();
        Ok(student)
    }

    #[instrument(skip(self), fields(payment_id = %payment_id))]
    async fn payment_by_id(&self, payment_id: Uuid) -> Result<Option<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["payment_by_id"])
            .start_timer();

        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get payment: {}", e)))?;

        timer.observe_duration();
        Ok(payment)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn payments_for_user(&self, user_id: Uuid) -> Result<Vec<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["payments_for_user"])
            .start_timer();

        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE user_id = $1 ORDER BY created_at"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e)))?;

        timer.observe_duration();
        Ok(payments)
    }
}

struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

/// Advisory-lock key for a receipt partition. One bit for the GST flag,
/// the rest for the financial-year start.
fn partition_lock_key(is_gst: bool, start_year: i32) -> i64 {
    ((start_year as i64) << 1) | is_gst as i64
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn student_for_update(
        &mut self,
        user_id: Uuid,
    ) -> Result<Option<StudentLedger>, AppError> {
        sqlx::query_as::<_, StudentLedger>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE user_id = $1 FOR UPDATE"
        ))
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock student: {}", e)))
    }

    async fn payment_for_update(&mut self, payment_id: Uuid) -> Result<Option<Payment>, AppError> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 FOR UPDATE"
        ))
        .bind(payment_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock payment: {}", e)))
    }

    async fn latest_receipt_number(
        &mut self,
        is_gst: bool,
        window: &FyWindow,
    ) -> Result<Option<String>, AppError> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(partition_lock_key(is_gst, window.start_year))
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to lock receipt partition: {}", e))
            })?;

        // `created_at` is stamped by the caller before the transaction
        // begins, so commit order and timestamp order diverge under
        // concurrency. The numeric suffix is the authoritative allocation
        // order; all rows in a partition share one prefix, so the suffix
        // starts at a fixed offset.
        let suffix_from = if is_gst { 8 } else { 9 };
        sqlx::query_scalar::<_, String>(&format!(
            "SELECT receipt_number FROM payments
             WHERE is_gst = $1 AND created_at >= $2 AND created_at < $3
             ORDER BY (SUBSTRING(receipt_number FROM {suffix_from}))::BIGINT DESC
             LIMIT 1"
        ))
        .bind(is_gst)
        .bind(window.start)
        .bind(window.end)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to read latest receipt: {}", e))
        })
    }

    async fn insert_payment(&mut self, payment: &NewPayment) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO payments (id, receipt_number, amount, pending, is_gst, mode, status,
                                   remark, user_id, created_by, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)",
        )
        .bind(payment.id)
        .bind(&payment.receipt_number)
        .bind(payment.amount)
        .bind(payment.pending)
        .bind(payment.is_gst)
        .bind(&payment.mode)
        .bind(&payment.status)
        .bind(&payment.remark)
        .bind(payment.user_id)
        .bind(payment.created_by)
        .bind(payment.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Receipt number '{}' was already allocated",
                    payment.receipt_number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to insert payment: {}", e)),
        })?;
        Ok(())
    }

    async fn link_subjects(
        &mut self,
        payment_id: Uuid,
        subject_ids: &[Uuid],
    ) -> Result<(), AppError> {
        for subject_id in subject_ids {
            sqlx::query("INSERT INTO payment_subjects (payment_id, subject_id) VALUES ($1, $2)")
                .bind(payment_id)
                .bind(subject_id)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to link subject: {}", e))
                })?;
        }
        Ok(())
    }

    async fn link_packages(
        &mut self,
        payment_id: Uuid,
        package_ids: &[Uuid],
    ) -> Result<(), AppError> {
        for package_id in package_ids {
            sqlx::query("INSERT INTO payment_packages (payment_id, package_id) VALUES ($1, $2)")
                .bind(payment_id)
                .bind(package_id)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to link package: {}", e))
                })?;
        }
        Ok(())
    }

    async fn update_payment(&mut self, update: &PaymentUpdate) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE payments
             SET amount = $2, pending = $3, mode = $4, status = $5, remark = $6,
                 created_by = COALESCE($7, created_by), updated_at = $8
             WHERE id = $1",
        )
        .bind(update.payment_id)
        .bind(update.amount)
        .bind(update.pending)
        .bind(&update.mode)
        .bind(&update.status)
        .bind(&update.remark)
        .bind(update.updated_by)
        .bind(update.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update payment: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Payment {} not found",
                update.payment_id
            )));
        }
        Ok(())
    }

    async fn delete_payment(&mut self, payment_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM payments WHERE id = $1")
            .bind(payment_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete payment: {}", e))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Payment {} not found",
                payment_id
            )));
        }
        Ok(())
    }

    async fn payments_remaining(&mut self, user_id: Uuid) -> Result<i64, AppError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM payments WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to count payments: {}", e))
            })
    }

    async fn update_student_ledger(
        &mut self,
        student_id: Uuid,
        pending_fees: Decimal,
        enrolled: Option<bool>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE students
             SET pending_fees = $2, enrolled = COALESCE($3, enrolled)
             WHERE id = $1",
        )
        .bind(student_id)
        .bind(pending_fees)
        .bind(enrolled)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update ledger: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Student {} not found",
                student_id
            )));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })
    }
}
