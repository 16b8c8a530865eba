//! Fee ledger core: financial-year windowing, receipt numbering, and the
//! balance reconciliation engine.

pub mod engine;
pub mod fiscal;
pub mod receipt;

pub use engine::{CreatePayment, CreatedPayment, EditPayment, FeeLedger};
pub use fiscal::FyWindow;
