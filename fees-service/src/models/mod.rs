pub mod payment;
pub mod student;

pub use payment::{NewPayment, Payment, PaymentUpdate};
pub use student::StudentLedger;
