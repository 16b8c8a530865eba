pub mod memory;
pub mod metrics;
pub mod postgres;
pub mod store;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;
pub use store::{LedgerStore, LedgerTx};
