//! admin-core: Shared infrastructure for the admin backend services.
pub mod error;
pub mod middleware;
pub mod response;

pub use axum;
pub use serde;
pub use serde_json;
pub use tracing;
pub use validator;
