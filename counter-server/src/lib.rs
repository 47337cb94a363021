//! Thin HTTP surface over the counting engine: an Axum router plus the
//! error-to-response mapping it needs.

mod api_error;
mod routes;

pub use api_error::{ApiError, ApiResult};
pub use routes::{build_router, SharedService};
