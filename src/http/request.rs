//! Request identification.
//!
//! # Responsibilities
//! - Attach a UUID `x-request-id` to every inbound request lacking one
//! - Expose the header name for handlers and log fields
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - A client-supplied ID is kept as is

use axum::http::HeaderName;
use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Layer that fills in `x-request-id` with a fresh UUID.
pub fn request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuid)
}
