//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (correlates logs, Sentry events, and the response)

pub mod request_id;

pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
