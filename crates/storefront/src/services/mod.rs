//! Business services.
//!
//! Services borrow their collaborators from `AppState` for the duration of
//! one request and never hold locks across calls.

pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod reconciler;

pub use catalog::{CatalogService, ProductQuery};
pub use checkout::{CheckoutError, CheckoutRequest, CheckoutService};
pub use orders::{OrderError, OrderService, generate_order_number};
pub use reconciler::{LogPaymentHooks, PaymentHooks, ReconcileOutcome, Reconciler};
