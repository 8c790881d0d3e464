//! Domain models for storefront.

pub mod catalog;
