//! HTTP surface of the service.
//!
//! Handlers only translate between HTTP and [`crate::teams::TeamEngine`];
//! they carry no authorization logic of their own.

mod types;

pub use types::*;

pub mod axum;
