//! # Domain Module
//!
//! Admission requests, re-check options and errors.

pub mod errors;
pub mod request;

pub use errors::*;
pub use request::*;
