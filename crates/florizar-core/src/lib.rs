//! Domain types, validation and the storage trait for Florizar.
//!
//! No HTTP or database code lives here. Backends implement
//! [`store::FlorizarStore`]; the API crate is generic over it.

pub mod contact;
pub mod error;
pub mod job_site;
pub mod migration;
pub mod normalize;
pub mod photo;
pub mod relation;
pub mod store;
pub mod tag;
pub mod user;

pub use error::{Error, Result};
