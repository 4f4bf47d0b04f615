//! Client library core for The City API.
//!
//! Successful responses become [`Entity`] values with typed, memoised field
//! accessors; failed responses become [`ApiError`] values classified by HTTP
//! status.

pub mod base;
pub mod error;
pub mod http;
pub mod models;
pub mod rate_limit;
pub mod version;

pub use base::{Attributes, Entity, Options, Uri};
pub use error::{ApiError, ErrorKind};
pub use http::{Client, Config, Response, Transport};
pub use rate_limit::RateLimit;
pub use version::Version;

#[doc(hidden)]
pub mod __private {
    pub use paste::paste;
    pub use serde_json::Value;
    pub use std::sync::{Arc, OnceLock};
}
