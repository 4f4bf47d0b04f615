//! Transport layer: configuration, the reqwest client and response
//! classification.

mod client;
mod config;
mod response;

pub use client::{ACCEPT_MEDIA_TYPE, Client, Transport, USER_TOKEN_HEADER, fetch_entity};
#[cfg(test)]
pub use client::MockTransport;
pub use config::{API_URL_ENV, Config, DEFAULT_API_URL, USER_TOKEN_ENV};
pub use response::{Response, raise_for_status};
