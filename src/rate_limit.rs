//! Rate limit metadata parsed from response headers.

use reqwest::header::HeaderMap;
use std::collections::BTreeMap;

/// Header carrying the request allowance for the caller's IP.
pub const LIMIT_HEADER: &str = "x-city-ratelimit-limit-by-ip";

/// Header carrying the remaining requests for the caller's IP.
pub const REMAINING_HEADER: &str = "x-city-ratelimit-remaining-by-ip";

/// Snapshot of the headers of one response.
///
/// Header names are stored lower-cased; values that are not valid UTF-8 are
/// dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimit {
    attrs: BTreeMap<String, String>,
}

impl RateLimit {
    pub fn new(headers: &HeaderMap) -> Self {
        let attrs = headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();
        Self { attrs }
    }

    /// Raw header snapshot.
    pub fn attrs(&self) -> &BTreeMap<String, String> {
        &self.attrs
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Number of requests allowed in the current window.
    pub fn limit(&self) -> Option<u64> {
        self.number(LIMIT_HEADER)
    }

    /// Number of requests left in the current window.
    pub fn remaining(&self) -> Option<u64> {
        self.number(REMAINING_HEADER)
    }

    fn number(&self, header: &str) -> Option<u64> {
        self.attrs.get(header)?.trim().parse().ok()
    }
}

impl From<&HeaderMap> for RateLimit {
    fn from(headers: &HeaderMap) -> Self {
        Self::new(headers)
    }
}
