//! Client configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::version::Version;

/// Default base URL of The City API.
pub const DEFAULT_API_URL: &str = "https://api.onthecity.org";

/// Environment variable overriding the API URL.
pub const API_URL_ENV: &str = "THECITY_API_URL";

/// Environment variable carrying the user token.
pub const USER_TOKEN_ENV: &str = "THECITY_USER_TOKEN";

/// Settings for [`Client`](super::Client).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the API.
    pub api_url: String,
    /// Token sent in `X-City-User-Token`.
    pub user_token: Option<String>,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            user_token: None,
            user_agent: Version::user_agent(),
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, falling back to defaults
    /// for unset or empty variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut config = Self::default();
        if let Some(api_url) = present(API_URL_ENV) {
            config = config.api_url(api_url)?;
        }
        config.user_token = present(USER_TOKEN_ENV);
        Ok(config)
    }

    /// Sets the API base URL. Trailing slashes are dropped.
    pub fn api_url(mut self, api_url: impl Into<String>) -> Result<Self> {
        let api_url = api_url.into();
        Url::parse(&api_url).with_context(|| format!("Invalid API URL: {}", api_url))?;
        self.api_url = api_url.trim_end_matches('/').to_string();
        Ok(self)
    }

    /// Sets the user token.
    pub fn user_token(mut self, token: impl Into<String>) -> Self {
        self.user_token = Some(token.into());
        self
    }

    /// Sets the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Joins `path` onto the API base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }
}
