//! HTTP transport for The City API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use std::sync::Arc;

use super::config::Config;
use super::response::{Response, raise_for_status};
use crate::base::{Entity, Options};
use crate::error::ApiError;

/// Media type requested from the API.
pub const ACCEPT_MEDIA_TYPE: &str = "application/vnd.thecity.v1+json";

/// Header carrying the user token.
pub const USER_TOKEN_HEADER: &str = "x-city-user-token";

/// Sends requests and classifies their responses.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Base URL requests are sent to.
    fn api_url(&self) -> &str;

    /// Performs a GET request for `path`, relative to the API URL.
    ///
    /// Error statuses are returned as [`ApiError`].
    async fn get(&self, path: &str) -> Result<Response, ApiError>;
}

/// reqwest-backed [`Transport`].
#[derive(Clone)]
pub struct Client {
    /// Pooled reqwest client with the API's default headers.
    http: reqwest::Client,
    /// Settings the client was built from.
    config: Config,
}

impl Client {
    /// Builds a client sending the Accept header, the user token (if any)
    /// and the user agent from `config`.
    pub fn new(config: Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_MEDIA_TYPE));
        if let Some(token) = &config.user_token {
            let mut value =
                HeaderValue::from_str(token).context("User token is not a valid header value")?;
            value.set_sensitive(true);
            headers.insert(USER_TOKEN_HEADER, value);
        }

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { http, config })
    }

    /// Creates a client configured from the environment.
    pub fn from_env() -> Result<Self> {
        Self::new(Config::from_env()?)
    }

    /// Settings the client was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[async_trait]
impl Transport for Client {
    fn api_url(&self) -> &str {
        &self.config.api_url
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, path: &str) -> Result<Response, ApiError> {
        let url = self.config.endpoint(path);
        debug!("GET {}...", url);

        let response = self.http.get(&url).send().await?;
        let response = Response::from_reqwest(response).await?;
        debug!("GET {} returned {}", url, response.status());

        raise_for_status(response)
    }
}

/// Fetches `path` and builds an entity from the response body.
///
/// The entity keeps `transport` as its client.
#[tracing::instrument(skip(transport))]
pub async fn fetch_entity<E: Entity>(
    transport: Arc<dyn Transport>,
    path: &str,
) -> Result<E, ApiError> {
    let response = transport.get(path).await?;
    Ok(E::from_response(
        &response,
        Options {
            client: Some(transport),
        },
    ))
}
