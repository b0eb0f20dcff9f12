//! Minimal HTTP fetcher shared by every data source of the summary bundle.
//!
//! Each call issues exactly one request, honours the caller's cancellation
//! token and the configured timeout, and never retries.

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Error returned by a single fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("cannot build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("{method} {url}: {source}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} {url}: status code: {status}")]
    Status {
        method: Method,
        url: String,
        status: u16,
    },
    #[error("{method} {url}: cannot read response body: {source}")]
    Body {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} {url}: cancelled")]
    Cancelled { method: Method, url: String },
}

impl FetchError {
    /// HTTP status code for non-200 responses.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Options for [`Fetcher::new`].
#[derive(Debug, Clone, Copy)]
pub struct FetcherOptions {
    /// Per-request timeout, covering connect and body download.
    pub timeout: Duration,
    /// Skip TLS certificate verification.
    pub insecure_tls: bool,
}

impl Default for FetcherOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            insecure_tls: false,
        }
    }
}

/// Stateless GET/POST helper around a shared `reqwest` client.
///
/// Cloning is cheap: clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(options: FetcherOptions) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.insecure_tls)
            .user_agent(concat!("pmm-admin/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    /// `GET url` and return the response body.
    pub async fn get(&self, cancel: &CancellationToken, url: &str) -> Result<Vec<u8>, FetchError> {
        let (url, builder) = self.request(Method::GET, url)?;
        execute(cancel, Method::GET, url, builder).await
    }

    /// `GET url` with an explicit `Accept` header.
    pub async fn get_with_accept(
        &self,
        cancel: &CancellationToken,
        url: &str,
        accept: &str,
    ) -> Result<Vec<u8>, FetchError> {
        let (url, builder) = self.request(Method::GET, url)?;
        execute(cancel, Method::GET, url, builder.header(ACCEPT, accept)).await
    }

    /// `POST url` with a JSON body and return the response body.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        cancel: &CancellationToken,
        url: &str,
        body: &T,
    ) -> Result<Vec<u8>, FetchError> {
        let (url, builder) = self.request(Method::POST, url)?;
        execute(cancel, Method::POST, url, builder.json(body)).await
    }

    /// Builds a request, moving URL userinfo into a basic auth header.
    ///
    /// The returned URL string has credentials removed and is the one used in errors and logs.
    fn request(&self, method: Method, raw: &str) -> Result<(String, RequestBuilder), FetchError> {
        let mut url = Url::parse(raw).map_err(|err| FetchError::InvalidUrl {
            url: raw.to_string(),
            reason: err.to_string(),
        })?;

        let credentials = if url.username().is_empty() {
            None
        } else {
            let user = url.username().to_string();
            let password = url.password().map(str::to_string);
            if url.set_username("").is_err() || url.set_password(None).is_err() {
                tracing::debug!("Cannot strip credentials from request URL");
            }
            Some((user, password))
        };

        let display = url.to_string();
        let mut builder = self.client.request(method, url);
        if let Some((user, password)) = credentials {
            builder = builder.basic_auth(user, password);
        }
        Ok((display, builder))
    }
}

async fn execute(
    cancel: &CancellationToken,
    method: Method,
    url: String,
    builder: RequestBuilder,
) -> Result<Vec<u8>, FetchError> {
    tracing::debug!(%method, %url, "Sending request");

    let request = async {
        let response = builder.send().await.map_err(|source| FetchError::Transport {
            method: method.clone(),
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                method: method.clone(),
                url: url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| FetchError::Body {
            method: method.clone(),
            url: url.clone(),
            source,
        })?;
        Ok(body.to_vec())
    };

    tokio::select! {
        _ = cancel.cancelled() => Err(FetchError::Cancelled { method: method.clone(), url: url.clone() }),
        result = request => result,
    }
}
