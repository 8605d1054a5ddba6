//! Single authenticated request/response exchange with the provider.
//!
//! The transport attaches credentials, serializes payloads and classifies the
//! outcome. It never retries and never interprets why a call failed.

use std::fmt;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the caller identity on every request.
pub const CALLER_IDENTITY_HEADER: &str = "x-mcs-user";

/// Errors raised by [`Transport::execute`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TransportError {
    /// Raised when the payload cannot be serialized.
    #[error("failed to encode payload for {method} {endpoint}: {message}")]
    Encode {
        /// HTTP method of the request.
        method: String,
        /// Endpoint relative to the base URL.
        endpoint: String,
        /// Serializer error text.
        message: String,
    },
    /// Raised when the exchange fails below the HTTP layer.
    #[error("{method} {endpoint} failed: {message}")]
    Connection {
        /// HTTP method of the request.
        method: String,
        /// Endpoint relative to the base URL.
        endpoint: String,
        /// Client error text.
        message: String,
    },
    /// Raised when the provider answers with a non-success status.
    #[error("{method} {endpoint} returned status {status}: {body}")]
    Api {
        /// HTTP method of the request.
        method: String,
        /// Endpoint relative to the base URL.
        endpoint: String,
        /// Numeric status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },
}

impl TransportError {
    /// Returns the remote status when the provider rejected the call.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Encode { .. } | Self::Connection { .. } => None,
        }
    }
}

/// Stateless HTTP transport bound to one provider endpoint and identity.
#[derive(Clone)]
pub struct Transport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    user_email: String,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.base_url)
            .field("user_email", &self.user_email)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Creates a transport for the given base URL and credentials.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        user_email: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
            user_email: user_email.into(),
        }
    }

    /// Returns the base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Performs one exchange and returns the response body on success.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Encode`] when the payload cannot be
    /// serialized, [`TransportError::Connection`] when the request cannot be
    /// completed and [`TransportError::Api`] for any non-success status.
    pub async fn execute<P>(
        &self,
        method: Method,
        endpoint: &str,
        payload: Option<&P>,
    ) -> Result<String, TransportError>
    where
        P: Serialize + Sync + ?Sized,
    {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CALLER_IDENTITY_HEADER, &self.user_email)
            .header(CONTENT_TYPE, "application/json");

        if let Some(body) = payload {
            let encoded = serde_json::to_vec(body).map_err(|err| TransportError::Encode {
                method: method.to_string(),
                endpoint: endpoint.to_owned(),
                message: err.to_string(),
            })?;
            request = request.body(encoded);
        }

        debug!(%method, endpoint, "sending request");
        let connection_error = |err: reqwest::Error| TransportError::Connection {
            method: method.to_string(),
            endpoint: endpoint.to_owned(),
            message: err.to_string(),
        };
        let response = request.send().await.map_err(connection_error)?;
        let status = response.status();
        let body = response.text().await.map_err(connection_error)?;

        if status.is_success() {
            return Ok(body);
        }

        Err(TransportError::Api {
            method: method.to_string(),
            endpoint: endpoint.to_owned(),
            status: status.as_u16(),
            body,
        })
    }

    /// Issues a `GET` without a body.
    ///
    /// # Errors
    ///
    /// See [`Transport::execute`].
    pub async fn get(&self, endpoint: &str) -> Result<String, TransportError> {
        self.execute::<()>(Method::GET, endpoint, None).await
    }

    /// Issues a `POST` with an optional JSON body.
    ///
    /// # Errors
    ///
    /// See [`Transport::execute`].
    pub async fn post<P>(&self, endpoint: &str, payload: Option<&P>) -> Result<String, TransportError>
    where
        P: Serialize + Sync + ?Sized,
    {
        self.execute(Method::POST, endpoint, payload).await
    }
}
