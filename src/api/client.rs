use std::fmt::Write as FmtWrite;
use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, COOKIE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::Result;
use crate::error::{ApiError, ConfigError, Error};

use super::body::body_preview;

const CORRELATION_HEADER: &str = "x-correlation-id";

/// Client for the messaging endpoints of the web application.
#[derive(Clone)]
pub struct MessagesClient {
    http: reqwest::Client,
    base: Url,
    session: Option<SecretString>,
}

impl MessagesClient {
    /// Build a `MessagesClient` for the application rooted at `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not HTTPS and `insecure_http` is not set,
    /// or if the underlying HTTP client fails to build.
    pub fn new(
        base: Url,
        session: Option<SecretString>,
        timeout: Duration,
        connect_timeout: Duration,
        insecure_http: bool,
    ) -> Result<Self> {
        if base.scheme() != "https" && !insecure_http {
            return Err(Error::Config(ConfigError::InvalidField {
                field: "server.url",
                message: "only https URLs are accepted without --insecure".to_string(),
            }));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .user_agent(concat!("msgnotify/", env!("CARGO_PKG_VERSION")))
            .pool_idle_timeout(Duration::from_secs(30));

        if !insecure_http {
            builder = builder.https_only(true);
        }

        let http = builder
            .build()
            .map_err(|err| ApiError::Client { source: err })?;

        Ok(Self {
            http,
            base,
            session,
        })
    }

    /// Resolve an absolute application path (`/messages/...`) against the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] if the join fails.
    pub fn endpoint(&self, path: &'static str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|source| ApiError::InvalidUrl { path, source }.into())
    }

    pub(super) async fn get_json<T>(&self, path: &'static str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let correlation_id = Uuid::now_v7().to_string();
        let started = Instant::now();

        let mut request = self
            .http
            .get(url)
            .header(CORRELATION_HEADER, &correlation_id);
        if let Some(cookie) = &self.session {
            let mut value = HeaderValue::from_str(cookie.expose_secret()).map_err(|err| {
                ConfigError::InvalidField {
                    field: "server.session_cookie",
                    message: err.to_string(),
                }
            })?;
            value.set_sensitive(true);
            request = request.header(COOKIE, value);
        }

        let response = request.send().await.map_err(ApiError::from)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::HttpStatus { status }.into());
        }

        let body = response.bytes().await.map_err(ApiError::from)?;
        let parsed = serde_json::from_slice::<T>(&body).map_err(|err| {
            let mut message = format!("error decoding {path}: {err}; body preview: ");
            let _ = FmtWrite::write_str(&mut message, &body_preview(&body));
            ApiError::Json { message }
        })?;

        debug!(
            path,
            %correlation_id,
            latency_ms = started.elapsed().as_millis(),
            "messages endpoint call succeeded"
        );
        Ok(parsed)
    }
}
