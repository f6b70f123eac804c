//! HTTP gateway to the verification backend.
//!
//! [`GatewayClient`] is the only path to the network. It attaches the current credential from
//! the shared [`CredentialVault`], classifies every failure into a [`GatewayError`], and on a
//! rejected credential clears it and notifies the registered [`ExpiryListener`] before the
//! failing call returns.

mod endpoints;
mod error;
mod vault;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use tracing::{debug, info};
use url::Url;
use verifier_types::{Credential, UploadFile};

pub use endpoints::{JobStatusReport, Reachability, UploadReceipt};
pub use error::{ErrorKind, GatewayError, extract_backend_message};
pub use vault::{
    CredentialStore, CredentialVault, FileCredentialStore, MemoryCredentialStore, StoreError,
};

use error::{classify_status, classify_transport, read_capped_error_body};

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_MAX_IDLE_PER_HOST: usize = 4;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Receives the session-expired signal.
///
/// Called synchronously from inside the failing request, after the credential has been
/// cleared and before the caller sees `Unauthorized`.
pub trait ExpiryListener: Send + Sync {
    fn session_expired(&self);
}

/// Listener that ignores expiry, for callers with no session to tear down.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopExpiryListener;

impl ExpiryListener for NoopExpiryListener {
    fn session_expired(&self) {}
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base all endpoint paths resolve against. Must end with `/`.
    pub base_url: Url,
    pub connect_timeout: Duration,
}

impl GatewayConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

#[derive(Debug, thiserror::Error)]
#[error("failed to build HTTP client: {0}")]
pub struct ClientBuildError(#[from] reqwest::Error);

/// Request payloads the backend accepts.
#[derive(Debug)]
pub enum RequestBody<'a> {
    Json(serde_json::Value),
    /// Multipart form with the file under the `file` field.
    Upload(&'a UploadFile),
}

pub struct GatewayClient {
    http: reqwest::Client,
    base_url: Url,
    vault: Arc<CredentialVault>,
    listener: Arc<dyn ExpiryListener>,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("base_url", &self.base_url.as_str())
            .field("vault", &self.vault)
            .finish_non_exhaustive()
    }
}

fn client_builder(connect_timeout: Duration) -> reqwest::ClientBuilder {
    use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};

    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(concat!("verifier/", env!("CARGO_PKG_VERSION")))
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .default_headers(default_headers)
}

impl GatewayClient {
    pub fn new(
        config: GatewayConfig,
        vault: Arc<CredentialVault>,
        listener: Arc<dyn ExpiryListener>,
    ) -> Result<Self, ClientBuildError> {
        let http = client_builder(config.connect_timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url,
            vault,
            listener,
        })
    }

    #[must_use]
    pub fn vault(&self) -> &Arc<CredentialVault> {
        &self.vault
    }

    /// Send a request carrying whatever credential is current.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<RequestBody<'_>>,
    ) -> Result<reqwest::Response, GatewayError> {
        let url = self.endpoint(path)?;
        let credential = self.vault.current();
        self.send(method, url, body, credential).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| GatewayError::ServerFault {
                status: None,
                message: format!("invalid endpoint path {path:?}: {e}"),
            })
    }

    /// `path` with one extra percent-encoded segment appended.
    fn endpoint_with_segment(&self, path: &str, segment: &str) -> Result<Url, GatewayError> {
        let mut url = self.endpoint(path)?;
        url.path_segments_mut()
            .map_err(|()| GatewayError::ServerFault {
                status: None,
                message: format!("base URL cannot carry path segments: {}", self.base_url),
            })?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<RequestBody<'_>>,
        credential: Option<Credential>,
    ) -> Result<reqwest::Response, GatewayError> {
        // The simulated sentinel never leaves the process.
        let credential = credential.filter(|c| !c.is_simulated());

        debug!(
            %method,
            path = url.path(),
            authenticated = credential.is_some(),
            "Sending backend request"
        );

        let mut builder = self.http.request(method, url);
        if let Some(credential) = &credential {
            builder = builder.bearer_auth(credential.expose_secret());
        }
        builder = match body {
            Some(RequestBody::Json(value)) => builder.json(&value),
            Some(RequestBody::Upload(file)) => builder.multipart(upload_form(file)),
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // Revoke on the status line; the error body may be slow to arrive.
        if status == StatusCode::UNAUTHORIZED {
            self.credential_rejected(credential.as_ref());
        }
        let body = read_capped_error_body(response).await;
        let error = classify_status(status, &body);
        debug!(
            status = status.as_u16(),
            kind = ?error.kind(),
            "Backend request failed"
        );
        Err(error)
    }

    fn credential_rejected(&self, presented: Option<&Credential>) {
        let Some(presented) = presented else {
            return;
        };
        if self.vault.revoke(presented) {
            info!("Backend rejected the current credential; session expired");
            self.listener.session_expired();
        }
    }
}

fn upload_form(file: &UploadFile) -> reqwest::multipart::Form {
    let part = reqwest::multipart::Part::bytes(file.bytes().to_vec())
        .file_name(file.filename().to_string());
    reqwest::multipart::Form::new().part("file", part)
}
