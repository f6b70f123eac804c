//! Typed wrappers over the backend's REST endpoints.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tracing::debug;
use verifier_types::{Credential, JobId, JobStatus, UploadFile, UserProfile};

use crate::{GatewayClient, GatewayError, RequestBody};

const LOGIN_PATH: &str = "api/auth/login/";
const PROFILE_PATH: &str = "api/auth/me/";
const REGISTER_PATH: &str = "api/auth/register/";
const UPLOAD_PATH: &str = "api/verify/upload";
const JOBS_PATH: &str = "api/verify/jobs/";
const HEALTH_PATH: &str = "health";

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access: String,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    #[serde(default)]
    message: Option<String>,
}

/// Acknowledgement of an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadReceipt {
    pub job_id: JobId,
}

/// Current state of a job as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobStatusReport {
    pub job_id: JobId,
    #[serde(deserialize_with = "status_any_case")]
    pub status: JobStatus,
    #[serde(default = "default_progress")]
    pub progress: String,
}

fn default_progress() -> String {
    "0%".to_string()
}

fn status_any_case<'de, D: Deserializer<'de>>(deserializer: D) -> Result<JobStatus, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Reachable,
    Unreachable,
}

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
    let status = response.status();
    response
        .json::<T>()
        .await
        .map_err(|e| GatewayError::unexpected_body(status, e))
}

impl GatewayClient {
    /// Exchange username and password for a credential. Does not install it.
    pub async fn login(&self, username: &str, password: &str) -> Result<Credential, GatewayError> {
        let body = serde_json::to_value(Credentials { username, password }).map_err(|e| {
            GatewayError::ServerFault {
                status: None,
                message: format!("failed to encode login request: {e}"),
            }
        })?;
        let response = self
            .request(Method::POST, LOGIN_PATH, Some(RequestBody::Json(body)))
            .await?;
        let status = response.status();
        let LoginResponse { access } = decode(response).await?;
        Credential::new(access)
            .map_err(|_| GatewayError::unexpected_body(status, "empty access token"))
    }

    /// Profile of whoever the current credential belongs to.
    pub async fn fetch_profile(&self) -> Result<UserProfile, GatewayError> {
        let response = self.request(Method::GET, PROFILE_PATH, None).await?;
        decode(response).await
    }

    /// Profile fetch presenting `credential` instead of the current one.
    ///
    /// A 401 here only clears the vault if `credential` happens to be current.
    pub async fn fetch_profile_as(
        &self,
        credential: &Credential,
    ) -> Result<UserProfile, GatewayError> {
        let url = self.endpoint(PROFILE_PATH)?;
        let response = self
            .send(Method::GET, url, None, Some(credential.clone()))
            .await?;
        decode(response).await
    }

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<String, GatewayError> {
        let mut body = json!({ "username": username, "password": password });
        if let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) {
            body["email"] = json!(email);
        }
        let response = self
            .request(Method::POST, REGISTER_PATH, Some(RequestBody::Json(body)))
            .await?;
        let RegisterResponse { message } = decode(response).await?;
        Ok(message.unwrap_or_else(|| "User created successfully".to_string()))
    }

    pub async fn upload(&self, file: &UploadFile) -> Result<UploadReceipt, GatewayError> {
        debug!(filename = file.filename(), bytes = file.len(), "Uploading file");
        let response = self
            .request(Method::POST, UPLOAD_PATH, Some(RequestBody::Upload(file)))
            .await?;
        decode(response).await
    }

    pub async fn job_status(&self, job_id: &JobId) -> Result<JobStatusReport, GatewayError> {
        let url = self.endpoint_with_segment(JOBS_PATH, job_id.as_str())?;
        let credential = self.vault.current();
        let response = self.send(Method::GET, url, None, credential).await?;
        decode(response).await
    }

    /// Whether the backend answers at all. Any HTTP response counts as reachable.
    pub async fn health(&self) -> Reachability {
        let url = match self.endpoint(HEALTH_PATH) {
            Ok(url) => url,
            Err(_) => return Reachability::Unreachable,
        };
        match self.send(Method::GET, url, None, None).await {
            Err(GatewayError::NetworkUnreachable { reason }) => {
                debug!(%reason, "Health probe failed");
                Reachability::Unreachable
            }
            _ => Reachability::Reachable,
        }
    }
}
