//! Failure taxonomy for backend calls.
//!
//! Every failed call resolves to exactly one [`GatewayError`] variant. Callers branch on
//! [`GatewayError::kind`], never on the display text.

use reqwest::StatusCode;
use serde_json::Value;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Discriminant of [`GatewayError`], for branching without matching payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The transport failed; no response was received.
    NetworkUnreachable,
    /// HTTP 401.
    Unauthorized,
    /// 4xx carrying a structured message from the backend.
    ValidationFailed,
    /// 5xx, or anything the other kinds don't cover.
    ServerFault,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("backend unreachable: {reason}")]
    NetworkUnreachable { reason: String },
    #[error("unauthorized: {}", .message.as_deref().unwrap_or("credential rejected"))]
    Unauthorized { message: Option<String> },
    #[error("{message}")]
    ValidationFailed { status: u16, message: String },
    #[error("server fault{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    ServerFault { status: Option<u16>, message: String },
}

impl GatewayError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NetworkUnreachable { .. } => ErrorKind::NetworkUnreachable,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::ValidationFailed { .. } => ErrorKind::ValidationFailed,
            Self::ServerFault { .. } => ErrorKind::ServerFault,
        }
    }

    #[must_use]
    pub const fn is_network_unreachable(&self) -> bool {
        matches!(self, Self::NetworkUnreachable { .. })
    }

    /// The backend-provided message, when the backend sent one.
    #[must_use]
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            Self::Unauthorized { message } => message.as_deref(),
            Self::ValidationFailed { message, .. } => Some(message),
            Self::NetworkUnreachable { .. } | Self::ServerFault { .. } => None,
        }
    }

    pub(crate) fn unexpected_body(status: StatusCode, detail: impl std::fmt::Display) -> Self {
        Self::ServerFault {
            status: Some(status.as_u16()),
            message: format!("unexpected response body: {detail}"),
        }
    }
}

/// Classify a transport-level failure (no response received).
pub(crate) fn classify_transport(error: &reqwest::Error) -> GatewayError {
    if error.is_builder() {
        return GatewayError::ServerFault {
            status: None,
            message: format!("invalid request: {error}"),
        };
    }

    let mut reason = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(inner) = source {
        reason.push_str(": ");
        reason.push_str(&inner.to_string());
        source = inner.source();
    }

    GatewayError::NetworkUnreachable {
        reason: verifier_utils::redact_tokens(&reason),
    }
}

/// Classify a non-success HTTP response.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> GatewayError {
    let message = extract_backend_message(body);

    if status == StatusCode::UNAUTHORIZED {
        return GatewayError::Unauthorized { message };
    }

    if status.is_client_error()
        && let Some(message) = message
    {
        return GatewayError::ValidationFailed {
            status: status.as_u16(),
            message,
        };
    }

    GatewayError::ServerFault {
        status: Some(status.as_u16()),
        message: message.unwrap_or_else(|| {
            status
                .canonical_reason()
                .map_or_else(|| format!("HTTP {}", status.as_u16()), ToString::to_string)
        }),
    }
}

/// Pull a human-readable message out of an error body.
///
/// Understands `{"detail": "..."}`, `{"error": "..."}`, `{"message": "..."}`,
/// list-valued `detail` (`[{"msg": "..."}]` or `["..."]`), and field-keyed
/// validation maps (`{"username": ["This field is required."]}`).
#[must_use]
pub fn extract_backend_message(body: &str) -> Option<String> {
    let payload: Value = serde_json::from_str(body.trim()).ok()?;
    let object = payload.as_object()?;

    for key in ["detail", "error", "message"] {
        match object.get(key) {
            Some(Value::String(text)) if !text.trim().is_empty() => {
                return Some(text.trim().to_string());
            }
            Some(Value::Array(items)) => {
                if let Some(joined) = join_messages(items) {
                    return Some(joined);
                }
            }
            _ => {}
        }
    }

    object.iter().find_map(|(field, value)| {
        let items = value.as_array()?;
        let joined = join_messages(items)?;
        if field == "non_field_errors" {
            Some(joined)
        } else {
            Some(format!("{field}: {joined}"))
        }
    })
}

fn join_messages(items: &[Value]) -> Option<String> {
    let parts: Vec<&str> = items
        .iter()
        .filter_map(|item| match item {
            Value::String(text) => Some(text.as_str()),
            Value::Object(map) => map.get("msg").and_then(Value::as_str),
            _ => None,
        })
        .filter(|text| !text.trim().is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

pub(crate) async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            break;
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
