//! Uniform result contract for every outbound operation.

use serde::{Deserialize, Serialize};

/// Message used when no HTTP response was ever received.
pub const NETWORK_FAILURE_MESSAGE: &str = "Network error or server unavailable";

/// Message used when an error response carries no usable message field.
pub const GENERIC_FAILURE_MESSAGE: &str = "An error occurred";

/// Message returned when an identity-bound call has no cached identity.
pub const MISSING_IDENTITY_MESSAGE: &str = "User ID is required";

/// `{success, data?, message?, statusCode}` — what every public operation
/// resolves to. Nothing else escapes to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// HTTP status, or 0 when no response was received.
    pub status_code: u16,
}

/// Failure classes, derived from the status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 401: the credential has been evicted.
    Authorization,
    /// Other 4xx.
    Client,
    /// 5xx.
    Server,
    /// No HTTP response at all.
    Connection,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, status_code: u16) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            status_code,
        }
    }

    pub fn ok_empty(status_code: u16) -> Self {
        Self {
            success: true,
            data: None,
            message: None,
            status_code,
        }
    }

    pub fn failure(message: impl Into<String>, status_code: u16) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            status_code,
        }
    }

    /// Transport gave up without any HTTP response.
    pub fn network_failure() -> Self {
        Self::failure(NETWORK_FAILURE_MESSAGE, 0)
    }

    /// Synthesized locally when no identity id is cached.
    pub fn missing_identity() -> Self {
        Self::failure(MISSING_IDENTITY_MESSAGE, 400)
    }

    /// Build a failure from an HTTP error response body: `errorMessage`,
    /// then `message`, then a generic text.
    pub fn from_error_body(status_code: u16, body: &serde_json::Value) -> Self {
        let message = ["errorMessage", "message"]
            .iter()
            .find_map(|key| body.get(key).and_then(|v| v.as_str()).filter(|m| !m.is_empty()))
            .unwrap_or(GENERIC_FAILURE_MESSAGE);
        Self::failure(message, status_code)
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        if self.success {
            return None;
        }
        Some(match self.status_code {
            0 => FailureKind::Connection,
            401 => FailureKind::Authorization,
            500..=599 => FailureKind::Server,
            _ => FailureKind::Client,
        })
    }

    /// Message to show when the call failed, with a caller-supplied fallback.
    pub fn message_or(&self, fallback: &str) -> String {
        self.message.clone().unwrap_or_else(|| fallback.to_string())
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            success: self.success,
            data: self.data.map(f),
            message: self.message,
            status_code: self.status_code,
        }
    }

    /// Keep the outcome, drop the payload.
    pub fn discard(self) -> ApiResponse<()> {
        ApiResponse {
            success: self.success,
            data: None,
            message: self.message,
            status_code: self.status_code,
        }
    }
}
