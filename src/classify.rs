//! Error classification for failed gateway calls.
//!
//! A raw failure (network error, non-2xx answer, or an error text in the body)
//! is mapped onto a closed set of [`ErrorCode`]s. Each code carries a
//! retryability verdict and drives the backoff schedule used by the sender.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::MspaceError;

/// Default number of attempts per recipient.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const MIN_DELAY_MS: f64 = 1_000.0;
const MAX_DELAY_MS: f64 = 10_000.0;
const RATE_LIMIT_BASE_MS: f64 = 5_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NetworkError,
    InvalidCredentials,
    InsufficientBalance,
    RateLimited,
    ServerError,
    HttpError,
    InvalidRecipient,
    Timeout,
    UnknownError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NetworkError => "NETWORK_ERROR",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::InsufficientBalance => "INSUFFICIENT_BALANCE",
            Self::RateLimited => "RATE_LIMITED",
            Self::ServerError => "SERVER_ERROR",
            Self::HttpError => "HTTP_ERROR",
            Self::InvalidRecipient => "INVALID_RECIPIENT",
            Self::Timeout => "TIMEOUT",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw failure of one gateway call, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderFailure {
    /// The request never reached the gateway (refused, DNS, TLS, reset).
    Network { message: String },
    /// The request or the batch deadline ran out.
    Timeout { message: String },
    /// The gateway answered with a non-2xx status.
    Http { status: u16, body: Option<String> },
    /// Anything else: malformed body, or an error text where entries were expected.
    Other { message: String },
}

impl ProviderFailure {
    fn text(&self) -> String {
        match self {
            Self::Network { message } | Self::Timeout { message } | Self::Other { message } => {
                message.clone()
            }
            Self::Http { status, body } => match body {
                Some(body) => format!("HTTP {status}: {body}"),
                None => format!("HTTP {status}"),
            },
        }
    }
}

impl From<&MspaceError> for ProviderFailure {
    fn from(value: &MspaceError) -> Self {
        match value {
            MspaceError::Transport(source) => {
                let message = source.to_string();
                match source.downcast_ref::<reqwest::Error>() {
                    Some(err) if err.is_timeout() => Self::Timeout { message },
                    _ => Self::Network { message },
                }
            }
            MspaceError::HttpStatus { status, body } => Self::Http {
                status: *status,
                body: body.clone(),
            },
            MspaceError::Api { message } => Self::Other {
                message: message.clone(),
            },
            other => Self::Other {
                message: other.to_string(),
            },
        }
    }
}

/// A classified failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub retryable: bool,
    pub http_status: u16,
}

impl fmt::Display for EnhancedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Map a raw failure onto an [`EnhancedError`]. Rules are ordered; the first match wins.
///
/// HTTP status always wins over wording in the body. Wording is only consulted for
/// failures that carry no status, and is matched case-insensitively.
pub fn classify(failure: &ProviderFailure, context: &str) -> EnhancedError {
    let message = failure.text();
    let (code, retryable, http_status) = match failure {
        ProviderFailure::Network { .. } => (ErrorCode::NetworkError, true, 503),
        ProviderFailure::Http { status, .. } => match *status {
            401 => (ErrorCode::InvalidCredentials, false, 401),
            402 => (ErrorCode::InsufficientBalance, false, 402),
            429 => (ErrorCode::RateLimited, true, 429),
            500 | 502 | 503 | 504 => (ErrorCode::ServerError, true, *status),
            other => (ErrorCode::HttpError, other >= 500, other),
        },
        ProviderFailure::Timeout { .. } => (ErrorCode::Timeout, true, 408),
        ProviderFailure::Other { .. } => classify_text(&message),
    };

    EnhancedError {
        code,
        message,
        details: Some(details(failure, context)),
        retryable,
        http_status,
    }
}

fn classify_text(message: &str) -> (ErrorCode, bool, u16) {
    let lower = message.to_lowercase();
    if lower.contains("invalid recipient") || lower.contains("invalid phone") {
        (ErrorCode::InvalidRecipient, false, 400)
    } else if lower.contains("insufficient") || lower.contains("balance") {
        (ErrorCode::InsufficientBalance, false, 402)
    } else if lower.contains("timeout") {
        (ErrorCode::Timeout, true, 408)
    } else {
        (ErrorCode::UnknownError, false, 500)
    }
}

fn details(failure: &ProviderFailure, context: &str) -> serde_json::Value {
    let mut details = serde_json::json!({ "context": context });
    if let ProviderFailure::Http {
        body: Some(body), ..
    } = failure
    {
        details["body"] = serde_json::from_str(body)
            .unwrap_or_else(|_| serde_json::Value::String(body.clone()));
    }
    details
}

/// Whether the attempt at zero-based index `attempt_count` should be followed by another.
pub fn should_retry(error: &EnhancedError, attempt_count: u32, max_retries: u32) -> bool {
    if attempt_count >= max_retries || !error.retryable {
        return false;
    }
    match error.code {
        ErrorCode::RateLimited => attempt_count < 2,
        ErrorCode::ServerError => attempt_count < max_retries.min(2),
        ErrorCode::NetworkError | ErrorCode::Timeout => attempt_count < max_retries,
        _ => error.retryable && attempt_count < max_retries,
    }
}

/// Backoff before the retry that follows attempt `attempt_count`; always within 1s..=10s.
pub fn retry_delay(error: &EnhancedError, attempt_count: u32) -> Duration {
    let exponent = attempt_count.min(64) as i32;
    let millis = match error.code {
        ErrorCode::RateLimited => RATE_LIMIT_BASE_MS * 2f64.powi(exponent),
        ErrorCode::ServerError => MIN_DELAY_MS * 1.5f64.powi(exponent),
        _ => MIN_DELAY_MS * 2f64.powi(exponent),
    };
    Duration::from_millis(millis.clamp(MIN_DELAY_MS, MAX_DELAY_MS) as u64)
}
