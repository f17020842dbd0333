//! Transport layer: HTTP and wire-format details (serialization/deserialization).

mod delivery_report;
mod send_text;

pub use delivery_report::{decode_delivery_report_response, encode_delivery_report_body};
pub use send_text::{decode_send_text_response, encode_send_text_body};

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid JSON response: {0}")]
    Json(#[from] serde_json::Error),

    /// The gateway answered without a `message` array; `text` is whatever it said instead.
    #[error("provider error: {text}")]
    Provider { text: String },

    #[error("response contains no delivery entries")]
    NoEntries,
}

/// `message` is an array of entries on success and sometimes a bare string on failure.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TransportMessage<T> {
    Entries(Vec<T>),
    Text(String),
}

#[derive(Debug, Clone, Deserialize)]
struct TransportEnvelope<T> {
    message: Option<TransportMessage<T>>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TransportStatus {
    Number(i64),
    String(String),
}

impl TransportStatus {
    fn into_code(self) -> Option<i64> {
        match self {
            Self::Number(value) => Some(value),
            Self::String(value) => value.trim().parse().ok(),
        }
    }
}

/// Id fields arrive as strings or bare numbers depending on the gateway build.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TransportId {
    String(String),
    Number(serde_json::Number),
}

impl TransportId {
    fn into_string(self) -> String {
        match self {
            Self::String(value) => value,
            Self::Number(value) => value.to_string(),
        }
    }
}

fn into_entries<T>(envelope: TransportEnvelope<T>) -> Result<Vec<T>, TransportError> {
    match envelope.message {
        Some(TransportMessage::Entries(entries)) if !entries.is_empty() => Ok(entries),
        Some(TransportMessage::Entries(_)) => Err(TransportError::NoEntries),
        Some(TransportMessage::Text(text)) => Err(TransportError::Provider { text }),
        None => match envelope.error {
            Some(text) => Err(TransportError::Provider { text }),
            None => Err(TransportError::NoEntries),
        },
    }
}
