use serde::{Deserialize, Serialize};

use super::{TransportEnvelope, TransportError, TransportId, TransportStatus, into_entries};
use crate::domain::{DeliveryStatus, MessageId, SendText, SendTextEntry, SendTextResponse, Username};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendTextBody<'a> {
    username: &'a str,
    sender_id: &'a str,
    recipient: &'a str,
    message: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendTextJsonEntry {
    #[serde(default)]
    message_id: Option<TransportId>,
    #[serde(default)]
    recipient: Option<TransportId>,
    status: TransportStatus,
    #[serde(default)]
    status_description: Option<String>,
}

pub fn encode_send_text_body(username: &Username, request: &SendText) -> serde_json::Value {
    let body = SendTextBody {
        username: username.as_str(),
        sender_id: request.sender_id().as_str(),
        recipient: request.recipient().digits(),
        message: request.message().as_str(),
    };
    serde_json::json!(body)
}

pub fn decode_send_text_response(json: &str) -> Result<SendTextResponse, TransportError> {
    let raw: serde_json::Value = serde_json::from_str(json)?;
    let envelope: TransportEnvelope<SendTextJsonEntry> = serde_json::from_value(raw.clone())?;

    let entries = into_entries(envelope)?
        .into_iter()
        .map(|entry| SendTextEntry {
            message_id: entry
                .message_id
                .and_then(|id| MessageId::new(id.into_string()).ok()),
            recipient: entry
                .recipient
                .map(TransportId::into_string)
                .unwrap_or_default(),
            // Unparseable status strings never equal the accepted code.
            status: DeliveryStatus::new(entry.status.into_code().unwrap_or(-1)),
            status_description: entry.status_description,
        })
        .collect();

    Ok(SendTextResponse { entries, raw })
}
