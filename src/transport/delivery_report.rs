use serde::{Deserialize, Serialize};

use super::{TransportEnvelope, TransportError, TransportId, TransportStatus, into_entries};
use crate::domain::{DeliveryReport, DeliveryReportRequest, DeliveryStatus, MessageId, Username};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeliveryReportBody<'a> {
    username: &'a str,
    message_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeliveryReportJsonEntry {
    #[serde(default)]
    message_id: Option<TransportId>,
    #[serde(default)]
    recipient: Option<TransportId>,
    #[serde(default)]
    status: Option<TransportStatus>,
    #[serde(default)]
    status_description: Option<String>,
}

pub fn encode_delivery_report_body(
    username: &Username,
    request: &DeliveryReportRequest,
) -> serde_json::Value {
    serde_json::json!(DeliveryReportBody {
        username: username.as_str(),
        message_id: request.message_id().as_str(),
    })
}

/// Decode a `deliveryreport` body; the first entry is the report.
pub fn decode_delivery_report_response(json: &str) -> Result<DeliveryReport, TransportError> {
    let raw: serde_json::Value = serde_json::from_str(json)?;
    let envelope: TransportEnvelope<DeliveryReportJsonEntry> =
        serde_json::from_value(raw.clone())?;

    let first = into_entries(envelope)?
        .into_iter()
        .next()
        .ok_or(TransportError::NoEntries)?;

    let first_raw = raw
        .get("message")
        .and_then(|message| message.get(0))
        .cloned()
        .unwrap_or(serde_json::Value::Null);

    Ok(DeliveryReport {
        message_id: first
            .message_id
            .and_then(|id| MessageId::new(id.into_string()).ok()),
        recipient: first.recipient.map(TransportId::into_string),
        status: first
            .status
            .and_then(TransportStatus::into_code)
            .map(DeliveryStatus::new),
        status_description: first.status_description,
        raw: first_raw,
    })
}
