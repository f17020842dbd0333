use crate::domain::value::{DeliveryStatus, MessageId};

#[derive(Debug, Clone, PartialEq)]
pub struct SendTextResponse {
    pub entries: Vec<SendTextEntry>,
    /// Body exactly as returned by the gateway, kept for auditing.
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTextEntry {
    pub message_id: Option<MessageId>,
    pub recipient: String,
    pub status: DeliveryStatus,
    pub status_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReport {
    pub message_id: Option<MessageId>,
    pub recipient: Option<String>,
    pub status: Option<DeliveryStatus>,
    pub status_description: Option<String>,
    pub raw: serde_json::Value,
}
