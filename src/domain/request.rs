use crate::domain::value::{MessageId, MessageText, Recipient, SenderId};

/// One `sendtext` call: a single message to a single recipient.
#[derive(Debug, Clone)]
pub struct SendText {
    recipient: Recipient,
    message: MessageText,
    sender_id: SenderId,
}

impl SendText {
    pub fn new(recipient: Recipient, message: MessageText, sender_id: SenderId) -> Self {
        Self {
            recipient,
            message,
            sender_id,
        }
    }

    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    pub fn message(&self) -> &MessageText {
        &self.message
    }

    pub fn sender_id(&self) -> &SenderId {
        &self.sender_id
    }
}

/// One `deliveryreport` lookup.
#[derive(Debug, Clone)]
pub struct DeliveryReportRequest {
    message_id: MessageId,
}

impl DeliveryReportRequest {
    pub fn new(message_id: MessageId) -> Self {
        Self { message_id }
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }
}
