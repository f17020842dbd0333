//! Domain layer: strong types with validation and invariants (no I/O).

mod request;
mod response;
mod result;
mod validation;
mod value;

pub use request::{DeliveryReportRequest, SendText};
pub use response::{DeliveryReport, SendTextEntry, SendTextResponse};
pub use result::{BatchSummary, SendResult};
pub use validation::ValidationError;
pub use value::{
    ApiKey, DeliveryStatus, MessageId, MessageText, Recipient, SenderId, Username,
    normalize_digits,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_rejects_empty() {
        assert!(matches!(
            ApiKey::new("   "),
            Err(ValidationError::Empty {
                field: ApiKey::HEADER
            })
        ));
    }

    #[test]
    fn send_text_keeps_normalized_recipient() {
        let request = SendText::new(
            Recipient::new("+254 712 345 678").unwrap(),
            MessageText::new("hello").unwrap(),
            SenderId::new("ACME").unwrap(),
        );
        assert_eq!(request.recipient().digits(), "254712345678");
        assert_eq!(request.message().as_str(), "hello");
        assert_eq!(request.sender_id().as_str(), "ACME");
    }

    #[test]
    fn normalize_digits_drops_everything_else() {
        assert_eq!(normalize_digits("(0712) 345-678"), "0712345678");
        assert_eq!(normalize_digits("abc"), "");
    }
}
