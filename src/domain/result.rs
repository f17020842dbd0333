use serde::{Deserialize, Serialize};

/// Terminal outcome of sending one message to one recipient.
///
/// Serialized with camelCase keys, which is the shape the calling application
/// renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    pub recipient: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendResult {
    pub fn sent(recipient: impl Into<String>, message_id: Option<String>) -> Self {
        Self {
            recipient: recipient.into(),
            success: true,
            message_id,
            message: "Message sent successfully".to_owned(),
            error: None,
        }
    }

    pub fn failed(
        recipient: impl Into<String>,
        message: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            success: false,
            message_id: None,
            message: message.into(),
            error: Some(error.into()),
        }
    }
}

/// Aggregate counts for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub successful: usize,
    pub failed: usize,
    pub total: usize,
}

impl BatchSummary {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a SendResult>) -> Self {
        results
            .into_iter()
            .fold(Self::default(), |mut summary, result| {
                if result.success {
                    summary.successful += 1;
                } else {
                    summary.failed += 1;
                }
                summary.total += 1;
                summary
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_result_serializes_camel_case_and_skips_empty_fields() {
        let ok = SendResult::sent("254712345678", Some("abc".to_owned()));
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "recipient": "254712345678",
                "success": true,
                "messageId": "abc",
                "message": "Message sent successfully"
            })
        );

        let failed = SendResult::failed("254700000000", "Failed to send", "boom");
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["error"], "boom");
        assert!(json.get("messageId").is_none());
    }

    #[test]
    fn summary_counts_successes_and_failures() {
        let results = vec![
            SendResult::sent("1", None),
            SendResult::failed("2", "Failed to send", "x"),
            SendResult::sent("3", None),
        ];
        let summary = BatchSummary::from_results(&results);
        assert_eq!(
            summary,
            BatchSummary {
                successful: 2,
                failed: 1,
                total: 3
            }
        );
    }
}
