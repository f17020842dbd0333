//! Per-recipient sender: one message, one recipient, bounded retries.

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::classify::{
    DEFAULT_MAX_RETRIES, EnhancedError, ProviderFailure, classify, retry_delay, should_retry,
};
use crate::client::MspaceClient;
use crate::domain::{
    MessageText, Recipient, SendResult, SendText, SendTextResponse, SenderId,
};

const EXHAUSTED: &str = "All retry attempts failed";
const FAILED: &str = "Failed to send message";

/// Everything the sender learned about one recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct SendOutcome {
    pub result: SendResult,
    /// Number of gateway calls made; zero when the recipient was rejected locally.
    pub attempts: u32,
    /// Last gateway payload (or classified error details), kept for auditing.
    pub provider_response: Option<serde_json::Value>,
}

/// Sends one message to one recipient, retrying classified transient failures.
///
/// Never fails: every path ends in a [`SendOutcome`].
#[derive(Clone)]
pub struct RecipientSender {
    client: MspaceClient,
    max_retries: u32,
}

enum Attempt {
    Done(SendResult, serde_json::Value),
    Failed(EnhancedError),
}

impl RecipientSender {
    pub fn new(client: MspaceClient) -> Self {
        Self {
            client,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Cap on gateway calls per recipient. Zero is treated as one.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn client(&self) -> &MspaceClient {
        &self.client
    }

    /// Send without a deadline.
    pub async fn send(
        &self,
        recipient: &str,
        message: &MessageText,
        sender_id: &SenderId,
    ) -> SendOutcome {
        self.send_until(recipient, message, sender_id, None).await
    }

    /// Send, giving up with a `TIMEOUT` failure once `deadline` passes.
    ///
    /// The deadline bounds both in-flight requests and backoff sleeps.
    ///
    /// The failure message tells which cap stopped the loop. `RATE_LIMITED`
    /// and `SERVER_ERROR` have their own caps below `max_retries`, so
    /// hitting them ends with "Failed to send message", like any other
    /// error `should_retry` refuses. Only errors still retryable after the
    /// last allowed attempt (`NETWORK_ERROR`, `TIMEOUT`, retryable
    /// `HTTP_ERROR`) end with "All retry attempts failed".
    pub async fn send_until(
        &self,
        recipient: &str,
        message: &MessageText,
        sender_id: &SenderId,
        deadline: Option<Instant>,
    ) -> SendOutcome {
        let recipient = match Recipient::new(recipient) {
            Ok(recipient) => recipient,
            Err(err) => {
                warn!(recipient, "rejecting recipient without digits");
                return SendOutcome {
                    result: SendResult::failed(recipient, "Invalid recipient", err.to_string()),
                    attempts: 0,
                    provider_response: None,
                };
            }
        };
        let request = SendText::new(recipient, message.clone(), sender_id.clone());
        let digits = request.recipient().digits().to_owned();

        let mut last_error = None;
        let mut attempts = 0;

        for attempt in 0..self.max_retries {
            attempts += 1;
            debug!(recipient = %digits, attempt, "sending message");

            let error = match self.attempt(&request, deadline).await {
                Attempt::Done(result, raw) => {
                    return SendOutcome {
                        result,
                        attempts,
                        provider_response: Some(raw),
                    };
                }
                Attempt::Failed(error) => error,
            };

            if !should_retry(&error, attempt, self.max_retries) {
                warn!(
                    recipient = %digits,
                    attempt,
                    code = %error.code,
                    error = %error.message,
                    "send failed, not retrying"
                );
                return failure(&digits, FAILED, error, attempts);
            }
            if attempt + 1 >= self.max_retries {
                last_error = Some(error);
                break;
            }

            let delay = retry_delay(&error, attempt);
            if let Some(deadline) = deadline {
                if Instant::now() + delay >= deadline {
                    warn!(recipient = %digits, attempt, "deadline leaves no room for a retry");
                    return failure(&digits, FAILED, deadline_error(), attempts);
                }
            }
            warn!(
                recipient = %digits,
                attempt,
                code = %error.code,
                delay_ms = delay.as_millis() as u64,
                "transient send failure, will retry"
            );
            tokio::time::sleep(delay).await;
        }

        let error = last_error.unwrap_or_else(|| {
            classify(
                &ProviderFailure::Other {
                    message: EXHAUSTED.to_owned(),
                },
                "sendtext",
            )
        });
        warn!(recipient = %digits, attempts, code = %error.code, "retries exhausted");
        failure(&digits, EXHAUSTED, error, attempts)
    }

    async fn attempt(&self, request: &SendText, deadline: Option<Instant>) -> Attempt {
        let call = self.client.send_text(request);
        let response = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, call).await {
                Ok(response) => response,
                Err(_) => return Attempt::Failed(deadline_error()),
            },
            None => call.await,
        };

        match response {
            Ok(response) => interpret(request.recipient(), response),
            Err(err) => Attempt::Failed(classify(&ProviderFailure::from(&err), "sendtext")),
        }
    }
}

/// Read the entry addressed to `recipient` out of a well-formed `sendtext` answer.
fn interpret(recipient: &Recipient, response: SendTextResponse) -> Attempt {
    let SendTextResponse { entries, raw } = response;
    let entry = match entries.iter().position(|entry| recipient.matches(&entry.recipient)) {
        Some(index) => entries.into_iter().nth(index),
        // A lone entry is ours even when the gateway reformats the number.
        None if entries.len() == 1 => entries.into_iter().next(),
        None => None,
    };

    let Some(entry) = entry else {
        return Attempt::Done(
            SendResult::failed(
                recipient.digits(),
                FAILED,
                "No delivery entry for recipient in gateway response",
            ),
            raw,
        );
    };

    if entry.status.is_accepted() {
        let message_id = entry.message_id.map(|id| id.as_str().to_owned());
        return Attempt::Done(SendResult::sent(recipient.digits(), message_id), raw);
    }

    let reason = entry
        .status_description
        .unwrap_or_else(|| format!("Gateway status {}", entry.status.as_i64()));
    Attempt::Done(SendResult::failed(recipient.digits(), reason.clone(), reason), raw)
}

fn deadline_error() -> EnhancedError {
    classify(
        &ProviderFailure::Timeout {
            message: "Batch deadline exceeded".to_owned(),
        },
        "sendtext",
    )
}

fn failure(digits: &str, message: &str, error: EnhancedError, attempts: u32) -> SendOutcome {
    SendOutcome {
        result: SendResult::failed(digits, message, error.message.clone()),
        attempts,
        provider_response: error.details,
    }
}
