//! Batch dispatcher: the inbound contract on top of the per-recipient pipeline.
//!
//! Recipients fan out through a bounded buffered stream. Each one is sent
//! (with its own retries) and persisted as soon as it reaches a terminal
//! result; the batch is billed once after the stream drains.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::client::MspaceError;
use crate::config::Config;
use crate::domain::{BatchSummary, MessageText, SendResult, SenderId, ValidationError};
use crate::ledger::CreditDebit;
use crate::persist::{BatchContext, ResultPersister};
use crate::sender::RecipientSender;
use crate::store::{CreditLedger, MessageStore};

pub const DEFAULT_CONCURRENCY: usize = 4;

/// Inbound batch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub recipients: Vec<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
}

/// Batch outcome, results in request order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub results: Vec<SendResult>,
    pub summary: BatchSummary,
    pub total_cost: f64,
    /// Whether the user's balance was charged `total_cost`.
    pub debited: bool,
}

/// Problems with the request itself; nothing was sent.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("recipients must not be empty")]
    EmptyRecipients,

    #[error("no sender id in the request and none configured")]
    MissingSenderId,

    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),
}

/// Runs a batch through send, persist and debit.
#[derive(Clone)]
pub struct Dispatcher {
    sender: RecipientSender,
    persister: ResultPersister,
    debit: CreditDebit,
    default_sender_id: Option<SenderId>,
    concurrency: usize,
    batch_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(sender: RecipientSender, persister: ResultPersister, debit: CreditDebit) -> Self {
        Self {
            sender,
            persister,
            debit,
            default_sender_id: None,
            concurrency: DEFAULT_CONCURRENCY,
            batch_timeout: None,
        }
    }

    /// Wire a dispatcher from configuration over one store that is both the
    /// message store and the credit ledger.
    pub fn from_config<S>(config: &Config, store: Arc<S>) -> Result<Self, MspaceError>
    where
        S: MessageStore + CreditLedger + 'static,
    {
        let sender =
            RecipientSender::new(config.client()?).with_max_retries(config.delivery.max_retries);
        let persister =
            ResultPersister::new(store.clone()).with_unit_price(config.billing.unit_price);
        let debit = CreditDebit::new(store);

        let mut dispatcher = Self::new(sender, persister, debit)
            .with_concurrency(config.delivery.concurrency)
            .with_batch_timeout(config.batch_timeout());
        if let Some(sender_id) = config.default_sender_id()? {
            dispatcher = dispatcher.with_default_sender_id(sender_id);
        }
        Ok(dispatcher)
    }

    pub fn with_default_sender_id(mut self, sender_id: SenderId) -> Self {
        self.default_sender_id = Some(sender_id);
        self
    }

    /// Recipients in flight at once. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_batch_timeout(mut self, batch_timeout: Option<Duration>) -> Self {
        self.batch_timeout = batch_timeout;
        self
    }

    /// Send `request` on behalf of `user_id`.
    ///
    /// Per-recipient failures are reported in the results; only a malformed
    /// request is an error.
    pub async fn send_batch(
        &self,
        user_id: &str,
        request: BatchRequest,
    ) -> Result<BatchResponse, DispatchError> {
        let ctx = self.context(user_id, &request)?;
        let deadline = self.batch_timeout.map(|timeout| Instant::now() + timeout);
        debug!(
            user_id,
            recipients = request.recipients.len(),
            campaign_id = ctx.campaign_id.as_deref(),
            "dispatching batch"
        );

        let ctx = &ctx;
        let sent: Vec<(SendResult, f64)> = futures::stream::iter(&request.recipients)
            .map(|recipient| async move {
                let outcome = self
                    .sender
                    .send_until(recipient, &ctx.message, &ctx.sender_id, deadline)
                    .await;
                let cost = self
                    .persister
                    .persist(&outcome.result, ctx, outcome.provider_response.as_ref())
                    .await;
                (outcome.result, cost)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let total_cost: f64 = sent.iter().map(|(_, cost)| cost).sum();
        let results: Vec<SendResult> = sent.into_iter().map(|(result, _)| result).collect();
        let summary = BatchSummary::from_results(&results);
        let debited = self.debit.debit(user_id, total_cost).await;

        info!(
            user_id,
            successful = summary.successful,
            failed = summary.failed,
            total = summary.total,
            total_cost,
            debited,
            "batch complete"
        );

        Ok(BatchResponse {
            results,
            summary,
            total_cost,
            debited,
        })
    }

    fn context(&self, user_id: &str, request: &BatchRequest) -> Result<BatchContext, DispatchError> {
        if request.recipients.is_empty() {
            return Err(DispatchError::EmptyRecipients);
        }
        let message = MessageText::new(request.message.as_str())?;
        let sender_id = match request.sender_id.as_deref() {
            Some(sender_id) => SenderId::new(sender_id)?,
            None => self
                .default_sender_id
                .clone()
                .ok_or(DispatchError::MissingSenderId)?,
        };
        let campaign_id = request
            .campaign_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_owned);

        Ok(BatchContext {
            user_id: user_id.to_owned(),
            campaign_id,
            sender_id,
            message,
        })
    }
}
