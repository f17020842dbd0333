//! Result persister: one durable record per terminal [`SendResult`].

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::domain::{MessageText, SendResult, SenderId, normalize_digits};
use crate::store::{MessageRecord, MessageStatus, MessageStore, PROVIDER};

/// Price of one accepted SMS in account credits.
pub const DEFAULT_UNIT_PRICE: f64 = 0.05;

/// Batch-wide facts every record of the batch shares.
#[derive(Debug, Clone)]
pub struct BatchContext {
    pub user_id: String,
    pub campaign_id: Option<String>,
    pub sender_id: SenderId,
    pub message: MessageText,
}

/// Writes results to the primary message table, falling back to the
/// campaign's embedded `metadata.messages` list.
#[derive(Clone)]
pub struct ResultPersister {
    store: Arc<dyn MessageStore>,
    unit_price: f64,
}

impl ResultPersister {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            store,
            unit_price: DEFAULT_UNIT_PRICE,
        }
    }

    /// Negative prices are clamped to zero.
    pub fn with_unit_price(mut self, unit_price: f64) -> Self {
        self.unit_price = unit_price.max(0.0);
        self
    }

    pub fn unit_price(&self) -> f64 {
        self.unit_price
    }

    /// Store `result` and return the cost it incurred.
    ///
    /// The cost depends only on `result.success`; storage failures are logged
    /// and never change it.
    pub async fn persist(
        &self,
        result: &SendResult,
        ctx: &BatchContext,
        provider_response: Option<&serde_json::Value>,
    ) -> f64 {
        let cost = if result.success { self.unit_price } else { 0.0 };
        let record = self.record(result, ctx, provider_response, cost);

        let primary = match self.store.insert_message(&record).await {
            Ok(()) => {
                debug!(id = %record.id, recipient = %record.recipient, status = %record.status, "message recorded");
                return cost;
            }
            Err(err) => err,
        };

        let Some(campaign_id) = ctx.campaign_id.as_deref() else {
            error!(
                recipient = %record.recipient,
                error = %primary,
                "failed to record message and no campaign to fall back to"
            );
            return cost;
        };

        warn!(
            recipient = %record.recipient,
            campaign_id,
            error = %primary,
            "primary insert failed, appending to campaign metadata"
        );
        if let Err(err) = self.store.append_campaign_message(campaign_id, &record).await {
            error!(
                recipient = %record.recipient,
                campaign_id,
                error = %err,
                "campaign fallback failed, message not recorded"
            );
        }
        cost
    }

    fn record(
        &self,
        result: &SendResult,
        ctx: &BatchContext,
        provider_response: Option<&serde_json::Value>,
        cost: f64,
    ) -> MessageRecord {
        let now = Utc::now();
        let (status, sent_at, failed_at) = if result.success {
            (MessageStatus::Sent, Some(now), None)
        } else {
            (MessageStatus::Failed, None, Some(now))
        };

        MessageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: ctx.user_id.clone(),
            campaign_id: ctx.campaign_id.clone(),
            kind: "sms".to_owned(),
            sender: ctx.sender_id.as_str().to_owned(),
            recipient: normalize_digits(&result.recipient),
            content: ctx.message.as_str().to_owned(),
            status,
            provider: PROVIDER.to_owned(),
            provider_message_id: result.message_id.clone(),
            cost,
            sent_at,
            failed_at,
            error_message: result.error.clone(),
            metadata: json!({ "mspace_response": provider_response.cloned() }),
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::BoxFuture;
    use crate::store::{SqliteStore, StoreError};

    /// Primary table always down; fallback outcome is scripted.
    #[derive(Default)]
    struct BrokenPrimary {
        fallback_fails: bool,
        appended: Mutex<Vec<(String, MessageRecord)>>,
    }

    impl MessageStore for BrokenPrimary {
        fn insert_message<'a>(
            &'a self,
            _record: &'a MessageRecord,
        ) -> BoxFuture<'a, Result<(), StoreError>> {
            Box::pin(async {
                Err(StoreError::Database("table messages is locked".into()))
            })
        }

        fn append_campaign_message<'a>(
            &'a self,
            campaign_id: &'a str,
            record: &'a MessageRecord,
        ) -> BoxFuture<'a, Result<(), StoreError>> {
            Box::pin(async move {
                if self.fallback_fails {
                    return Err(StoreError::CampaignNotFound {
                        campaign_id: campaign_id.to_owned(),
                    });
                }
                self.appended
                    .lock()
                    .unwrap()
                    .push((campaign_id.to_owned(), record.clone()));
                Ok(())
            })
        }
    }

    fn ctx(campaign_id: Option<&str>) -> BatchContext {
        BatchContext {
            user_id: "user-1".to_owned(),
            campaign_id: campaign_id.map(str::to_owned),
            sender_id: SenderId::new("ACME").unwrap(),
            message: MessageText::new("hello").unwrap(),
        }
    }

    #[tokio::test]
    async fn success_is_recorded_with_unit_cost() {
        let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
        let persister = ResultPersister::new(store.clone()).with_unit_price(0.8);
        let raw = json!({"message": [{"messageId": "abc", "status": 111}]});

        let cost = persister
            .persist(
                &SendResult::sent("254712345678", Some("abc".to_owned())),
                &ctx(None),
                Some(&raw),
            )
            .await;

        assert_eq!(cost, 0.8);
        let records = store.messages_for_user("user-1").await.unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.status, MessageStatus::Sent);
        assert_eq!(record.kind, "sms");
        assert_eq!(record.provider, "mspace");
        assert_eq!(record.sender, "ACME");
        assert_eq!(record.content, "hello");
        assert_eq!(record.provider_message_id.as_deref(), Some("abc"));
        assert_eq!(record.cost, 0.8);
        assert!(record.sent_at.is_some());
        assert!(record.failed_at.is_none());
        assert_eq!(record.metadata["mspace_response"], raw);
    }

    #[tokio::test]
    async fn failure_costs_nothing() {
        let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
        let persister = ResultPersister::new(store.clone());

        let cost = persister
            .persist(
                &SendResult::failed("254712345678", "Failed to send message", "Insufficient balance"),
                &ctx(None),
                None,
            )
            .await;

        assert_eq!(cost, 0.0);
        let records = store.messages_for_user("user-1").await.unwrap();
        assert_eq!(records[0].status, MessageStatus::Failed);
        assert_eq!(records[0].cost, 0.0);
        assert!(records[0].failed_at.is_some());
        assert_eq!(records[0].error_message.as_deref(), Some("Insufficient balance"));
        assert!(records[0].metadata["mspace_response"].is_null());
    }

    #[tokio::test]
    async fn insert_failure_falls_back_to_campaign() {
        let store = Arc::new(BrokenPrimary::default());
        let persister = ResultPersister::new(store.clone());

        let cost = persister
            .persist(
                &SendResult::sent("254712345678", Some("abc".to_owned())),
                &ctx(Some("camp-1")),
                None,
            )
            .await;

        assert_eq!(cost, DEFAULT_UNIT_PRICE);
        let appended = store.appended.lock().unwrap();
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].0, "camp-1");
        assert_eq!(appended[0].1.recipient, "254712345678");
        assert_eq!(appended[0].1.campaign_id.as_deref(), Some("camp-1"));
    }

    #[tokio::test]
    async fn without_campaign_nothing_is_appended() {
        let store = Arc::new(BrokenPrimary::default());
        let persister = ResultPersister::new(store.clone());

        let cost = persister
            .persist(&SendResult::sent("254712345678", None), &ctx(None), None)
            .await;

        assert_eq!(cost, DEFAULT_UNIT_PRICE);
        assert!(store.appended.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn both_paths_failing_still_reports_cost() {
        let store = Arc::new(BrokenPrimary {
            fallback_fails: true,
            ..Default::default()
        });
        let persister = ResultPersister::new(store);

        let cost = persister
            .persist(&SendResult::sent("254712345678", None), &ctx(Some("gone")), None)
            .await;

        assert_eq!(cost, DEFAULT_UNIT_PRICE);
    }

    #[tokio::test]
    async fn fallback_lands_in_sqlite_campaign_metadata() {
        let sqlite = SqliteStore::open_in_memory().await.unwrap();
        sqlite.create_campaign("camp-1", "user-1").await.unwrap();
        sqlite
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("DROP TABLE messages")?;
                Ok(())
            })
            .await
            .unwrap();
        let persister = ResultPersister::new(Arc::new(sqlite.clone()));

        persister
            .persist(&SendResult::sent("254712345678", None), &ctx(Some("camp-1")), None)
            .await;

        let metadata = sqlite.campaign_metadata("camp-1").await.unwrap().unwrap();
        let messages = metadata["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["recipient"], "254712345678");
        assert_eq!(messages[0]["status"], "sent");
    }
}
