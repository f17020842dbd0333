//! SQLite implementation of the storage seams.
//!
//! All statements run on the single tokio-rusqlite background thread, so each
//! `call` closure executes without interleaving with any other.

use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use tracing::debug;

use super::{CreditLedger, MessageRecord, MessageStatus, MessageStore, StoreError};
use crate::BoxFuture;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY NOT NULL,
        user_id TEXT NOT NULL,
        campaign_id TEXT,
        type TEXT NOT NULL DEFAULT 'sms',
        sender TEXT NOT NULL,
        recipient TEXT NOT NULL,
        content TEXT NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('sent', 'failed')),
        provider TEXT NOT NULL,
        provider_message_id TEXT,
        cost REAL NOT NULL DEFAULT 0.0,
        sent_at TEXT,
        failed_at TEXT,
        error_message TEXT,
        metadata TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_messages_user ON messages(user_id);
    CREATE INDEX IF NOT EXISTS idx_messages_campaign ON messages(campaign_id);

    CREATE TABLE IF NOT EXISTS campaigns (
        id TEXT PRIMARY KEY NOT NULL,
        user_id TEXT NOT NULL,
        metadata TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS user_credits (
        user_id TEXT PRIMARY KEY NOT NULL,
        balance REAL NOT NULL DEFAULT 0.0,
        updated_at TEXT NOT NULL
    );
";

/// Convert a tokio-rusqlite error into [`StoreError::Database`].
fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> StoreError {
    StoreError::Database(Box::new(e))
}

/// SQLite-backed message store and credit ledger.
#[derive(Clone)]
pub struct SqliteStore {
    conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
    /// Open (or create) a database file and apply the schema.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| StoreError::Database(Box::new(e)))?;
        Self::with_connection(conn).await
    }

    /// Open a private in-memory database with the schema applied.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| StoreError::Database(Box::new(e)))?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: tokio_rusqlite::Connection) -> Result<Self, StoreError> {
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
        debug!("SQLite store schema ready");
        Ok(Self { conn })
    }

    /// The underlying connection, for maintenance statements.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Create a campaign with empty metadata.
    pub async fn create_campaign(&self, campaign_id: &str, user_id: &str) -> Result<(), StoreError> {
        let campaign_id = campaign_id.to_owned();
        let user_id = user_id.to_owned();
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO campaigns (id, user_id, metadata, created_at) VALUES (?1, ?2, '{}', ?3)",
                    params![campaign_id, user_id, Utc::now()],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Campaign metadata, or `None` when the campaign does not exist.
    pub async fn campaign_metadata(
        &self,
        campaign_id: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let campaign_id = campaign_id.to_owned();
        self.conn
            .call(move |conn| -> Result<Option<serde_json::Value>, rusqlite::Error> {
                conn.query_row(
                    "SELECT metadata FROM campaigns WHERE id = ?1",
                    params![campaign_id],
                    |row| row.get(0),
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)
    }

    /// Create or overwrite a user's credit balance.
    pub async fn set_balance(&self, user_id: &str, balance: f64) -> Result<(), StoreError> {
        let user_id = user_id.to_owned();
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO user_credits (user_id, balance, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(user_id) DO UPDATE SET balance = excluded.balance,
                                                        updated_at = excluded.updated_at",
                    params![user_id, balance, Utc::now()],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Current balance, or `None` when the user has no credit account.
    pub async fn balance(&self, user_id: &str) -> Result<Option<f64>, StoreError> {
        let user_id = user_id.to_owned();
        self.conn
            .call(move |conn| -> Result<Option<f64>, rusqlite::Error> {
                conn.query_row(
                    "SELECT balance FROM user_credits WHERE user_id = ?1",
                    params![user_id],
                    |row| row.get(0),
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)
    }

    /// All records for a user in insertion order.
    pub async fn messages_for_user(&self, user_id: &str) -> Result<Vec<MessageRecord>, StoreError> {
        let user_id = user_id.to_owned();
        self.conn
            .call(move |conn| -> Result<Vec<MessageRecord>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, campaign_id, type, sender, recipient, content, status,
                            provider, provider_message_id, cost, sent_at, failed_at,
                            error_message, metadata, created_at
                     FROM messages WHERE user_id = ?1 ORDER BY rowid ASC",
                )?;
                let rows = stmt.query_map(params![user_id], |row| {
                    let status: String = row.get(7)?;
                    let status = status.parse::<MessageStatus>().map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            7,
                            rusqlite::types::Type::Text,
                            e.into(),
                        )
                    })?;
                    Ok(MessageRecord {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        campaign_id: row.get(2)?,
                        kind: row.get(3)?,
                        sender: row.get(4)?,
                        recipient: row.get(5)?,
                        content: row.get(6)?,
                        status,
                        provider: row.get(8)?,
                        provider_message_id: row.get(9)?,
                        cost: row.get(10)?,
                        sent_at: row.get(11)?,
                        failed_at: row.get(12)?,
                        error_message: row.get(13)?,
                        metadata: row.get(14)?,
                        created_at: row.get(15)?,
                    })
                })?;
                let records = rows.collect::<Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await
            .map_err(map_tr_err)
    }
}

impl MessageStore for SqliteStore {
    fn insert_message<'a>(
        &'a self,
        record: &'a MessageRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let record = record.clone();
            self.conn
                .call(move |conn| -> Result<(), rusqlite::Error> {
                    conn.execute(
                        "INSERT INTO messages (id, user_id, campaign_id, type, sender, recipient,
                             content, status, provider, provider_message_id, cost, sent_at,
                             failed_at, error_message, metadata, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                        params![
                            record.id,
                            record.user_id,
                            record.campaign_id,
                            record.kind,
                            record.sender,
                            record.recipient,
                            record.content,
                            record.status.as_str(),
                            record.provider,
                            record.provider_message_id,
                            record.cost,
                            record.sent_at,
                            record.failed_at,
                            record.error_message,
                            record.metadata,
                            record.created_at,
                        ],
                    )?;
                    Ok(())
                })
                .await
                .map_err(map_tr_err)
        })
    }

    fn append_campaign_message<'a>(
        &'a self,
        campaign_id: &'a str,
        record: &'a MessageRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let entry = serde_json::to_value(record)?;
            let id = campaign_id.to_owned();
            let found = self
                .conn
                .call(move |conn| -> Result<bool, rusqlite::Error> {
                    let tx = conn.transaction()?;
                    let metadata: Option<serde_json::Value> = tx
                        .query_row(
                            "SELECT metadata FROM campaigns WHERE id = ?1",
                            params![id],
                            |row| row.get(0),
                        )
                        .optional()?;
                    let Some(metadata) = metadata else {
                        return Ok(false);
                    };

                    let metadata = with_appended_message(metadata, entry);
                    tx.execute(
                        "UPDATE campaigns SET metadata = ?2 WHERE id = ?1",
                        params![id, metadata],
                    )?;
                    tx.commit()?;
                    Ok(true)
                })
                .await
                .map_err(map_tr_err)?;

            if !found {
                return Err(StoreError::CampaignNotFound {
                    campaign_id: campaign_id.to_owned(),
                });
            }
            Ok(())
        })
    }
}

fn with_appended_message(metadata: serde_json::Value, entry: serde_json::Value) -> serde_json::Value {
    let mut object = match metadata {
        serde_json::Value::Object(object) => object,
        _ => serde_json::Map::new(),
    };
    let messages = object
        .entry("messages")
        .or_insert_with(|| serde_json::Value::Array(Vec::new()));
    if !messages.is_array() {
        *messages = serde_json::Value::Array(Vec::new());
    }
    if let serde_json::Value::Array(items) = messages {
        items.push(entry);
    }
    serde_json::Value::Object(object)
}

impl CreditLedger for SqliteStore {
    fn deduct_credits<'a>(
        &'a self,
        user_id: &'a str,
        amount: f64,
    ) -> BoxFuture<'a, Result<f64, StoreError>> {
        Box::pin(async move {
            let id = user_id.to_owned();
            let balance = self
                .conn
                .call(move |conn| -> Result<Option<f64>, rusqlite::Error> {
                    conn.query_row(
                        "UPDATE user_credits SET balance = balance - ?2, updated_at = ?3
                         WHERE user_id = ?1 RETURNING balance",
                        params![id, amount, Utc::now()],
                        |row| row.get(0),
                    )
                    .optional()
                })
                .await
                .map_err(map_tr_err)?;

            balance.ok_or_else(|| StoreError::AccountNotFound {
                user_id: user_id.to_owned(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::store::PROVIDER;

    fn record(user_id: &str, campaign_id: Option<&str>, status: MessageStatus) -> MessageRecord {
        let now = Utc::now();
        MessageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_owned(),
            campaign_id: campaign_id.map(str::to_owned),
            kind: "sms".to_owned(),
            sender: "ACME".to_owned(),
            recipient: "254712345678".to_owned(),
            content: "hello".to_owned(),
            status,
            provider: PROVIDER.to_owned(),
            provider_message_id: Some("abc".to_owned()),
            cost: if status == MessageStatus::Sent { 0.05 } else { 0.0 },
            sent_at: (status == MessageStatus::Sent).then_some(now),
            failed_at: (status == MessageStatus::Failed).then_some(now),
            error_message: None,
            metadata: serde_json::json!({ "mspace_response": { "message": [] } }),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn insert_and_read_back_messages() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let sent = record("user-1", None, MessageStatus::Sent);
        let failed = record("user-1", Some("camp-1"), MessageStatus::Failed);
        store.insert_message(&sent).await.unwrap();
        store.insert_message(&failed).await.unwrap();
        store
            .insert_message(&record("user-2", None, MessageStatus::Sent))
            .await
            .unwrap();

        let rows = store.messages_for_user("user-1").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, sent.id);
        assert_eq!(rows[0].status, MessageStatus::Sent);
        assert_eq!(rows[0].metadata, sent.metadata);
        assert!(rows[0].sent_at.is_some());
        assert_eq!(rows[1].campaign_id.as_deref(), Some("camp-1"));
        assert_eq!(rows[1].status, MessageStatus::Failed);
        assert!(rows[1].failed_at.is_some());
    }

    #[tokio::test]
    async fn append_campaign_message_accumulates_in_metadata() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.create_campaign("camp-1", "user-1").await.unwrap();

        let first = record("user-1", Some("camp-1"), MessageStatus::Sent);
        let second = record("user-1", Some("camp-1"), MessageStatus::Failed);
        store.append_campaign_message("camp-1", &first).await.unwrap();
        store.append_campaign_message("camp-1", &second).await.unwrap();

        let metadata = store.campaign_metadata("camp-1").await.unwrap().unwrap();
        let messages = metadata["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["id"], first.id.as_str());
        assert_eq!(messages[1]["status"], "failed");
    }

    #[tokio::test]
    async fn append_to_missing_campaign_fails() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let err = store
            .append_campaign_message("nope", &record("user-1", Some("nope"), MessageStatus::Sent))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::CampaignNotFound { campaign_id } if campaign_id == "nope"));
    }

    #[tokio::test]
    async fn concurrent_appends_do_not_lose_updates() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.create_campaign("camp-1", "user-1").await.unwrap();

        let records: Vec<_> = (0..20)
            .map(|_| record("user-1", Some("camp-1"), MessageStatus::Sent))
            .collect();
        let appends = records
            .iter()
            .map(|record| store.append_campaign_message("camp-1", record));
        for result in futures::future::join_all(appends).await {
            result.unwrap();
        }

        let metadata = store.campaign_metadata("camp-1").await.unwrap().unwrap();
        assert_eq!(metadata["messages"].as_array().unwrap().len(), 20);
    }

    #[tokio::test]
    async fn deduct_credits_is_a_single_decrement() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.set_balance("user-1", 10.0).await.unwrap();

        let balance = store.deduct_credits("user-1", 0.15).await.unwrap();
        assert!((balance - 9.85).abs() < 1e-9, "got {balance}");
        let stored = store.balance("user-1").await.unwrap().unwrap();
        assert!((stored - 9.85).abs() < 1e-9);
    }

    #[tokio::test]
    async fn deduct_credits_for_unknown_user_fails() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let err = store.deduct_credits("ghost", 1.0).await.unwrap_err();
        assert!(matches!(err, StoreError::AccountNotFound { .. }));
        assert_eq!(store.balance("ghost").await.unwrap(), None);
    }

    #[test]
    fn appended_message_replaces_malformed_metadata() {
        let out = with_appended_message(serde_json::json!("oops"), serde_json::json!(1));
        assert_eq!(out, serde_json::json!({ "messages": [1] }));

        let out = with_appended_message(
            serde_json::json!({ "name": "promo", "messages": "bad" }),
            serde_json::json!(2),
        );
        assert_eq!(out, serde_json::json!({ "name": "promo", "messages": [2] }));

        let out = with_appended_message(
            serde_json::json!({ "messages": [1] }),
            serde_json::json!(2),
        );
        assert_eq!(out, serde_json::json!({ "messages": [1, 2] }));
    }
}
