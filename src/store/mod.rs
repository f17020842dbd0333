//! Storage seams for delivery records and the prepaid credit balance.
//!
//! The pipeline only talks to the [`MessageStore`] and [`CreditLedger`]
//! traits. [`SqliteStore`] implements both on a single tokio-rusqlite
//! connection.

mod sqlite;

use std::error::Error as StdError;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use sqlite::SqliteStore;

use crate::BoxFuture;

/// Provider name written on every record.
pub const PROVIDER: &str = "mspace";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[source] Box<dyn StdError + Send + Sync>),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("campaign not found: {campaign_id}")]
    CampaignNotFound { campaign_id: String },

    #[error("no credit account for user: {user_id}")]
    AccountNotFound { user_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Failed,
}

impl MessageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown message status: {other}")),
        }
    }
}

/// One persisted delivery attempt outcome. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub user_id: String,
    pub campaign_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub sender: String,
    /// Digits only.
    pub recipient: String,
    pub content: String,
    pub status: MessageStatus,
    pub provider: String,
    pub provider_message_id: Option<String>,
    pub cost: f64,
    pub sent_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Durable home for [`MessageRecord`]s.
pub trait MessageStore: Send + Sync {
    /// Insert one record into the primary table.
    fn insert_message<'a>(&'a self, record: &'a MessageRecord)
    -> BoxFuture<'a, Result<(), StoreError>>;

    /// Append `record` to the campaign's `metadata.messages` array.
    ///
    /// Implementations must make the read-modify-write atomic per campaign.
    fn append_campaign_message<'a>(
        &'a self,
        campaign_id: &'a str,
        record: &'a MessageRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>>;
}

/// Prepaid credit balance per user.
pub trait CreditLedger: Send + Sync {
    /// Atomically subtract `amount` from the user's balance and return the new balance.
    fn deduct_credits<'a>(
        &'a self,
        user_id: &'a str,
        amount: f64,
    ) -> BoxFuture<'a, Result<f64, StoreError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_status_round_trips_through_text() {
        for status in [MessageStatus::Sent, MessageStatus::Failed] {
            assert_eq!(status.as_str().parse::<MessageStatus>(), Ok(status));
        }
        assert!("queued".parse::<MessageStatus>().is_err());
        assert_eq!(
            serde_json::to_value(MessageStatus::Failed).unwrap(),
            "failed"
        );
    }
}
