//! Typed Rust client and outbound delivery pipeline for the Mspace SMS API.
//!
//! The crate is layered: a domain layer of strong types, a transport layer for
//! wire-format details, a small client layer orchestrating requests, and the
//! delivery pipeline on top (classification, per-recipient retries,
//! persistence, and a single credit debit per batch).
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use mspace::{BatchRequest, Config, Dispatcher, SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load()?;
//!     let store = Arc::new(SqliteStore::open(&config.storage.database_path).await?);
//!     let dispatcher = Dispatcher::from_config(&config, store)?;
//!     let request = BatchRequest {
//!         recipients: vec!["+254712345678".to_owned()],
//!         message: "hello".to_owned(),
//!         sender_id: None,
//!         campaign_id: None,
//!     };
//!     let response = dispatcher.send_batch("user-1", request).await?;
//!     println!("{} sent, {} failed", response.summary.successful, response.summary.failed);
//!     Ok(())
//! }
//! ```
#![forbid(unsafe_code)]

use std::future::Future;
use std::pin::Pin;

pub mod classify;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod ledger;
pub mod persist;
pub mod sender;
pub mod store;
mod transport;

/// Boxed future returned by the object-safe async seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use classify::{ErrorCode, EnhancedError, ProviderFailure, classify, retry_delay, should_retry};
pub use client::{Credentials, MspaceClient, MspaceClientBuilder, MspaceError};
pub use config::Config;
pub use dispatch::{BatchRequest, BatchResponse, DispatchError, Dispatcher};
pub use domain::{
    ApiKey, BatchSummary, DeliveryReport, DeliveryReportRequest, DeliveryStatus, MessageId,
    MessageText, Recipient, SendResult, SendText, SendTextEntry, SendTextResponse, SenderId,
    Username, ValidationError,
};
pub use ledger::CreditDebit;
pub use persist::{BatchContext, ResultPersister};
pub use sender::{RecipientSender, SendOutcome};
pub use store::{CreditLedger, MessageRecord, MessageStatus, MessageStore, SqliteStore, StoreError};
