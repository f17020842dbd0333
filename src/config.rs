//! Layered configuration: compiled defaults, then `mspace.toml`, then
//! `MSPACE_*` environment variables.
//!
//! Environment keys map section-first, so `MSPACE_PROVIDER_API_KEY` lands on
//! `provider.api_key` and `MSPACE_DELIVERY_MAX_RETRIES` on
//! `delivery.max_retries`. Variables outside the known sections are ignored.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::client::{Credentials, DEFAULT_BASE_URL, MspaceClient, MspaceError};
use crate::domain::{SenderId, ValidationError};

/// Local configuration file picked up by [`load_config`].
pub const CONFIG_FILE: &str = "mspace.toml";

const ENV_PREFIX: &str = "MSPACE_";
const SECTIONS: [&str; 4] = ["provider", "delivery", "billing", "storage"];

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Gateway account and endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    #[serde(default, deserialize_with = "text")]
    pub api_key: String,
    #[serde(default, deserialize_with = "text")]
    pub username: String,
    /// Used when a batch request carries no `senderId`. Numeric shortcodes
    /// are common here.
    #[serde(
        default,
        deserialize_with = "optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub sender_id: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            username: String::new(),
            sender_id: None,
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Retry and fan-out settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Maximum gateway calls per recipient.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Recipients in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Wall-clock bound for a whole batch. Unset means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_timeout_secs: Option<u64>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            concurrency: default_concurrency(),
            batch_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BillingConfig {
    /// Credits charged per accepted message.
    #[serde(default = "default_unit_price")]
    pub unit_price: f64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            unit_price: default_unit_price(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Environment values that look numeric arrive as numbers; the text fields
/// take them back as written.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

impl From<Scalar> for String {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Text(text) => text,
            Scalar::Unsigned(n) => n.to_string(),
            Scalar::Signed(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
        }
    }
}

fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Scalar::deserialize(deserializer).map(String::from)
}

fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(String::from))
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_owned()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    crate::classify::DEFAULT_MAX_RETRIES
}

fn default_concurrency() -> usize {
    4
}

fn default_unit_price() -> f64 {
    crate::persist::DEFAULT_UNIT_PRICE
}

fn default_database_path() -> String {
    "mspace.db".to_owned()
}

impl Config {
    /// Shorthand for [`load_config`].
    pub fn load() -> Result<Self, figment::Error> {
        load_config()
    }

    /// Check the values serde cannot: empty credentials, negative price.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.credentials()?;
        if let Some(sender_id) = &self.provider.sender_id {
            SenderId::new(sender_id.as_str())?;
        }
        if self.billing.unit_price.is_nan() || self.billing.unit_price < 0.0 {
            return Err(ValidationError::NegativeAmount {
                field: "billing.unit_price",
            });
        }
        Ok(())
    }

    pub fn credentials(&self) -> Result<Credentials, ValidationError> {
        Credentials::new(self.provider.api_key.as_str(), self.provider.username.as_str())
    }

    /// The configured fallback sender id, if any.
    pub fn default_sender_id(&self) -> Result<Option<SenderId>, ValidationError> {
        self.provider
            .sender_id
            .as_deref()
            .map(SenderId::new)
            .transpose()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.provider.request_timeout_secs)
    }

    pub fn batch_timeout(&self) -> Option<Duration> {
        self.delivery.batch_timeout_secs.map(Duration::from_secs)
    }

    /// Build a gateway client from the provider section.
    pub fn client(&self) -> Result<MspaceClient, MspaceError> {
        let mut builder = MspaceClient::builder(self.credentials()?)
            .base_url(self.provider.base_url.as_str())
            .user_agent(concat!("mspace/", env!("CARGO_PKG_VERSION")));
        if self.provider.request_timeout_secs > 0 {
            builder = builder.timeout(self.request_timeout());
        }
        builder.build()
    }
}

/// Load `./mspace.toml` (if present) over compiled defaults, then apply
/// `MSPACE_*` overrides.
pub fn load_config() -> Result<Config, figment::Error> {
    build_figment(Toml::file(CONFIG_FILE)).extract()
}

/// Load from an explicit file path with environment overrides.
pub fn load_config_from_path(path: &Path) -> Result<Config, figment::Error> {
    build_figment(Toml::file(path)).extract()
}

/// Parse a TOML document over the defaults. No environment lookup.
pub fn load_config_from_str(toml_content: &str) -> Result<Config, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

fn build_figment(file: figment::providers::Data<Toml>) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(file)
        .merge(env_provider())
}

/// Explicit `section_key` to `section.key` mapping; `Env::split("_")` would
/// break keys such as `api_key`.
fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).filter_map(|key| {
        let key = key.as_str().to_ascii_lowercase();
        SECTIONS.iter().find_map(|section| {
            key.strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
                .filter(|rest| !rest.is_empty())
                .map(|rest| format!("{section}.{rest}").into())
        })
    })
}
