use serde::{Deserialize, Serialize};

use crate::domain::validation::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Mspace API key, sent in the `apikey` header.
///
/// Invariant: non-empty after trimming.
pub struct ApiKey(String);

impl ApiKey {
    /// Header name used by Mspace (`apikey`).
    pub const HEADER: &'static str = "apikey";

    /// Create a validated [`ApiKey`].
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty {
                field: Self::HEADER,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the validated key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Mspace account username (`username`).
///
/// Invariant: non-empty after trimming.
pub struct Username(String);

impl Username {
    /// JSON field name used by Mspace (`username`).
    pub const FIELD: &'static str = "username";

    /// Create a validated [`Username`].
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field: Self::FIELD });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the validated username.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
/// Sender id shown to the recipient (`senderId`).
///
/// Invariant: non-empty after trimming. The value must be registered on the Mspace account.
pub struct SenderId(String);

impl SenderId {
    /// JSON field name used by Mspace (`senderId`).
    pub const FIELD: &'static str = "senderId";

    /// Create a validated [`SenderId`].
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field: Self::FIELD });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the validated sender id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SenderId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SenderId> for String {
    fn from(value: SenderId) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// SMS message text (`message`).
///
/// Invariant: non-empty after trimming. The original value (including whitespace) is preserved.
pub struct MessageText(String);

impl MessageText {
    /// JSON field name used by Mspace (`message`).
    pub const FIELD: &'static str = "message";

    /// Create validated message text.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ValidationError::Empty { field: Self::FIELD });
        }
        Ok(Self(value))
    }

    /// Borrow the message text as provided.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Recipient phone number as transmitted to Mspace (`recipient`).
///
/// Invariant: digits only and non-empty. Construction strips every non-digit
/// character (`+`, spaces, dashes, parentheses), so `+254 712-345-678` becomes
/// `254712345678`.
pub struct Recipient {
    digits: String,
}

impl Recipient {
    /// JSON field name used by Mspace (`recipient`).
    pub const FIELD: &'static str = "recipient";

    /// Normalize and validate a recipient.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let input = value.into();
        let digits = normalize_digits(&input);
        if digits.is_empty() {
            if input.trim().is_empty() {
                return Err(ValidationError::Empty { field: Self::FIELD });
            }
            return Err(ValidationError::InvalidRecipient { input });
        }
        Ok(Self { digits })
    }

    /// Digits-only form sent to the provider and persisted.
    pub fn digits(&self) -> &str {
        &self.digits
    }

    /// Whether a provider-reported recipient refers to this number.
    pub fn matches(&self, reported: &str) -> bool {
        normalize_digits(reported) == self.digits
    }
}

/// Strip every non-ASCII-digit character.
pub fn normalize_digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
/// Provider message id (`messageId`) returned by `sendtext`.
///
/// Invariant: non-empty after trimming.
pub struct MessageId(String);

impl MessageId {
    /// JSON field name used by Mspace (`messageId`).
    pub const FIELD: &'static str = "messageId";

    /// Create a validated [`MessageId`].
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field: Self::FIELD });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the validated message id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Per-recipient status code reported by Mspace.
///
/// This value is preserved as-is; only [`DeliveryStatus::ACCEPTED`] means the
/// gateway took the message.
pub struct DeliveryStatus(i64);

impl DeliveryStatus {
    /// Status reported for a message the gateway accepted for delivery.
    pub const ACCEPTED: Self = Self(111);

    /// Construct a status from its integer representation.
    pub fn new(code: i64) -> Self {
        Self(code)
    }

    /// Get the integer code as provided by Mspace.
    pub fn as_i64(self) -> i64 {
        self.0
    }

    /// Returns `true` for [`DeliveryStatus::ACCEPTED`].
    pub fn is_accepted(self) -> bool {
        self == Self::ACCEPTED
    }
}
