use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Empty { field: &'static str },
    InvalidRecipient { input: String },
    InvalidEndpoint { input: String },
    NegativeAmount { field: &'static str },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "{field} must not be empty"),
            Self::InvalidRecipient { input } => {
                write!(f, "invalid recipient (no digits): {input}")
            }
            Self::InvalidEndpoint { input } => write!(f, "invalid endpoint URL: {input}"),
            Self::NegativeAmount { field } => write!(f, "{field} must not be negative"),
        }
    }
}

impl std::error::Error for ValidationError {}
