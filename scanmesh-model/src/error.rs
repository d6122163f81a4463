use std::fmt::{self, Display};

/// Errors produced by model constructors and validation routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A work item carries neither a host nor an IP address.
    MissingAddress,
    InvalidGroup(String),
    UnknownVariant { kind: &'static str, value: String },
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::MissingAddress => {
                write!(f, "address requires a host or an ip")
            }
            ModelError::InvalidGroup(msg) => write!(f, "invalid group: {msg}"),
            ModelError::UnknownVariant { kind, value } => {
                write!(f, "unknown {kind} '{value}'")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
