use crate::domain::operation::OperationKind;
use thiserror::Error;

/// Errors surfaced by the orchestration layer.
///
/// `Validation`, `Busy` and `NotInitialized` are returned synchronously and never
/// touch the request registry. The remaining variants only ever arrive through an
/// operation's eventual resolution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("{0}")]
    Validation(String),
    #[error("Another {0} operation is already in progress")]
    Busy(OperationKind),
    #[error("The payment layer has not been initialised")]
    NotInitialized,
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("{0}")]
    Failed(String),
    #[error("{0}")]
    Canceled(String),
    #[error("{0}")]
    Unknown(String),
}

impl PaymentError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn missing(field: &str) -> Self {
        Self::Validation(format!("You must provide {field}"))
    }

    /// Stable label used when outcomes are reported to a host.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Validation",
            Self::Busy(_) => "Busy",
            Self::NotInitialized => "NotInitialized",
            Self::Provider(_) => "Provider",
            Self::Failed(_) => "Failed",
            Self::Canceled(_) => "Canceled",
            Self::Unknown(_) => "Unknown",
        }
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors raised while reading or writing operation scripts.
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid step on line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
    /// Raised when an outcome record cannot be written.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_message_names_kind() {
        let err = PaymentError::Busy(OperationKind::ConfirmPayment);
        assert_eq!(
            err.to_string(),
            "Another confirm_payment operation is already in progress"
        );
        assert_eq!(err.code(), "Busy");
    }

    #[test]
    fn test_missing_field_message() {
        let err = PaymentError::missing("iban");
        assert_eq!(err, PaymentError::Validation("You must provide iban".into()));
        assert_eq!(err.code(), "Validation");
    }
}
