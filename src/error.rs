use thiserror::Error;

/// Crate-wide error taxonomy. Each kind maps to one of the recovery classes
/// in the design doc: surface-to-caller, surface-and-retry, or non-retryable.
#[derive(Error, Debug)]
pub enum ShadowyError {
    #[error("input error: {0}")]
    Input(String),

    #[error("format error: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("signature error: {0}")]
    Signature(String),

    #[error("validation failed in {validator_name}: {cause}")]
    Validation {
        validator_name: String,
        cause: String,
    },

    #[error("state error: {0}")]
    State(String),

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ShadowyError>;

impl ShadowyError {
    /// Exit code for the CLI surface, per the process-boundary contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            ShadowyError::Input(_) | ShadowyError::Format(_) | ShadowyError::Validation { .. } => {
                1
            }
            ShadowyError::Io(_) | ShadowyError::State(_) => 2,
            ShadowyError::Crypto(_) | ShadowyError::Signature(_) => 3,
            ShadowyError::Cancelled => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_message_matches_convention() {
        let e = ShadowyError::Validation {
            validator_name: "TemporalValidator".to_string(),
            cause: "transaction not valid until 2026-01-01T00:00:00Z".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "validation failed in TemporalValidator: transaction not valid until 2026-01-01T00:00:00Z"
        );
    }

    #[test]
    fn exit_codes_follow_taxonomy() {
        assert_eq!(ShadowyError::Input("x".into()).exit_code(), 1);
        assert_eq!(ShadowyError::Io(std::io::Error::other("x")).exit_code(), 2);
        assert_eq!(ShadowyError::Crypto("x".into()).exit_code(), 3);
    }
}
