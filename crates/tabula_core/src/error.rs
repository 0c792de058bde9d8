use thiserror::Error;

type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum TabulaError {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
    #[error("invalid filter: {message}")]
    InvalidFilter { message: String },
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("duplicate key: {message}")]
    DuplicateKey { message: String },
    #[error("storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<BoxedCause>,
    },
}

impl TabulaError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Self::InvalidFilter {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::DuplicateKey {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    pub fn storage_with(message: impl Into<String>, source: impl Into<BoxedCause>) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Only infrastructure failures are worth retrying with the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type TabulaResult<T> = Result<T, TabulaError>;

impl From<sea_orm::DbErr> for TabulaError {
    fn from(value: sea_orm::DbErr) -> Self {
        if let Some(sea_orm::SqlErr::UniqueConstraintViolation(message)) = value.sql_err() {
            return TabulaError::duplicate(message);
        }
        TabulaError::storage_with(value.to_string(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::TabulaError;

    #[test]
    fn helper_constructors_set_variants() {
        let err = TabulaError::invalid("empty");
        assert!(matches!(err, TabulaError::InvalidArgument { .. }));
        let err = TabulaError::invalid_filter("empty mapping");
        assert!(matches!(err, TabulaError::InvalidFilter { .. }));
        let err = TabulaError::not_found("missing");
        assert!(err.is_not_found());
        let err = TabulaError::duplicate("dup");
        assert!(err.is_duplicate_key());
        let err = TabulaError::storage("disk");
        assert!(matches!(err, TabulaError::Storage { source: None, .. }));
    }

    #[test]
    fn only_storage_errors_are_retryable() {
        assert!(TabulaError::storage("io").is_retryable());
        assert!(!TabulaError::duplicate("dup").is_retryable());
        assert!(!TabulaError::invalid("bad").is_retryable());
        assert!(!TabulaError::not_found("gone").is_retryable());
    }

    #[test]
    fn driver_errors_become_storage_with_cause() {
        let err = TabulaError::from(sea_orm::DbErr::Custom("boom".to_string()));
        match err {
            TabulaError::Storage { message, source } => {
                assert!(message.contains("boom"));
                assert!(source.is_some());
            }
            other => panic!("expected storage error, got {other:?}"),
        }
    }
}
