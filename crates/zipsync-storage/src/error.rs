//! Storage error types for the document store abstraction layer.

use std::fmt;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The document being written is malformed (e.g. not keyed).
    #[error("Invalid document: {message}")]
    InvalidDocument {
        /// Description of why the document is invalid.
        message: String,
    },

    /// The collection name cannot be used by this backend.
    #[error("Invalid collection '{collection}': {message}")]
    InvalidCollection {
        /// Name of the rejected collection.
        collection: String,
        /// Description of why the collection is rejected.
        message: String,
    },

    /// One operation of an ordered bulk write failed.
    ///
    /// Operations before `index` have already been applied.
    #[error("Write error at operation {index}: {message}")]
    WriteError {
        /// Position of the failing operation in the batch.
        index: usize,
        /// Description of the failure.
        message: String,
    },

    /// Failed to connect to the storage backend.
    #[error("Connection error: {message}")]
    ConnectionError {
        /// Description of the connection error.
        message: String,
    },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `InvalidDocument` error.
    #[must_use]
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidCollection` error.
    #[must_use]
    pub fn invalid_collection(collection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidCollection {
            collection: collection.into(),
            message: message.into(),
        }
    }

    /// Creates a new `WriteError` error.
    #[must_use]
    pub fn write_error(index: usize, message: impl Into<String>) -> Self {
        Self::WriteError {
            index,
            message: message.into(),
        }
    }

    /// Creates a new `ConnectionError` error.
    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this error was raised by one operation of a bulk write.
    #[must_use]
    pub fn is_write_error(&self) -> bool {
        matches!(self, Self::WriteError { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidDocument { .. } | Self::InvalidCollection { .. } => {
                ErrorCategory::Validation
            }
            Self::WriteError { .. } => ErrorCategory::Write,
            Self::ConnectionError { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Validation error.
    Validation,
    /// A write inside a batch failed.
    Write,
    /// Infrastructure/connection error.
    Infrastructure,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Write => write!(f, "write"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::write_error(3, "duplicate key");
        assert_eq!(err.to_string(), "Write error at operation 3: duplicate key");

        let err = StorageError::invalid_collection("bad name", "must be alphanumeric");
        assert_eq!(
            err.to_string(),
            "Invalid collection 'bad name': must be alphanumeric"
        );
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            StorageError::invalid_document("no key").category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            StorageError::write_error(0, "x").category(),
            ErrorCategory::Write
        );
        assert_eq!(
            StorageError::connection_error("refused").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(ErrorCategory::Infrastructure.to_string(), "infrastructure");
        assert!(StorageError::write_error(1, "x").is_write_error());
        assert!(!StorageError::internal("x").is_write_error());
    }
}
