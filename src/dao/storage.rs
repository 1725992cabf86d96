use std::{error::Error, time::Duration};
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not serve the request.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human readable summary of the failure.
        message: String,
        /// Backend-specific cause.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The backend did not answer within the configured deadline.
    #[error("storage `{operation}` timed out after {}ms", after.as_millis())]
    TimedOut {
        /// Store operation that was abandoned.
        operation: &'static str,
        /// Deadline that elapsed.
        after: Duration,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

/// Run a store future, failing with [`StorageError::TimedOut`] once `limit` elapses.
pub async fn with_deadline<T, F>(operation: &'static str, limit: Duration, work: F) -> StorageResult<T>
where
    F: Future<Output = StorageResult<T>>,
{
    match tokio::time::timeout(limit, work).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::TimedOut {
            operation,
            after: limit,
        }),
    }
}
