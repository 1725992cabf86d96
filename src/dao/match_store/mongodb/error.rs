use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for MongoDB operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures raised by the MongoDB match store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// Connection string could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Offending URI.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Driver rejected the client options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Server never answered the initial ping.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Attempts made before giving up.
        attempts: u32,
        /// Last driver error.
        #[source]
        source: MongoError,
    },
    /// Periodic health ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Index creation failed.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Target collection.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Single match write failed.
    #[error("failed to save match `{id}`")]
    SaveMatch {
        /// Match id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Transactional batch write failed and was rolled back.
    #[error("failed to save a batch of {count} match(es)")]
    SaveBatch {
        /// Size of the batch.
        count: usize,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Match deletion failed.
    #[error("failed to delete match `{id}`")]
    DeleteMatch {
        /// Match id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Listing matches failed.
    #[error("failed to list matches")]
    ListMatches {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Competitor directory write failed.
    #[error("failed to save competitor `{id}`")]
    SaveCompetitor {
        /// Competitor id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Listing competitors failed.
    #[error("failed to list competitors")]
    ListCompetitors {
        /// Driver error.
        #[source]
        source: MongoError,
    },
}
