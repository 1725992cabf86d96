pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;
#[cfg(test)]
pub(crate) mod test_support;

use crate::dao::models::{CompetitorEntity, MatchEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for matches and the competitor directory.
pub trait MatchStore: Send + Sync {
    /// Insert or replace a single match.
    fn save_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Insert or replace several matches as one unit: either all are stored or none.
    fn save_matches(&self, entities: Vec<MatchEntity>) -> BoxFuture<'static, StorageResult<()>>;
    /// Remove a match, returning whether it existed.
    fn delete_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    /// Load every stored match.
    fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>>;
    /// Load the competitor directory.
    fn list_competitors(&self) -> BoxFuture<'static, StorageResult<Vec<CompetitorEntity>>>;
    /// Insert or replace directory entries.
    fn save_competitors(
        &self,
        competitors: Vec<CompetitorEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap liveness probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
