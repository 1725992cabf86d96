//! Process-local [`MatchStore`] used when no database is configured and by tests.

use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dao::{
    match_store::MatchStore,
    models::{CompetitorEntity, MatchEntity},
    storage::StorageResult,
};

#[derive(Default)]
struct MemoryTables {
    matches: IndexMap<Uuid, MatchEntity>,
    competitors: IndexMap<Uuid, CompetitorEntity>,
}

/// In-memory store. A single lock guards both tables so batch writes are atomic.
#[derive(Clone, Default)]
pub struct MemoryMatchStore {
    tables: Arc<RwLock<MemoryTables>>,
}

impl MemoryMatchStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MatchStore for MemoryMatchStore {
    fn save_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            tables.write().await.matches.insert(entity.id, entity);
            Ok(())
        })
    }

    fn save_matches(&self, entities: Vec<MatchEntity>) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.write().await;
            guard
                .matches
                .extend(entities.into_iter().map(|entity| (entity.id, entity)));
            Ok(())
        })
    }

    fn delete_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let tables = self.tables.clone();
        Box::pin(async move { Ok(tables.write().await.matches.shift_remove(&id).is_some()) })
    }

    fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move { Ok(tables.read().await.matches.values().cloned().collect()) })
    }

    fn list_competitors(&self) -> BoxFuture<'static, StorageResult<Vec<CompetitorEntity>>> {
        let tables = self.tables.clone();
        Box::pin(async move { Ok(tables.read().await.competitors.values().cloned().collect()) })
    }

    fn save_competitors(
        &self,
        competitors: Vec<CompetitorEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let tables = self.tables.clone();
        Box::pin(async move {
            let mut guard = tables.write().await;
            guard.competitors.extend(
                competitors
                    .into_iter()
                    .map(|competitor| (competitor.id, competitor)),
            );
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
