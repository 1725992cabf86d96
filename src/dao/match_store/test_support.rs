//! Store doubles shared by service tests.

use std::{
    collections::HashSet,
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    match_store::{MatchStore, memory::MemoryMatchStore},
    models::{CompetitorEntity, MatchEntity},
    storage::{StorageError, StorageResult},
};

#[derive(Default)]
struct Faults {
    failing_ids: HashSet<Uuid>,
    fail_all: bool,
    stall: Option<Duration>,
}

/// Memory store that can be told to fail or stall writes.
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: MemoryMatchStore,
    faults: Arc<Mutex<Faults>>,
}

impl FlakyStore {
    /// Healthy store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every write touching `id`.
    pub fn fail_match(&self, id: Uuid) {
        self.faults.lock().unwrap().failing_ids.insert(id);
    }

    /// Fail (or stop failing) every write.
    pub fn fail_all(&self, value: bool) {
        self.faults.lock().unwrap().fail_all = value;
    }

    /// Delay every write by `delay`.
    pub fn stall_writes(&self, delay: Duration) {
        self.faults.lock().unwrap().stall = Some(delay);
    }

    /// Persisted copy of a match.
    pub async fn stored(&self, id: Uuid) -> Option<MatchEntity> {
        self.inner
            .list_matches()
            .await
            .ok()?
            .into_iter()
            .find(|entity| entity.id == id)
    }

    fn check(&self, ids: &[Uuid]) -> (StorageResult<()>, Option<Duration>) {
        let faults = self.faults.lock().unwrap();
        let fails = faults.fail_all || ids.iter().any(|id| faults.failing_ids.contains(id));
        let result = if fails {
            Err(StorageError::unavailable(
                "injected failure".into(),
                io::Error::other("injected failure"),
            ))
        } else {
            Ok(())
        };
        (result, faults.stall)
    }
}

impl MatchStore for FlakyStore {
    fn save_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let (verdict, stall) = self.check(&[entity.id]);
        let inner = self.inner.clone();
        Box::pin(async move {
            if let Some(delay) = stall {
                tokio::time::sleep(delay).await;
            }
            verdict?;
            inner.save_match(entity).await
        })
    }

    fn save_matches(&self, entities: Vec<MatchEntity>) -> BoxFuture<'static, StorageResult<()>> {
        let ids: Vec<Uuid> = entities.iter().map(|entity| entity.id).collect();
        let (verdict, stall) = self.check(&ids);
        let inner = self.inner.clone();
        Box::pin(async move {
            if let Some(delay) = stall {
                tokio::time::sleep(delay).await;
            }
            verdict?;
            inner.save_matches(entities).await
        })
    }

    fn delete_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let (verdict, _) = self.check(&[id]);
        let inner = self.inner.clone();
        Box::pin(async move {
            verdict?;
            inner.delete_match(id).await
        })
    }

    fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        self.inner.list_matches()
    }

    fn list_competitors(&self) -> BoxFuture<'static, StorageResult<Vec<CompetitorEntity>>> {
        self.inner.list_competitors()
    }

    fn save_competitors(
        &self,
        competitors: Vec<CompetitorEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let (verdict, _) = self.check(&[]);
        let inner = self.inner.clone();
        Box::pin(async move {
            verdict?;
            inner.save_competitors(competitors).await
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let (verdict, _) = self.check(&[]);
        Box::pin(async move { verdict })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.health_check()
    }
}
