pub mod access;
pub mod bracket;
mod hub;
pub mod matches;

use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use tokio::sync::{Mutex, MutexGuard, RwLock, watch};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{
        match_store::MatchStore,
        models::MatchEntity,
        storage::{StorageResult, with_deadline},
    },
    dto::events::{SYSTEM_STATUS_EVENT, ServerEvent, SystemStatus},
    error::ServiceError,
    services::match_timer::TimerHandle,
    state::matches::{Competitor, Match},
};

pub use self::hub::ViewerHub;

pub type SharedState = Arc<AppState>;

const VIEWER_CHANNEL_CAPACITY: usize = 64;

/// Central application state: the authoritative match table, the storage handle and the
/// viewer fan-out.
///
/// Every match write goes through [`AppState::lock_mutations`]; callers compute new
/// records on copies, persist them, then [`AppState::commit_matches`] while still holding
/// the gate. Readers therefore only ever see committed records.
pub struct AppState {
    config: Arc<AppConfig>,
    match_store: RwLock<Option<Arc<dyn MatchStore>>>,
    matches: RwLock<IndexMap<Uuid, Match>>,
    competitors: DashMap<Uuid, Competitor>,
    viewers: ViewerHub,
    degraded: watch::Sender<bool>,
    mutation_gate: Mutex<()>,
    timer: Mutex<Option<TimerHandle>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config: Arc::new(config),
            match_store: RwLock::new(None),
            matches: RwLock::new(IndexMap::new()),
            competitors: DashMap::new(),
            viewers: ViewerHub::new(VIEWER_CHANNEL_CAPACITY),
            degraded: degraded_tx,
            mutation_gate: Mutex::new(()),
            timer: Mutex::new(None),
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current match store, if one is installed.
    pub async fn match_store(&self) -> Option<Arc<dyn MatchStore>> {
        let guard = self.match_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store, or [`ServiceError::Degraded`] while writes are refused.
    pub async fn require_match_store(&self) -> Result<Arc<dyn MatchStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.match_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new match store implementation and leave degraded mode.
    pub async fn install_match_store(&self, store: Arc<dyn MatchStore>) {
        {
            let mut guard = self.match_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current match store and enter degraded mode.
    pub async fn clear_match_store(&self) {
        {
            let mut guard = self.match_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag, notifying viewers when the value changes.
    pub fn update_degraded(&self, value: bool) {
        let changed = self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });

        if changed {
            info!(degraded = value, "degraded mode changed");
            match ServerEvent::json(SYSTEM_STATUS_EVENT, &SystemStatus { degraded: value }) {
                Ok(event) => self.viewers.broadcast(event),
                Err(err) => warn!(error = %err, "failed to serialize system status"),
            }
        }
    }

    /// Broadcast hub shared by WebSocket and SSE viewers.
    pub fn viewers(&self) -> &ViewerHub {
        &self.viewers
    }

    /// Competitor directory used to resolve names in snapshots.
    pub fn competitors(&self) -> &DashMap<Uuid, Competitor> {
        &self.competitors
    }

    /// Directory lookup returning an owned entry.
    pub fn competitor(&self, id: Uuid) -> Option<Competitor> {
        self.competitors.get(&id).map(|entry| entry.value().clone())
    }

    /// Handle of the running timer loop, if any.
    pub fn timer(&self) -> &Mutex<Option<TimerHandle>> {
        &self.timer
    }

    /// Acquire the gate that serializes every match mutation.
    pub async fn lock_mutations(&self) -> MutexGuard<'_, ()> {
        self.mutation_gate.lock().await
    }

    /// Committed copy of a match.
    pub async fn find_match(&self, id: Uuid) -> Option<Match> {
        self.matches.read().await.get(&id).cloned()
    }

    /// Run `f` against the committed match table.
    pub async fn read_matches<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&IndexMap<Uuid, Match>) -> T,
    {
        let guard = self.matches.read().await;
        f(&guard)
    }

    /// Publish persisted records, replacing existing ones in place.
    pub async fn commit_matches(&self, updated: impl IntoIterator<Item = Match>) {
        let mut guard = self.matches.write().await;
        for record in updated {
            guard.insert(record.id, record);
        }
    }

    /// Drop a match from the committed table.
    pub async fn remove_match(&self, id: Uuid) -> Option<Match> {
        self.matches.write().await.shift_remove(&id)
    }

    /// Replace the whole table, used when hydrating from storage.
    pub async fn replace_matches(&self, records: Vec<Match>) {
        let mut guard = self.matches.write().await;
        *guard = records.into_iter().map(|record| (record.id, record)).collect();
    }

    /// Persist `records` within the configured deadline. Several records are written as
    /// one atomic batch.
    pub async fn persist_matches(&self, records: &[Match]) -> Result<(), ServiceError> {
        let store = self.require_match_store().await?;
        let limit = self.config.persist_timeout();

        let mut entities: Vec<MatchEntity> = records.iter().cloned().map(Into::into).collect();
        let result: StorageResult<()> = match entities.len() {
            0 => Ok(()),
            1 => {
                let entity = entities.remove(0);
                with_deadline("save_match", limit, store.save_match(entity)).await
            }
            _ => with_deadline("save_matches", limit, store.save_matches(entities)).await,
        };

        result.map_err(|err| {
            warn!(error = %err, count = records.len(), "failed to persist matches");
            ServiceError::from(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::match_store::test_support::FlakyStore;
    use crate::state::matches::MatchRules;

    fn sample() -> Match {
        Match::new(
            "sumo".into(),
            "FINAL".into(),
            "school".into(),
            None,
            &MatchRules::default(),
            SystemTime::now(),
        )
    }

    #[tokio::test]
    async fn writes_are_refused_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded());
        assert!(matches!(
            state.persist_matches(&[sample()]).await,
            Err(ServiceError::Degraded)
        ));

        state.install_match_store(Arc::new(FlakyStore::new())).await;
        assert!(!state.is_degraded());
        assert!(state.persist_matches(&[sample()]).await.is_ok());
    }

    #[tokio::test]
    async fn degraded_changes_are_announced_to_viewers() {
        let state = AppState::new(AppConfig::default());
        let mut rx = state.viewers().subscribe();

        state.install_match_store(Arc::new(FlakyStore::new())).await;
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, SYSTEM_STATUS_EVENT);
        assert_eq!(event.data["degraded"], false);

        state.update_degraded(false);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn commit_keeps_insertion_order() {
        let state = AppState::new(AppConfig::default());
        let first = sample();
        let second = sample();
        state.commit_matches([first.clone(), second.clone()]).await;

        let mut changed = first.clone();
        changed.score_a = 2;
        state.commit_matches([changed]).await;

        let ids = state.read_matches(|table| table.keys().copied().collect::<Vec<_>>()).await;
        assert_eq!(ids, vec![first.id, second.id]);
        assert_eq!(state.find_match(first.id).await.unwrap().score_a, 2);
    }
}
