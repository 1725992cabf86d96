use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, IndexModel, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::{ConnectAttempts, establish_connection, ping},
    error::{MongoDaoError, MongoResult},
    models::{MongoCompetitorDocument, MongoMatchDocument, doc_id},
};
use crate::dao::{
    match_store::MatchStore,
    models::{CompetitorEntity, MatchEntity},
    storage::StorageResult,
};

const MATCH_COLLECTION_NAME: &str = "matches";
const COMPETITOR_COLLECTION_NAME: &str = "competitors";

/// MongoDB-backed [`MatchStore`] implementation.
#[derive(Clone)]
pub struct MongoMatchStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        ping(&database)
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = establish_connection(
            &self.config.options,
            &self.config.database_name,
            ConnectAttempts::RECONNECT,
        )
        .await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoMatchStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = establish_connection(
            &config.options,
            &config.database_name,
            ConnectAttempts::STARTUP,
        )
        .await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.matches().await;
        let bracket_index = IndexModel::builder()
            .keys(doc! {"bracket_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("match_bracket_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(bracket_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: MATCH_COLLECTION_NAME,
                index: "bracket_id",
                source,
            })?;

        Ok(())
    }

    async fn client(&self) -> Client {
        let guard = self.inner.state.read().await;
        guard.client.clone()
    }

    async fn matches(&self) -> Collection<MongoMatchDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoMatchDocument>(MATCH_COLLECTION_NAME)
    }

    async fn competitors(&self) -> Collection<MongoCompetitorDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoCompetitorDocument>(COMPETITOR_COLLECTION_NAME)
    }

    async fn save_match(&self, entity: MatchEntity) -> MongoResult<()> {
        let id = entity.id;
        let document: MongoMatchDocument = entity.into();
        self.matches()
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveMatch { id, source })?;
        Ok(())
    }

    /// Upsert every match inside one transaction so a bracket is stored whole or not at all.
    async fn save_matches(&self, entities: Vec<MatchEntity>) -> MongoResult<()> {
        let count = entities.len();
        let batch_error = |source| MongoDaoError::SaveBatch { count, source };

        let collection = self.matches().await;
        let mut session = self
            .client()
            .await
            .start_session()
            .await
            .map_err(batch_error)?;
        session.start_transaction().await.map_err(batch_error)?;

        for entity in entities {
            let id = entity.id;
            let document: MongoMatchDocument = entity.into();
            let written = collection
                .replace_one(doc_id(id), &document)
                .upsert(true)
                .session(&mut session)
                .await;

            if let Err(source) = written {
                if let Err(abort_err) = session.abort_transaction().await {
                    warn!(error = %abort_err, "failed to abort match batch transaction");
                }
                return Err(batch_error(source));
            }
        }

        session.commit_transaction().await.map_err(batch_error)?;
        Ok(())
    }

    async fn delete_match(&self, id: Uuid) -> MongoResult<bool> {
        let result = self
            .matches()
            .await
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::DeleteMatch { id, source })?;
        Ok(result.deleted_count > 0)
    }

    async fn list_matches(&self) -> MongoResult<Vec<MatchEntity>> {
        let documents: Vec<MongoMatchDocument> = self
            .matches()
            .await
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::ListMatches { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListMatches { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn list_competitors(&self) -> MongoResult<Vec<CompetitorEntity>> {
        let documents: Vec<MongoCompetitorDocument> = self
            .competitors()
            .await
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::ListCompetitors { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListCompetitors { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn save_competitors(&self, competitors: Vec<CompetitorEntity>) -> MongoResult<()> {
        let collection = self.competitors().await;
        for competitor in competitors {
            let id = competitor.id;
            let document: MongoCompetitorDocument = competitor.into();
            collection
                .replace_one(doc_id(id), &document)
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::SaveCompetitor { id, source })?;
        }
        Ok(())
    }
}

impl MatchStore for MongoMatchStore {
    fn save_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_match(entity).await.map_err(Into::into) })
    }

    fn save_matches(&self, entities: Vec<MatchEntity>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_matches(entities).await.map_err(Into::into) })
    }

    fn delete_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_match(id).await.map_err(Into::into) })
    }

    fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_matches().await.map_err(Into::into) })
    }

    fn list_competitors(&self) -> BoxFuture<'static, StorageResult<Vec<CompetitorEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_competitors().await.map_err(Into::into) })
    }

    fn save_competitors(
        &self,
        competitors: Vec<CompetitorEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_competitors(competitors).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
