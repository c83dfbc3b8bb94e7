use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{DateTime, Document, doc},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::{ConnectPolicy, open, ping},
    error::{MongoDaoError, MongoResult},
    models::{MongoLineupDocument, MongoMatchDocument, MongoPlayerDocument, MongoRotationDocument},
};
use crate::dao::{
    match_store::MatchStore,
    models::{
        CreateOutcome, GradeIncrement, GradeTallyEntity, LineupEntity, MatchEntity, PlayerEntity,
        PlayerReasonIncrement, PlayerReasonTallyEntity, ReasonIncrement, ReasonTallyEntity,
        RotationTallyEntity,
    },
    storage::StorageResult,
};

const MATCHES: &str = "matches";
const LINEUPS: &str = "lineups";
const GRADE_TALLIES: &str = "grade_tallies";
const REASON_TALLIES: &str = "reason_tallies";
const PLAYER_REASON_TALLIES: &str = "player_reason_tallies";
const ROTATION_TALLIES: &str = "rotation_tallies";
const PLAYERS: &str = "players";

/// Collections holding rows keyed by `match_id`, dropped on delete-cascade.
const MATCH_ROW_COLLECTIONS: [&str; 5] = [
    LINEUPS,
    GRADE_TALLIES,
    REASON_TALLIES,
    PLAYER_REASON_TALLIES,
    ROTATION_TALLIES,
];

const DUPLICATE_KEY: i32 = 11000;

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
        let (client, database) = open(
            &self.config.options,
            &self.config.database_name,
            ConnectPolicy::SINGLE,
        )
        .await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

impl MongoMatchStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            open(&config.options, &config.database_name, ConnectPolicy::STARTUP).await?;
        info!(database = %config.database_name, "connected to MongoDB");

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let indexes: [(&'static str, &'static str, Document, bool); 7] = [
            (MATCHES, "created_at", doc! {"created_at": -1}, false),
            (LINEUPS, "match_id", doc! {"match_id": 1}, false),
            (
                GRADE_TALLIES,
                "match_id,side,player_name,grade",
                doc! {"match_id": 1, "side": 1, "player_name": 1, "grade": 1},
                true,
            ),
            (
                REASON_TALLIES,
                "match_id,reason_id",
                doc! {"match_id": 1, "reason_id": 1},
                true,
            ),
            (
                PLAYER_REASON_TALLIES,
                "match_id,player_id,reason_id",
                doc! {"match_id": 1, "player_id": 1, "reason_id": 1},
                true,
            ),
            (
                ROTATION_TALLIES,
                "match_id,slot",
                doc! {"match_id": 1, "slot": 1},
                true,
            ),
            (PLAYERS, "name", doc! {"name": 1}, false),
        ];

        let database = self.database().await;
        for (collection, index, keys, unique) in indexes {
            let model = IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(Some(format!("{collection}_{}_idx", index.replace(',', "_"))))
                        .unique(Some(unique))
                        .build(),
                )
                .build();
            database
                .collection::<Document>(collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index,
                    source,
                })?;
        }
        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(name)
    }

    async fn create_match(&self, record: MatchEntity) -> MongoResult<CreateOutcome> {
        let id = record.match_id.clone();
        let document: MongoMatchDocument = record.into();
        let collection = self.collection::<MongoMatchDocument>(MATCHES).await;
        match collection.insert_one(&document).await {
            Ok(_) => Ok(CreateOutcome::Created),
            Err(err) if is_duplicate_key(&err) => Ok(CreateOutcome::AlreadyExists),
            Err(source) => Err(MongoDaoError::SaveMatch { id, source }),
        }
    }

    async fn find_match(&self, id: String) -> MongoResult<Option<MatchEntity>> {
        let collection = self.collection::<MongoMatchDocument>(MATCHES).await;
        let document = collection
            .find_one(doc! {"_id": id.as_str()})
            .await
            .map_err(|source| MongoDaoError::LoadMatch { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn update_match(&self, record: MatchEntity) -> MongoResult<bool> {
        let collection = self.collection::<MongoMatchDocument>(MATCHES).await;
        let update = doc! {
            "$set": {
                "team_name": record.team_name,
                "date": record.date,
                "our_score": i64::from(record.our_score),
                "opponent_score": i64::from(record.opponent_score),
                "point_cap": i64::from(record.point_cap),
                "status": record.status.as_str(),
                "rotation": {
                    "current_slot": i32::from(record.rotation.current_slot),
                    "serving": record.rotation.serving,
                    "own_serve_done": record.rotation.own_serve_done,
                    "opponent_serve_done": record.rotation.opponent_serve_done,
                },
                "updated_at": DateTime::now(),
            }
        };
        let id = record.match_id;
        let result = collection
            .update_one(doc! {"_id": id.as_str()}, update)
            .await
            .map_err(|source| MongoDaoError::SaveMatch { id, source })?;
        Ok(result.matched_count > 0)
    }

    async fn list_matches(&self) -> MongoResult<Vec<MatchEntity>> {
        let collection = self.collection::<MongoMatchDocument>(MATCHES).await;
        let documents: Vec<MongoMatchDocument> = collection
            .find(doc! {})
            .sort(doc! {"created_at": -1})
            .await
            .map_err(|source| MongoDaoError::ListMatches { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListMatches { source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn delete_match(&self, id: String) -> MongoResult<bool> {
        let database = self.database().await;
        for collection in MATCH_ROW_COLLECTIONS {
            database
                .collection::<Document>(collection)
                .delete_many(doc! {"match_id": id.as_str()})
                .await
                .map_err(|source| MongoDaoError::DeleteMatch {
                    id: id.clone(),
                    collection,
                    source,
                })?;
        }
        let result = database
            .collection::<Document>(MATCHES)
            .delete_one(doc! {"_id": id.as_str()})
            .await
            .map_err(|source| MongoDaoError::DeleteMatch {
                id: id.clone(),
                collection: MATCHES,
                source,
            })?;
        Ok(result.deleted_count > 0)
    }

    /// Every row of `collection` belonging to `id`, in insertion order.
    async fn rows<T>(&self, collection: &'static str, id: String) -> MongoResult<Vec<T>>
    where
        T: serde::de::DeserializeOwned + Send + Sync + Unpin,
    {
        self.collection::<T>(collection)
            .await
            .find(doc! {"match_id": id.as_str()})
            .sort(doc! {"_id": 1})
            .await
            .map_err(|source| MongoDaoError::LoadRows {
                id: id.clone(),
                collection,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadRows {
                id,
                collection,
                source,
            })
    }

    /// `$inc` the `count` of the row matching `filter`, creating it first when absent.
    async fn increment<T>(
        &self,
        collection: &'static str,
        id: String,
        filter: Document,
        on_insert: Document,
    ) -> MongoResult<T>
    where
        T: serde::de::DeserializeOwned + Send + Sync,
    {
        self.collection::<T>(collection)
            .await
            .find_one_and_update(filter, doc! {"$inc": {"count": 1}, "$setOnInsert": on_insert})
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::SaveRow {
                id,
                collection,
                source,
            })?
            .ok_or(MongoDaoError::MissingUpsert { collection })
    }

    async fn list_lineup(&self, id: String) -> MongoResult<Vec<LineupEntity>> {
        let documents: Vec<MongoLineupDocument> = self.rows(LINEUPS, id).await?;
        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn append_lineup(&self, entry: LineupEntity) -> MongoResult<()> {
        let id = entry.match_id.clone();
        let document: MongoLineupDocument = entry.into();
        self.collection::<MongoLineupDocument>(LINEUPS)
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::SaveRow {
                id,
                collection: LINEUPS,
                source,
            })?;
        Ok(())
    }

    async fn remove_lineup(&self, id: String, entry_id: Uuid) -> MongoResult<bool> {
        let result = self
            .collection::<MongoLineupDocument>(LINEUPS)
            .await
            .delete_one(doc! {"_id": entry_id.to_string(), "match_id": id.as_str()})
            .await
            .map_err(|source| MongoDaoError::SaveRow {
                id,
                collection: LINEUPS,
                source,
            })?;
        Ok(result.deleted_count > 0)
    }

    async fn increment_grade(&self, increment: GradeIncrement) -> MongoResult<GradeTallyEntity> {
        let filter = doc! {
            "match_id": increment.match_id.as_str(),
            "side": increment.side.as_str(),
            "player_name": increment.player_name.as_str(),
            "grade": increment.grade.as_str(),
        };
        let on_insert = doc! {"player_id": increment.player_id};
        self.increment(GRADE_TALLIES, increment.match_id, filter, on_insert)
            .await
    }

    async fn increment_reason(&self, increment: ReasonIncrement) -> MongoResult<ReasonTallyEntity> {
        let filter = doc! {
            "match_id": increment.match_id.as_str(),
            "reason_id": increment.reason_id.as_str(),
        };
        let on_insert = doc! {"reason_type": increment.reason_type.as_str()};
        self.increment(REASON_TALLIES, increment.match_id, filter, on_insert)
            .await
    }

    async fn increment_player_reason(
        &self,
        increment: PlayerReasonIncrement,
    ) -> MongoResult<PlayerReasonTallyEntity> {
        let filter = doc! {
            "match_id": increment.match_id.as_str(),
            "player_id": increment.player_id.as_str(),
            "reason_id": increment.reason_id.as_str(),
        };
        let on_insert = doc! {
            "player_name": increment.player_name.as_str(),
            "reason_type": increment.reason_type.as_str(),
        };
        self.increment(PLAYER_REASON_TALLIES, increment.match_id, filter, on_insert)
            .await
    }

    async fn list_rotations(&self, id: String) -> MongoResult<Vec<RotationTallyEntity>> {
        let mut documents: Vec<MongoRotationDocument> = self.rows(ROTATION_TALLIES, id).await?;
        documents.sort_by_key(|document| document.slot);
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn upsert_rotation(&self, tally: RotationTallyEntity) -> MongoResult<()> {
        let id = tally.match_id.clone();
        self.collection::<MongoRotationDocument>(ROTATION_TALLIES)
            .await
            .update_one(
                doc! {"match_id": tally.match_id.as_str(), "slot": i32::from(tally.slot)},
                doc! {"$set": {
                    "serve": i64::from(tally.counter.serve),
                    "receive": i64::from(tally.counter.receive),
                }},
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveRow {
                id,
                collection: ROTATION_TALLIES,
                source,
            })?;
        Ok(())
    }

    async fn list_players(&self) -> MongoResult<Vec<PlayerEntity>> {
        let documents: Vec<MongoPlayerDocument> = self
            .collection::<MongoPlayerDocument>(PLAYERS)
            .await
            .find(doc! {})
            .sort(doc! {"name": 1})
            .await
            .map_err(|source| MongoDaoError::Roster { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Roster { source })?;
        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn create_player(&self, player: PlayerEntity) -> MongoResult<()> {
        let document: MongoPlayerDocument = player.into();
        self.collection::<MongoPlayerDocument>(PLAYERS)
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::Roster { source })?;
        Ok(())
    }

    async fn rename_player(&self, id: Uuid, name: String) -> MongoResult<Option<PlayerEntity>> {
        let document = self
            .collection::<MongoPlayerDocument>(PLAYERS)
            .await
            .find_one_and_update(doc! {"_id": id.to_string()}, doc! {"$set": {"name": name}})
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::Roster { source })?;
        document.map(TryInto::try_into).transpose()
    }

    async fn delete_player(&self, id: Uuid) -> MongoResult<bool> {
        let result = self
            .collection::<MongoPlayerDocument>(PLAYERS)
            .await
            .delete_one(doc! {"_id": id.to_string()})
            .await
            .map_err(|source| MongoDaoError::Roster { source })?;
        Ok(result.deleted_count > 0)
    }
}

impl MatchStore for MongoMatchStore {
    fn create_match(&self, record: MatchEntity) -> BoxFuture<'static, StorageResult<CreateOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.create_match(record).await.map_err(Into::into) })
    }

    fn find_match(&self, match_id: String) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_match(match_id).await.map_err(Into::into) })
    }

    fn update_match(&self, record: MatchEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.update_match(record).await.map_err(Into::into) })
    }

    fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_matches().await.map_err(Into::into) })
    }

    fn delete_match(&self, match_id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_match(match_id).await.map_err(Into::into) })
    }

    fn list_lineup(&self, match_id: String) -> BoxFuture<'static, StorageResult<Vec<LineupEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_lineup(match_id).await.map_err(Into::into) })
    }

    fn append_lineup(&self, entry: LineupEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.append_lineup(entry).await.map_err(Into::into) })
    }

    fn remove_lineup(&self, match_id: String, entry_id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .remove_lineup(match_id, entry_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_grades(&self, match_id: String) -> BoxFuture<'static, StorageResult<Vec<GradeTallyEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.rows(GRADE_TALLIES, match_id).await.map_err(Into::into) })
    }

    fn increment_grade(&self, increment: GradeIncrement) -> BoxFuture<'static, StorageResult<GradeTallyEntity>> {
        let store = self.clone();
        Box::pin(async move { store.increment_grade(increment).await.map_err(Into::into) })
    }

    fn list_reasons(&self, match_id: String) -> BoxFuture<'static, StorageResult<Vec<ReasonTallyEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.rows(REASON_TALLIES, match_id).await.map_err(Into::into) })
    }

    fn increment_reason(&self, increment: ReasonIncrement) -> BoxFuture<'static, StorageResult<ReasonTallyEntity>> {
        let store = self.clone();
        Box::pin(async move { store.increment_reason(increment).await.map_err(Into::into) })
    }

    fn list_player_reasons(
        &self,
        match_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerReasonTallyEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .rows(PLAYER_REASON_TALLIES, match_id)
                .await
                .map_err(Into::into)
        })
    }

    fn increment_player_reason(
        &self,
        increment: PlayerReasonIncrement,
    ) -> BoxFuture<'static, StorageResult<PlayerReasonTallyEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .increment_player_reason(increment)
                .await
                .map_err(Into::into)
        })
    }

    fn list_rotations(&self, match_id: String) -> BoxFuture<'static, StorageResult<Vec<RotationTallyEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_rotations(match_id).await.map_err(Into::into) })
    }

    fn upsert_rotation(&self, tally: RotationTallyEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.upsert_rotation(tally).await.map_err(Into::into) })
    }

    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_players().await.map_err(Into::into) })
    }

    fn create_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.create_player(player).await.map_err(Into::into) })
    }

    fn rename_player(&self, id: Uuid, name: String) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.rename_player(id, name).await.map_err(Into::into) })
    }

    fn delete_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_player(id).await.map_err(Into::into) })
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
