use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::SystemTime,
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::{
    dao::{
        match_store::MatchStore,
        models::{
            CreateOutcome, GradeIncrement, GradeTallyEntity, LineupEntity, MatchEntity,
            PlayerEntity, PlayerReasonIncrement, PlayerReasonTallyEntity, ReasonIncrement,
            ReasonTallyEntity, RotationTallyEntity,
        },
        storage::{StorageError, StorageResult},
    },
    state::{
        reasons::{ReasonId, Side},
        session::Grade,
    },
};

type GradeKey = (String, Side, String, Grade);
type PlayerReasonKey = (String, String, ReasonId);

/// Row tagged with its insertion sequence so listings stay in insertion order.
#[derive(Debug, Clone)]
struct Row<T> {
    seq: u64,
    value: T,
}

/// Process-local store used by tests and `STORAGE_BACKEND=memory`.
#[derive(Clone, Default)]
pub struct MemoryMatchStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    seq: AtomicU64,
    offline: AtomicBool,
    matches: DashMap<String, Row<MatchEntity>>,
    lineups: DashMap<Uuid, Row<LineupEntity>>,
    grades: DashMap<GradeKey, Row<GradeTallyEntity>>,
    reasons: DashMap<(String, ReasonId), Row<ReasonTallyEntity>>,
    player_reasons: DashMap<PlayerReasonKey, Row<PlayerReasonTallyEntity>>,
    rotations: DashMap<(String, u8), Row<RotationTallyEntity>>,
    players: DashMap<Uuid, Row<PlayerEntity>>,
}

impl MemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails with [`StorageError::Unavailable`] while offline.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }
}

impl MemoryInner {
    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    fn row<T>(&self, value: T) -> Row<T> {
        Row {
            seq: self.next_seq(),
            value,
        }
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "memory store offline".into(),
                io::Error::new(io::ErrorKind::NotConnected, "offline"),
            ));
        }
        Ok(())
    }

    fn collect<K, T, F>(&self, map: &DashMap<K, Row<T>>, keep: F) -> Vec<T>
    where
        K: Eq + std::hash::Hash,
        T: Clone,
        F: Fn(&T) -> bool,
    {
        let mut rows: Vec<Row<T>> = map
            .iter()
            .filter(|entry| keep(&entry.value().value))
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(|row| row.seq);
        rows.into_iter().map(|row| row.value).collect()
    }

    fn create_match(&self, record: MatchEntity) -> StorageResult<CreateOutcome> {
        self.ensure_online()?;
        let row = self.row(record);
        match self.matches.entry(row.value.match_id.clone()) {
            Entry::Occupied(_) => Ok(CreateOutcome::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(row);
                Ok(CreateOutcome::Created)
            }
        }
    }

    fn update_match(&self, mut record: MatchEntity) -> StorageResult<bool> {
        self.ensure_online()?;
        let Some(mut existing) = self.matches.get_mut(&record.match_id) else {
            return Ok(false);
        };
        record.created_at = existing.value.created_at;
        record.updated_at = SystemTime::now();
        existing.value = record;
        Ok(true)
    }

    fn list_matches(&self) -> StorageResult<Vec<MatchEntity>> {
        self.ensure_online()?;
        let mut rows: Vec<Row<MatchEntity>> =
            self.matches.iter().map(|entry| entry.value().clone()).collect();
        rows.sort_by(|left, right| {
            right
                .value
                .created_at
                .cmp(&left.value.created_at)
                .then(right.seq.cmp(&left.seq))
        });
        Ok(rows.into_iter().map(|row| row.value).collect())
    }

    fn delete_match(&self, match_id: &str) -> StorageResult<bool> {
        self.ensure_online()?;
        self.lineups.retain(|_, row| row.value.match_id != match_id);
        self.grades.retain(|key, _| key.0 != match_id);
        self.reasons.retain(|key, _| key.0 != match_id);
        self.player_reasons.retain(|key, _| key.0 != match_id);
        self.rotations.retain(|key, _| key.0 != match_id);
        Ok(self.matches.remove(match_id).is_some())
    }

    fn increment_grade(&self, increment: GradeIncrement) -> StorageResult<GradeTallyEntity> {
        self.ensure_online()?;
        let key = (
            increment.match_id.clone(),
            increment.side,
            increment.player_name.clone(),
            increment.grade,
        );
        let seq = self.next_seq();
        let mut row = self.grades.entry(key).or_insert_with(|| Row {
            seq,
            value: GradeTallyEntity {
                match_id: increment.match_id,
                side: increment.side,
                player_id: increment.player_id,
                player_name: increment.player_name,
                grade: increment.grade,
                count: 0,
            },
        });
        row.value.count += 1;
        Ok(row.value.clone())
    }

    fn increment_reason(&self, increment: ReasonIncrement) -> StorageResult<ReasonTallyEntity> {
        self.ensure_online()?;
        let seq = self.next_seq();
        let mut row = self
            .reasons
            .entry((increment.match_id.clone(), increment.reason_id))
            .or_insert_with(|| Row {
                seq,
                value: ReasonTallyEntity {
                    match_id: increment.match_id,
                    reason_id: increment.reason_id,
                    reason_type: increment.reason_type,
                    count: 0,
                },
            });
        row.value.count += 1;
        Ok(row.value.clone())
    }

    fn increment_player_reason(
        &self,
        increment: PlayerReasonIncrement,
    ) -> StorageResult<PlayerReasonTallyEntity> {
        self.ensure_online()?;
        let key = (
            increment.match_id.clone(),
            increment.player_id.clone(),
            increment.reason_id,
        );
        let seq = self.next_seq();
        let mut row = self.player_reasons.entry(key).or_insert_with(|| Row {
            seq,
            value: PlayerReasonTallyEntity {
                match_id: increment.match_id,
                player_id: increment.player_id,
                player_name: increment.player_name,
                reason_id: increment.reason_id,
                reason_type: increment.reason_type,
                count: 0,
            },
        });
        row.value.count += 1;
        Ok(row.value.clone())
    }

    fn upsert_rotation(&self, tally: RotationTallyEntity) -> StorageResult<()> {
        self.ensure_online()?;
        let key = (tally.match_id.clone(), tally.slot);
        match self.rotations.entry(key) {
            Entry::Occupied(mut slot) => slot.get_mut().value = tally,
            Entry::Vacant(slot) => {
                slot.insert(self.row(tally));
            }
        }
        Ok(())
    }

    fn rename_player(&self, id: Uuid, name: String) -> StorageResult<Option<PlayerEntity>> {
        self.ensure_online()?;
        Ok(self.players.get_mut(&id).map(|mut row| {
            row.value.name = name;
            row.value.clone()
        }))
    }

    fn list_players(&self) -> StorageResult<Vec<PlayerEntity>> {
        self.ensure_online()?;
        let mut players = self.collect(&self.players, |_| true);
        players.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(players)
    }
}

impl MatchStore for MemoryMatchStore {
    fn create_match(&self, record: MatchEntity) -> BoxFuture<'static, StorageResult<CreateOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.inner.create_match(record) })
    }

    fn find_match(&self, match_id: String) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.ensure_online()?;
            Ok(store
                .inner
                .matches
                .get(&match_id)
                .map(|row| row.value.clone()))
        })
    }

    fn update_match(&self, record: MatchEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.inner.update_match(record) })
    }

    fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.inner.list_matches() })
    }

    fn delete_match(&self, match_id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.inner.delete_match(&match_id) })
    }

    fn list_lineup(&self, match_id: String) -> BoxFuture<'static, StorageResult<Vec<LineupEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.ensure_online()?;
            Ok(store
                .inner
                .collect(&store.inner.lineups, |row| row.match_id == match_id))
        })
    }

    fn append_lineup(&self, entry: LineupEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.ensure_online()?;
            let row = store.inner.row(entry);
            store.inner.lineups.insert(row.value.id, row);
            Ok(())
        })
    }

    fn remove_lineup(&self, match_id: String, entry_id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.ensure_online()?;
            Ok(store
                .inner
                .lineups
                .remove_if(&entry_id, |_, row| row.value.match_id == match_id)
                .is_some())
        })
    }

    fn list_grades(&self, match_id: String) -> BoxFuture<'static, StorageResult<Vec<GradeTallyEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.ensure_online()?;
            Ok(store
                .inner
                .collect(&store.inner.grades, |row| row.match_id == match_id))
        })
    }

    fn increment_grade(&self, increment: GradeIncrement) -> BoxFuture<'static, StorageResult<GradeTallyEntity>> {
        let store = self.clone();
        Box::pin(async move { store.inner.increment_grade(increment) })
    }

    fn list_reasons(&self, match_id: String) -> BoxFuture<'static, StorageResult<Vec<ReasonTallyEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.ensure_online()?;
            Ok(store
                .inner
                .collect(&store.inner.reasons, |row| row.match_id == match_id))
        })
    }

    fn increment_reason(&self, increment: ReasonIncrement) -> BoxFuture<'static, StorageResult<ReasonTallyEntity>> {
        let store = self.clone();
        Box::pin(async move { store.inner.increment_reason(increment) })
    }

    fn list_player_reasons(
        &self,
        match_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerReasonTallyEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.ensure_online()?;
            Ok(store
                .inner
                .collect(&store.inner.player_reasons, |row| row.match_id == match_id))
        })
    }

    fn increment_player_reason(
        &self,
        increment: PlayerReasonIncrement,
    ) -> BoxFuture<'static, StorageResult<PlayerReasonTallyEntity>> {
        let store = self.clone();
        Box::pin(async move { store.inner.increment_player_reason(increment) })
    }

    fn list_rotations(&self, match_id: String) -> BoxFuture<'static, StorageResult<Vec<RotationTallyEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.ensure_online()?;
            let mut rows = store
                .inner
                .collect(&store.inner.rotations, |row| row.match_id == match_id);
            rows.sort_by_key(|row| row.slot);
            Ok(rows)
        })
    }

    fn upsert_rotation(&self, tally: RotationTallyEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.upsert_rotation(tally) })
    }

    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.inner.list_players() })
    }

    fn create_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.ensure_online()?;
            let row = store.inner.row(player);
            store.inner.players.insert(row.value.id, row);
            Ok(())
        })
    }

    fn rename_player(&self, id: Uuid, name: String) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.inner.rename_player(id, name) })
    }

    fn delete_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.ensure_online()?;
            Ok(store.inner.players.remove(&id).is_some())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ensure_online() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ensure_online() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::match_store::load_bundle,
        state::{reasons::ReasonType, rotation::RotationCounter},
    };

    #[tokio::test]
    async fn create_is_idempotent() {
        let store = MemoryMatchStore::new();
        let first = store.create_match(MatchEntity::empty("ABC123")).await.unwrap();
        let second = store.create_match(MatchEntity::empty("ABC123")).await.unwrap();
        assert_eq!(first, CreateOutcome::Created);
        assert_eq!(second, CreateOutcome::AlreadyExists);
        assert_eq!(store.list_matches().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn increments_create_then_add_one() {
        let store = MemoryMatchStore::new();
        let increment = ReasonIncrement {
            match_id: "ABC123".into(),
            reason_id: ReasonId::Attack,
            reason_type: ReasonType::Score,
        };
        store.increment_reason(increment.clone()).await.unwrap();
        let row = store.increment_reason(increment).await.unwrap();
        assert_eq!(row.count, 2);

        let grade = GradeIncrement {
            match_id: "ABC123".into(),
            side: Side::Opposing,
            player_id: Some("7".into()),
            player_name: "Riverside_7".into(),
            grade: Grade::D,
        };
        store.increment_grade(grade.clone()).await.unwrap();
        store.increment_grade(grade).await.unwrap();
        let grades = store.list_grades("ABC123".into()).await.unwrap();
        assert_eq!(grades.len(), 1);
        assert_eq!(grades[0].count, 2);
    }

    #[tokio::test]
    async fn delete_cascades_to_every_row() {
        let store = MemoryMatchStore::new();
        store.create_match(MatchEntity::empty("ABC123")).await.unwrap();
        store.create_match(MatchEntity::empty("KEEP01")).await.unwrap();
        for match_id in ["ABC123", "KEEP01"] {
            store
                .upsert_rotation(RotationTallyEntity {
                    match_id: match_id.into(),
                    slot: 1,
                    counter: RotationCounter { serve: 1, receive: 0 },
                })
                .await
                .unwrap();
            store
                .append_lineup(LineupEntity {
                    id: Uuid::new_v4(),
                    match_id: match_id.into(),
                    side: Side::Own,
                    player_id: Some("p1".into()),
                    player_name: "Lin".into(),
                })
                .await
                .unwrap();
        }

        assert!(store.delete_match("ABC123".into()).await.unwrap());
        assert!(load_bundle(&store, "ABC123").await.unwrap().is_none());
        assert!(store.list_lineup("ABC123".into()).await.unwrap().is_empty());
        assert!(store.list_rotations("ABC123".into()).await.unwrap().is_empty());

        let kept = load_bundle(&store, "KEEP01").await.unwrap().unwrap();
        assert_eq!(kept.lineup.len(), 1);
        assert_eq!(kept.rotations.len(), 1);
    }

    #[tokio::test]
    async fn rotation_upsert_overwrites() {
        let store = MemoryMatchStore::new();
        for serve in 1..=3 {
            store
                .upsert_rotation(RotationTallyEntity {
                    match_id: "ABC123".into(),
                    slot: 4,
                    counter: RotationCounter { serve, receive: 2 },
                })
                .await
                .unwrap();
        }
        let rows = store.list_rotations("ABC123".into()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].counter.serve, 3);
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = MemoryMatchStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.health_check().await,
            Err(StorageError::Unavailable { .. })
        ));
        store.set_offline(false);
        assert!(store.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn roster_is_sorted_by_name() {
        let store = MemoryMatchStore::new();
        for name in ["Wu", "Chen", "Lin"] {
            store
                .create_player(PlayerEntity {
                    id: Uuid::new_v4(),
                    name: name.into(),
                    created_at: SystemTime::now(),
                })
                .await
                .unwrap();
        }
        let names: Vec<String> = store
            .list_players()
            .await
            .unwrap()
            .into_iter()
            .map(|player| player.name)
            .collect();
        assert_eq!(names, vec!["Chen", "Lin", "Wu"]);
    }
}
