pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{
    CreateOutcome, GradeIncrement, GradeTallyEntity, LineupEntity, MatchBundle, MatchEntity,
    PlayerEntity, PlayerReasonIncrement, PlayerReasonTallyEntity, ReasonIncrement,
    ReasonTallyEntity, RotationTallyEntity,
};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for matches, their tallies and the roster.
pub trait MatchStore: Send + Sync {
    fn create_match(&self, record: MatchEntity) -> BoxFuture<'static, StorageResult<CreateOutcome>>;
    fn find_match(&self, match_id: String) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;
    /// Replace a match row. `false` when no such match exists.
    fn update_match(&self, record: MatchEntity) -> BoxFuture<'static, StorageResult<bool>>;
    /// Every match, newest first.
    fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>>;
    /// Remove a match and every row attached to it. `false` when no such match exists.
    fn delete_match(&self, match_id: String) -> BoxFuture<'static, StorageResult<bool>>;

    fn list_lineup(&self, match_id: String) -> BoxFuture<'static, StorageResult<Vec<LineupEntity>>>;
    fn append_lineup(&self, entry: LineupEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn remove_lineup(&self, match_id: String, entry_id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;

    fn list_grades(&self, match_id: String) -> BoxFuture<'static, StorageResult<Vec<GradeTallyEntity>>>;
    /// Create-or-increment by one.
    fn increment_grade(&self, increment: GradeIncrement) -> BoxFuture<'static, StorageResult<GradeTallyEntity>>;

    fn list_reasons(&self, match_id: String) -> BoxFuture<'static, StorageResult<Vec<ReasonTallyEntity>>>;
    fn increment_reason(&self, increment: ReasonIncrement) -> BoxFuture<'static, StorageResult<ReasonTallyEntity>>;

    fn list_player_reasons(
        &self,
        match_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerReasonTallyEntity>>>;
    fn increment_player_reason(
        &self,
        increment: PlayerReasonIncrement,
    ) -> BoxFuture<'static, StorageResult<PlayerReasonTallyEntity>>;

    fn list_rotations(&self, match_id: String) -> BoxFuture<'static, StorageResult<Vec<RotationTallyEntity>>>;
    fn upsert_rotation(&self, tally: RotationTallyEntity) -> BoxFuture<'static, StorageResult<()>>;

    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
    fn create_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn rename_player(&self, id: Uuid, name: String) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    fn delete_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Load a match with every attached row, or `None` when the match does not exist.
pub async fn load_bundle(store: &dyn MatchStore, match_id: &str) -> StorageResult<Option<MatchBundle>> {
    let Some(record) = store.find_match(match_id.to_string()).await? else {
        return Ok(None);
    };
    let id = || match_id.to_string();
    let (lineup, grades, reasons, player_reasons, rotations) = futures::try_join!(
        store.list_lineup(id()),
        store.list_grades(id()),
        store.list_reasons(id()),
        store.list_player_reasons(id()),
        store.list_rotations(id()),
    )?;
    Ok(Some(MatchBundle {
        record,
        lineup,
        grades,
        reasons,
        player_reasons,
        rotations,
    }))
}
