use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::{
    dao::{match_store::MatchStore, storage::StorageResult},
    state::{
        reasons::ReasonCatalog,
        scoring::{MirrorWrite, ScoreRejection, ScoringEngine},
        session::MatchSession,
    },
};

enum MirrorCommand {
    Write(MirrorWrite),
    Flush(oneshot::Sender<()>),
}

/// The session being scored on this client, plus the queue mirroring it to storage.
///
/// Interactions run synchronously against the in-memory engine. The writes they produce are
/// handed to a background worker that applies them in order; a failed write is logged and
/// dropped.
pub struct LiveMatch {
    engine: Option<ScoringEngine>,
    catalog: ReasonCatalog,
    mirror: mpsc::UnboundedSender<MirrorCommand>,
}

impl LiveMatch {
    /// Must be called from within a tokio runtime.
    pub fn new(store: Arc<dyn MatchStore>, catalog: ReasonCatalog) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_mirror(store, rx));
        Self {
            engine: None,
            catalog,
            mirror: tx,
        }
    }

    /// Id of the loaded session.
    pub fn session_id(&self) -> Option<String> {
        self.engine.as_ref().map(|engine| engine.session().id.clone())
    }

    pub fn engine(&self) -> Option<&ScoringEngine> {
        self.engine.as_ref()
    }

    /// Replace whatever is loaded with `session`.
    pub fn load(&mut self, session: MatchSession) {
        match self.engine.as_mut() {
            Some(engine) => engine.replace_session(session),
            None => self.engine = Some(ScoringEngine::new(session, self.catalog)),
        }
    }

    pub fn clear(&mut self) {
        self.engine = None;
    }

    /// Run one interaction and queue the writes it produced.
    pub fn apply<T>(
        &mut self,
        action: impl FnOnce(&mut ScoringEngine) -> Result<T, ScoreRejection>,
    ) -> Result<T, ScoreRejection> {
        let engine = self.engine.as_mut().ok_or(ScoreRejection::NoSession)?;
        let outcome = action(engine);
        for write in engine.take_writes() {
            if self.mirror.send(MirrorCommand::Write(write)).is_err() {
                warn!("mirror worker stopped; dropping write");
                break;
            }
        }
        outcome
    }

    /// Wait until every write queued so far has been attempted.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.mirror.send(MirrorCommand::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

async fn run_mirror(store: Arc<dyn MatchStore>, mut rx: mpsc::UnboundedReceiver<MirrorCommand>) {
    while let Some(command) = rx.recv().await {
        match command {
            MirrorCommand::Write(write) => {
                let kind = write_kind(&write);
                if let Err(err) = apply_write(store.as_ref(), write).await {
                    warn!(write = kind, error = %err, "mirror write failed");
                }
            }
            MirrorCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("mirror worker stopped");
}

async fn apply_write(store: &dyn MatchStore, write: MirrorWrite) -> StorageResult<()> {
    match write {
        MirrorWrite::CreateMatch(record) => {
            let outcome = store.create_match(record).await?;
            debug!(?outcome, "mirrored match creation");
        }
        MirrorWrite::UpdateMatch(record) => {
            let match_id = record.match_id.clone();
            if !store.update_match(record).await? {
                warn!(match_id = %match_id, "mirrored update hit no match row");
            }
        }
        MirrorWrite::AppendLineup(entry) => store.append_lineup(entry).await?,
        MirrorWrite::RemoveLineup { match_id, entry_id } => {
            store.remove_lineup(match_id, entry_id).await?;
        }
        MirrorWrite::IncrementGrade(increment) => {
            store.increment_grade(increment).await?;
        }
        MirrorWrite::IncrementReason(increment) => {
            store.increment_reason(increment).await?;
        }
        MirrorWrite::IncrementPlayerReason(increment) => {
            store.increment_player_reason(increment).await?;
        }
        MirrorWrite::UpsertRotation(tally) => store.upsert_rotation(tally).await?,
    }
    Ok(())
}

fn write_kind(write: &MirrorWrite) -> &'static str {
    match write {
        MirrorWrite::CreateMatch(_) => "create_match",
        MirrorWrite::UpdateMatch(_) => "update_match",
        MirrorWrite::AppendLineup(_) => "append_lineup",
        MirrorWrite::RemoveLineup { .. } => "remove_lineup",
        MirrorWrite::IncrementGrade(_) => "increment_grade",
        MirrorWrite::IncrementReason(_) => "increment_reason",
        MirrorWrite::IncrementPlayerReason(_) => "increment_player_reason",
        MirrorWrite::UpsertRotation(_) => "upsert_rotation",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::{
            match_store::{load_bundle, memory::MemoryMatchStore},
            models::MatchEntity,
        },
        state::{
            reasons::{ReasonId, Side},
            session::Grade,
        },
    };

    async fn live_with_record(store: &MemoryMatchStore) -> LiveMatch {
        store
            .create_match(MatchEntity::empty("ABC123"))
            .await
            .unwrap();
        let mut live = LiveMatch::new(Arc::new(store.clone()), ReasonCatalog::default());
        live.load(MatchSession::new("ABC123"));
        live
    }

    #[tokio::test]
    async fn interactions_without_a_session_are_rejected() {
        let mut live = LiveMatch::new(Arc::new(MemoryMatchStore::new()), ReasonCatalog::default());
        let err = live
            .apply(|engine| engine.add_player(Side::Opposing, "7", None))
            .unwrap_err();
        assert_eq!(err, ScoreRejection::NoSession);
        assert_eq!(live.session_id(), None);
    }

    #[tokio::test]
    async fn writes_reach_the_store_in_order() {
        let store = MemoryMatchStore::new();
        let mut live = live_with_record(&store).await;

        live.apply(|engine| engine.add_player(Side::Own, "p1", Some("Lin".into())))
            .unwrap();
        live.apply(|engine| {
            engine.grade_player(Side::Own, "p1", Grade::A)?;
            engine.record_point(Side::Own, ReasonId::Attack, Some("p1".into()))
        })
        .unwrap();
        live.flush().await;

        let lineup = store.list_lineup("ABC123".into()).await.unwrap();
        assert_eq!(lineup.len(), 1);
        let record = store.find_match("ABC123".into()).await.unwrap().unwrap();
        assert_eq!(record.our_score, 1);
        let players = store.list_player_reasons("ABC123".into()).await.unwrap();
        assert_eq!(players[0].count, 1);
        assert_eq!(players[0].player_name, "Lin");
    }

    #[tokio::test]
    async fn failed_writes_leave_local_state_alone() {
        let store = MemoryMatchStore::new();
        let mut live = live_with_record(&store).await;
        store.set_offline(true);

        live.apply(|engine| engine.add_player(Side::Opposing, "7", None))
            .unwrap();
        live.apply(|engine| {
            engine.grade_player(Side::Opposing, "7", Grade::D)?;
            engine.record_point(Side::Own, ReasonId::OppServeError, None)
        })
        .unwrap();
        live.flush().await;

        let engine = live.engine().unwrap();
        assert_eq!(engine.session().score(Side::Own), 1);
        assert_eq!(engine.session().reason_tally(ReasonId::OppServeError), 1);

        store.set_offline(false);
        let reasons = store.list_reasons("ABC123".into()).await.unwrap();
        assert!(reasons.is_empty());
    }

    #[tokio::test]
    async fn loading_another_session_replaces_the_engine_state() {
        let store = MemoryMatchStore::new();
        let mut live = live_with_record(&store).await;
        live.apply(|engine| engine.add_player(Side::Opposing, "7", None))
            .unwrap();

        live.load(MatchSession::new("XYZ789"));
        assert_eq!(live.session_id().as_deref(), Some("XYZ789"));
        assert!(live.engine().unwrap().session().lineup(Side::Opposing).is_empty());

        live.clear();
        assert!(live.engine().is_none());
    }

    #[tokio::test]
    async fn reload_resumes_the_rotation_position() {
        let store = MemoryMatchStore::new();
        let mut live = live_with_record(&store).await;
        live.apply(|engine| engine.add_player(Side::Own, "p1", Some("Lin".into())))
            .unwrap();
        for _ in 0..2 {
            live.apply(|engine| {
                engine.grade_player(Side::Own, "p1", Grade::B)?;
                engine.record_point(Side::Own, ReasonId::Attack, Some("p1".into()))
            })
            .unwrap();
        }
        live.flush().await;
        let before = live.engine().unwrap().session().rotation().clone();
        assert_eq!(before.current_slot(), 2);
        assert!(before.serving());

        let bundle = load_bundle(&store, "ABC123").await.unwrap().unwrap();
        let reloaded = MatchSession::from(bundle);
        assert_eq!(reloaded.rotation(), &before);
    }
}
