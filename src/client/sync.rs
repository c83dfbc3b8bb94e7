//! Poll loop keeping a client's loaded session aligned with the coordinator.

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    client::{
        gateway::{GatewayError, SessionSource},
        live::LiveMatch,
    },
    dao::match_store::{MatchStore, load_bundle},
    dto::session::NextSetResponse,
    state::{reasons::ReasonCatalog, scoring::ScoreRejection, session::MatchSession},
};

/// What one poll did to the local session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Local and remote ids agree.
    Unchanged,
    /// Nothing was loaded; the remote session is now.
    Adopted(String),
    /// The remote id moved; the new session replaced the old one.
    Switched { from: String, to: String },
    /// The coordinator named a session with no stored record. The local session was dropped.
    NotFound(String),
    /// A request failed. Local state is untouched.
    Failed,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Rejected(#[from] ScoreRejection),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Scoring client: a [`LiveMatch`] plus the coordinator it follows.
pub struct SyncClient {
    source: Arc<dyn SessionSource>,
    store: Arc<dyn MatchStore>,
    live: Arc<Mutex<LiveMatch>>,
}

impl SyncClient {
    pub fn new(
        source: Arc<dyn SessionSource>,
        store: Arc<dyn MatchStore>,
        catalog: ReasonCatalog,
    ) -> Self {
        let live = LiveMatch::new(Arc::clone(&store), catalog);
        Self {
            source,
            store,
            live: Arc::new(Mutex::new(live)),
        }
    }

    /// Session being scored. Lock it to run interactions.
    pub fn live(&self) -> Arc<Mutex<LiveMatch>> {
        Arc::clone(&self.live)
    }

    pub async fn session_id(&self) -> Option<String> {
        self.live.lock().await.session_id()
    }

    /// Fetch the active id and report activity concurrently, then reload when the id moved.
    pub async fn tick(&self) -> SyncOutcome {
        let (active, touched) = tokio::join!(
            self.source.active_session(),
            self.source.report_activity()
        );
        if let Err(err) = touched {
            warn!(error = %err, "failed to report activity");
        }
        let remote = match active {
            Ok(id) => id,
            Err(err) => {
                warn!(error = %err, "failed to fetch the active session");
                return SyncOutcome::Failed;
            }
        };

        let local = self.session_id().await;
        if local.as_deref() == Some(remote.as_str()) {
            return SyncOutcome::Unchanged;
        }

        let bundle = match load_bundle(self.store.as_ref(), &remote).await {
            Ok(bundle) => bundle,
            Err(err) => {
                warn!(session_id = %remote, error = %err, "failed to load session");
                return SyncOutcome::Failed;
            }
        };

        let mut live = self.live.lock().await;
        let local = live.session_id();
        if local.as_deref() == Some(remote.as_str()) {
            return SyncOutcome::Unchanged;
        }
        let Some(bundle) = bundle else {
            warn!(session_id = %remote, "session not found");
            live.clear();
            return SyncOutcome::NotFound(remote);
        };
        live.load(MatchSession::from(bundle));
        info!(session_id = %remote, previous = ?local, "loaded session");
        match local {
            Some(from) => SyncOutcome::Switched { from, to: remote },
            None => SyncOutcome::Adopted(remote),
        }
    }

    /// Ask the coordinator for the next set. When this client wins, the roster is carried into
    /// the new session right away; otherwise the next tick loads the winner's session.
    pub async fn next_set(&self) -> Result<NextSetResponse, SyncError> {
        let current = self
            .session_id()
            .await
            .ok_or(ScoreRejection::NoSession)?;
        let response = self.source.next_set(current.clone()).await?;
        if response.superseded {
            let mut live = self.live.lock().await;
            if live.session_id().as_deref() == Some(current.as_str()) {
                let next = response.session_id.clone();
                live.apply(|engine| {
                    engine.next_set(next);
                    Ok(())
                })?;
                info!(from = %current, to = %response.session_id, "started next set");
            }
        }
        Ok(response)
    }

    /// Poll every `interval` until the handle is stopped. A poll in flight at stop time is
    /// abandoned and its result discarded.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> SyncHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    outcome = self.tick() => debug!(?outcome, "sync tick"),
                }
            }
            debug!("sync loop stopped");
        });
        SyncHandle {
            stop: stop_tx,
            task,
        }
    }
}

/// Running poll loop.
pub struct SyncHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "sync loop ended abnormally");
        }
    }
}
