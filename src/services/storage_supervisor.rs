use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{match_store::MatchStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep a match store installed in the shared state, toggling degraded mode while it is down.
///
/// `connect` is retried with exponential backoff until it yields a store; the store is then
/// health-checked every few seconds and reconnected in place when a check fails. When in-place
/// reconnection gives up, the store is dropped and a fresh connection is attempted.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn MatchStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        let store = match connect().await {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
                continue;
            }
        };

        state.set_match_store(store.clone()).await;
        info!("storage connection established; leaving degraded mode");
        delay = INITIAL_DELAY;

        watch_store(&state, store.as_ref()).await;

        warn!("exhausted storage reconnect attempts; dropping store");
        state.clear_match_store().await;
        sleep(delay).await;
    }
}

/// Health-check `store` until it cannot be revived.
async fn watch_store(state: &SharedState, store: &dyn MatchStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded().await {
                    info!("storage healthy again; leaving degraded mode");
                    state.update_degraded(false).await;
                }
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                if !reconnect(state, store).await {
                    return;
                }
                state.update_degraded(false).await;
            }
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

/// Bounded in-place reconnection. Enters degraded mode on the first failure.
async fn reconnect(state: &SharedState, store: &dyn MatchStore) -> bool {
    let mut backoff = INITIAL_DELAY;
    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(attempt, error = %err, "storage reconnect failed; entering degraded mode");
                    state.update_degraded(true).await;
                } else {
                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                }
                sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_DELAY);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, dao::match_store::memory::MemoryMatchStore, state::AppState};

    #[tokio::test(start_paused = true)]
    async fn outage_toggles_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryMatchStore::new();
        let installed = store.clone();
        let supervisor = tokio::spawn(run(state.clone(), move || {
            let store = installed.clone();
            async move { Ok(Arc::new(store) as Arc<dyn MatchStore>) }
        }));

        sleep(Duration::from_millis(10)).await;
        assert!(!state.is_degraded().await);

        store.set_offline(true);
        sleep(HEALTH_POLL_INTERVAL + Duration::from_millis(10)).await;
        assert!(state.is_degraded().await);

        store.set_offline(false);
        sleep(MAX_DELAY * 4).await;
        assert!(!state.is_degraded().await);
        assert!(state.match_store().await.is_some());

        supervisor.abort();
    }
}
