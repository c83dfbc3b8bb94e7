//! Client construction and readiness probing.

use std::{iter, time::Duration};

use mongodb::{Client, Database, bson::doc, error::Error as MongoError, options::ClientOptions};
use tokio::time::sleep;
use tracing::debug;

use super::error::{MongoDaoError, MongoResult};

/// How many pings to try before giving up on a fresh client, and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectPolicy {
    pub attempts: u32,
    pub first_delay: Duration,
    pub max_delay: Duration,
}

impl ConnectPolicy {
    /// Startup: the database may still be coming up alongside the service.
    pub const STARTUP: Self = Self {
        attempts: 10,
        first_delay: Duration::from_millis(250),
        max_delay: Duration::from_secs(5),
    };

    /// A single probe. The storage supervisor owns retries once the service runs.
    pub const SINGLE: Self = Self {
        attempts: 1,
        first_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    };

    fn delays(self) -> impl Iterator<Item = Duration> {
        iter::successors(Some(self.first_delay), move |delay| {
            Some((*delay * 2).min(self.max_delay))
        })
    }
}

pub async fn ping(database: &Database) -> Result<(), MongoError> {
    database.run_command(doc! { "ping": 1 }).await.map(drop)
}

/// Build a client for `database_name` and wait until it answers `ping`.
pub async fn open(
    options: &ClientOptions,
    database_name: &str,
    policy: ConnectPolicy,
) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    let mut delays = policy.delays();
    let mut attempt = 0;
    loop {
        attempt += 1;
        match ping(&database).await {
            Ok(()) => return Ok((client, database)),
            Err(source) if attempt >= policy.attempts.max(1) => {
                return Err(MongoDaoError::InitialPing {
                    attempts: attempt,
                    source,
                });
            }
            Err(err) => {
                let delay = delays.next().unwrap_or(policy.max_delay);
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "MongoDB not ready; retrying"
                );
                sleep(delay).await;
            }
        }
    }
}
