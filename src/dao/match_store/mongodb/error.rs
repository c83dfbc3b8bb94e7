use mongodb::error::Error as MongoError;
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save match `{id}`")]
    SaveMatch {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load match `{id}`")]
    LoadMatch {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to list matches")]
    ListMatches {
        #[source]
        source: MongoError,
    },
    #[error("failed to delete match `{id}` from `{collection}`")]
    DeleteMatch {
        id: String,
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to read `{collection}` rows of match `{id}`")]
    LoadRows {
        id: String,
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to write `{collection}` row of match `{id}`")]
    SaveRow {
        id: String,
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("upsert on `{collection}` returned no document")]
    MissingUpsert { collection: &'static str },
    #[error("failed to access the player roster")]
    Roster {
        #[source]
        source: MongoError,
    },
    #[error("invalid player id `{id}` stored in roster")]
    InvalidPlayerId {
        id: String,
        #[source]
        source: uuid::Error,
    },
}
