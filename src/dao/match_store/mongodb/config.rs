use std::env;

use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_URI: &str = "mongodb://localhost:27017";
const DEFAULT_DATABASE: &str = "volley_stats";

/// Parsed client options plus the database holding the match collections.
#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
}

impl MongoConfig {
    /// `MONGO_URI` (default `mongodb://localhost:27017`) and `MONGO_DB` (default `volley_stats`).
    pub async fn from_env() -> MongoResult<Self> {
        let uri = env::var("MONGO_URI").unwrap_or_else(|_| DEFAULT_URI.to_owned());
        let database = env::var("MONGO_DB").ok().filter(|name| !name.trim().is_empty());
        Self::parse(&uri, database).await
    }

    pub async fn parse(uri: &str, database: Option<String>) -> MongoResult<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri {
                uri: uri.to_owned(),
                source,
            })?;
        options
            .app_name
            .get_or_insert_with(|| env!("CARGO_PKG_NAME").to_owned());

        Ok(Self {
            options,
            database_name: database.unwrap_or_else(|| DEFAULT_DATABASE.to_owned()),
        })
    }
}
