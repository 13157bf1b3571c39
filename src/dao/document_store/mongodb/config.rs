use std::time::Duration;

use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DB: &str = "league_tracker";

#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
    /// How often live subscriptions re-query to pick up writes made by other processes.
    pub refresh_interval: Duration,
}

impl MongoConfig {
    pub async fn from_uri(
        uri: &str,
        db_name: Option<&str>,
        refresh_interval: Duration,
    ) -> MongoResult<Self> {
        let database_name = db_name.unwrap_or(DEFAULT_DB).to_owned();
        let options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;

        Ok(Self {
            options,
            database_name,
            refresh_interval,
        })
    }
}
