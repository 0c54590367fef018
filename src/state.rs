use std::sync::Arc;

use chrono::Duration;
use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, PooledConnection},
};

use crate::{
    auth::jwt::JwtService,
    config::AppConfig,
    db::PgPool,
    error::{AppError, AppResult},
    reveal::RevealCache,
};

type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub jwt: JwtService,
    pub reveals: Arc<RevealCache>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig, jwt: JwtService) -> Self {
        let reveals = Arc::new(RevealCache::new(Duration::minutes(
            config.reveal_ttl_minutes,
        )));
        Self {
            pool,
            config: Arc::new(config),
            jwt,
            reveals,
        }
    }

    pub fn db(&self) -> AppResult<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|err| AppError::internal(format!("database pool error: {err}")))
    }
}
