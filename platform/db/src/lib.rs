//! Database primitives for the employee directory: connection settings,
//! startup initialization and the read-only [`EmployeeStore`].

mod seed;
mod store;

use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use thiserror::Error;
use tracing::info;

pub use seed::{SeedOutcome, seed_employees, seed_if_empty};
pub use store::{EmployeeStore, Lookup};

/// Shared connection pool alias.
pub type DbPool = DatabaseConnection;

const URL_KEY: &str = "DATABASE_URL";
const MAX_CONNECTIONS_KEY: &str = "DB_MAX_CONNECTIONS";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database url missing; set {0}")]
    MissingUrl(&'static str),
    #[error("invalid value {value:?} for {key}")]
    InvalidSetting { key: &'static str, value: String },
    #[error("store error: {0}")]
    Store(#[from] DbErr),
}

pub type DbResult<T> = Result<T, DbError>;

/// Connection settings for the backing relational store.
#[derive(Clone, Debug)]
pub struct DatabaseSettings {
    url: String,
    max_connections: u32,
    lazy: bool,
}

impl DatabaseSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            lazy: false,
        }
    }

    /// Read `DATABASE_URL` and the optional `DB_MAX_CONNECTIONS`.
    pub fn from_env() -> DbResult<Self> {
        let url = std::env::var(URL_KEY).map_err(|_| DbError::MissingUrl(URL_KEY))?;
        let settings = Self::new(url);
        match std::env::var(MAX_CONNECTIONS_KEY) {
            Ok(raw) => Ok(settings.with_max_connections(parse_max_connections(&raw)?)),
            Err(_) => Ok(settings),
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Defer opening connections until the first query, so an unreachable
    /// store surfaces as query errors instead of a failed [`connect`].
    pub fn with_lazy_connect(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn database_url(&self) -> &str {
        &self.url
    }

    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }
}

fn parse_max_connections(raw: &str) -> DbResult<u32> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|value| *value > 0)
        .ok_or_else(|| DbError::InvalidSetting {
            key: MAX_CONNECTIONS_KEY,
            value: raw.to_string(),
        })
}

/// Open a pooled connection using the given settings.
pub async fn connect(settings: &DatabaseSettings) -> DbResult<DbPool> {
    let mut options = ConnectOptions::new(settings.url.clone());
    options
        .max_connections(settings.max_connections)
        .min_connections(1)
        .connect_lazy(settings.lazy)
        .sqlx_logging(false);
    let pool = Database::connect(options).await?;
    Ok(pool)
}

/// Create the schema if absent, then seed the fixed employee set into an
/// empty table. Safe to run repeatedly.
pub async fn initialize(pool: &DbPool) -> DbResult<SeedOutcome> {
    Migrator::up(pool, None).await?;
    let outcome = seed_if_empty(pool).await?;
    info!(?outcome, "employee store initialized");
    Ok(outcome)
}
