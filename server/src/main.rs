mod config;
mod http;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use platform_db::{DatabaseSettings, DbPool, EmployeeStore, SeedOutcome, connect};
use platform_obs::{ObsConfig, init_tracing};
use tracing::{error, info};

use crate::{
    config::AppConfig,
    http::{AppState, ServeConfig},
};

#[derive(Parser, Debug)]
#[command(name = "employee-service", version, about = "Read-only employee directory service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize the store and start the HTTP server.
    Serve(ServeCommand),
    /// Run database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Create the schema if needed and seed an empty employees table.
    Seed,
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply pending migrations.
    Up,
    /// Rollback the most recent migration.
    Down,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
    #[arg(
        long,
        help = "Connect lazily and keep serving when the store cannot be reached, created or seeded at startup"
    )]
    allow_uninitialized: bool,
}

impl From<ServeCommand> for ServeConfig {
    fn from(value: ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(ObsConfig::default())?;
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(cmd) => run_server(cmd).await,
        Command::Migrate(action) => match action {
            MigrateCommand::Up => migrate_up().await,
            MigrateCommand::Down => migrate_down().await,
        },
        Command::Seed => run_seed().await,
    }
}

async fn setup_pool() -> Result<DbPool> {
    connect_pool(DatabaseSettings::from_env()?).await
}

async fn connect_pool(settings: DatabaseSettings) -> Result<DbPool> {
    connect(&settings)
        .await
        .context("failed to connect to database")
}

async fn run_server(cmd: ServeCommand) -> Result<()> {
    let config = Arc::new(AppConfig::load()?);
    let settings = DatabaseSettings::from_env()?.with_lazy_connect(cmd.allow_uninitialized);
    let pool = connect_pool(settings).await?;
    initialize_store(&pool, cmd.allow_uninitialized).await?;
    let state = AppState::new(EmployeeStore::new(pool), config);
    http::serve(cmd.into(), state).await
}

async fn initialize_store(pool: &DbPool, allow_uninitialized: bool) -> Result<()> {
    match platform_db::initialize(pool).await {
        Ok(_) => Ok(()),
        Err(err) if allow_uninitialized => {
            error!(error = %err, "error initializing database; serving anyway");
            Ok(())
        }
        Err(err) => Err(anyhow::Error::new(err)
            .context("failed to initialize database; pass --allow-uninitialized to start anyway")),
    }
}

async fn run_seed() -> Result<()> {
    let pool = setup_pool().await?;
    match platform_db::initialize(&pool).await? {
        SeedOutcome::Seeded(count) => info!(count, "seed data inserted"),
        SeedOutcome::AlreadyPopulated(count) => {
            info!(count, "employees already present; seed skipped")
        }
    }
    Ok(())
}

async fn migrate_up() -> Result<()> {
    let pool = setup_pool().await?;
    Migrator::up(&pool, None).await?;
    info!("database migrations applied");
    Ok(())
}

async fn migrate_down() -> Result<()> {
    let pool = setup_pool().await?;
    Migrator::down(&pool, Some(1)).await?;
    info!("most recent migration rolled back");
    Ok(())
}

#[cfg(test)]
mod tests {
    use sea_orm::ConnectionTrait;

    use super::*;

    /// An in-memory store where `employees` is a view, so seeding cannot work.
    async fn conflicting_pool() -> DbPool {
        let settings = DatabaseSettings::new("sqlite::memory:").with_max_connections(1);
        let pool = connect_pool(settings).await.unwrap();
        pool.execute_unprepared("CREATE VIEW employees AS SELECT 1 AS id")
            .await
            .unwrap();
        pool
    }

    #[tokio::test]
    async fn initialization_failure_aborts_by_default() {
        let pool = conflicting_pool().await;
        let err = initialize_store(&pool, false).await.unwrap_err();
        assert!(err.to_string().contains("--allow-uninitialized"));
    }

    #[tokio::test]
    async fn initialization_failure_is_tolerated_when_allowed() {
        let pool = conflicting_pool().await;
        assert!(initialize_store(&pool, true).await.is_ok());
    }

    #[tokio::test]
    async fn unreachable_store_is_tolerated_when_allowed() {
        let settings = DatabaseSettings::new("sqlite:/nonexistent-dir/employees.db")
            .with_max_connections(1)
            .with_lazy_connect(true);
        let pool = connect_pool(settings).await.unwrap();
        assert!(initialize_store(&pool, true).await.is_ok());
        assert!(initialize_store(&pool, false).await.is_err());
    }

    #[tokio::test]
    async fn healthy_store_initializes_in_both_modes() {
        let settings = DatabaseSettings::new("sqlite::memory:").with_max_connections(1);
        let pool = connect_pool(settings).await.unwrap();
        initialize_store(&pool, false).await.unwrap();
        initialize_store(&pool, true).await.unwrap();
    }
}
