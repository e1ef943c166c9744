use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::{counter, gauge};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

pub type DbPool = DatabaseConnection;

fn connect_options(cfg: &AppConfig) -> ConnectOptions {
    let mut opt = ConnectOptions::new(cfg.database_url.clone());
    opt.max_connections(cfg.db_max_connections)
        .min_connections(cfg.db_min_connections)
        .connect_timeout(Duration::from_secs(cfg.db_connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(cfg.db_acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(cfg.db_idle_timeout_secs))
        .sqlx_logging(false);
    opt
}

/// Opens the pool described by the `db_*` settings.
pub async fn connect(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    info!(
        max_connections = cfg.db_max_connections,
        "Connecting to database"
    );
    Database::connect(connect_options(cfg)).await.map_err(|e| {
        error!("Database connection failed: {}", e);
        ServiceError::DatabaseError(e)
    })
}

/// Applies every pending schema migration.
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    let start = Instant::now();
    crate::migrator::Migrator::up(pool, None).await?;
    info!(elapsed = ?start.elapsed(), "Database migrations applied");
    Ok(())
}

/// Pings the database for `/health`, recording latency or the failure.
pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    let start = Instant::now();
    match pool.ping().await {
        Ok(()) => {
            let elapsed = start.elapsed();
            debug!(?elapsed, "Database ping ok");
            gauge!("farmstand.db.ping_ms", elapsed.as_millis() as f64);
            Ok(())
        }
        Err(e) => {
            error!("Database ping failed: {}", e);
            counter!("farmstand.db.ping_failures", 1);
            Err(ServiceError::DatabaseError(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> AppConfig {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "test".into(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg
    }

    #[tokio::test]
    async fn migrations_apply_to_fresh_database() {
        let pool = connect(&memory_config()).await.expect("connect");
        run_migrations(&pool).await.expect("migrate");
        assert!(check_connection(&pool).await.is_ok());
    }

    #[test]
    fn pool_settings_come_from_app_config() {
        let mut cfg = memory_config();
        cfg.db_max_connections = 3;
        let opt = connect_options(&cfg);
        assert_eq!(opt.get_max_connections(), Some(3));
        assert_eq!(opt.get_url(), "sqlite::memory:");
    }
}
