//! Connection pool for the PostgreSQL store.
//!
//! The server runs one short statement per request (a batched read or a
//! batched upsert), so the pool is sized by configuration alone and
//! connections are not tested on checkout.

use std::time::Duration;

use sqlx_core::pool::PoolOptions;
use sqlx_postgres::{PgPool, Postgres};
use tracing::{debug, info};
use url::Url;

use crate::config::PostgresConfig;
use crate::error::Result;

/// Connection lifetime when the configuration leaves it open.
const DEFAULT_MAX_LIFETIME: Duration = Duration::from_secs(30 * 60);

/// Pool options derived from `config`.
///
/// The idle floor defaults to a quarter of the pool, at least one connection
/// and never above `pool_size`.
pub fn pool_options(config: &PostgresConfig) -> PoolOptions<Postgres> {
    let max = config.pool_size.max(1);
    let min = config.min_connections.unwrap_or(max / 4).clamp(1, max);
    let max_lifetime = config
        .max_lifetime_secs
        .map_or(DEFAULT_MAX_LIFETIME, Duration::from_secs);

    PoolOptions::<Postgres>::new()
        .max_connections(max)
        .min_connections(min)
        .acquire_timeout(Duration::from_millis(config.connect_timeout_ms))
        .idle_timeout(config.idle_timeout_ms.map(Duration::from_millis))
        .max_lifetime(max_lifetime)
        .test_before_acquire(false)
}

/// Opens the pool and establishes the idle floor of connections.
///
/// # Errors
///
/// Returns `PostgresError::Connection` if the server cannot be reached.
pub async fn create_pool(config: &PostgresConfig) -> Result<PgPool> {
    let options = pool_options(config);
    info!(
        url = %mask_password(&config.url),
        max_connections = options.get_max_connections(),
        min_connections = options.get_min_connections(),
        "Opening PostgreSQL pool"
    );
    let pool = options.connect(&config.url).await?;
    debug!(size = pool.size(), "PostgreSQL pool open");
    Ok(pool)
}

/// Round trip used by readiness checks.
///
/// # Errors
///
/// Returns `PostgresError::Connection` if the query cannot run.
pub async fn ping(pool: &PgPool) -> Result<()> {
    sqlx_core::query::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Replaces the password of a connection URL for logging. Input that does
/// not parse as a URL is returned unchanged.
pub fn mask_password(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some("****")).is_ok() {
                parsed.to_string()
            } else {
                url.to_string()
            }
        }
        _ => url.to_string(),
    }
}
