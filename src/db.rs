use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PoolError, PooledConnection};
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::Arc;
use std::time::Duration;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;
pub type SqlitePooledConnection = PooledConnection<ConnectionManager<SqliteConnection>>;
pub type DbPool = Arc<SqlitePool>;

pub const IN_MEMORY: &str = ":memory:";

#[derive(Debug)]
pub enum DbError {
    PoolError(PoolError),
    DieselError(diesel::result::Error),
    TaskJoinError(String),
    OutOfRange(String),
}

impl From<PoolError> for DbError {
    fn from(err: PoolError) -> Self {
        DbError::PoolError(err)
    }
}

impl From<diesel::result::Error> for DbError {
    fn from(err: diesel::result::Error) -> Self {
        DbError::DieselError(err)
    }
}

impl From<tokio::task::JoinError> for DbError {
    fn from(err: tokio::task::JoinError) -> Self {
        DbError::TaskJoinError(err.to_string())
    }
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbError::PoolError(e) => write!(f, "Pool error: {}", e),
            DbError::DieselError(e) => write!(f, "Database error: {}", e),
            DbError::TaskJoinError(e) => write!(f, "Task join error: {}", e),
            DbError::OutOfRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for DbError {}

/// Per-connection pragmas. The ingestion endpoint, the bot loop and the
/// retention task all write to the same file.
#[derive(Debug)]
struct SqliteConnectionOptions {
    busy_timeout: Duration,
    wal: bool,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqliteConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        let mut pragmas = format!(
            "PRAGMA busy_timeout = {};",
            self.busy_timeout.as_millis()
        );
        if self.wal {
            pragmas.push_str("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;");
        }
        conn.batch_execute(&pragmas)
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Builds the pool. Every connection to `:memory:` opens its own database, so
/// an in-memory store gets a single connection and no WAL.
pub fn create_pool(database_url: &str) -> Result<SqlitePool, PoolError> {
    let in_memory = database_url == IN_MEMORY;
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let mut builder = Pool::builder().connection_customizer(Box::new(SqliteConnectionOptions {
        busy_timeout: BUSY_TIMEOUT,
        wal: !in_memory,
    }));
    if in_memory {
        builder = builder.max_size(1);
    }
    builder.build(manager)
}

pub fn run_migrations(
    pool: &SqlitePool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let mut conn = pool.get()?;
    let applied = conn.run_pending_migrations(MIGRATIONS)?;
    for version in applied {
        tracing::info!(%version, "Applied migration");
    }
    Ok(())
}

#[cfg(test)]
pub fn test_pool() -> SqlitePool {
    let pool = create_pool(IN_MEMORY).expect("in-memory pool");
    run_migrations(&pool).expect("migrations apply");
    pool
}
