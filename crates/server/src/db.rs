use std::str::FromStr;
use std::time::Duration;

use futures::future::BoxFuture;
use sqlx::{
    Sqlite, SqliteConnection, SqlitePool,
    pool::PoolConnection,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

use crate::error::AppResult;

/// How long a writer waits for the store's write lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn connect(database_url: &str) -> AppResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let db = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    migrate(&db).await?;
    Ok(db)
}

/// A private in-memory database with the schema applied.
///
/// Every connection to `sqlite::memory:` is its own database, so the pool is
/// pinned to a single connection that is never recycled.
pub async fn memory_pool() -> AppResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    migrate(&db).await?;
    Ok(db)
}

async fn migrate(db: &SqlitePool) -> AppResult<()> {
    sqlx::migrate!("./migrations").run(db).await?;
    tracing::debug!("schema up to date");
    Ok(())
}

/// Runs `work` inside a `BEGIN IMMEDIATE` transaction, committing on `Ok`
/// and rolling back on `Err`.
///
/// The write lock is taken before `work` reads anything, so concurrent
/// writers wait on the busy timeout instead of failing on a lock upgrade.
/// The transaction runs on its own task: a dropped request never leaves a
/// pooled connection mid-transaction.
pub async fn write<T, F>(db: &SqlitePool, work: F) -> AppResult<T>
where
    T: Send + 'static,
    F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, AppResult<T>> + Send + 'static,
{
    let db = db.clone();

    tokio::spawn(async move {
        let mut conn = db.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let outcome = match work(&mut *conn).await {
            Ok(value) => match sqlx::query("COMMIT").execute(&mut *conn).await {
                Ok(_) => Ok(value),
                Err(e) => Err(e.into()),
            },
            Err(e) => Err(e),
        };

        if outcome.is_err() {
            rollback(conn).await;
        }
        outcome
    })
    .await?
}

async fn rollback(mut conn: PoolConnection<Sqlite>) {
    if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
        // The transaction state is unknown, so the connection must not go back to the pool.
        tracing::error!(error = %e, "rollback failed, closing connection");
        let _ = conn.close().await;
    }
}
