//! Vote ingestion and the administrative count override.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::Answer;
use crate::notifier::{Notifier, PollEvent};
use crate::polls;

/// Upper bound for a single count in [`set_counts`].
pub const MAX_BULK_COUNT: i64 = 100_000;

/// Records a vote for the active poll and returns that poll's id.
///
/// Finding the active poll and inserting the vote is one statement, so a
/// concurrent activation can never split them.
///
/// Credentials are checked before this is called.
pub async fn cast(db: &SqlitePool, notifier: &Notifier, answer: Option<&str>) -> AppResult<i64> {
    let answer = Answer::parse_required(answer)?;

    let poll_id: i64 = sqlx::query_scalar(
        "INSERT INTO votes (poll_id, answer, timestamp)
         SELECT id, $1, $2 FROM polls WHERE is_active = 1
         RETURNING poll_id",
    )
    .bind(answer)
    .bind(Utc::now())
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::Conflict("No active poll".into()))?;

    tracing::debug!(poll_id, %answer, "vote recorded");
    let _ = notifier.publish(PollEvent::VoteCast { poll_id });
    Ok(poll_id)
}

/// Parses a raw form count.
pub fn parse_count(field: &str, raw: Option<&str>) -> AppResult<i64> {
    let invalid = || AppError::Validation(format!("{field} must be a non-negative integer"));
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(invalid)?;
    let count = raw.parse::<i64>().map_err(|_| invalid())?;
    if count < 0 {
        return Err(invalid());
    }
    Ok(count)
}

/// Replaces every vote of `poll_id` with exactly `count_a` A votes and
/// `count_b` B votes, all stamped now.
///
/// Destructive: the previous votes and their timestamps are gone afterwards.
pub async fn set_counts(
    db: &SqlitePool,
    notifier: &Notifier,
    poll_id: i64,
    count_a: i64,
    count_b: i64,
) -> AppResult<()> {
    for (field, count) in [("count_a", count_a), ("count_b", count_b)] {
        if count < 0 {
            return Err(AppError::Validation(format!(
                "{field} must be a non-negative integer"
            )));
        }
        if count > MAX_BULK_COUNT {
            return Err(AppError::Validation(format!(
                "{field} must not exceed {MAX_BULK_COUNT}"
            )));
        }
    }

    let replaced = db::write(db, move |conn| {
        Box::pin(replace_votes(conn, poll_id, count_a, count_b))
    })
    .await?;

    if replaced > 0 {
        warn!(poll_id, replaced, "existing votes discarded by count override");
    }
    info!(poll_id, count_a, count_b, "vote counts overridden");

    let _ = notifier.publish(PollEvent::VoteCast { poll_id });
    Ok(())
}

/// Returns the number of votes that were discarded.
async fn replace_votes(
    conn: &mut SqliteConnection,
    poll_id: i64,
    count_a: i64,
    count_b: i64,
) -> AppResult<u64> {
    if polls::get(&mut *conn, poll_id).await?.is_none() {
        return Err(AppError::Validation(format!("Poll {poll_id} not found")));
    }

    let replaced = sqlx::query("DELETE FROM votes WHERE poll_id = $1")
        .bind(poll_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    let now = Utc::now();
    for (answer, count) in [(Answer::A, count_a), (Answer::B, count_b)] {
        for _ in 0..count {
            sqlx::query("INSERT INTO votes (poll_id, answer, timestamp) VALUES ($1, $2, $3)")
                .bind(poll_id)
                .bind(answer)
                .bind(now)
                .execute(&mut *conn)
                .await?;
        }
    }

    Ok(replaced)
}
