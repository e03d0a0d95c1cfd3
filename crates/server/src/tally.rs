//! Vote aggregation. Every call re-derives counts from the vote rows.

use sqlx::{Sqlite, SqliteExecutor, SqlitePool};

use crate::error::AppResult;
use crate::models::{CompletedPoll, DisplayPoll, PollWithCounts, Tally};
use crate::polls;

/// Counts the votes of `poll_id`. An unknown poll tallies to zero.
pub async fn tally<'e, E>(executor: E, poll_id: i64) -> AppResult<Tally>
where
    E: SqliteExecutor<'e>,
{
    let tally = sqlx::query_as::<Sqlite, Tally>(
        "SELECT
            COUNT(CASE WHEN answer = 'A' THEN 1 END) AS count_a,
            COUNT(CASE WHEN answer = 'B' THEN 1 END) AS count_b
         FROM votes
         WHERE poll_id = $1",
    )
    .bind(poll_id)
    .fetch_one(executor)
    .await?;

    Ok(tally)
}

/// The active poll with its counts, read in one transaction so the poll and
/// its tally come from the same committed state.
pub async fn active_display(db: &SqlitePool) -> AppResult<Option<DisplayPoll>> {
    let mut tx = db.begin().await?;
    let Some(poll) = polls::get_active(&mut *tx).await? else {
        return Ok(None);
    };
    let tally = tally(&mut *tx, poll.id).await?;
    tx.commit().await?;

    Ok(Some(DisplayPoll::new(&poll, tally)))
}

/// Same as [`active_display`] for a specific poll, active or not.
pub async fn display_for(db: &SqlitePool, poll_id: i64) -> AppResult<Option<DisplayPoll>> {
    let mut tx = db.begin().await?;
    let Some(poll) = polls::get(&mut *tx, poll_id).await? else {
        return Ok(None);
    };
    let tally = tally(&mut *tx, poll.id).await?;
    tx.commit().await?;

    Ok(Some(DisplayPoll::new(&poll, tally)))
}

const POLLS_WITH_COUNTS: &str = "
    SELECT
        p.id, p.question, p.answer_a, p.answer_b, p.is_active, p.created_at,
        COUNT(CASE WHEN v.answer = 'A' THEN 1 END) AS count_a,
        COUNT(CASE WHEN v.answer = 'B' THEN 1 END) AS count_b
    FROM polls p
    LEFT JOIN votes v ON v.poll_id = p.id";

/// Every poll with its counts, most recently created first.
pub async fn list_with_counts(db: &SqlitePool) -> AppResult<Vec<PollWithCounts>> {
    let sql = format!(
        "{POLLS_WITH_COUNTS}
         GROUP BY p.id
         ORDER BY p.created_at DESC, p.id DESC"
    );
    let rows = sqlx::query_as::<_, PollWithCounts>(&sql)
        .fetch_all(db)
        .await?;

    Ok(rows)
}

/// Inactive polls with counts and bar percentages, most recent first.
pub async fn completed(db: &SqlitePool) -> AppResult<Vec<CompletedPoll>> {
    let sql = format!(
        "{POLLS_WITH_COUNTS}
         WHERE p.is_active = 0
         GROUP BY p.id
         ORDER BY p.created_at DESC, p.id DESC"
    );
    let rows = sqlx::query_as::<_, PollWithCounts>(&sql)
        .fetch_all(db)
        .await?;

    Ok(rows.into_iter().map(CompletedPoll::from).collect())
}
