//! Poll lifecycle: creation, edits, deletion and the single active poll.

use chrono::Utc;
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::info;

use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::Poll;
use crate::notifier::{Notifier, PollEvent};

const POLL_COLUMNS: &str = "id, question, answer_a, answer_b, is_active, created_at";

/// Trims the three text fields, rejecting any that end up empty.
fn validate_text<'a>(
    question: &'a str,
    answer_a: &'a str,
    answer_b: &'a str,
) -> AppResult<(&'a str, &'a str, &'a str)> {
    let fields = [
        ("question", question.trim()),
        ("answer_a", answer_a.trim()),
        ("answer_b", answer_b.trim()),
    ];
    if let Some((name, _)) = fields.iter().find(|(_, value)| value.is_empty()) {
        return Err(AppError::Validation(format!("{name} is required")));
    }
    Ok((fields[0].1, fields[1].1, fields[2].1))
}

/// Creates an inactive poll.
pub async fn create(
    db: &SqlitePool,
    question: &str,
    answer_a: &str,
    answer_b: &str,
) -> AppResult<Poll> {
    let (question, answer_a, answer_b) = validate_text(question, answer_a, answer_b)?;

    let poll = sqlx::query_as::<_, Poll>(&format!(
        "INSERT INTO polls (question, answer_a, answer_b, is_active, created_at)
         VALUES ($1, $2, $3, 0, $4)
         RETURNING {POLL_COLUMNS}"
    ))
    .bind(question)
    .bind(answer_a)
    .bind(answer_b)
    .bind(Utc::now())
    .fetch_one(db)
    .await?;

    info!(poll_id = poll.id, "poll created");
    Ok(poll)
}

pub async fn get<'e, E>(executor: E, poll_id: i64) -> AppResult<Option<Poll>>
where
    E: SqliteExecutor<'e>,
{
    let poll = sqlx::query_as::<_, Poll>(&format!(
        "SELECT {POLL_COLUMNS} FROM polls WHERE id = $1"
    ))
    .bind(poll_id)
    .fetch_optional(executor)
    .await?;

    Ok(poll)
}

/// The poll currently accepting votes, if any.
pub async fn get_active<'e, E>(executor: E) -> AppResult<Option<Poll>>
where
    E: SqliteExecutor<'e>,
{
    let poll = sqlx::query_as::<_, Poll>(&format!(
        "SELECT {POLL_COLUMNS} FROM polls WHERE is_active = 1"
    ))
    .fetch_optional(executor)
    .await?;

    Ok(poll)
}

pub async fn list_all(db: &SqlitePool, newest_first: bool) -> AppResult<Vec<Poll>> {
    let order = if newest_first {
        "created_at DESC, id DESC"
    } else {
        "created_at ASC, id ASC"
    };

    let polls = sqlx::query_as::<_, Poll>(&format!(
        "SELECT {POLL_COLUMNS} FROM polls ORDER BY {order}"
    ))
    .fetch_all(db)
    .await?;

    Ok(polls)
}

/// Makes `poll_id` the only active poll.
///
/// Deactivation of the others and activation of the target commit together;
/// an unknown target leaves the current active poll untouched.
pub async fn activate(db: &SqlitePool, notifier: &Notifier, poll_id: i64) -> AppResult<Poll> {
    let poll = db::write(db, move |conn| Box::pin(swap_active(conn, poll_id))).await?;
    info!(poll_id, "poll activated");

    let _ = notifier.publish(PollEvent::PollActivated { poll_id });
    Ok(poll)
}

async fn swap_active(conn: &mut SqliteConnection, poll_id: i64) -> AppResult<Poll> {
    if get(&mut *conn, poll_id).await?.is_none() {
        return Err(AppError::poll_not_found(poll_id));
    }

    sqlx::query("UPDATE polls SET is_active = 0 WHERE is_active = 1")
        .execute(&mut *conn)
        .await?;

    let poll = sqlx::query_as::<_, Poll>(&format!(
        "UPDATE polls SET is_active = 1 WHERE id = $1 RETURNING {POLL_COLUMNS}"
    ))
    .bind(poll_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(poll)
}

/// Removes an inactive poll together with its votes.
pub async fn delete(db: &SqlitePool, poll_id: i64) -> AppResult<()> {
    let removed = db::write(db, move |conn| Box::pin(delete_inactive(conn, poll_id))).await?;
    info!(poll_id, votes = removed, "poll deleted");
    Ok(())
}

/// Returns the number of votes removed with the poll.
async fn delete_inactive(conn: &mut SqliteConnection, poll_id: i64) -> AppResult<u64> {
    let poll = get(&mut *conn, poll_id)
        .await?
        .ok_or_else(|| AppError::poll_not_found(poll_id))?;
    if poll.is_active {
        return Err(AppError::Conflict(
            "Cannot delete active poll. Deactivate it first".into(),
        ));
    }

    let removed = sqlx::query("DELETE FROM votes WHERE poll_id = $1")
        .bind(poll_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    sqlx::query("DELETE FROM polls WHERE id = $1")
        .bind(poll_id)
        .execute(&mut *conn)
        .await?;

    Ok(removed)
}

/// Overwrites the text of an existing poll, active or not.
pub async fn update(
    db: &SqlitePool,
    poll_id: i64,
    question: &str,
    answer_a: &str,
    answer_b: &str,
) -> AppResult<Poll> {
    let (question, answer_a, answer_b) = validate_text(question, answer_a, answer_b)?;

    let poll = sqlx::query_as::<_, Poll>(&format!(
        "UPDATE polls SET question = $1, answer_a = $2, answer_b = $3
         WHERE id = $4
         RETURNING {POLL_COLUMNS}"
    ))
    .bind(question)
    .bind(answer_a)
    .bind(answer_b)
    .bind(poll_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::poll_not_found(poll_id))?;

    info!(poll_id, "poll updated");
    Ok(poll)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::tally::tally;
    use crate::votes;

    async fn active_count(db: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM polls WHERE is_active = 1")
            .fetch_one(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_trims_and_starts_inactive() {
        let db = memory_pool().await.unwrap();
        let poll = create(&db, "  Pepsi or Coke?  ", " Pepsi", "Coke ").await.unwrap();

        assert_eq!(poll.question, "Pepsi or Coke?");
        assert_eq!(poll.answer_a, "Pepsi");
        assert_eq!(poll.answer_b, "Coke");
        assert!(!poll.is_active);
        assert_eq!(get(&db, poll.id).await.unwrap(), Some(poll));
    }

    #[tokio::test]
    async fn create_rejects_blank_fields() {
        let db = memory_pool().await.unwrap();
        for (q, a, b) in [("", "a", "b"), ("q", "   ", "b"), ("q", "a", "\t")] {
            let err = create(&db, q, a, b).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{q:?} {a:?} {b:?}");
        }
        assert!(list_all(&db, true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn activating_another_poll_deactivates_the_previous_one() {
        let db = memory_pool().await.unwrap();
        let notifier = Notifier::new();
        let first = create(&db, "One?", "a", "b").await.unwrap();
        let second = create(&db, "Two?", "a", "b").await.unwrap();

        activate(&db, &notifier, first.id).await.unwrap();
        assert_eq!(get_active(&db).await.unwrap().map(|p| p.id), Some(first.id));

        activate(&db, &notifier, second.id).await.unwrap();
        assert_eq!(get_active(&db).await.unwrap().map(|p| p.id), Some(second.id));
        assert!(!get(&db, first.id).await.unwrap().unwrap().is_active);
        assert_eq!(active_count(&db).await, 1);
    }

    #[tokio::test]
    async fn any_activation_sequence_keeps_at_most_one_active() {
        let db = memory_pool().await.unwrap();
        let notifier = Notifier::new();
        let mut ids = Vec::new();
        for i in 0..4 {
            ids.push(create(&db, &format!("Q{i}?"), "a", "b").await.unwrap().id);
        }

        for &id in [ids[2], ids[0], ids[0], ids[3], ids[1], ids[2]].iter() {
            activate(&db, &notifier, id).await.unwrap();
            assert_eq!(active_count(&db).await, 1);
            assert_eq!(get_active(&db).await.unwrap().map(|p| p.id), Some(id));
        }
    }

    #[tokio::test]
    async fn activating_a_missing_poll_keeps_the_current_one_active() {
        let db = memory_pool().await.unwrap();
        let notifier = Notifier::new();
        let poll = create(&db, "Stay?", "a", "b").await.unwrap();
        activate(&db, &notifier, poll.id).await.unwrap();

        let err = activate(&db, &notifier, poll.id + 100).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(get_active(&db).await.unwrap().map(|p| p.id), Some(poll.id));
    }

    #[tokio::test]
    async fn activation_is_broadcast() {
        let db = memory_pool().await.unwrap();
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let poll = create(&db, "Live?", "a", "b").await.unwrap();

        activate(&db, &notifier, poll.id).await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            PollEvent::PollActivated { poll_id: poll.id }
        );
    }

    #[tokio::test]
    async fn deleting_the_active_poll_is_rejected_and_keeps_votes() {
        let db = memory_pool().await.unwrap();
        let notifier = Notifier::new();
        let poll = create(&db, "Keep?", "a", "b").await.unwrap();
        activate(&db, &notifier, poll.id).await.unwrap();
        votes::cast(&db, &notifier, Some("A")).await.unwrap();

        let err = delete(&db, poll.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(err.to_string().to_lowercase().contains("cannot delete active poll"));

        let all = list_all(&db, true).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(tally(&db, poll.id).await.unwrap().count_a, 1);
    }

    #[tokio::test]
    async fn deleting_an_inactive_poll_cascades_to_its_votes() {
        let db = memory_pool().await.unwrap();
        let notifier = Notifier::new();
        let doomed = create(&db, "Doomed?", "a", "b").await.unwrap();
        let kept = create(&db, "Kept?", "a", "b").await.unwrap();
        votes::set_counts(&db, &notifier, doomed.id, 2, 2).await.unwrap();
        votes::set_counts(&db, &notifier, kept.id, 1, 0).await.unwrap();

        delete(&db, doomed.id).await.unwrap();

        let orphaned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE poll_id = $1")
            .bind(doomed.id)
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(orphaned, 0);
        assert!(get(&db, doomed.id).await.unwrap().is_none());
        assert_eq!(tally(&db, kept.id).await.unwrap().count_a, 1);
    }

    #[tokio::test]
    async fn deleting_a_missing_poll_is_not_found() {
        let db = memory_pool().await.unwrap();
        assert!(matches!(delete(&db, 9).await.unwrap_err(), AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_overwrites_text_and_validates() {
        let db = memory_pool().await.unwrap();
        let notifier = Notifier::new();
        let poll = create(&db, "Old?", "a", "b").await.unwrap();
        activate(&db, &notifier, poll.id).await.unwrap();

        let updated = update(&db, poll.id, "New?", " x ", "y").await.unwrap();
        assert_eq!(
            (updated.question.as_str(), updated.answer_a.as_str(), updated.answer_b.as_str()),
            ("New?", "x", "y")
        );
        assert!(updated.is_active);
        assert_eq!(updated.created_at, poll.created_at);

        let err = update(&db, poll.id, "", "x", "y").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = update(&db, poll.id + 1, "Q?", "x", "y").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_all_orders_by_creation() {
        let db = memory_pool().await.unwrap();
        let first = create(&db, "1?", "a", "b").await.unwrap();
        let second = create(&db, "2?", "a", "b").await.unwrap();

        let newest: Vec<i64> = list_all(&db, true).await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(newest, vec![second.id, first.id]);
        let oldest: Vec<i64> = list_all(&db, false).await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(oldest, vec![first.id, second.id]);
    }
}
