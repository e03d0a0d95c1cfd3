//! Concurrent access against a file database with a real connection pool.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use live_poll::{db, notifier::Notifier, polls, tally, votes};
use sqlx::SqlitePool;

/// A database file under the temp dir, removed with its WAL files on drop.
struct TempDb {
    path: PathBuf,
}

impl TempDb {
    fn new(name: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "live_poll_{name}_{}_{nanos}.db",
            std::process::id()
        ));
        Self { path }
    }

    async fn pool(&self) -> SqlitePool {
        db::connect(&format!("sqlite://{}", self.path.display()))
            .await
            .unwrap()
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

async fn active_count(db: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM polls WHERE is_active = 1")
        .fetch_one(db)
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn simultaneous_votes_are_all_recorded() {
    let file = TempDb::new("votes");
    let db = file.pool().await;
    let notifier = Notifier::new();
    let poll = polls::create(&db, "Rush hour?", "Yes", "No").await.unwrap();
    polls::activate(&db, &notifier, poll.id).await.unwrap();

    let handles: Vec<_> = (0..200)
        .map(|i| {
            let db = db.clone();
            let notifier = notifier.clone();
            let answer = if i % 2 == 0 { "A" } else { "B" };
            tokio::spawn(async move { votes::cast(&db, &notifier, Some(answer)).await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), poll.id);
    }

    let counts = tally::tally(&db, poll.id).await.unwrap();
    assert_eq!((counts.count_a, counts.count_b), (100, 100));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn simultaneous_activations_leave_exactly_one_active() {
    let file = TempDb::new("activate");
    let db = file.pool().await;
    let notifier = Notifier::new();

    let mut ids = Vec::new();
    for i in 0..8 {
        let poll = polls::create(&db, &format!("Poll {i}?"), "a", "b").await.unwrap();
        ids.push(poll.id);
    }

    let done = Arc::new(AtomicBool::new(false));
    let watcher = {
        let db = db.clone();
        let done = done.clone();
        tokio::spawn(async move {
            let mut max_seen = 0;
            while !done.load(Ordering::Relaxed) {
                max_seen = max_seen.max(active_count(&db).await);
                tokio::task::yield_now().await;
            }
            max_seen
        })
    };

    let handles: Vec<_> = (0..64)
        .map(|i| {
            let db = db.clone();
            let notifier = notifier.clone();
            let poll_id = ids[i % ids.len()];
            tokio::spawn(async move { polls::activate(&db, &notifier, poll_id).await })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().unwrap().is_active);
    }
    done.store(true, Ordering::Relaxed);

    assert!(watcher.await.unwrap() <= 1);
    assert_eq!(active_count(&db).await, 1);
    let active = polls::get_active(&db).await.unwrap().unwrap();
    assert!(ids.contains(&active.id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn readers_never_see_a_half_replaced_vote_set() {
    let file = TempDb::new("override");
    let db = file.pool().await;
    let notifier = Notifier::new();
    let poll = polls::create(&db, "Stable?", "Yes", "No").await.unwrap();
    polls::activate(&db, &notifier, poll.id).await.unwrap();
    for answer in ["A", "A", "B"] {
        votes::cast(&db, &notifier, Some(answer)).await.unwrap();
    }

    let poll_id = poll.id;
    let allowed = [(2, 1), (30, 10), (5, 25)];
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let db = db.clone();
            let done = done.clone();
            tokio::spawn(async move {
                let mut seen = Vec::new();
                while !done.load(Ordering::Relaxed) {
                    let counts = tally::tally(&db, poll_id).await.unwrap();
                    seen.push((counts.count_a, counts.count_b));
                    if let Some(display) = tally::active_display(&db).await.unwrap() {
                        seen.push((display.count_a, display.count_b));
                    }
                }
                seen
            })
        })
        .collect();

    for round in 0..20 {
        let (a, b) = allowed[1 + round % 2];
        votes::set_counts(&db, &notifier, poll.id, a, b).await.unwrap();
    }
    done.store(true, Ordering::Relaxed);

    for reader in readers {
        for observed in reader.await.unwrap() {
            assert!(allowed.contains(&observed), "saw {observed:?}");
        }
    }

    let counts = tally::tally(&db, poll.id).await.unwrap();
    assert_eq!((counts.count_a, counts.count_b), (5, 25));
}
