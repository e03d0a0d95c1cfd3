use std::env;

use anyhow::Context;
use live_poll::{config::Config, db, polls};

/// Splits `question | answer A | answer B`.
fn parse_line(line: &str) -> Option<(&str, &str, &str)> {
    let mut parts = line.split('|').map(str::trim);
    let question = parts.next()?;
    let answer_a = parts.next()?;
    let answer_b = parts.next()?;
    if parts.next().is_some() || [question, answer_a, answer_b].iter().any(|s| s.is_empty()) {
        return None;
    }
    Some((question, answer_a, answer_b))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let db = db::connect(&config.database_url).await?;

    println!("Connected to database!");

    let path = env::args().nth(1).unwrap_or_else(|| "polls.txt".to_string());
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {path} - make sure it exists!"))?;

    let mut count = 0;
    let mut skipped = 0;
    let mut malformed = 0;

    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((question, answer_a, answer_b)) = parse_line(line) else {
            println!("✗ Line {}: expected `question | answer A | answer B`", number + 1);
            malformed += 1;
            continue;
        };

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM polls WHERE question = $1)")
                .bind(question)
                .fetch_one(&db)
                .await?;

        if exists {
            println!("⊘ Skipped (duplicate): {}", question);
            skipped += 1;
            continue;
        }

        let poll = polls::create(&db, question, answer_a, answer_b).await?;
        count += 1;
        println!("✓ Loaded #{}: {}", poll.id, poll.question);
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ Successfully loaded {} new polls!", count);
    if skipped > 0 {
        println!("⊘ Skipped {} duplicate polls", skipped);
    }
    if malformed > 0 {
        println!("✗ Ignored {} malformed lines", malformed);
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    Ok(())
}
