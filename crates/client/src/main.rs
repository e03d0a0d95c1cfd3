mod models;

use colored::*;
use models::*;
use std::env;
use std::io::{self, Write};

// ===== Settings =====

struct Settings {
    backend_url: String,
    vote_password: String,
    admin_secret: Option<String>,
}

impl Settings {
    fn from_env() -> Self {
        Self {
            backend_url: env::var("BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            vote_password: env::var("VOTE_PASSWORD").unwrap_or_else(|_| "vote123".to_string()),
            admin_secret: env::var("ADMIN_SECRET").ok().filter(|s| !s.is_empty()),
        }
    }
}

// ===== Main =====

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let settings = Settings::from_env();
    let client = reqwest::Client::new();

    println!("{}", "=".repeat(60).bright_cyan());
    println!("{}", "    🗳️  LIVE POLL 🗳️".bright_yellow().bold());
    println!("{}", "=".repeat(60).bright_cyan());
    println!();
    println!(
        "{} {}",
        "Connected to".bright_black(),
        settings.backend_url.bright_blue()
    );
    println!();

    voting_loop(&client, &settings).await
}

// ===== Voting Loop =====

fn print_poll(poll: &DisplayPoll) {
    println!("{}", "━".repeat(60).bright_black());
    println!();
    println!(
        "{} {}",
        "QUESTION".bright_yellow().bold(),
        format!("#{}", poll.id).bright_black()
    );
    println!("{}", poll.question.bright_white().bold());
    println!();
    println!(
        "  {} {}  {}",
        "[A]".bright_cyan().bold(),
        poll.answer_a.bright_white(),
        format!("({} votes)", poll.count_a).bright_black()
    );
    println!(
        "  {} {}  {}",
        "[B]".bright_cyan().bold(),
        poll.answer_b.bright_white(),
        format!("({} votes)", poll.count_b).bright_black()
    );
    println!();
}

fn prompt() -> anyhow::Result<String> {
    println!(
        "{}",
        "Vote: [A] [B]  [R]efresh  [O]pen display  [S]tandings  [Q]uit".bright_black()
    );
    print!("{}", "> ".bright_green().bold());
    io::stdout().flush()?;

    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        // stdin closed
        return Ok("q".to_string());
    }
    Ok(input.trim().to_lowercase())
}

async fn voting_loop(client: &reqwest::Client, settings: &Settings) -> anyhow::Result<()> {
    loop {
        match fetch_display_data(client, settings).await {
            Ok(DisplayData { poll: Some(poll) }) => print_poll(&poll),
            Ok(DisplayData { poll: None }) => {
                println!();
                println!("{}", "⏳ No poll is running right now.".yellow());
                println!();
            }
            Err(e) => {
                eprintln!("{} {}", "❌ Could not reach the server:".red().bold(), e);
            }
        }

        let choice = prompt()?;
        match choice.as_str() {
            "a" | "b" => {
                let answer = choice.to_uppercase();
                match submit_vote(client, settings, &answer).await {
                    Ok(response) => {
                        println!("{}", format!("✓ Voted {}", answer).green());
                        if let Some(poll) = response.poll {
                            println!(
                                "{}",
                                format!(
                                    "  Poll #{}: {} {} / {} {}",
                                    response.poll_id,
                                    poll.answer_a,
                                    poll.count_a,
                                    poll.answer_b,
                                    poll.count_b
                                )
                                .bright_black()
                            );
                        }
                    }
                    Err(e) => println!("{} {}", "✗ Vote failed:".red().bold(), e),
                }
            }
            "r" | "refresh" => continue,
            "o" | "open" => open_display(settings),
            "s" | "standings" => {
                if let Err(e) = show_standings(client, settings).await {
                    println!("{} {}", "✗ Could not load standings:".red().bold(), e);
                }
            }
            "q" | "quit" => {
                println!();
                println!("{}", "Thanks for voting! 👋".bright_cyan().bold());
                return Ok(());
            }
            _ => {
                println!("{}", "Invalid choice. Please try again.".red());
            }
        }
    }
}

fn open_display(settings: &Settings) {
    let url = format!("{}/display", settings.backend_url);
    if let Err(e) = webbrowser::open(&url) {
        eprintln!(
            "{} {}",
            "⚠️  Could not open browser automatically:".yellow(),
            e
        );
        println!("{}", "Please open this URL manually:".bright_white().bold());
        println!("{}", url.bright_blue().underline());
    }
}

// ===== API Calls =====

/// Turns a non-success response into an error carrying the server's message.
async fn check(response: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let text = response.text().await?;
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    anyhow::bail!("{} ({})", message, status)
}

async fn fetch_display_data(
    client: &reqwest::Client,
    settings: &Settings,
) -> anyhow::Result<DisplayData> {
    let response = client
        .get(format!("{}/api/display/data", settings.backend_url))
        .send()
        .await?;

    Ok(check(response).await?.json().await?)
}

async fn submit_vote(
    client: &reqwest::Client,
    settings: &Settings,
    answer: &str,
) -> anyhow::Result<VoteResponse> {
    let response = client
        .post(format!("{}/api/vote", settings.backend_url))
        .header("X-Vote-Password", &settings.vote_password)
        .json(&VoteRequest { answer })
        .send()
        .await?;

    Ok(check(response).await?.json().await?)
}

async fn show_standings(client: &reqwest::Client, settings: &Settings) -> anyhow::Result<()> {
    let Some(secret) = &settings.admin_secret else {
        anyhow::bail!("set ADMIN_SECRET to view standings");
    };

    let response = client
        .get(format!("{}/admin/polls", settings.backend_url))
        .header("X-Admin-Secret", secret)
        .send()
        .await?;
    let polls: Vec<PollStanding> = check(response).await?.json().await?;

    println!();
    println!("{}", "=".repeat(60).bright_cyan());
    println!("{}", "    📊 POLL RESULTS".bright_yellow().bold());
    println!("{}", "=".repeat(60).bright_cyan());
    println!();

    for poll in &polls {
        let marker = if poll.is_active {
            "●".bright_green().to_string()
        } else {
            " ".to_string()
        };
        println!(
            "{} {}. {} ({} votes: {} {}, {} {})",
            marker,
            poll.id.to_string().bright_cyan(),
            poll.question.bright_white().bold(),
            (poll.count_a + poll.count_b).to_string().yellow(),
            poll.answer_a,
            poll.count_a.to_string().green(),
            poll.answer_b,
            poll.count_b.to_string().red()
        );
    }

    println!();
    Ok(())
}
