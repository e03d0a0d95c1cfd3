use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Poll {
    pub id: i64,
    pub question: String,
    pub answer_a: String,
    pub answer_b: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vote {
    pub id: i64,
    pub poll_id: i64,
    pub answer: Answer,
    pub timestamp: DateTime<Utc>,
}

/// One of the two options a poll offers. Stored as the text `A` or `B`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum Answer {
    A,
    B,
}

impl Answer {
    pub fn as_str(self) -> &'static str {
        match self {
            Answer::A => "A",
            Answer::B => "B",
        }
    }

    /// Parses an answer as it arrives from a request, where it may be absent.
    pub fn parse_required(raw: Option<&str>) -> Result<Self, AppError> {
        match raw {
            None => Err(AppError::Validation("Answer is required".into())),
            Some(s) if s.is_empty() => Err(AppError::Validation("Answer is required".into())),
            Some(s) => s.parse(),
        }
    }
}

impl FromStr for Answer {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Answer::A),
            "B" => Ok(Answer::B),
            _ => Err(AppError::Validation(
                "Invalid answer. Must be A or B".into(),
            )),
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vote counts for a poll's two answers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Tally {
    pub count_a: i64,
    pub count_b: i64,
}

impl Tally {
    pub fn total(&self) -> i64 {
        self.count_a + self.count_b
    }

    /// Share of each answer in percent, `(0, 0)` when nobody voted.
    pub fn percentages(&self) -> (f64, f64) {
        let total = self.total();
        if total == 0 {
            return (0.0, 0.0);
        }
        (
            self.count_a as f64 / total as f64 * 100.0,
            self.count_b as f64 / total as f64 * 100.0,
        )
    }
}

/// A poll joined with its tally, as produced by grouped queries.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PollWithCounts {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub poll: Poll,
    pub count_a: i64,
    pub count_b: i64,
}

impl PollWithCounts {
    pub fn tally(&self) -> Tally {
        Tally {
            count_a: self.count_a,
            count_b: self.count_b,
        }
    }
}

/// Poll shape served to live displays and returned after a vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayPoll {
    pub id: i64,
    pub question: String,
    pub answer_a: String,
    pub answer_b: String,
    pub count_a: i64,
    pub count_b: i64,
}

impl DisplayPoll {
    pub fn new(poll: &Poll, tally: Tally) -> Self {
        Self {
            id: poll.id,
            question: poll.question.clone(),
            answer_a: poll.answer_a.clone(),
            answer_b: poll.answer_b.clone(),
            count_a: tally.count_a,
            count_b: tally.count_b,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DisplayData {
    pub poll: Option<DisplayPoll>,
}

/// Entry of the completed-polls grid.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedPoll {
    pub poll: Poll,
    pub count_a: i64,
    pub count_b: i64,
    pub percent_a: f64,
    pub percent_b: f64,
}

impl From<PollWithCounts> for CompletedPoll {
    fn from(row: PollWithCounts) -> Self {
        let (percent_a, percent_b) = row.tally().percentages();
        Self {
            count_a: row.count_a,
            count_b: row.count_b,
            poll: row.poll,
            percent_a,
            percent_b,
        }
    }
}

// ===== Requests =====

#[derive(Debug, Default, Deserialize)]
pub struct VoteRequest {
    pub answer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PollForm {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer_a: String,
    #[serde(default)]
    pub answer_b: String,
}

/// Counts arrive as raw text so non-numeric input becomes a validation error
/// rather than a rejected form.
#[derive(Debug, Deserialize)]
pub struct CountsForm {
    pub count_a: Option<String>,
    pub count_b: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub success: bool,
    pub poll_id: i64,
    pub poll: Option<DisplayPoll>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_parsing_separates_missing_from_invalid() {
        assert_eq!(Answer::parse_required(Some("A")).ok(), Some(Answer::A));
        assert_eq!(Answer::parse_required(Some("B")).ok(), Some(Answer::B));

        let missing = Answer::parse_required(None).unwrap_err();
        assert!(missing.to_string().to_lowercase().contains("required"));

        for bad in ["C", "a", "AB", " A"] {
            let err = Answer::parse_required(Some(bad)).unwrap_err();
            assert!(err.to_string().to_lowercase().contains("invalid answer"));
        }
    }

    #[test]
    fn percentages_handle_empty_tally() {
        assert_eq!(Tally::default().percentages(), (0.0, 0.0));

        let tally = Tally { count_a: 1, count_b: 3 };
        assert_eq!(tally.total(), 4);
        assert_eq!(tally.percentages(), (25.0, 75.0));
    }
}
