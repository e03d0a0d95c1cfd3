use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayPoll {
    pub id: i64,
    pub question: String,
    pub answer_a: String,
    pub answer_b: String,
    pub count_a: i64,
    pub count_b: i64,
}

#[derive(Debug, Deserialize)]
pub struct DisplayData {
    pub poll: Option<DisplayPoll>,
}

#[derive(Debug, Serialize)]
pub struct VoteRequest<'a> {
    pub answer: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct VoteResponse {
    pub poll_id: i64,
    pub poll: Option<DisplayPoll>,
}

#[derive(Debug, Deserialize)]
pub struct PollStanding {
    pub id: i64,
    pub question: String,
    pub answer_a: String,
    pub answer_b: String,
    pub is_active: bool,
    pub count_a: i64,
    pub count_b: i64,
}

/// Error body shared by every failing endpoint.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
