use axum::{Json, body::Bytes, extract::State};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::Query;
use crate::models::{CompletedPoll, DisplayData, VoteRequest, VoteResponse};
use crate::{tally, votes};

/// `POST /api/vote`: the answer comes from `?answer=` or a JSON body.
pub async fn vote(
    State(state): State<AppState>,
    Query(query): Query<VoteRequest>,
    body: Bytes,
) -> AppResult<Json<VoteResponse>> {
    let answer = match query.answer {
        Some(answer) => Some(answer),
        None if body.is_empty() => None,
        None => {
            serde_json::from_slice::<VoteRequest>(&body)
                .map_err(|_| AppError::Validation("Invalid JSON body".into()))?
                .answer
        }
    };

    let poll_id = votes::cast(&state.db, &state.notifier, answer.as_deref()).await?;
    let poll = tally::display_for(&state.db, poll_id).await?;

    Ok(Json(VoteResponse {
        success: true,
        poll_id,
        poll,
    }))
}

/// `GET /api/display/data`
pub async fn display_data(State(state): State<AppState>) -> AppResult<Json<DisplayData>> {
    let poll = tally::active_display(&state.db).await?;
    Ok(Json(DisplayData { poll }))
}

/// `GET /api/display/completed`
pub async fn completed(State(state): State<AppState>) -> AppResult<Json<Vec<CompletedPoll>>> {
    Ok(Json(tally::completed(&state.db).await?))
}
