use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use crate::AppState;
use crate::error::AppResult;
use crate::extract::{Form, Path};
use crate::models::{CountsForm, PollForm, PollWithCounts};
use crate::{polls, tally, votes};

pub async fn list_polls(State(state): State<AppState>) -> AppResult<Json<Vec<PollWithCounts>>> {
    Ok(Json(tally::list_with_counts(&state.db).await?))
}

pub async fn create_poll(
    State(state): State<AppState>,
    Form(form): Form<PollForm>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let poll = polls::create(&state.db, &form.question, &form.answer_a, &form.answer_b).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "poll": poll })),
    ))
}

pub async fn activate_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<i64>,
) -> AppResult<Json<Value>> {
    let poll = polls::activate(&state.db, &state.notifier, poll_id).await?;
    Ok(Json(json!({ "success": true, "poll": poll })))
}

pub async fn delete_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<i64>,
) -> AppResult<Json<Value>> {
    polls::delete(&state.db, poll_id).await?;
    Ok(Json(json!({ "success": true, "poll_id": poll_id })))
}

pub async fn edit_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<i64>,
    Form(form): Form<PollForm>,
) -> AppResult<Json<Value>> {
    let poll = polls::update(
        &state.db,
        poll_id,
        &form.question,
        &form.answer_a,
        &form.answer_b,
    )
    .await?;
    Ok(Json(json!({ "success": true, "poll": poll })))
}

pub async fn set_votes(
    State(state): State<AppState>,
    Path(poll_id): Path<i64>,
    Form(form): Form<CountsForm>,
) -> AppResult<Json<Value>> {
    let count_a = votes::parse_count("count_a", form.count_a.as_deref())?;
    let count_b = votes::parse_count("count_b", form.count_b.as_deref())?;

    votes::set_counts(&state.db, &state.notifier, poll_id, count_a, count_b).await?;
    let tally = tally::tally(&state.db, poll_id).await?;

    Ok(Json(json!({
        "success": true,
        "poll_id": poll_id,
        "count_a": tally.count_a,
        "count_b": tally.count_b,
    })))
}
