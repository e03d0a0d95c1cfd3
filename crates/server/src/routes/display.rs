//! Read-only HTML views for the projector screens.

use axum::{extract::State, response::Html};

use crate::AppState;
use crate::error::AppResult;
use crate::models::{CompletedPoll, DisplayPoll};
use crate::tally;

const STYLE: &str = r#"
    body { font-family: Arial, sans-serif; margin: 0; padding: 2rem;
           background: #1a202c; color: #f7fafc; text-align: center; }
    h1 { font-size: 3rem; }
    .answers { display: flex; justify-content: center; gap: 4rem; margin-top: 2rem; }
    .answer { width: 30%; }
    .label { font-size: 2rem; margin-bottom: 1rem; }
    .count { font-size: 4rem; font-weight: bold; }
    .bar-track { height: 300px; background: #2d3748; display: flex; align-items: flex-end; }
    .bar { width: 100%; transition: height 0.5s; }
    .bar-a { background: #4299e1; }
    .bar-b { background: #ed8936; }
    .grid { display: grid; grid-template-columns: 1fr 1fr; gap: 2rem; }
    .card { background: #2d3748; border-radius: 1rem; padding: 1.5rem; text-align: left; }
    .row { margin: 0.75rem 0; }
    .track { background: #4a5568; height: 1.5rem; border-radius: 0.5rem; }
    .fill { height: 100%; border-radius: 0.5rem; }
    .date { color: #a0aec0; font-size: 0.9rem; }
    .waiting { color: #a0aec0; font-size: 2rem; margin-top: 20vh; }
    #grid-container { transition: opacity 0.3s; }
    .page[hidden] { display: none; }
    .page-indicator { color: #a0aec0; margin-top: 1.5rem; font-size: 1.2rem; }
"#;

/// Completed polls shown per page of the results grid.
const POLLS_PER_PAGE: usize = 4;

/// Steps through the results pages every 10 s with a short fade.
const COMPLETED_SCRIPT: &str = r#"
<script>
(function() {
    const ROTATION_INTERVAL = 10000;
    const FADE_DURATION = 300;
    const container = document.getElementById('grid-container');
    const label = document.getElementById('current-page');
    if (!container || !label) return;
    const pages = container.querySelectorAll('.page');
    if (pages.length < 2) return;

    let current = 0;
    setInterval(() => {
        container.style.opacity = 0;
        setTimeout(() => {
            current = (current + 1) % pages.length;
            pages.forEach((page, i) => page.hidden = i !== current);
            label.textContent = current + 1;
            container.style.opacity = 1;
        }, FADE_DURATION);
    }, ROTATION_INTERVAL);
})();
</script>
"#;

/// Reloads on activation and refreshes counts on each vote; falls back to
/// polling when the socket is down.
const LIVE_SCRIPT: &str = r#"
<script>
function refresh() {
    fetch('/api/display/data').then(r => r.json()).then(data => {
        if (!data.poll) return;
        const total = data.poll.count_a + data.poll.count_b;
        const pa = total > 0 ? data.poll.count_a / total * 100 : 0;
        const pb = total > 0 ? data.poll.count_b / total * 100 : 0;
        const set = (id, f) => { const el = document.getElementById(id); if (el) f(el); };
        set('count-a', el => el.textContent = data.poll.count_a);
        set('count-b', el => el.textContent = data.poll.count_b);
        set('bar-a', el => el.style.height = pa + '%');
        set('bar-b', el => el.style.height = pb + '%');
    }).catch(e => console.error('refresh failed', e));
}
function connect() {
    const proto = location.protocol === 'https:' ? 'wss' : 'ws';
    const socket = new WebSocket(proto + '://' + location.host + '/ws');
    socket.onmessage = msg => {
        const event = JSON.parse(msg.data);
        if (event.event === 'poll_activated') location.reload();
        if (event.event === 'vote_cast') refresh();
    };
    socket.onclose = () => setTimeout(connect, 2000);
}
connect();
setInterval(refresh, 5000);
</script>
"#;

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str, script: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title}</title>
    <style>{STYLE}</style>
</head>
<body>
{body}
{script}
</body>
</html>"#,
        title = escape(title),
    ))
}

fn waiting() -> String {
    r#"<p class="waiting">Waiting for the next poll...</p>"#.to_string()
}

fn live_body(poll: &DisplayPoll, show_counts: bool) -> String {
    let answer = |slot: &str, label: &str, count: i64, percent: f64| {
        let counts = if show_counts {
            format!(
                r#"<div class="bar-track"><div id="bar-{slot}" class="bar bar-{slot}" style="height: {percent}%"></div></div>
            <div id="count-{slot}" class="count">{count}</div>"#
            )
        } else {
            String::new()
        };
        format!(
            r#"<div class="answer">
            <div class="label">{label}</div>
            {counts}
        </div>"#,
            label = escape(label),
        )
    };

    let tally = crate::models::Tally {
        count_a: poll.count_a,
        count_b: poll.count_b,
    };
    let (percent_a, percent_b) = tally.percentages();

    format!(
        r#"<h1>{question}</h1>
    <div class="answers">
        {a}
        {b}
    </div>"#,
        question = escape(&poll.question),
        a = answer("a", &poll.answer_a, poll.count_a, percent_a),
        b = answer("b", &poll.answer_b, poll.count_b, percent_b),
    )
}

/// `GET /display`: the active poll with live counts.
pub async fn live(State(state): State<AppState>) -> AppResult<Html<String>> {
    let body = match tally::active_display(&state.db).await? {
        Some(poll) => live_body(&poll, true),
        None => waiting(),
    };
    Ok(page("Live poll", &body, LIVE_SCRIPT))
}

/// `GET /display-no-votes`: question and answers only.
pub async fn no_votes(State(state): State<AppState>) -> AppResult<Html<String>> {
    let body = match tally::active_display(&state.db).await? {
        Some(poll) => live_body(&poll, false),
        None => waiting(),
    };
    Ok(page("Live poll", &body, LIVE_SCRIPT))
}

fn completed_card(entry: &CompletedPoll) -> String {
    let row = |label: &str, count: i64, percent: f64, color: &str| {
        format!(
            r#"<div class="row">
                <div>{label}</div>
                <div class="track"><div class="fill" style="width: {percent}%; background: {color}"></div></div>
                <div>{count} votes ({rounded}%)</div>
            </div>"#,
            label = escape(label),
            rounded = percent.round(),
        )
    };

    format!(
        r#"<div class="card">
            <h2>{question}</h2>
            {a}
            {b}
            <div class="date">{date}</div>
        </div>"#,
        question = escape(&entry.poll.question),
        a = row(&entry.poll.answer_a, entry.count_a, entry.percent_a, "#4299e1"),
        b = row(&entry.poll.answer_b, entry.count_b, entry.percent_b, "#ed8936"),
        date = entry.poll.created_at.format("%B %-d, %Y"),
    )
}

/// Splits the cards into pages of [`POLLS_PER_PAGE`]; only the first page
/// starts visible.
fn completed_body(polls: &[CompletedPoll]) -> String {
    if polls.is_empty() {
        return r#"<p class="waiting">No completed polls yet.</p>"#.to_string();
    }

    let pages: String = polls
        .chunks(POLLS_PER_PAGE)
        .enumerate()
        .map(|(index, chunk)| {
            let cards: String = chunk.iter().map(completed_card).collect();
            let hidden = if index == 0 { "" } else { " hidden" };
            format!(
                r#"<div class="grid page" data-page="{number}"{hidden}>{cards}</div>"#,
                number = index + 1,
            )
        })
        .collect();

    let total = polls.len().div_ceil(POLLS_PER_PAGE);
    let indicator = if total > 1 {
        format!(
            r#"<div class="page-indicator">Page <span id="current-page">1</span> of <span id="total-pages">{total}</span></div>"#
        )
    } else {
        String::new()
    };

    format!(r#"<h1>Results</h1><div id="grid-container">{pages}</div>{indicator}"#)
}

/// `GET /display-completed`: every finished poll, newest first, four at a
/// time.
pub async fn completed(State(state): State<AppState>) -> AppResult<Html<String>> {
    let polls = tally::completed(&state.db).await?;
    Ok(page("Completed polls", &completed_body(&polls), COMPLETED_SCRIPT))
}
