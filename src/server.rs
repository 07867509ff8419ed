use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use log::error;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::cache::ScheduleCache;
use crate::collect::Collector;
use crate::kst;

pub struct AppState {
    pub collector: Collector,
    pub cache: ScheduleCache,
    pub window_days: u32,
    pub max_chars: usize,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/nightbot", get(nightbot))
        .route("/update", get(update))
        .fallback(|| async { (StatusCode::NOT_FOUND, "not found\n") })
        .with_state(state)
}

static DIGIT_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

#[derive(Debug, PartialEq, Eq)]
struct ParsedQuery {
    mmdd: Option<String>,
    part: Option<usize>,
}

// The first exactly-four-digit run is the MMDD token; a trailing run that
// is not the date itself selects a part when none came explicitly.
fn parse_token(text: &str, explicit_part: Option<usize>) -> ParsedQuery {
    let runs: Vec<regex::Match> = DIGIT_RUNS.find_iter(text).collect();
    let date_index = runs.iter().position(|run| run.as_str().len() == 4);
    let mmdd = date_index.map(|index| runs[index].as_str().to_string());

    let part = explicit_part.or_else(|| {
        let last = runs.last()?;
        if Some(runs.len() - 1) == date_index {
            return None;
        }
        last.as_str().parse().ok()
    });

    ParsedQuery { mmdd, part }
}

pub async fn nightbot(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let text = ["date", "q", "query", "text"]
        .iter()
        .find_map(|key| params.get(*key))
        .cloned()
        .unwrap_or_default();

    let explicit_part = params.get("part").and_then(|raw| raw.trim().parse().ok());
    let parsed = parse_token(&text, explicit_part);

    let date_iso = parsed
        .mmdd
        .as_deref()
        .and_then(kst::resolve_mmdd_today)
        .unwrap_or_else(|| kst::iso_date(kst::today()));
    let date_pretty = kst::pretty_of_iso(&date_iso);

    let schedule = match state
        .cache
        .get_or_collect(&state.collector, &date_iso, &date_pretty)
        .await
    {
        Ok(schedule) => schedule,
        Err(err) => {
            error!("schedule for {date_iso} failed: {err:#}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ERROR: failed to fetch schedule\n",
            )
                .into_response();
        }
    };

    let body = match parsed.part {
        Some(part) => schedule.part(part).unwrap_or_default(),
        None => clip(schedule.full(), state.max_chars),
    };

    body.into_response()
}

pub async fn update(State(state): State<Arc<AppState>>) -> Response {
    let fresh = state
        .cache
        .refresh_window(&state.collector, state.window_days)
        .await;
    format!("cache updated: {fresh}/{} dates\n", state.window_days).into_response()
}

fn clip(body: String, max_chars: usize) -> String {
    if max_chars == 0 || body.chars().count() <= max_chars {
        return body;
    }
    let mut clipped: String = body.chars().take(max_chars).collect();
    clipped.push_str("…(생략)");
    clipped
}
