use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::to_bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Response;

use assembly_nightbot::cache::ScheduleCache;
use assembly_nightbot::collect::{CollectOptions, Collector};
use assembly_nightbot::extract;
use assembly_nightbot::fetch::PageFetcher;
use assembly_nightbot::kst;
use assembly_nightbot::server::{self, AppState};

struct RecordedSite {
    pages: HashMap<String, String>,
    calls: AtomicUsize,
}

#[async_trait]
impl PageFetcher for RecordedSite {
    async fn fetch(&self, url: &str, _wait_for: Option<&str>) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no recorded page for {url}"))
    }
}

fn detail_page(title: &str, organizer: &str, place: &str, time: &str) -> String {
    format!(
        "<html><body><h1>{title}</h1><dl>\
         <dt>주최</dt><dd>{organizer}</dd>\
         <dt>장소</dt><dd>{place}</dd>\
         <dt>시간</dt><dd>{time}</dd>\
         </dl></body></html>"
    )
}

// 1014 carries two events, shifted to 09:00~10:00 and 10:00~11:00; 1015 is empty.
fn recorded_site() -> Arc<RecordedSite> {
    let busy_iso = kst::resolve_mmdd_today("1014").unwrap();
    let empty_iso = kst::resolve_mmdd_today("1015").unwrap();

    let mut pages = HashMap::new();
    pages.insert(
        extract::listing_url(&busy_iso),
        r#"<div id="__next">
            <a href="/assembly/late">늦은 집회</a>
            <a href="/assembly/early">이른 집회</a>
        </div>"#
            .to_string(),
    );
    pages.insert(
        format!("{}/assembly/late", extract::UPSTREAM),
        detail_page("늦은 집회", "모임A", "서울역", "01:00~02:00"),
    );
    pages.insert(
        format!("{}/assembly/early", extract::UPSTREAM),
        detail_page("이른 집회", "모임B", "광화문", "00:00~01:00"),
    );
    pages.insert(
        extract::listing_url(&empty_iso),
        r#"<div id="__next"></div>"#.to_string(),
    );

    Arc::new(RecordedSite {
        pages,
        calls: AtomicUsize::new(0),
    })
}

fn state_over(site: Arc<RecordedSite>) -> Arc<AppState> {
    Arc::new(AppState {
        collector: Collector::new(
            site as Arc<dyn PageFetcher>,
            CollectOptions::default(),
        ),
        cache: ScheduleCache::new(None),
        window_days: 2,
        max_chars: 3000,
    })
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn get_nightbot(state: &Arc<AppState>, params: &[(&str, &str)]) -> (StatusCode, String) {
    let query: HashMap<String, String> = params
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    let response = server::nightbot(State(Arc::clone(state)), Query(query)).await;
    (response.status(), body_text(response).await)
}

#[tokio::test]
async fn full_digest_lists_sorted_numbered_blocks() {
    let state = state_over(recorded_site());
    let (status, body) = get_nightbot(&state, &[("date", "1014")]).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("(2건)"), "header should count events: {body}");
    let first = body.find("No1. 이른 집회").expect("earlier event first");
    let second = body.find("No2. 늦은 집회").expect("later event second");
    assert!(first < second);
    assert!(body.contains("- 주최: 모임B"));
    assert!(body.contains("- 시간: 09:00~10:00"));
    assert!(body.contains("- 시간: 10:00~11:00"));
    assert!(body.trim_end().ends_with("기준)"));
}

#[tokio::test]
async fn alias_and_free_text_resolve_the_same_date() {
    let state = state_over(recorded_site());

    let (_, by_date) = get_nightbot(&state, &[("date", "1014")]).await;
    let (_, by_q) = get_nightbot(&state, &[("q", "집회 1014 알려줘")]).await;

    assert_eq!(by_date, by_q);
}

#[tokio::test]
async fn empty_day_returns_exactly_the_notice() {
    let state = state_over(recorded_site());
    let empty_iso = kst::resolve_mmdd_today("1015").unwrap();

    let (status, body) = get_nightbot(&state, &[("date", "1015")]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        format!("{} 집회 일정이 없습니다.", kst::pretty_of_iso(&empty_iso))
    );
}

#[tokio::test]
async fn parts_split_header_and_footer() {
    let state = state_over(recorded_site());

    let (status, first) = get_nightbot(&state, &[("date", "1014"), ("part", "1")]).await;
    assert_eq!(status, StatusCode::OK);
    assert!(first.contains("📢"));
    assert!(first.contains("No1. 이른 집회"));
    assert!(!first.contains("No2."));
    assert!(!first.contains("기준"));

    let (_, last) = get_nightbot(&state, &[("date", "1014"), ("part", "2")]).await;
    assert!(!last.contains("📢"));
    assert!(last.contains("No2. 늦은 집회"));
    assert!(last.trim_end().ends_with("기준)"));
}

#[tokio::test]
async fn out_of_range_part_is_an_empty_ok() {
    let state = state_over(recorded_site());

    let (status, body) = get_nightbot(&state, &[("date", "1014"), ("part", "5")]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "");
}

#[tokio::test]
async fn trailing_digits_in_free_text_select_a_part() {
    let state = state_over(recorded_site());

    let (_, explicit) = get_nightbot(&state, &[("date", "1014"), ("part", "2")]).await;
    let (_, inferred) = get_nightbot(&state, &[("q", "1014 2")]).await;

    assert_eq!(explicit, inferred);
}

#[tokio::test]
async fn impossible_date_token_reads_as_an_empty_day() {
    let bad_iso = kst::resolve_mmdd_today("1332").unwrap();

    let mut pages = HashMap::new();
    pages.insert(
        extract::listing_url(&bad_iso),
        r#"<div id="__next"></div>"#.to_string(),
    );
    let state = state_over(Arc::new(RecordedSite {
        pages,
        calls: AtomicUsize::new(0),
    }));

    let (status, body) = get_nightbot(&state, &[("date", "1332")]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, format!("{bad_iso} 집회 일정이 없습니다."));
}

#[tokio::test]
async fn upstream_failure_maps_to_a_500_marker() {
    let state = state_over(Arc::new(RecordedSite {
        pages: HashMap::new(),
        calls: AtomicUsize::new(0),
    }));

    let (status, body) = get_nightbot(&state, &[("date", "1014")]).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.starts_with("ERROR:"), "marker body, got: {body}");
}

#[tokio::test]
async fn repeat_requests_are_served_from_the_cache() {
    let site = recorded_site();
    let state = state_over(Arc::clone(&site));

    get_nightbot(&state, &[("date", "1014")]).await;
    let after_first = site.calls.load(Ordering::SeqCst);
    assert_eq!(after_first, 3, "one listing and two detail fetches");

    get_nightbot(&state, &[("date", "1014")]).await;
    assert_eq!(site.calls.load(Ordering::SeqCst), after_first);
}

#[tokio::test]
async fn update_endpoint_reports_the_refresh() {
    let state = state_over(recorded_site());

    let response = server::update(State(Arc::clone(&state))).await;
    let status = response.status();
    let body = body_text(response).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("cache updated:"), "got: {body}");
}
