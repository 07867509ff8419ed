use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::kst;

pub const FIELD_PLACEHOLDER: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub title: String,
    pub organizer: String,
    pub place: String,
    pub time_raw: Option<String>,
    pub start_minutes: u32,
    pub end_minutes: u32,
    pub source_order: usize,
}

impl Event {
    pub fn new(
        title: String,
        organizer: Option<String>,
        place: Option<String>,
        time_raw: Option<String>,
        source_order: usize,
    ) -> Event {
        let shifted = time_raw.as_deref().map(kst::shift_time_range);
        let (start_minutes, end_minutes) = span_minutes(shifted.as_deref());
        Event {
            title,
            organizer: or_placeholder(organizer),
            place: or_placeholder(place),
            time_raw,
            start_minutes,
            end_minutes,
            source_order,
        }
    }

    pub fn time_display(&self) -> String {
        self.time_raw
            .as_deref()
            .map(kst::shift_time_range)
            .unwrap_or_else(|| FIELD_PLACEHOLDER.to_string())
    }
}

fn or_placeholder(field: Option<String>) -> String {
    match field.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => FIELD_PLACEHOLDER.to_string(),
    }
}

fn span_minutes(shifted: Option<&str>) -> (u32, u32) {
    let Some(range) = shifted else {
        return (0, kst::END_SENTINEL);
    };
    let mut sides = range.split('~');
    let start = sides.next().and_then(kst::clock_minutes).unwrap_or(0);
    let end = sides
        .next()
        .and_then(kst::clock_minutes)
        .unwrap_or(kst::END_SENTINEL);
    (start, end)
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub group_size: usize,
    pub new_badge: usize,
    pub warn_digit_sum: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            group_size: 1,
            new_badge: 3,
            warn_digit_sum: 13,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySchedule {
    pub date_iso: String,
    pub date_pretty: String,
    pub events: Vec<Event>,
    pub chunks: Vec<String>,
    pub header: Option<String>,
    pub footer: Option<String>,
    pub generated_at: DateTime<FixedOffset>,
}

impl DaySchedule {
    pub fn build(
        date_iso: &str,
        date_pretty: &str,
        mut events: Vec<Event>,
        opts: &RenderOptions,
        generated_at: DateTime<FixedOffset>,
    ) -> DaySchedule {
        // Stable sort; ties beyond (start, end) keep listing order.
        events.sort_by_key(|event| (event.start_minutes, event.end_minutes));

        if events.is_empty() {
            return DaySchedule {
                date_iso: date_iso.to_string(),
                date_pretty: date_pretty.to_string(),
                events,
                chunks: vec![no_events_message(date_pretty)],
                header: None,
                footer: None,
                generated_at,
            };
        }

        let fresh = newest_orders(&events, opts.new_badge);
        let blocks: Vec<String> = events
            .iter()
            .enumerate()
            .map(|(index, event)| {
                render_block(index + 1, event, fresh.contains(&event.source_order))
            })
            .collect();

        let chunks = blocks
            .chunks(opts.group_size.max(1))
            .map(|group| group.join("\n\n"))
            .collect();

        DaySchedule {
            date_iso: date_iso.to_string(),
            date_pretty: date_pretty.to_string(),
            header: Some(render_header(
                date_iso,
                date_pretty,
                events.len(),
                opts.warn_digit_sum,
            )),
            footer: Some(render_footer(generated_at)),
            events,
            chunks,
            generated_at,
        }
    }

    pub fn count(&self) -> usize {
        self.events.len()
    }

    pub fn full(&self) -> String {
        let mut parts = Vec::with_capacity(self.chunks.len() + 2);
        parts.extend(self.header.clone());
        parts.extend(self.chunks.iter().cloned());
        parts.extend(self.footer.clone());
        parts.join("\n\n")
    }

    pub fn part(&self, number: usize) -> Option<String> {
        if number == 0 || number > self.chunks.len() {
            return None;
        }
        let mut parts = Vec::with_capacity(3);
        if number == 1 {
            parts.extend(self.header.clone());
        }
        parts.push(self.chunks[number - 1].clone());
        if number == self.chunks.len() {
            parts.extend(self.footer.clone());
        }
        Some(parts.join("\n\n"))
    }
}

pub fn no_events_message(date_pretty: &str) -> String {
    format!("{date_pretty} 집회 일정이 없습니다.")
}

fn render_header(date_iso: &str, date_pretty: &str, count: usize, warn_digit_sum: u32) -> String {
    let mut header = format!("📢 {date_pretty} 집회 일정 ({count}건)");
    if mmdd_digit_sum(date_iso) == Some(warn_digit_sum) {
        header.push_str(" ⚠️");
    }
    header
}

fn mmdd_digit_sum(date_iso: &str) -> Option<u32> {
    let (_, month_day) = date_iso.split_once('-')?;
    let digits: Vec<u32> = month_day
        .bytes()
        .filter(u8::is_ascii_digit)
        .map(|digit| u32::from(digit - b'0'))
        .collect();
    if digits.is_empty() {
        return None;
    }
    Some(digits.iter().sum())
}

fn render_footer(generated_at: DateTime<FixedOffset>) -> String {
    format!("({} 기준)", generated_at.format("%m/%d %H:%M"))
}

fn newest_orders(events: &[Event], badge: usize) -> Vec<usize> {
    let mut orders: Vec<usize> = events.iter().map(|event| event.source_order).collect();
    orders.sort_unstable_by(|a, b| b.cmp(a));
    orders.truncate(badge);
    orders
}

fn render_block(number: usize, event: &Event, fresh: bool) -> String {
    let badge = if fresh { " 🆕" } else { "" };
    format!(
        "No{number}. {}{badge}\n- 주최: {}\n- 장소: {}\n- 시간: {}",
        event.title,
        event.organizer,
        event.place,
        event.time_display(),
    )
}
