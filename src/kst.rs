use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};

const OFFSET_HOURS: u32 = 9;

pub const END_SENTINEL: u32 = 9999;

fn offset() -> FixedOffset {
    FixedOffset::east_opt(OFFSET_HOURS as i32 * 3600).unwrap()
}

pub fn now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&offset())
}

pub fn today() -> NaiveDate {
    now().date_naive()
}

pub fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

const WEEKDAYS: [&str; 7] = ["월", "화", "수", "목", "금", "토", "일"];

pub fn pretty_date(date: NaiveDate) -> String {
    let weekday = WEEKDAYS[date.weekday().num_days_from_monday() as usize];
    format!("{}월 {}일 ({weekday})", date.month(), date.day())
}

pub fn pretty_of_iso(iso: &str) -> String {
    NaiveDate::parse_from_str(iso, "%Y-%m-%d").map_or_else(|_| iso.to_string(), pretty_date)
}

// Month and day ranges are not checked; an impossible date finds no listings.
pub fn resolve_mmdd(token: &str, year: i32) -> Option<String> {
    if token.len() != 4 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{year:04}-{}-{}", &token[..2], &token[2..]))
}

pub fn resolve_mmdd_today(token: &str) -> Option<String> {
    resolve_mmdd(token, today().year())
}

pub fn window(days: u32) -> Vec<(String, String)> {
    let start = today();
    (0..days.max(1) as i64)
        .map(|offset| {
            let date = start + chrono::Duration::days(offset);
            (iso_date(date), pretty_date(date))
        })
        .collect()
}

fn parse_clock(raw: &str) -> Option<(u32, u32)> {
    let (hours, minutes) = raw.split_once(':')?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return None;
    }
    let hours = hours.parse::<u32>().ok()?;
    let minutes = minutes.parse::<u32>().ok()?;
    (hours < 24 && minutes < 60).then_some((hours, minutes))
}

// Literal shift: hours wrap mod 24, the date never rolls over, and anything
// unparsable comes back unchanged.
pub fn shift_clock(raw: &str) -> String {
    match parse_clock(raw) {
        Some((hours, minutes)) => format!("{:02}:{minutes:02}", (hours + OFFSET_HOURS) % 24),
        None => raw.to_string(),
    }
}

pub fn shift_time_range(raw: &str) -> String {
    raw.split('~')
        .map(|side| shift_clock(side.trim()))
        .collect::<Vec<_>>()
        .join("~")
}

pub fn clock_minutes(raw: &str) -> Option<u32> {
    parse_clock(raw.trim()).map(|(hours, minutes)| hours * 60 + minutes)
}
