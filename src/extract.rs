use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

macro_rules! selector {
    ($query:expr) => {{
        static SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse($query).unwrap());
        &SELECTOR
    }};
}

pub const UPSTREAM: &str = "https://kukmin.libertysocial.co.kr";

pub fn listing_url(date_iso: &str) -> String {
    format!("{UPSTREAM}/assembly?date={date_iso}")
}

pub fn detail_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in document.select(selector!(r#"a[href*="/assembly/"]"#)) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let url = absolutize(href);
        if seen.insert(url.clone()) {
            links.push(url);
        }
    }

    links
}

fn absolutize(href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{UPSTREAM}{href}")
    } else {
        format!("{UPSTREAM}/{href}")
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DetailFields {
    pub title: Option<String>,
    pub organizer: Option<String>,
    pub place: Option<String>,
    pub time_range: Option<String>,
}

static TIME_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,2}:\d{2}\s*~\s*\d{1,2}:\d{2}").unwrap());

pub fn detail_fields(html: &str) -> DetailFields {
    let document = Html::parse_document(html);

    let title = document
        .select(selector!("h1"))
        .map(element_text)
        .find(|text| !text.is_empty());

    let mut fields = DetailFields {
        title,
        ..DetailFields::default()
    };

    let labels: Vec<String> = document.select(selector!("dt")).map(element_text).collect();
    let values: Vec<String> = document.select(selector!("dd")).map(element_text).collect();
    for (label, value) in labels.iter().zip(values.iter()) {
        if value.is_empty() {
            continue;
        }
        if label.contains("주최") {
            fields.organizer.get_or_insert_with(|| value.clone());
        } else if label.contains("장소") {
            fields.place.get_or_insert_with(|| value.clone());
        } else if label.contains("일시") || label.contains("시간") {
            // Datetime rows narrow to their clock range when one is present.
            let narrowed = TIME_RANGE
                .find(value)
                .map_or_else(|| value.clone(), |found| found.as_str().to_string());
            fields.time_range.get_or_insert(narrowed);
        }
    }

    if fields.time_range.is_none() {
        let text = document.root_element().text().collect::<String>();
        fields.time_range = TIME_RANGE
            .find(&text)
            .map(|found| found.as_str().to_string());
    }

    fields
}

fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}
