use std::sync::Arc;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};

use crate::extract::{self, DetailFields};
use crate::fetch::PageFetcher;
use crate::kst;
use crate::schedule::{DaySchedule, Event, RenderOptions};

const DETAIL_HEADING: &str = "h1";

#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub concurrency: usize,
    pub render: RenderOptions,
}

impl Default for CollectOptions {
    fn default() -> Self {
        CollectOptions {
            concurrency: 1,
            render: RenderOptions::default(),
        }
    }
}

pub struct Collector {
    fetcher: Arc<dyn PageFetcher>,
    opts: CollectOptions,
}

impl Collector {
    pub fn new(fetcher: Arc<dyn PageFetcher>, opts: CollectOptions) -> Collector {
        Collector { fetcher, opts }
    }

    // A listing failure propagates; a detail page only costs its own event.
    pub async fn collect(&self, date_iso: &str, date_pretty: &str) -> Result<DaySchedule> {
        let listing = self
            .fetcher
            .fetch(&extract::listing_url(date_iso), None)
            .await
            .with_context(|| format!("listing for {date_iso} failed"))?;

        let links = extract::detail_links(&listing);
        info!("{date_iso}: {} detail links", links.len());

        let events: Vec<Event> = stream::iter(links.into_iter().enumerate())
            .map(|(order, link)| self.event_from_link(order, link))
            .buffered(self.opts.concurrency.max(1))
            .collect::<Vec<Option<Event>>>()
            .await
            .into_iter()
            .flatten()
            .collect();

        Ok(DaySchedule::build(
            date_iso,
            date_pretty,
            events,
            &self.opts.render,
            kst::now(),
        ))
    }

    async fn event_from_link(&self, order: usize, link: String) -> Option<Event> {
        let html = match self.fetcher.fetch(&link, Some(DETAIL_HEADING)).await {
            Ok(html) => html,
            Err(err) => {
                warn!("skipping {link}: {err:#}");
                return None;
            }
        };

        let DetailFields {
            title,
            organizer,
            place,
            time_range,
        } = extract::detail_fields(&html);

        let Some(title) = title.filter(|title| !title.trim().is_empty()) else {
            debug!("skipping {link}: no title");
            return None;
        };

        Some(Event::new(title, organizer, place, time_range, order))
    }
}
