use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::collect::Collector;
use crate::kst;
use crate::schedule::DaySchedule;

#[derive(Serialize, Deserialize)]
struct CacheFile {
    updated: DateTime<FixedOffset>,
    data: DaySchedule,
}

pub struct ScheduleCache {
    inner: RwLock<HashMap<String, Arc<DaySchedule>>>,
    dir: Option<PathBuf>,
}

impl ScheduleCache {
    pub fn new(dir: Option<PathBuf>) -> ScheduleCache {
        ScheduleCache {
            inner: RwLock::new(HashMap::new()),
            dir,
        }
    }

    pub async fn get(&self, date_iso: &str) -> Option<Arc<DaySchedule>> {
        self.inner.read().await.get(date_iso).map(Arc::clone)
    }

    pub async fn get_or_collect(
        &self,
        collector: &Collector,
        date_iso: &str,
        date_pretty: &str,
    ) -> Result<Arc<DaySchedule>> {
        if let Some(hit) = self.get(date_iso).await {
            return Ok(hit);
        }

        let schedule = Arc::new(collector.collect(date_iso, date_pretty).await?);
        self.inner
            .write()
            .await
            .insert(date_iso.to_string(), Arc::clone(&schedule));
        self.store(&schedule);
        Ok(schedule)
    }

    pub async fn refresh_window(&self, collector: &Collector, days: u32) -> usize {
        let window = kst::window(days);
        let mut next = HashMap::with_capacity(window.len());
        let mut fresh = 0;

        for (date_iso, date_pretty) in &window {
            match collector.collect(date_iso, date_pretty).await {
                Ok(schedule) => {
                    let schedule = Arc::new(schedule);
                    self.store(&schedule);
                    next.insert(date_iso.clone(), schedule);
                    fresh += 1;
                }
                Err(err) => {
                    warn!("refresh failed for {date_iso}, keeping previous: {err:#}");
                    if let Some(previous) = self.get(date_iso).await {
                        next.insert(date_iso.clone(), previous);
                    }
                }
            }
        }

        // One assignment swaps the window; readers see old or new, never a mix.
        *self.inner.write().await = next;

        self.prune(&window);
        info!("window refreshed: {fresh}/{} dates collected", window.len());
        fresh
    }

    pub async fn load_persisted(&self, days: u32) {
        let Some(dir) = &self.dir else {
            return;
        };

        let mut inner = self.inner.write().await;
        for (date_iso, _) in kst::window(days) {
            match read_cache_file(&dir.join(format!("{date_iso}.json"))) {
                Ok(Some(file)) => {
                    info!("loaded cached schedule for {date_iso} (updated {})", file.updated);
                    inner.insert(date_iso, Arc::new(file.data));
                }
                Ok(None) => {}
                Err(err) => warn!("ignoring cache file for {date_iso}: {err:#}"),
            }
        }
    }

    fn store(&self, schedule: &DaySchedule) {
        let Some(dir) = &self.dir else {
            return;
        };
        if let Err(err) = write_cache_file(dir, schedule) {
            warn!("could not persist {}: {err:#}", schedule.date_iso);
        }
    }

    fn prune(&self, window: &[(String, String)]) {
        let Some(dir) = &self.dir else {
            return;
        };
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(date_iso) = name.strip_suffix(".json") else {
                continue;
            };
            if window.iter().any(|(iso, _)| iso == date_iso) {
                continue;
            }
            if let Err(err) = fs::remove_file(entry.path()) {
                warn!("could not prune {name}: {err:#}");
            }
        }
    }
}

fn write_cache_file(dir: &Path, schedule: &DaySchedule) -> Result<()> {
    fs::create_dir_all(dir)?;
    let file = CacheFile {
        updated: kst::now(),
        data: schedule.clone(),
    };
    let path = dir.join(format!("{}.json", schedule.date_iso));
    fs::write(&path, serde_json::to_vec(&file)?)
        .with_context(|| format!("writing {}", path.display()))
}

fn read_cache_file(path: &Path) -> Result<Option<CacheFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}
