use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use log::{debug, info, warn};
use tokio::task::spawn_blocking;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; NightbotFetcher/1.0)";

const IDLE_TIMEOUT: Duration = Duration::from_secs(3600);

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// `wait_for` names an element the page gets a bounded chance to
    /// produce; when it never shows up, the fetch still returns the DOM.
    async fn fetch(&self, url: &str, wait_for: Option<&str>) -> Result<String>;
}

#[derive(Clone)]
pub struct ChromeFetcher {
    inner: Arc<ChromeInner>,
}

struct ChromeInner {
    chrome_path: Option<PathBuf>,
    nav_timeout: Duration,
    element_wait: Duration,
    slot: Mutex<Option<Browser>>,
}

impl ChromeFetcher {
    pub fn new(
        chrome_path: Option<PathBuf>,
        nav_timeout: Duration,
        element_wait: Duration,
    ) -> ChromeFetcher {
        ChromeFetcher {
            inner: Arc::new(ChromeInner {
                chrome_path,
                nav_timeout,
                element_wait,
                slot: Mutex::new(None),
            }),
        }
    }
}

#[async_trait]
impl PageFetcher for ChromeFetcher {
    async fn fetch(&self, url: &str, wait_for: Option<&str>) -> Result<String> {
        let inner = Arc::clone(&self.inner);
        let url = url.to_string();
        let wait_for = wait_for.map(str::to_string);
        spawn_blocking(move || inner.fetch_blocking(&url, wait_for.as_deref())).await?
    }
}

impl ChromeInner {
    fn fetch_blocking(&self, url: &str, wait_for: Option<&str>) -> Result<String> {
        let tab = self.open_tab()?;
        let outcome = self.grab(&tab, url, wait_for);
        // Close the tab on every path or the long-lived session wedges.
        if let Err(err) = tab.close(true) {
            warn!("failed to close tab for {url}: {err:#}");
        }
        outcome
    }

    fn open_tab(&self) -> Result<Arc<Tab>> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(browser) = slot.as_ref() {
            match browser.new_tab() {
                Ok(tab) => return Ok(tab),
                Err(err) => {
                    warn!("browser session lost ({err:#}), relaunching");
                    *slot = None;
                }
            }
        }

        let browser = self.launch()?;
        let tab = browser.new_tab().context("fresh browser refused a tab")?;
        *slot = Some(browser);
        Ok(tab)
    }

    fn launch(&self) -> Result<Browser> {
        info!("launching headless browser");
        Browser::new(LaunchOptions {
            headless: true,
            sandbox: false,
            path: self.chrome_path.clone(),
            idle_browser_timeout: IDLE_TIMEOUT,
            args: vec![OsStr::new("--disable-dev-shm-usage")],
            ..LaunchOptions::default()
        })
        .context("could not launch a headless browser")
    }

    fn grab(&self, tab: &Tab, url: &str, wait_for: Option<&str>) -> Result<String> {
        tab.set_default_timeout(self.nav_timeout);
        tab.set_user_agent(USER_AGENT, None, None)?;
        tab.navigate_to(url)?;
        tab.wait_until_navigated()?;

        if let Some(selector) = wait_for {
            if tab
                .wait_for_element_with_custom_timeout(selector, self.element_wait)
                .is_err()
            {
                debug!(
                    "`{selector}` not seen within {:?} on {url}, extracting anyway",
                    self.element_wait
                );
            }
        }

        tab.get_content().context("could not read rendered document")
    }
}
