//! Browser capability used by the review scraper.
//!
//! The pagination loop only talks to [`PageDriver`], so it runs the same against
//! a live Chrome session and an in-memory site in tests.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::ScrapeConfig;
use crate::stealth;

/// CSS selector of the reviews list on a restaurant profile page.
pub const REVIEWS_CONTAINER: &str = "ol#restProfileReviewsContent";
/// CSS selector of the pagination control that moves to the next page.
pub const NEXT_PAGE_CONTROL: &str = "a[aria-label='Go to the next page']";

/// Outcome of activating the next-page control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPage {
    /// The control was clicked; a new page is rendering.
    Advanced,
    /// The control is disabled: this is the last page.
    LastPage,
}

/// A controlled browser session scoped to one scrape.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigates to the listing URL.
    async fn open(&mut self, url: &str) -> Result<()>;

    /// Waits for the reviews container to be present.
    async fn wait_for_reviews(&mut self, timeout: Duration) -> Result<()>;

    /// Rendered markup of the current page.
    async fn page_source(&mut self) -> Result<String>;

    async fn refresh(&mut self) -> Result<()>;

    /// Locates the next-page control and clicks it unless it is disabled.
    /// Errors are transient (control not rendered yet, click intercepted).
    async fn click_next_page(&mut self, timeout: Duration) -> Result<NextPage>;

    /// Releases the session. Must be safe to call more than once.
    async fn close(&mut self);
}

/// [`PageDriver`] backed by a local headless Chrome.
pub struct ChromeDriver {
    browser: Option<Browser>,
    tab: Option<Arc<Tab>>,
}

impl ChromeDriver {
    pub fn launch(config: &ScrapeConfig) -> Result<Self> {
        let ua_arg = format!("--user-agent={}", stealth::random_user_agent());
        let mut args = vec![
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-infobars"),
            OsStr::new("--window-position=0,0"),
            OsStr::new(&ua_arg),
        ];
        if config.headless {
            args.push(OsStr::new("--headless=new"));
        }

        let browser = Browser::new(LaunchOptions {
            // Headless mode is passed through args so the modern implementation is used.
            headless: false,
            window_size: Some((1920, 1080)),
            idle_browser_timeout: config.container_timeout.max(config.refresh_pause) * 6,
            args,
            ..Default::default()
        })
        .context("failed to launch Chrome")?;

        let tab = browser.new_tab()?;
        tab.enable_debugger()?;
        tab.call_method(headless_chrome::protocol::cdp::Page::AddScriptToEvaluateOnNewDocument {
            source: stealth::get_stealth_script().to_string(),
            world_name: None,
            include_command_line_api: None,
            run_immediately: None,
        })?;

        info!("🌐 Chrome session started");
        Ok(Self {
            browser: Some(browser),
            tab: Some(tab),
        })
    }

    fn tab(&self) -> Result<&Arc<Tab>> {
        self.tab.as_ref().ok_or_else(|| anyhow!("browser session already closed"))
    }
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn open(&mut self, url: &str) -> Result<()> {
        info!("Navigating to {}", url);
        let tab = self.tab()?;
        tab.navigate_to(url)?;
        tab.wait_until_navigated()?;
        Ok(())
    }

    async fn wait_for_reviews(&mut self, timeout: Duration) -> Result<()> {
        self.tab()?
            .wait_for_element_with_custom_timeout(REVIEWS_CONTAINER, timeout)
            .map(|_| ())
            .with_context(|| format!("reviews container not found within {:?}", timeout))
    }

    async fn page_source(&mut self) -> Result<String> {
        self.tab()?.get_content()
    }

    async fn refresh(&mut self) -> Result<()> {
        self.tab()?.reload(false, None)?;
        Ok(())
    }

    async fn click_next_page(&mut self, timeout: Duration) -> Result<NextPage> {
        let tab = self.tab()?;
        let next = tab.wait_for_element_with_custom_timeout(NEXT_PAGE_CONTROL, timeout)?;
        let class = next.get_attribute_value("class")?.unwrap_or_default();
        if class.contains("disabled") {
            return Ok(NextPage::LastPage);
        }
        next.click()?;
        Ok(NextPage::Advanced)
    }

    async fn close(&mut self) {
        if self.browser.is_some() {
            debug!("Closing Chrome session");
        }
        self.tab = None;
        // Dropping the handle terminates the Chrome process.
        self.browser = None;
    }
}
