//! Browser abstraction for the portal scrape.
//!
//! [`PortalDriver`] is the narrow set of browser operations the engine
//! needs. [`ChromeDriver`] implements it over a visible Chrome window so an
//! operator can complete bot-detection challenges by hand.

use std::path::PathBuf;
use std::sync::Arc;

use headless_chrome::browser::tab::NoElementFound;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::{info, instrument};

use crate::error::ScrapeError;

/// Blocking browser operations used by the scrape engine.
///
/// Selectors are CSS selectors. None of these calls wait for elements to
/// appear; polling is the engine's job.
pub trait PortalDriver {
    /// Load `url` and wait for navigation to finish.
    fn navigate(&mut self, url: &str) -> Result<(), ScrapeError>;

    fn current_url(&mut self) -> Result<String, ScrapeError>;

    /// Whether an element matching `selector` is currently in the DOM.
    ///
    /// Only "no such element" is `Ok(false)`; a dead tab or a rejected
    /// selector is an error.
    fn is_present(&mut self, selector: &str) -> Result<bool, ScrapeError>;

    fn type_into(&mut self, selector: &str, text: &str) -> Result<(), ScrapeError>;

    fn click(&mut self, selector: &str) -> Result<(), ScrapeError>;

    /// Rendered HTML of the current page.
    fn page_source(&mut self) -> Result<String, ScrapeError>;
}

/// A Chrome window driven over the DevTools protocol.
pub struct ChromeDriver {
    // Dropping the browser kills the Chrome process, so it lives as long as the tab.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeDriver {
    /// Launch Chrome and open a tab.
    ///
    /// `CHROME_PATH` overrides the browser binary.
    #[instrument(level = "info")]
    pub fn launch(headless: bool) -> Result<Self, ScrapeError> {
        let chrome_path = std::env::var("CHROME_PATH").ok().map(PathBuf::from);
        let options = LaunchOptions::default_builder()
            .headless(headless)
            .window_size(Some((1600, 1000)))
            .path(chrome_path)
            .build()
            .map_err(|e| ScrapeError::Browser(format!("Failed to build Chrome launch options: {e}")))?;
        let browser = Browser::new(options)
            .map_err(|e| ScrapeError::Browser(format!("Failed to launch Chrome: {e}")))?;
        let tab = browser
            .new_tab()
            .map_err(|e| ScrapeError::Browser(format!("Failed to create browser tab: {e}")))?;
        info!("Chrome launched");
        Ok(Self { _browser: browser, tab })
    }
}

impl PortalDriver for ChromeDriver {
    fn navigate(&mut self, url: &str) -> Result<(), ScrapeError> {
        self.tab
            .navigate_to(url)
            .map_err(|e| ScrapeError::Browser(format!("Failed to navigate to {url}: {e}")))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| ScrapeError::Browser(format!("Page failed to load for {url}: {e}")))?;
        Ok(())
    }

    fn current_url(&mut self) -> Result<String, ScrapeError> {
        Ok(self.tab.get_url())
    }

    fn is_present(&mut self, selector: &str) -> Result<bool, ScrapeError> {
        match self.tab.find_element(selector) {
            Ok(_) => Ok(true),
            Err(e) if e.is::<NoElementFound>() => Ok(false),
            Err(e) => Err(ScrapeError::Browser(format!("Failed to look up {selector}: {e}"))),
        }
    }

    fn type_into(&mut self, selector: &str, text: &str) -> Result<(), ScrapeError> {
        self.tab
            .find_element(selector)
            .and_then(|el| el.type_into(text).map(|_| ()))
            .map_err(|e| ScrapeError::Browser(format!("Failed to type into {selector}: {e}")))
    }

    fn click(&mut self, selector: &str) -> Result<(), ScrapeError> {
        self.tab
            .find_element(selector)
            .and_then(|el| el.click().map(|_| ()))
            .map_err(|e| ScrapeError::Browser(format!("Failed to click {selector}: {e}")))
    }

    fn page_source(&mut self) -> Result<String, ScrapeError> {
        self.tab
            .get_content()
            .map_err(|e| ScrapeError::Browser(format!("Failed to get page content: {e}")))
    }
}
