//! Foundation Directory scrape engine.
//!
//! For one EIN the engine discovers how many result pages exist and
//! extracts every grant row across them, waiting out the site's
//! bot-detection interstitial when it appears.
//!
//! # States
//!
//! ```text
//! Unauthenticated --login--> Authenticated --search(ein)--> SearchResultsLoaded
//!   SearchResultsLoaded --no status line / 0 pages--> NoResults
//!   SearchResultsLoaded --pages > max_pages--------> TooManyPages
//!   SearchResultsLoaded --for each page-----------> AwaitingPageLoad
//!     AwaitingPageLoad --container present--> extract rows, next page
//!     AwaitingPageLoad --timeout-------------> wait for challenge to clear, retry same page
//!   last page done --> Complete
//! ```
//!
//! Only the challenge wait repeats. Every other timeout or layout surprise
//! is returned as a [`ScrapeError`].

pub mod driver;
pub mod events;
pub mod parse;
pub mod run;

use std::thread::sleep;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::config::ScrapeConfig;
use crate::error::ScrapeError;
use crate::models::GrantRow;

pub use driver::{ChromeDriver, PortalDriver};
pub use events::{Observer, ScrapeEvent};
pub use parse::{PageCount, count_table_pages, extract_rows, parse_status_text};
pub use run::{RunSummary, run_scrape};

const LOGIN_USERNAME: &str = "form.form-horizontal.gray-box.login-form input[name='username']";
const LOGIN_PASSWORD: &str = "form.form-horizontal.gray-box.login-form input[name='password']";
const LOGIN_SUBMIT: &str = "form.form-horizontal.gray-box.login-form input[type='submit']";
/// Present once a results page has rendered.
pub const RESULTS_CONTAINER: &str = "#search-results-container";
/// Present while the bot-detection checkbox is showing.
pub const CHALLENGE_INDICATOR: &str = ".cb-c";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Endpoints, credentials, and timing for a scrape.
#[derive(Debug, Clone)]
pub struct PortalSettings {
    pub login_url: String,
    pub username: String,
    pub password: String,
    pub target_url: String,
    pub page_url: String,
    pub search_wait: Duration,
    pub login_wait: Duration,
    pub page_wait: Duration,
    pub challenge_timeout: Duration,
    pub challenge_settle: Duration,
    pub max_pages: u64,
}

impl From<&ScrapeConfig> for PortalSettings {
    fn from(cfg: &ScrapeConfig) -> Self {
        Self {
            login_url: cfg.login_url.clone(),
            username: cfg.username.clone(),
            password: cfg.password.clone(),
            target_url: cfg.target_url.clone(),
            page_url: cfg.page_url.clone(),
            search_wait: Duration::from_secs(cfg.wait_seconds),
            login_wait: Duration::from_secs(cfg.login_wait_seconds),
            page_wait: Duration::from_secs(cfg.page_wait_seconds),
            challenge_timeout: Duration::from_secs(cfg.challenge_timeout_seconds),
            challenge_settle: Duration::from_secs(cfg.challenge_settle_seconds),
            max_pages: u64::from(cfg.max_pages),
        }
    }
}

/// How one EIN's search ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    NoResults,
    /// More pages than the ceiling; nothing was extracted.
    TooManyPages { total_pages: u64 },
    /// Rows from every page, in page order.
    Complete(Vec<GrantRow>),
}

/// Per-EIN scrape state: which page we are on and what has been collected.
#[derive(Debug)]
struct SearchSession<'a> {
    ein: &'a str,
    page: u32,
    total_pages: u64,
    rows: Vec<GrantRow>,
}

pub struct PortalScraper<D> {
    driver: D,
    settings: PortalSettings,
    observer: Observer,
}

impl<D: PortalDriver> PortalScraper<D> {
    pub fn new(driver: D, settings: PortalSettings) -> Self {
        Self {
            driver,
            settings,
            observer: Box::new(|_| {}),
        }
    }

    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&ScrapeEvent) + Send + 'static,
    {
        self.observer = Box::new(observer);
        self
    }

    pub fn settings(&self) -> &PortalSettings {
        &self.settings
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    fn emit(&mut self, event: ScrapeEvent) {
        (self.observer)(&event);
    }

    /// Poll until `selector` is present or `timeout` elapses. The first
    /// check happens immediately.
    fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, ScrapeError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.driver.is_present(selector)? {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Poll until `selector` is gone or `timeout` elapses.
    fn wait_until_absent(&mut self, selector: &str, timeout: Duration) -> Result<bool, ScrapeError> {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.driver.is_present(selector)? {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Submit the login form and wait for the portal to redirect.
    ///
    /// There is no retry: if the URL has not changed within the login wait
    /// the run cannot proceed.
    #[instrument(level = "info", skip_all, fields(url = %self.settings.login_url))]
    pub fn login(&mut self) -> Result<(), ScrapeError> {
        let login_url = self.settings.login_url.clone();
        let wait = self.settings.login_wait;
        self.driver.navigate(&login_url)?;

        if !self.wait_for(LOGIN_USERNAME, wait)? {
            return Err(ScrapeError::ElementTimeout {
                selector: LOGIN_USERNAME.to_string(),
                seconds: wait.as_secs(),
            });
        }
        let (username, password) = (self.settings.username.clone(), self.settings.password.clone());
        self.driver.type_into(LOGIN_USERNAME, &username)?;
        self.driver.type_into(LOGIN_PASSWORD, &password)?;
        self.driver.click(LOGIN_SUBMIT)?;

        let deadline = Instant::now() + wait;
        loop {
            let url = self.driver.current_url()?;
            if url != login_url {
                info!(%url, "Login successful");
                self.emit(ScrapeEvent::LoggedIn { url });
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                warn!("Timed out while trying to log in");
                return Err(ScrapeError::LoginTimeout {
                    url,
                    seconds: wait.as_secs(),
                });
            }
            sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    fn search_url(&self, ein: &str) -> String {
        format!("{}&ein={}", self.settings.target_url, urlencoding::encode(ein))
    }

    fn page_url(&self, ein: &str, page: u32) -> String {
        format!(
            "{}&ein={}&page={}",
            self.settings.page_url,
            urlencoding::encode(ein),
            page
        )
    }

    /// Run the initial search for `ein` and, if the page count is within
    /// the ceiling, scrape every page.
    #[instrument(level = "info", skip(self))]
    pub fn search(&mut self, ein: &str) -> Result<SearchOutcome, ScrapeError> {
        let url = self.search_url(ein);
        self.driver.navigate(&url)?;

        let wait = self.settings.search_wait;
        if !self.wait_for(RESULTS_CONTAINER, wait)? {
            return Err(ScrapeError::ElementTimeout {
                selector: RESULTS_CONTAINER.to_string(),
                seconds: wait.as_secs(),
            });
        }
        info!("Navigated to target search URL");

        let html = self.driver.page_source()?;
        let total_pages = count_table_pages(&html)?.map_or(0, |c| c.total_pages);
        self.emit(ScrapeEvent::PagesCounted {
            ein: ein.to_string(),
            total_pages,
        });

        if total_pages == 0 {
            info!("No grant results");
            return Ok(SearchOutcome::NoResults);
        }
        if total_pages > self.settings.max_pages {
            warn!(total_pages, max_pages = self.settings.max_pages, "Too many result pages; skipping");
            return Ok(SearchOutcome::TooManyPages { total_pages });
        }

        let rows = self.scrape_pages(ein, total_pages)?;
        Ok(SearchOutcome::Complete(rows))
    }

    fn scrape_pages(&mut self, ein: &str, total_pages: u64) -> Result<Vec<GrantRow>, ScrapeError> {
        let mut session = SearchSession {
            ein,
            page: 0,
            total_pages,
            rows: Vec::new(),
        };

        while u64::from(session.page) < session.total_pages {
            session.page += 1;
            let url = self.page_url(session.ein, session.page);
            self.driver.navigate(&url)?;
            self.await_results(session.ein, session.page)?;
            info!(page = session.page, total_pages, "Navigated to results page");

            let html = self.driver.page_source()?;
            let rows = extract_rows(&html, session.ein, session.page)?;
            self.emit(ScrapeEvent::PageScraped {
                ein: session.ein.to_string(),
                page: session.page,
                total_pages,
                rows: rows.len(),
            });
            session.rows.extend(rows);
        }

        debug!(rows = session.rows.len(), "Scraped all pages");
        Ok(session.rows)
    }

    /// Block until the results container is on the page.
    ///
    /// A missing container after `page_wait` is taken to be the
    /// bot-detection interstitial. This loops until a human clears it.
    fn await_results(&mut self, ein: &str, page: u32) -> Result<(), ScrapeError> {
        let page_wait = self.settings.page_wait;
        let challenge_timeout = self.settings.challenge_timeout;
        let settle = self.settings.challenge_settle;

        while !self.wait_for(RESULTS_CONTAINER, page_wait)? {
            warn!(%ein, page, "Verification challenge detected; please complete the checkbox");
            self.emit(ScrapeEvent::ChallengeDetected {
                ein: ein.to_string(),
                page,
            });

            if self.wait_until_absent(CHALLENGE_INDICATOR, challenge_timeout)? {
                self.emit(ScrapeEvent::ChallengeCleared {
                    ein: ein.to_string(),
                    page,
                });
            } else {
                warn!(%ein, page, "Waited for human verification, but ran out of patience");
                self.emit(ScrapeEvent::ChallengeTimedOut {
                    ein: ein.to_string(),
                    page,
                    waited: challenge_timeout,
                });
            }
            sleep(settle);
        }
        Ok(())
    }
}
