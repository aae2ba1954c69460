//! Progress and challenge notifications emitted by the scrape engine.
//!
//! The engine never alerts an operator itself. Callers register an observer
//! with [`PortalScraper::with_observer`](super::PortalScraper::with_observer)
//! and decide how to surface each event (log line, terminal bell, UI banner).

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeEvent {
    LoggedIn {
        url: String,
    },
    PagesCounted {
        ein: String,
        total_pages: u64,
    },
    /// The results container did not load in time; a bot-detection
    /// interstitial is assumed to be blocking the page and a human is needed.
    ChallengeDetected {
        ein: String,
        page: u32,
    },
    ChallengeCleared {
        ein: String,
        page: u32,
    },
    /// Gave up waiting for the challenge indicator to go away. The engine
    /// keeps polling for results regardless.
    ChallengeTimedOut {
        ein: String,
        page: u32,
        waited: Duration,
    },
    PageScraped {
        ein: String,
        page: u32,
        total_pages: u64,
        rows: usize,
    },
}

/// Callback receiving every [`ScrapeEvent`].
pub type Observer = Box<dyn FnMut(&ScrapeEvent) + Send>;
