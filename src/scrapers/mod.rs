//! Data collectors for the pipeline's web sources.
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | Foundation Directory | [`portal`] | Browser automation | Login required; bot-detection challenge solved by a human |
//! | Climate Action 100+ | [`ca100`] | HTML scraping | Paginated per sector |
//!
//! The portal engine is blocking and owns its browser for the whole run.
//! The CA100 scraper is async and issues one request at a time.

pub mod ca100;
pub mod portal;
