//! Climate Action 100+ company directory scraper.
//!
//! The directory lists focus companies per sector, a few cards per page,
//! with a `Next` link until the sector is exhausted. Company names are the
//! `<h3>` headings on each page.

use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use itertools::Itertools;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::PipelineError;

pub const BASE_URL: &str = "https://www.climateaction100.org/whos-involved/companies/";

pub const SECTORS: [&str; 14] = [
    "oil-and-gas",
    "oil-and-gas-distribution",
    "airlines",
    "automobiles",
    "cement",
    "chemicals",
    "coal-mining",
    "consumer-goods-services",
    "diversified-mining",
    "electric-utilities",
    "other-industrials",
    "paper",
    "shipping",
    "steel",
];

const USER_AGENT: &str = "Mozilla/5.0 (compatible; ClimateAction100 scraper/1.0)";

static HEADING: Lazy<Selector> = Lazy::new(|| Selector::parse("h3").expect("valid selector"));
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Ca100Company {
    pub company: String,
    pub ca100_sector: String,
}

/// Company names and the absolute `Next` URL, if any, from one page.
pub fn parse_sector_page(html: &str, page_url: &Url) -> (Vec<String>, Option<Url>) {
    let document = Html::parse_document(html);

    let names = document
        .select(&HEADING)
        .map(|h| h.text().collect::<String>().trim().to_string())
        .filter(|name| !name.is_empty() && name.to_uppercase() != "COMPANIES")
        .collect();

    let next = document
        .select(&LINK)
        .find(|a| a.text().collect::<String>().trim().eq_ignore_ascii_case("next"))
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| page_url.join(href).ok());

    (names, next)
}

pub fn http_client() -> Result<Client, PipelineError> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .build()?)
}

/// Every company in `sector`, following `Next` links until none remain.
#[instrument(level = "info", skip(client))]
pub async fn scrape_sector(client: &Client, base_url: &str, sector: &str) -> Result<Vec<Ca100Company>, PipelineError> {
    let first = format!("{base_url}?search_companies&company_sector={sector}");
    let mut next_url = Some(Url::parse(&first).map_err(|e| PipelineError::Config {
        path: base_url.into(),
        reason: format!("invalid base URL: {e}"),
    })?);

    let mut companies = Vec::new();
    let mut pages = 0usize;
    while let Some(url) = next_url.take() {
        let html = client.get(url.clone()).send().await?.error_for_status()?.text().await?;
        let (names, next) = parse_sector_page(&html, &url);
        debug!(%url, found = names.len(), "Parsed sector page");
        companies.extend(names.into_iter().map(|company| Ca100Company {
            company,
            ca100_sector: sector.to_string(),
        }));
        pages += 1;
        // a self-referencing Next link would otherwise never terminate
        next_url = next.filter(|n| *n != url);
    }

    info!(count = companies.len(), pages, "Scraped sector");
    Ok(companies)
}

/// Scrape all sectors, then deduplicate and sort by sector and company.
#[instrument(level = "info", skip(client))]
pub async fn scrape_companies(client: &Client, base_url: &str) -> Result<Vec<Ca100Company>, PipelineError> {
    // sequential, in sector order
    let per_sector: Vec<Vec<Ca100Company>> = stream::iter(SECTORS)
        .then(|sector| scrape_sector(client, base_url, sector))
        .try_collect()
        .await?;
    let companies: Vec<Ca100Company> = per_sector
        .into_iter()
        .flatten()
        .unique()
        .sorted_by(|a, b| (&a.ca100_sector, &a.company).cmp(&(&b.ca100_sector, &b.company)))
        .collect();
    info!(count = companies.len(), "Collected CA100 companies");
    Ok(companies)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_heading_and_resolves_next() {
        let html = r#"
            <h3>Companies</h3>
            <div class="card"><h3> BP </h3></div>
            <div class="card"><h3>Shell plc</h3></div>
            <h3>   </h3>
            <a href="/other">Previous</a>
            <a href="?search_companies&company_sector=oil-and-gas&page=2"> Next </a>
        "#;
        let url = Url::parse("https://ca100.test/companies/?search_companies&company_sector=oil-and-gas").unwrap();
        let (names, next) = parse_sector_page(html, &url);
        assert_eq!(names, vec!["BP", "Shell plc"]);
        assert_eq!(
            next.unwrap().as_str(),
            "https://ca100.test/companies/?search_companies&company_sector=oil-and-gas&page=2"
        );
    }

    #[test]
    fn test_parse_last_page_has_no_next() {
        let url = Url::parse("https://ca100.test/companies/").unwrap();
        let (names, next) = parse_sector_page("<h3>Eni</h3>", &url);
        assert_eq!(names, vec!["Eni"]);
        assert!(next.is_none());
    }
}
