//! HTML parsing for Foundation Directory search results.
//!
//! Two things are read from a rendered results page:
//!
//! - the `Showing A–B of C` status line, which gives the page count
//! - the grants table body, one [`GrantRow`] per well-formed `<tr>`

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::ScrapeError;
use crate::models::GrantRow;
use crate::utils::truncate_for_log;

/// Status line element; absent when the search matched nothing.
pub const STATUS_TEXT: &str = "span.showing-number";
/// Table body holding the grant rows.
pub const RESULTS_BODY: &str = "tbody#search-results-grants";
/// Rows with fewer cells than this are layout rows, not grants.
pub const MIN_CELLS: usize = 9;

static SHOWING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Showing\s+([\d,]+)\s*[–-]\s*([\d,]+)\s+of\s+([\d,]+)").expect("valid regex")
});
static STATUS_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse(STATUS_TEXT).expect("valid selector"));
static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse(RESULTS_BODY).expect("valid selector"));
static ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("valid selector"));
static CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("valid selector"));

/// Pagination derived from the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCount {
    pub results_per_page: u64,
    pub total_results: u64,
    pub total_pages: u64,
}

fn parse_number(s: &str) -> Option<u64> {
    s.replace(',', "").parse().ok()
}

/// Parse `Showing A–B of C` into a [`PageCount`].
///
/// Any page's status line gives the same answer as long as it is a full
/// page: `results_per_page = B - A + 1`, `total_pages = ceil(C / per_page)`.
pub fn parse_status_text(text: &str) -> Result<PageCount, ScrapeError> {
    let format_error = || ScrapeError::StatusFormat {
        text: truncate_for_log(text.trim(), 200),
    };
    let caps = SHOWING_RE.captures(text).ok_or_else(format_error)?;
    let start = parse_number(&caps[1]).ok_or_else(format_error)?;
    let end = parse_number(&caps[2]).ok_or_else(format_error)?;
    let total_results = parse_number(&caps[3]).ok_or_else(format_error)?;
    if end < start {
        return Err(format_error());
    }
    let results_per_page = (end - start).checked_add(1).ok_or_else(format_error)?;
    let total_pages = total_results.div_ceil(results_per_page);
    Ok(PageCount {
        results_per_page,
        total_results,
        total_pages,
    })
}

/// Page count for a rendered results page, or `None` when the page has no
/// status line (the search found no grants).
pub fn count_table_pages(html: &str) -> Result<Option<PageCount>, ScrapeError> {
    let document = Html::parse_document(html);
    let Some(span) = document.select(&STATUS_SELECTOR).next() else {
        return Ok(None);
    };
    let count = parse_status_text(&span.text().collect::<String>())?;
    debug!(total_pages = count.total_pages, per_page = count.results_per_page, "Counted result pages");
    Ok(Some(count))
}

/// Text of a cell with each text fragment trimmed and the pieces joined
/// without separators.
fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().map(str::trim).filter(|t| !t.is_empty()).collect()
}

/// Extract grant rows from one results page.
///
/// Rows with fewer than [`MIN_CELLS`] cells are skipped. A page with no
/// results table at all means the layout changed and is an error.
pub fn extract_rows(html: &str, ein: &str, page: u32) -> Result<Vec<GrantRow>, ScrapeError> {
    let document = Html::parse_document(html);
    let body = document
        .select(&BODY_SELECTOR)
        .next()
        .ok_or_else(|| ScrapeError::MalformedPage(format!("no {RESULTS_BODY} on page {page} for EIN {ein}")))?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for tr in body.select(&ROW_SELECTOR) {
        let cells: Vec<String> = tr.select(&CELL_SELECTOR).map(cell_text).collect();
        if cells.len() < MIN_CELLS {
            skipped += 1;
            continue;
        }
        rows.push(GrantRow {
            grantmaker: cells[1].clone(),
            recipient: cells[2].clone(),
            recipient_city: cells[3].clone(),
            recipient_state: cells[4].clone(),
            recipient_country: cells[5].clone(),
            primary_subject: cells[6].clone(),
            year: cells[7].clone(),
            grant_amount: cells[8].clone(),
            ein: ein.to_string(),
            search_result_page: page,
        });
    }
    debug!(%ein, page, rows = rows.len(), skipped, "Extracted grant rows");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_html(cells: usize, tag: &str) -> String {
        let tds: String = (0..cells).map(|i| format!("<td> {tag}{i} </td>")).collect();
        format!("<tr>{tds}</tr>")
    }

    fn page_html(rows: &[String]) -> String {
        format!(
            r#"<html><body><div id="search-results-container">
            <span class="showing-number">Showing 1-25 of 237 Results</span>
            <table><tbody id="search-results-grants">{}</tbody></table>
            </div></body></html>"#,
            rows.concat()
        )
    }

    #[test]
    fn test_status_text_first_page() {
        let c = parse_status_text("Showing 1-25 of 237 Results").unwrap();
        assert_eq!(c.results_per_page, 25);
        assert_eq!(c.total_pages, 10);
        assert_eq!(c.total_results, 237);
    }

    #[test]
    fn test_status_text_later_page_same_answer() {
        let first = parse_status_text("Showing 1-25 of 237 Results").unwrap();
        let later = parse_status_text("Showing 101-125 of 237 Results").unwrap();
        assert_eq!(first, later);
    }

    #[test]
    fn test_status_text_en_dash_and_thousands() {
        let c = parse_status_text("Showing 1–50 of 1,234 Results").unwrap();
        assert_eq!(c.results_per_page, 50);
        assert_eq!(c.total_pages, 25);
    }

    #[test]
    fn test_status_text_exact_multiple() {
        let c = parse_status_text("Showing 1-25 of 50 Results").unwrap();
        assert_eq!(c.total_pages, 2);
    }

    #[test]
    fn test_status_text_missing_of_clause_is_error() {
        let err = parse_status_text("Showing 1-25 Results").unwrap_err();
        assert!(matches!(err, ScrapeError::StatusFormat { .. }));
    }

    #[test]
    fn test_status_text_reversed_range_is_error() {
        assert!(parse_status_text("Showing 25-1 of 237").is_err());
    }

    #[test]
    fn test_status_text_full_u64_range_is_error() {
        let err = parse_status_text("Showing 0-18446744073709551615 of 5").unwrap_err();
        assert!(matches!(err, ScrapeError::StatusFormat { .. }));
    }

    #[test]
    fn test_count_pages_absent_span_is_none() {
        let html = r#"<div id="search-results-container"><p>No grants found</p></div>"#;
        assert_eq!(count_table_pages(html).unwrap(), None);
    }

    #[test]
    fn test_count_pages_malformed_span_is_error() {
        let html = r#"<span class="showing-number">Showing lots</span>"#;
        assert!(matches!(
            count_table_pages(html),
            Err(ScrapeError::StatusFormat { .. })
        ));
    }

    #[test]
    fn test_extract_skips_short_rows() {
        let html = page_html(&[row_html(9, "a"), row_html(8, "b"), row_html(3, "c"), row_html(9, "d")]);
        let rows = extract_rows(&html, "012345678", 3).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].grantmaker, "a1");
        assert_eq!(rows[0].grant_amount, "a8");
        assert_eq!(rows[1].recipient, "d2");
        assert!(rows.iter().all(|r| r.ein == "012345678" && r.search_result_page == 3));
    }

    #[test]
    fn test_extract_all_nine_cell_rows_kept() {
        let rows: Vec<String> = (0..5).map(|i| row_html(9, &format!("r{i}_"))).collect();
        let extracted = extract_rows(&page_html(&rows), "1", 1).unwrap();
        assert_eq!(extracted.len(), 5);
    }

    #[test]
    fn test_cell_text_joins_trimmed_fragments() {
        let html = page_html(&[format!(
            "<tr><td></td><td>  Ford <b> Foundation </b></td>{}</tr>",
            "<td>x</td>".repeat(7)
        )]);
        let rows = extract_rows(&html, "1", 1).unwrap();
        assert_eq!(rows[0].grantmaker, "FordFoundation");
    }

    #[test]
    fn test_missing_table_is_malformed() {
        let html = r#"<div id="search-results-container"></div>"#;
        assert!(matches!(
            extract_rows(html, "1", 1),
            Err(ScrapeError::MalformedPage(_))
        ));
    }
}
