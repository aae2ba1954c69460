//! Record types that flow between pipeline stages.
//!
//! - [`GrantRow`]: one grant as scraped from a Foundation Directory results table
//! - [`CompiledGrant`]: a grant row after role filtering and name cleanup
//! - [`EinReference`]: the search term and alternative name for a grantmaker EIN
//! - [`RegistryRow`]: one organization returned by the nonprofit registry search
//!
//! CSV column names are part of the contract between stages, so the serde
//! renames here must stay in step with what downstream stages read.

use serde::{Deserialize, Serialize};

/// A single grant scraped from a results page.
///
/// The header spelling matches the portal's own table headings; the compiler
/// normalises them to snake_case on read.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GrantRow {
    #[serde(rename = "Grantmaker")]
    pub grantmaker: String,
    #[serde(rename = "Recipient")]
    pub recipient: String,
    #[serde(rename = "Recipient City")]
    pub recipient_city: String,
    #[serde(rename = "Recipient State")]
    pub recipient_state: String,
    #[serde(rename = "Recipient Country")]
    pub recipient_country: String,
    #[serde(rename = "Primary Subject")]
    pub primary_subject: String,
    #[serde(rename = "Year")]
    pub year: String,
    /// Currency-formatted, e.g. `"$25,000"`.
    #[serde(rename = "Grant Amount")]
    pub grant_amount: String,
    /// EIN the search was run for (provenance).
    pub ein: String,
    /// 1-based results page the row came from (provenance).
    pub search_result_page: u32,
}

/// A grant row where the searched EIN is the grantmaker, with the recipient
/// name normalised.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CompiledGrant {
    pub grantmaker: String,
    pub recipient_original: String,
    pub recipient: String,
    pub recipient_city: String,
    pub recipient_state: String,
    pub recipient_country: String,
    pub primary_subject: String,
    pub year: String,
    pub grant_amount: String,
    pub ein: String,
    pub search_result_page: String,
}

/// How a grantmaker EIN is recognised in the `grantmaker` column.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EinReference {
    pub ein: String,
    pub search_term: String,
    #[serde(default)]
    pub alternative_name: String,
}

impl EinReference {
    /// True when `grantmaker` names this organization, i.e. the EIN acted as
    /// grantmaker rather than recipient. Comparison ignores case; an empty
    /// alternative name never matches.
    pub fn is_grantmaker(&self, grantmaker: &str) -> bool {
        let g = grantmaker.to_lowercase();
        let term = self.search_term.trim().to_lowercase();
        let alt = self.alternative_name.trim().to_lowercase();
        (!term.is_empty() && g.contains(&term)) || (!alt.is_empty() && g.contains(&alt))
    }
}

/// Which registry query produced a [`RegistryRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Quoted search term, 501(c)(3) only.
    Basic,
    /// Search term followed by `Foundation`, 501(c)(3) only.
    Foundation,
    /// Quoted search term, 501(c)(6) only.
    TradeAssociation,
    /// Term was not searched, or the query failed.
    NotQueried,
}

impl SearchStrategy {
    /// IRS subsection code used in the `c_code[id]` filter.
    pub fn c_code(self) -> i32 {
        match self {
            SearchStrategy::Basic | SearchStrategy::Foundation => 3,
            SearchStrategy::TradeAssociation => 6,
            SearchStrategy::NotQueried => -1,
        }
    }
}

/// One organization found by the registry search, or a placeholder for a
/// search term that produced nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryRow {
    pub search_term: String,
    pub full_name: String,
    /// Position of the row within its query's results.
    pub result_id: usize,
    pub ein: String,
    pub name: String,
    pub sub_name: String,
    pub city: String,
    pub state: String,
    #[serde(rename = "501c")]
    pub c_code: i32,
    pub propublica_queried: u8,
    pub query: SearchStrategy,
}

impl RegistryRow {
    /// Row recording only the search metadata, with empty result fields.
    pub fn placeholder(result_id: usize, search_term: &str, full_name: &str) -> Self {
        Self {
            search_term: search_term.to_string(),
            full_name: full_name.to_string(),
            result_id,
            ein: String::new(),
            name: String::new(),
            sub_name: String::new(),
            city: String::new(),
            state: String::new(),
            c_code: SearchStrategy::NotQueried.c_code(),
            propublica_queried: 0,
            query: SearchStrategy::NotQueried,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exxon() -> EinReference {
        EinReference {
            ein: "136083566".to_string(),
            search_term: "ExxonMobil".to_string(),
            alternative_name: "Exxon Mobil".to_string(),
        }
    }

    #[test]
    fn test_is_grantmaker_matches_term_or_alternative() {
        let r = exxon();
        assert!(r.is_grantmaker("EXXONMOBIL FOUNDATION"));
        assert!(r.is_grantmaker("The Exxon Mobil Foundation"));
        assert!(!r.is_grantmaker("Rice University"));
    }

    #[test]
    fn test_empty_alternative_never_matches() {
        let r = EinReference {
            alternative_name: String::new(),
            ..exxon()
        };
        assert!(!r.is_grantmaker("Ford Foundation"));
    }

    #[test]
    fn test_grant_row_headers() {
        let mut w = csv::Writer::from_writer(vec![]);
        w.serialize(GrantRow {
            grantmaker: "G".into(),
            recipient: "R".into(),
            recipient_city: "Houston".into(),
            recipient_state: "TX".into(),
            recipient_country: "USA".into(),
            primary_subject: "Education".into(),
            year: "2020".into(),
            grant_amount: "$1,000".into(),
            ein: "012345678".into(),
            search_result_page: 2,
        })
        .unwrap();
        let out = String::from_utf8(w.into_inner().unwrap()).unwrap();
        let header = out.lines().next().unwrap();
        assert_eq!(
            header,
            "Grantmaker,Recipient,Recipient City,Recipient State,Recipient Country,Primary Subject,Year,Grant Amount,ein,search_result_page"
        );
    }

    #[test]
    fn test_placeholder_row() {
        let row = RegistryRow::placeholder(4, "Exxon", "Exxon Mobil Corp");
        assert_eq!(row.c_code, -1);
        assert_eq!(row.propublica_queried, 0);
        assert!(row.ein.is_empty());
    }
}
