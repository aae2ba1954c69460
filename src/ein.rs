//! EIN normalisation helpers.
//!
//! EINs are nine digits, but CSV round-trips through numeric columns drop the
//! leading zero. Every join key is passed through [`pad_ein`] first.

/// Restore a leading zero lost by numeric CSV handling.
///
/// Only 8-character values are padded; anything else is returned unchanged.
///
/// ```
/// use foundation_grants::ein::pad_ein;
/// assert_eq!(pad_ein("12345678"), "012345678");
/// assert_eq!(pad_ein("1234567"), "1234567");
/// ```
pub fn pad_ein(ein: &str) -> String {
    let ein = ein.trim();
    if ein.chars().count() == 8 {
        format!("0{ein}")
    } else {
        ein.to_string()
    }
}

/// File-name slug for an organization key, e.g. `"Ford Foundation (US)."` ->
/// `"ford_foundation_us"`.
pub fn company_slug(name: &str) -> String {
    name.replace(' ', "_")
        .replace(['.', '(', ')'], "")
        .to_lowercase()
}

/// YAML key used by the scrape config for a search term: lowercased with
/// spaces replaced by underscores.
pub fn search_term_key(term: &str) -> String {
    term.to_lowercase().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_ein_eight_digits() {
        let padded = pad_ein("12345678");
        assert_eq!(padded, "012345678");
        assert_eq!(padded.len(), 9);
        assert!(padded.ends_with("12345678"));
    }

    #[test]
    fn test_pad_ein_other_lengths_unchanged() {
        assert_eq!(pad_ein("1234567"), "1234567");
        assert_eq!(pad_ein("123456789"), "123456789");
        assert_eq!(pad_ein(""), "");
    }

    #[test]
    fn test_company_slug() {
        assert_eq!(company_slug("Ford Foundation (US)."), "ford_foundation_us");
        assert_eq!(company_slug("exxon"), "exxon");
    }

    #[test]
    fn test_search_term_key() {
        assert_eq!(search_term_key("Exxon Mobil"), "exxon_mobil");
    }
}
