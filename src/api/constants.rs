//! Protocol constants for OData v2 services

use once_cell::sync::Lazy;
use regex::Regex;

/// Default number of rows requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Default cap on concurrently in-flight page requests
pub const DEFAULT_MAX_CONCURRENT: usize = 10;

/// Prefix of protocol bookkeeping keys inside response objects
pub const METADATA_SIGIL: &str = "__";

/// Envelope key wrapping every OData v2 response body
pub const ENVELOPE_KEY: &str = "d";

/// Key holding the row collection inside an envelope
pub const RESULTS_KEY: &str = "results";

/// Key holding the server-reported total count on the first page
pub const COUNT_KEY: &str = "__count";

/// Response header carrying a follow-up link for paginated metadata documents
pub const METADATA_CONTINUATION_HEADER: &str = "x-odata-continuation";

/// Suffix of the metadata document endpoint
pub const METADATA_SEGMENT: &str = "$metadata";

/// Naming convention: navigation properties may carry this suffix on top of
/// the plain property name requested by a path
pub const NAV_NAME_SUFFIX: &str = "Details";

/// Query parameter names
pub mod params {
    pub const FORMAT: &str = "$format";
    pub const INLINECOUNT: &str = "$inlinecount";
    pub const SELECT: &str = "$select";
    pub const EXPAND: &str = "$expand";
    pub const FILTER: &str = "$filter";
    pub const TOP: &str = "$top";
    pub const SKIP: &str = "$skip";

    pub const FORMAT_JSON: &str = "json";
    pub const INLINECOUNT_ALL: &str = "allpages";
}

/// Date literals embedded in v2 JSON payloads: `/Date(1609459200000)/`,
/// optionally with a signed minute offset such as `/Date(1609459200000+0120)/`
pub static DATE_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/Date\((-?\d+)([+-]\d{4})?\)/$").expect("valid date literal pattern"));

/// Entity sets named `<prefix>_<digits>` pass the presentation filter even
/// when absent from the allow-list
pub static NUMERIC_SUFFIX_SET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^.+_\d+$").expect("valid entity set pattern"));

/// Build the data endpoint URL for one entity set
pub fn entity_endpoint(base_url: &str, entity_set: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), entity_set)
}

/// Build the metadata document URL
pub fn metadata_endpoint(base_url: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), METADATA_SEGMENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_literal_pattern() {
        assert!(DATE_LITERAL.is_match("/Date(1609459200000)/"));
        assert!(DATE_LITERAL.is_match("/Date(1609459200000+0120)/"));
        assert!(DATE_LITERAL.is_match("/Date(-86400000)/"));
        assert!(!DATE_LITERAL.is_match("Date(1609459200000)"));
        assert!(!DATE_LITERAL.is_match("/Date(abc)/"));
    }

    #[test]
    fn test_numeric_suffix_pattern() {
        assert!(NUMERIC_SUFFIX_SET.is_match("Orders_001"));
        assert!(NUMERIC_SUFFIX_SET.is_match("Z_PROJECT_42"));
        assert!(!NUMERIC_SUFFIX_SET.is_match("Orders"));
        assert!(!NUMERIC_SUFFIX_SET.is_match("_123"));
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(entity_endpoint("https://host/odata/", "Employees"), "https://host/odata/Employees");
        assert_eq!(metadata_endpoint("https://host/odata"), "https://host/odata/$metadata");
    }
}
