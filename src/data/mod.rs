//! Remote data sources.
//!
//! - typed value coercion for feature attributes (`value`)
//! - query model and wire encoding (`query`)
//! - the feature-service client (`feature`)
//! - cross-validated aggregate totals (`aggregates`)
//! - document fetching with cache freshness (`fetch`)
//! - workbook sheet extraction (`workbook`)
//! - bulletin page scraping (`bulletin`)

pub mod aggregates;
pub mod bulletin;
pub mod feature;
pub mod fetch;
pub mod query;
pub mod value;
pub mod workbook;

/// Stable workbook address. The server answers it with an HTML landing
/// page that carries the volatile link to the actual file.
pub const WORKBOOK_LANDING_URI: &str =
    "https://www.rki.de/DE/Content/InfAZ/N/Neuartiges_Coronavirus/Daten/Fallzahlen_Kum_Tab.xlsx";

/// Bulletin page publishing only the latest totals.
pub const BULLETIN_URI: &str =
    "https://www.rki.de/DE/Content/InfAZ/N/Neuartiges_Coronavirus/Fallzahlen.html";

/// Browser-like User-Agent presented to every upstream server.
pub const DEFAULT_USER_AGENT: &str =
    "IE 9/Windows: Mozilla/5.0 (compatible; MSIE 9.0; Windows NT 6.1; WOW64; Trident/5.0)";
