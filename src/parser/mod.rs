// Parser module: site profiles and the odds extraction pipeline.

pub mod odds_parser;
pub mod profiles;

pub use odds_parser::{ExtractorSettings, OddsExtractor};
pub use profiles::{SiteProfile, SiteRegistry};
