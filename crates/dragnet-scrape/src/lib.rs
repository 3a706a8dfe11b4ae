mod content_type;
mod fetch;
mod scrapers;

pub use content_type::{extract_content_type, response_content_type};
pub use fetch::SCRAPE_SUFFIX;
pub use scrapers::{
    BodyValidator, DEFAULT_SCRAPER_NAME, LocalOrHttpScraper, Scraper, ValidatedScraper,
};
