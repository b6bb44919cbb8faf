//! Variant sub-page discovery
//!
//! A product page may link to one sub-page per swatch (colour, size, ...).
//! The expander lists those links; the orchestrator decides which of them
//! still need a visit.

use crate::config::SelectorConfig;
use crate::harvest::fetcher::PageContent;
use crate::url::{resolve_link, visit_key};
use crate::ConfigError;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Attributes that may carry a variant link, in order of preference
const LINK_ATTRIBUTES: &[&str] = &["href", "data-href", "data-url"];

/// Discovers linked sub-pages on a page
pub trait PaginationExpander: Send + Sync {
    /// Returns the sub-page addresses found on `page`
    ///
    /// The result is free of duplicates, never contains the page itself, and
    /// is the same every time for the same content.
    fn expand(&self, page: &PageContent) -> Vec<Url>;
}

/// Finds variant links inside the swatch picker
pub struct SwatchExpander {
    swatches: Selector,
}

impl SwatchExpander {
    pub fn new(selector: &str) -> Result<Self, ConfigError> {
        let swatches = Selector::parse(selector).map_err(|_| ConfigError::InvalidSelector {
            field: "swatches".to_string(),
            selector: selector.to_string(),
        })?;
        Ok(Self { swatches })
    }

    pub fn from_config(config: &SelectorConfig) -> Result<Self, ConfigError> {
        Self::new(&config.swatches)
    }
}

impl PaginationExpander for SwatchExpander {
    fn expand(&self, page: &PageContent) -> Vec<Url> {
        let document = Html::parse_document(&page.body);

        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(visit_key(&page.requested));
        seen.insert(visit_key(&page.final_url));

        let mut links = Vec::new();
        for element in document.select(&self.swatches) {
            let href = LINK_ATTRIBUTES
                .iter()
                .find_map(|attr| element.value().attr(attr));

            let Some(url) = href.and_then(|h| resolve_link(h, &page.final_url)) else {
                continue;
            };

            if seen.insert(visit_key(&url)) {
                links.push(url);
            }
        }

        tracing::trace!("{} variant link(s) on {}", links.len(), page.final_url);
        links
    }
}
