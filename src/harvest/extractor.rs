//! Product field extraction
//!
//! Extraction is best-effort: each field is looked up independently and a
//! field that cannot be located is left absent. Only content that is not a
//! usable page at all produces an `ExtractError`.

use crate::config::SelectorConfig;
use crate::harvest::fetcher::PageContent;
use crate::record::{DocumentLink, FieldSet};
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractErrorKind {
    MalformedPage,
}

/// Page content could not be used
#[derive(Debug, Clone, Error)]
#[error("malformed page {address}: {reason}")]
pub struct ExtractError {
    pub kind: ExtractErrorKind,
    pub address: Url,
    pub reason: String,
}

impl ExtractError {
    pub fn malformed(address: &Url, reason: impl Into<String>) -> Self {
        Self {
            kind: ExtractErrorKind::MalformedPage,
            address: address.clone(),
            reason: reason.into(),
        }
    }
}

/// Turns page content into a partial set of product fields
pub trait FieldExtractor: Send + Sync {
    /// Extracts all recognized fields; missing fields are `None`
    ///
    /// Fails only when the page itself is unusable, never because a field is missing.
    fn extract(&self, page: &PageContent) -> Result<FieldSet, ExtractError>;

    /// Label of the variant shown on `page` (e.g. a colour name)
    fn variant_label(&self, _page: &PageContent) -> Option<String> {
        None
    }
}

/// CSS-selector based extractor
pub struct SelectorExtractor {
    title: Selector,
    price: Selector,
    description: Selector,
    specifications: Selector,
    teaser: Selector,
    image_container: Selector,
    image: Selector,
    documents: Selector,
    variant_label: Selector,
    variant_section: Selector,
    page_marker: Option<Selector>,
    body_children: Selector,
}

impl SelectorExtractor {
    /// Compiles the configured selectors
    ///
    /// # Returns
    ///
    /// * `Ok(SelectorExtractor)` - All selectors compiled
    /// * `Err(ConfigError::InvalidSelector)` - A selector did not parse
    pub fn new(config: &SelectorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            title: compile("title", &config.title)?,
            price: compile("price", &config.price)?,
            description: compile("description", &config.description)?,
            specifications: compile("specifications", &config.specifications)?,
            teaser: compile("teaser", &config.teaser)?,
            image_container: compile("image-container", &config.image_container)?,
            image: compile("image", "img")?,
            documents: compile("documents", &config.documents)?,
            variant_label: compile("variant-label", &config.variant_label)?,
            variant_section: compile("variant-section", &config.variant_section)?,
            page_marker: config
                .page_marker
                .as_deref()
                .map(|m| compile("page-marker", m))
                .transpose()?,
            body_children: compile("body", "body *")?,
        })
    }

    /// Rejects content that is not a usable HTML page
    fn check_well_formed(&self, page: &PageContent, document: &Html) -> Result<(), ExtractError> {
        if let Some(content_type) = &page.content_type {
            if is_non_markup_type(content_type) && !looks_like_markup(&page.body) {
                return Err(ExtractError::malformed(
                    &page.final_url,
                    format!("expected HTML, got {}", content_type),
                ));
            }
        }

        let has_elements = document.select(&self.body_children).next().is_some();
        let has_text = document
            .root_element()
            .text()
            .any(|t| !t.trim().is_empty());
        if !has_elements && !has_text {
            return Err(ExtractError::malformed(&page.final_url, "page has no content"));
        }

        if let Some(marker) = &self.page_marker {
            if document.select(marker).next().is_none() {
                return Err(ExtractError::malformed(
                    &page.final_url,
                    "not a product page (page marker missing)",
                ));
            }
        }

        Ok(())
    }

    fn images(&self, document: &Html, base: &Url) -> Option<Vec<String>> {
        let mut seen = HashSet::new();
        let mut images = Vec::new();

        for container in document.select(&self.image_container) {
            for img in container.select(&self.image) {
                let src = img
                    .value()
                    .attr("src")
                    .or_else(|| img.value().attr("data-src"))
                    .map(str::trim)
                    .filter(|s| !s.is_empty());
                if let Some(absolute) = src.and_then(|s| base.join(s).ok()) {
                    let absolute = absolute.to_string();
                    if seen.insert(absolute.clone()) {
                        images.push(absolute);
                    }
                }
            }
        }

        non_empty(images)
    }

    fn documents(&self, document: &Html, base: &Url) -> Option<Vec<DocumentLink>> {
        let mut seen = HashSet::new();
        let mut documents = Vec::new();

        for link in document.select(&self.documents) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let Ok(absolute) = base.join(href.trim()) else {
                continue;
            };
            let href = absolute.to_string();
            if seen.insert(href.clone()) {
                documents.push(DocumentLink {
                    text: element_text(link),
                    href,
                });
            }
        }

        non_empty(documents)
    }
}

impl FieldExtractor for SelectorExtractor {
    fn extract(&self, page: &PageContent) -> Result<FieldSet, ExtractError> {
        if page.body.trim().is_empty() {
            return Err(ExtractError::malformed(&page.final_url, "empty body"));
        }

        let document = Html::parse_document(&page.body);
        self.check_well_formed(page, &document)?;

        let base = &page.final_url;
        let description = first_text(&document, &self.description)
            .or_else(|| first_text(&document, &self.variant_section));

        Ok(FieldSet {
            title: first_text(&document, &self.title),
            price: first_text(&document, &self.price),
            description,
            specifications: first_text(&document, &self.specifications),
            teaser: first_text(&document, &self.teaser),
            images: self.images(&document, base),
            documents: self.documents(&document, base),
            swatch_variants: None,
        })
    }

    fn variant_label(&self, page: &PageContent) -> Option<String> {
        let document = Html::parse_document(&page.body);
        first_text(&document, &self.variant_label)
    }
}

fn compile(field: &str, selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|_| ConfigError::InvalidSelector {
        field: field.to_string(),
        selector: selector.to_string(),
    })
}

/// Whitespace-collapsed text of the first matching element with any text
fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Media types that never carry a product page
fn is_non_markup_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json"
        || mime.ends_with("+json")
        || mime == "application/pdf"
        || mime == "application/octet-stream"
        || mime == "application/zip"
        || mime.starts_with("image/")
        || mime.starts_with("audio/")
        || mime.starts_with("video/")
        || mime.starts_with("font/")
}

fn looks_like_markup(body: &str) -> bool {
    body.trim_start().starts_with('<')
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
