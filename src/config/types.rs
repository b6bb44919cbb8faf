use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Catalog-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
}

/// Retry, delay and concurrency behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Maximum number of full attempts per task
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Attempts per variant sub-page before it is omitted
    #[serde(rename = "variant-attempts")]
    pub variant_attempts: u32,

    /// Lower bound of the randomized wait before each page visit (milliseconds)
    #[serde(rename = "delay-min-ms")]
    pub delay_min_ms: u64,

    /// Upper bound of the randomized wait before each page visit (milliseconds)
    #[serde(rename = "delay-max-ms")]
    pub delay_max_ms: u64,

    /// Extra wait added per attempt already made before a retry (milliseconds)
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,

    /// Per-fetch timeout (seconds)
    #[serde(rename = "page-timeout-secs")]
    pub page_timeout_secs: u64,

    /// Number of workers, each with its own fetch session
    #[serde(rename = "worker-count")]
    pub worker_count: u32,

    /// Maximum number of variant sub-pages visited per task
    #[serde(rename = "max-variants")]
    pub max_variants: u32,

    /// Log a progress line every this many completed tasks
    #[serde(rename = "progress-interval")]
    pub progress_interval: u32,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            variant_attempts: 2,
            delay_min_ms: 1000,
            delay_max_ms: 2500,
            retry_backoff_ms: 1500,
            page_timeout_secs: 60,
            worker_count: 1,
            max_variants: 32,
            progress_interval: 10,
        }
    }
}

impl HarvestConfig {
    pub fn delay_min(&self) -> Duration {
        Duration::from_millis(self.delay_min_ms)
    }

    pub fn delay_max(&self) -> Duration {
        Duration::from_millis(self.delay_max_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the harvester
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the harvester
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the harvester
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for harvester-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the results CSV file
    #[serde(rename = "results-path")]
    pub results_path: String,

    /// Path to the failures CSV file
    #[serde(rename = "failures-path")]
    pub failures_path: String,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path")]
    pub summary_path: String,

    /// Flush sinks after this many completed tasks
    #[serde(rename = "batch-save-size", default = "default_batch_save_size")]
    pub batch_save_size: u32,
}

fn default_batch_save_size() -> u32 {
    20
}

/// CSS selectors used to locate product fields and variant links
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub title: String,
    pub price: String,
    pub description: String,
    pub specifications: String,
    pub teaser: String,

    /// Container whose `img` descendants are the product images
    #[serde(rename = "image-container")]
    pub image_container: String,

    /// Support document links
    pub documents: String,

    /// Swatch / variant label on a variant page
    #[serde(rename = "variant-label")]
    pub variant_label: String,

    /// Model section shown for the selected variant
    #[serde(rename = "variant-section")]
    pub variant_section: String,

    /// Elements carrying variant sub-page links
    pub swatches: String,

    /// If set, pages without a match are treated as malformed
    #[serde(rename = "page-marker")]
    pub page_marker: Option<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            title: "h1".to_string(),
            price: "div.pdp-productPrice".to_string(),
            description: "div.xps-card-tile.xps-card-tile-content-center".to_string(),
            specifications: "div.xps-product-specifications".to_string(),
            teaser: "div.xps-teaser__content".to_string(),
            image_container: "ul#splide03-list".to_string(),
            documents: "a.xps-support-doc-item-link".to_string(),
            variant_label: "p.pdp-atc-controls__color".to_string(),
            variant_section: "div.pdp-atc-controls-model-section".to_string(),
            swatches: "div.xps-swatchpicker-container a[href], \
                       div.xps-swatchpicker-container button[data-href], \
                       div.xps-swatchpicker-container [data-url]"
                .to_string(),
            page_marker: None,
        }
    }
}

impl SelectorConfig {
    /// Returns every configured selector paired with its key
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        let mut entries = vec![
            ("title", self.title.as_str()),
            ("price", self.price.as_str()),
            ("description", self.description.as_str()),
            ("specifications", self.specifications.as_str()),
            ("teaser", self.teaser.as_str()),
            ("image-container", self.image_container.as_str()),
            ("documents", self.documents.as_str()),
            ("variant-label", self.variant_label.as_str()),
            ("variant-section", self.variant_section.as_str()),
            ("swatches", self.swatches.as_str()),
        ];
        if let Some(marker) = &self.page_marker {
            entries.push(("page-marker", marker.as_str()));
        }
        entries
    }
}
