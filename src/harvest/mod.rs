//! Harvest module: the extraction-and-resilience pipeline
//!
//! This module contains the core harvesting logic, including:
//! - Page fetching behind the `PageFetcher` trait (HTTP implementation included)
//! - Best-effort field extraction that tolerates missing fields
//! - Variant sub-page discovery
//! - Randomized inter-request delays
//! - The per-task retry state machine
//! - The batch driver with an optional worker pool

mod delay;
mod driver;
mod expander;
mod extractor;
mod fetcher;
mod orchestrator;

#[cfg(test)]
pub(crate) mod testing;

pub use delay::{DelayPolicy, FixedSequenceDelay, NoDelay, RandomDelay};
pub use driver::{FetcherFactory, HarvestDriver, HarvestReport, Progress};
pub use expander::{PaginationExpander, SwatchExpander};
pub use extractor::{ExtractError, ExtractErrorKind, FieldExtractor, SelectorExtractor};
pub use fetcher::{build_http_client, FetchError, FetchErrorKind, HttpFetcher, PageContent, PageFetcher};
pub use orchestrator::{RetryOrchestrator, RetryPolicy, TaskOutcome};

use crate::config::Config;
use crate::task::Task;
use crate::HarvestError;
use std::sync::Arc;

/// Builds a driver that fetches over HTTP, one client session per worker
///
/// # Arguments
///
/// * `config` - The harvester configuration
///
/// # Returns
///
/// * `Ok(HarvestDriver)` - Driver ready to run
/// * `Err(HarvestError)` - A selector in the configuration did not parse
pub fn http_driver(config: &Config) -> Result<HarvestDriver, HarvestError> {
    let user_agent = config.user_agent.clone();
    let timeout = config.harvest.page_timeout();

    let factory = move || -> Result<Arc<dyn PageFetcher>, HarvestError> {
        Ok(Arc::new(HttpFetcher::new(&user_agent, timeout)?))
    };

    let extractor = SelectorExtractor::new(&config.selectors)?;
    let expander = SwatchExpander::from_config(&config.selectors)?;
    let delay = RandomDelay::new(config.harvest.delay_min(), config.harvest.delay_max());

    Ok(HarvestDriver::new(
        Arc::new(factory),
        Arc::new(extractor),
        Arc::new(expander),
        Arc::new(delay),
        &config.harvest,
    )
    .with_batch_save_size(config.output.batch_save_size as usize))
}

/// Runs a complete harvest over `tasks` with the HTTP fetcher
///
/// This is the library entry point used when no custom fetcher or sink is needed.
pub async fn harvest(config: &Config, tasks: Vec<Task>) -> Result<HarvestReport, HarvestError> {
    http_driver(config)?.run(tasks).await
}
