//! Per-task retry orchestration
//!
//! One task is harvested as a sequence of attempts. Each attempt fetches the
//! main page, extracts its fields, expands and visits its variant sub-pages,
//! and combines everything into a record. A failed attempt is discarded as a
//! whole; the next one starts again from the main page.

use crate::config::HarvestConfig;
use crate::harvest::delay::DelayPolicy;
use crate::harvest::expander::PaginationExpander;
use crate::harvest::extractor::FieldExtractor;
use crate::harvest::fetcher::{FetchError, PageContent, PageFetcher};
use crate::record::{ErrorKind, FailureEntry, PageError, Record, Variant};
use crate::state::TaskState;
use crate::task::Task;
use crate::url::visit_key;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Attempt limits and timing
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Full attempts per task
    pub max_attempts: u32,

    /// Tries per variant sub-page within one attempt
    pub variant_attempts: u32,

    /// Added to the retry wait once per attempt already made
    pub retry_backoff: Duration,

    /// Upper bound for a single fetch
    pub page_timeout: Duration,

    /// Variant sub-pages visited per attempt
    pub max_variants: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&HarvestConfig::default())
    }
}

impl From<&HarvestConfig> for RetryPolicy {
    fn from(config: &HarvestConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            variant_attempts: config.variant_attempts.max(1),
            retry_backoff: config.retry_backoff(),
            page_timeout: config.page_timeout(),
            max_variants: config.max_variants as usize,
        }
    }
}

/// Final result of one task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Succeeded(Record),
    Exhausted(FailureEntry),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    pub fn task(&self) -> &Task {
        match self {
            Self::Succeeded(record) => &record.task,
            Self::Exhausted(failure) => &failure.task,
        }
    }
}

/// Tracks the state machine of one task
struct Tracker<'a> {
    task: &'a Task,
    state: TaskState,
    history: Vec<TaskState>,
}

impl<'a> Tracker<'a> {
    fn new(task: &'a Task) -> Self {
        Self {
            task,
            state: TaskState::Pending,
            history: vec![TaskState::Pending],
        }
    }

    fn advance(&mut self, next: TaskState) {
        if let Err(e) = self.state.transition(next) {
            debug_assert!(false, "{}", e);
            tracing::error!("{}: {}", self.task.address, e);
        }
        tracing::trace!("{}: {} -> {}", self.task.address, self.state, next);
        self.state = next;
        self.history.push(next);
    }
}

/// Runs tasks through fetch, expand, extract and combine with bounded retries
///
/// The orchestrator owns a handle to one fetcher (one session); extractor,
/// expander and delay policy may be shared between orchestrators.
#[derive(Clone)]
pub struct RetryOrchestrator {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn FieldExtractor>,
    expander: Arc<dyn PaginationExpander>,
    delay: Arc<dyn DelayPolicy>,
    policy: RetryPolicy,
}

impl RetryOrchestrator {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn FieldExtractor>,
        expander: Arc<dyn PaginationExpander>,
        delay: Arc<dyn DelayPolicy>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            expander,
            delay,
            policy,
        }
    }

    /// Harvests one task
    ///
    /// Always returns an outcome: either a record from the first attempt that
    /// succeeded, or a failure entry once `max_attempts` attempts have failed.
    pub async fn run_task(&self, task: &Task) -> TaskOutcome {
        self.run_traced(task).await.0
    }

    async fn run_traced(&self, task: &Task) -> (TaskOutcome, Vec<TaskState>) {
        let mut tracker = Tracker::new(task);
        let mut attempts_made = 0;

        loop {
            attempts_made += 1;
            tracing::debug!(
                "Harvesting {} (attempt {}/{})",
                task.address,
                attempts_made,
                self.policy.max_attempts
            );

            let error = match self.attempt(task, &mut tracker, attempts_made).await {
                Ok(record) => {
                    tracker.advance(TaskState::Succeeded);
                    tracing::info!(
                        "Harvested {} ({} variant(s), attempt {})",
                        task.address,
                        record.fields.variant_count(),
                        attempts_made
                    );
                    return (TaskOutcome::Succeeded(record), tracker.history);
                }
                Err(error) => error,
            };

            if attempts_made >= self.policy.max_attempts {
                tracker.advance(TaskState::Exhausted);
                tracing::error!(
                    "Giving up on {} after {} attempt(s): {}",
                    task.address,
                    attempts_made,
                    error
                );
                let failure = FailureEntry {
                    task: task.clone(),
                    last_error: error.kind,
                    message: error.message,
                    attempts_made,
                };
                return (TaskOutcome::Exhausted(failure), tracker.history);
            }

            tracker.advance(TaskState::Retrying);
            let wait = self.delay.next_delay() + self.policy.retry_backoff * attempts_made;
            tracing::warn!(
                "Attempt {} for {} failed ({}); retrying in {:?}",
                attempts_made,
                task.address,
                error,
                wait
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// One all-or-nothing pass over the task
    async fn attempt(
        &self,
        task: &Task,
        tracker: &mut Tracker<'_>,
        attempt: u32,
    ) -> Result<Record, PageError> {
        tracker.advance(TaskState::Fetching);
        let main_page = self.fetch_page(&task.address).await?;

        tracker.advance(TaskState::Extracting);
        let mut fields = self.extractor.extract(&main_page)?;
        let label = self.extractor.variant_label(&main_page);

        tracker.advance(TaskState::Expanding);
        // The last attempt keeps what it has rather than failing the task
        let abort_on_block = attempt < self.policy.max_attempts;
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(visit_key(&task.address));
        visited.insert(visit_key(&main_page.final_url));

        let mut frontier: VecDeque<Url> = VecDeque::new();
        self.enqueue_links(&main_page, &mut visited, &mut frontier);
        drop(main_page);

        let mut variants = Vec::new();
        let mut visits = 0usize;
        while let Some(address) = frontier.pop_front() {
            if visits >= self.policy.max_variants {
                tracing::debug!(
                    "Variant limit {} reached for {}; {} link(s) left unvisited",
                    self.policy.max_variants,
                    task.address,
                    frontier.len() + 1
                );
                break;
            }
            visits += 1;

            match self.visit_variant(&address, tracker, abort_on_block).await {
                Ok((variant, page)) => {
                    self.enqueue_links(&page, &mut visited, &mut frontier);
                    variants.push(variant);
                }
                Err(error) if error.kind == ErrorKind::Blocked && abort_on_block => {
                    // A blocked session taints the whole attempt
                    return Err(error);
                }
                Err(error) => {
                    tracing::warn!("Omitting variant {} of {}: {}", address, task.address, error);
                }
            }
        }

        tracker.advance(TaskState::Combining);
        let pages_visited = 1 + variants.len();
        fields.swatch_variants = if variants.is_empty() {
            None
        } else {
            Some(variants)
        };

        Ok(Record {
            task: task.clone(),
            fields,
            label,
            attempts: attempt,
            pages_visited,
        })
    }

    /// Fetches and extracts one variant page, retrying it in place
    ///
    /// Ends in `Expanding` on every path except a blocked fetch when
    /// `abort_on_block` is set.
    async fn visit_variant(
        &self,
        address: &Url,
        tracker: &mut Tracker<'_>,
        abort_on_block: bool,
    ) -> Result<(Variant, PageContent), PageError> {
        let mut last_error = None;

        for _ in 0..self.policy.variant_attempts {
            tracker.advance(TaskState::Fetching);
            let page = match self.fetch_page(address).await {
                Ok(page) => page,
                Err(error) => {
                    let error = PageError::from(error);
                    if error.kind == ErrorKind::Blocked && abort_on_block {
                        return Err(error);
                    }
                    tracker.advance(TaskState::Expanding);
                    last_error = Some(error);
                    continue;
                }
            };

            tracker.advance(TaskState::Extracting);
            let extracted = self.extractor.extract(&page);
            tracker.advance(TaskState::Expanding);

            match extracted {
                Ok(fields) => {
                    let variant = Variant {
                        address: address.clone(),
                        label: self.extractor.variant_label(&page),
                        fields,
                    };
                    return Ok((variant, page));
                }
                Err(error) => last_error = Some(error.into()),
            }
        }

        Err(last_error.unwrap_or_else(|| PageError {
            kind: ErrorKind::Transport,
            message: format!("no attempt made for {}", address),
        }))
    }

    fn enqueue_links(
        &self,
        page: &PageContent,
        visited: &mut HashSet<String>,
        frontier: &mut VecDeque<Url>,
    ) {
        for link in self.expander.expand(page) {
            if visited.insert(visit_key(&link)) {
                frontier.push_back(link);
            }
        }
    }

    /// Waits per the delay policy, then fetches under the per-operation timeout
    async fn fetch_page(&self, address: &Url) -> Result<PageContent, FetchError> {
        let wait = self.delay.next_delay();
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        match tokio::time::timeout(self.policy.page_timeout, self.fetcher.fetch(address)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::timeout(address, self.policy.page_timeout)),
        }
    }
}
