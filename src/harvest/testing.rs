//! Scripted page fetcher for unit tests

use crate::harvest::fetcher::{FetchError, FetchErrorKind, PageContent, PageFetcher};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// One scripted response
#[derive(Debug, Clone)]
pub enum Scripted {
    Page(String),
    Fail(FetchErrorKind),
    Hang(Duration),
    Panic,
}

/// Serves scripted responses per address
///
/// Responses for an address are consumed in order; the last one repeats.
/// Unknown addresses fail with `NotFound`.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<String>>,
    call_times: Mutex<Vec<Instant>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, address: &str, responses: Vec<Scripted>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(address.to_string(), responses.into());
        self
    }

    pub fn page(self, address: &str, body: impl Into<String>) -> Self {
        self.script(address, vec![Scripted::Page(body.into())])
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// When each fetch started, in call order
    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }

    pub fn calls_to(&self, address: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.as_str() == address)
            .count()
    }

    fn next_response(&self, address: &str) -> Option<Scripted> {
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.get_mut(address)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, address: &Url) -> Result<PageContent, FetchError> {
        self.calls.lock().unwrap().push(address.to_string());
        self.call_times.lock().unwrap().push(Instant::now());

        match self.next_response(address.as_str()) {
            Some(Scripted::Page(body)) => Ok(PageContent::new(address.clone(), body)),
            Some(Scripted::Fail(kind)) => Err(FetchError::new(kind, address, "scripted failure")),
            Some(Scripted::Hang(duration)) => {
                tokio::time::sleep(duration).await;
                Err(FetchError::new(FetchErrorKind::Transport, address, "hung"))
            }
            Some(Scripted::Panic) => panic!("scripted panic fetching {}", address),
            None => Err(FetchError::new(FetchErrorKind::NotFound, address, "unscripted")),
        }
    }
}

/// Product page markup using the default selectors
pub fn product_page(title: &str, price: &str, swatches: &[&str]) -> String {
    let links: String = swatches
        .iter()
        .map(|s| format!(r#"<a href="{}">{}</a>"#, s, s))
        .collect();
    format!(
        r#"<html><body>
            <h1>{}</h1>
            <div class="pdp-productPrice">{}</div>
            <div class="xps-swatchpicker-container">{}</div>
        </body></html>"#,
        title, price, links
    )
}

/// Variant page markup with a colour label and model section
pub fn variant_page(label: &str, model: &str, swatches: &[&str]) -> String {
    let links: String = swatches
        .iter()
        .map(|s| format!(r#"<a href="{}">{}</a>"#, s, s))
        .collect();
    format!(
        r#"<html><body>
            <p class="pdp-atc-controls__color">{}</p>
            <div class="pdp-atc-controls-model-section">{}</div>
            <div class="xps-swatchpicker-container">{}</div>
        </body></html>"#,
        label, model, links
    )
}
