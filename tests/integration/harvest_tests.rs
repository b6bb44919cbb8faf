//! Integration tests for the harvester
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! fetch, expand, extract and combine cycle end-to-end over HTTP.

use catalog_harvest::config::{Config, HarvestConfig, OutputConfig, SelectorConfig, UserAgentConfig};
use catalog_harvest::harvest::{harvest, http_driver};
use catalog_harvest::output::{generate_markdown_summary, generate_summary, CsvSink, FanoutSink, SqliteSink};
use catalog_harvest::storage::{RunStatus, SqliteStorage, Storage};
use catalog_harvest::task::load_tasks;
use catalog_harvest::{ErrorKind, Task};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration writing into `dir`
fn create_test_config(dir: &Path) -> Config {
    let out = |name: &str| dir.join(name).to_string_lossy().into_owned();
    Config {
        harvest: HarvestConfig {
            max_attempts: 2,
            variant_attempts: 2,
            delay_min_ms: 0,
            delay_max_ms: 5,
            retry_backoff_ms: 0,
            page_timeout_secs: 5,
            worker_count: 1,
            max_variants: 32,
            progress_interval: 1,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: out("harvest.db"),
            results_path: out("results.csv"),
            failures_path: out("failures.csv"),
            summary_path: out("summary.md"),
            batch_save_size: 2,
        },
        selectors: SelectorConfig::default(),
    }
}

fn product_html(title: &str, price: &str, swatches: &[&str]) -> String {
    let links: String = swatches
        .iter()
        .map(|s| format!(r#"<a href="{}">{}</a>"#, s, s))
        .collect();
    format!(
        r#"<html><head><title>{title}</title></head><body>
        <h1>{title}</h1>
        <div class="pdp-productPrice">{price}</div>
        <p class="pdp-atc-controls__color">Brushed Steel</p>
        <div class="xps-teaser__content">Boils in minutes</div>
        <ul id="splide03-list"><li><img src="/img/{title}.png"></li></ul>
        <a class="xps-support-doc-item-link" href="/docs/manual.pdf">Instruction Book</a>
        <div class="xps-swatchpicker-container">{links}</div>
        </body></html>"#
    )
}

fn variant_html(label: &str, swatches: &[&str]) -> String {
    let links: String = swatches
        .iter()
        .map(|s| format!(r#"<a href="{}">{}</a>"#, s, s))
        .collect();
    format!(
        r#"<html><body>
        <p class="pdp-atc-controls__color">{label}</p>
        <div class="pdp-atc-controls-model-section">Model {label}</div>
        <div class="xps-swatchpicker-container">{links}</div>
        </body></html>"#
    )
}

async fn mount_html(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// A small catalog: one product with variants, one missing, one forbidden
async fn mount_catalog(server: &MockServer) {
    mount_html(
        server,
        "/kettle",
        product_html("Smart Kettle", "$199.95", &["/kettle-red", "/kettle-blue"]),
    )
    .await;
    mount_html(server, "/kettle-red", variant_html("Red", &["/kettle", "/kettle-blue"])).await;
    mount_status(server, "/kettle-blue", 500).await;
    mount_status(server, "/gone", 404).await;
    mount_status(server, "/private", 403).await;
    mount_html(server, "/toaster", product_html("Toaster", "$49.95", &[])).await;
}

fn task(base: &str, route: &str, row: usize) -> Task {
    Task::new(Url::parse(&format!("{}{}", base, route)).unwrap()).with_row(row)
}

#[tokio::test]
async fn test_harvest_catalog_over_http() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    let base = server.uri();

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let tasks = vec![
        task(&base, "/kettle", 1),
        task(&base, "/gone", 2),
        task(&base, "/private", 3),
        task(&base, "/toaster", 4),
    ];

    let report = harvest(&config, tasks).await.expect("Harvest failed");

    assert!(report.is_complete());
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.failures.len(), 2);

    let kettle = report
        .results
        .iter()
        .find(|r| r.task.row == 1)
        .expect("Kettle record missing");
    assert_eq!(kettle.fields.title.as_deref(), Some("Smart Kettle"));
    assert_eq!(kettle.fields.price.as_deref(), Some("$199.95"));
    assert_eq!(kettle.fields.teaser.as_deref(), Some("Boils in minutes"));
    assert_eq!(kettle.label.as_deref(), Some("Brushed Steel"));
    assert_eq!(
        kettle.fields.images.as_deref(),
        Some(&[format!("{}/img/Smart Kettle.png", base).replace(' ', "%20")][..])
    );
    let documents = kettle.fields.documents.as_ref().expect("Documents missing");
    assert_eq!(documents[0].text, "Instruction Book");
    assert_eq!(documents[0].href, format!("{}/docs/manual.pdf", base));

    // Red loads, blue keeps failing and is left out
    let variants = kettle.fields.swatch_variants.as_ref().expect("Variants missing");
    assert_eq!(variants.len(), 1);
    assert_eq!(variants[0].label.as_deref(), Some("Red"));
    assert_eq!(kettle.attempts, 1);

    let gone = report.failures.iter().find(|f| f.task.row == 2).unwrap();
    assert_eq!(gone.last_error, ErrorKind::NotFound);
    assert_eq!(gone.attempts_made, 2);

    let private = report.failures.iter().find(|f| f.task.row == 3).unwrap();
    assert_eq!(private.last_error, ErrorKind::Blocked);
    assert_eq!(private.attempts_made, 2);
}

#[tokio::test]
async fn test_main_page_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_html(&server, "/flaky", product_html("Blender", "$299.95", &[])).await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let report = harvest(&config, vec![task(&server.uri(), "/flaky", 1)])
        .await
        .unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].attempts, 2);
    assert_eq!(report.results[0].fields.title.as_deref(), Some("Blender"));
}

#[tokio::test]
async fn test_slow_page_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(product_html("Slow", "$1", &[]), "text/html")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(dir.path());
    config.harvest.max_attempts = 1;
    config.harvest.page_timeout_secs = 1;

    let report = harvest(&config, vec![task(&server.uri(), "/slow", 1)])
        .await
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].last_error, ErrorKind::Timeout);
    assert_eq!(report.failures[0].attempts_made, 1);
}

#[tokio::test]
async fn test_non_html_page_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"title":"Kettle"}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let report = harvest(&config, vec![task(&server.uri(), "/feed", 1)])
        .await
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].last_error, ErrorKind::MalformedPage);
}

#[tokio::test]
async fn test_mislabelled_html_is_harvested() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plain"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(product_html("Juicer", "$149.95", &[]), "text/plain"),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let report = harvest(&config, vec![task(&server.uri(), "/plain", 1)])
        .await
        .unwrap();

    assert!(report.failures.is_empty());
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].fields.title.as_deref(), Some("Juicer"));
}

#[tokio::test]
async fn test_worker_pool_over_http() {
    let server = MockServer::start().await;
    for i in 0..8 {
        mount_html(
            &server,
            &format!("/item{}", i),
            product_html(&format!("Item{}", i), "$10", &[]),
        )
        .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(dir.path());
    config.harvest.worker_count = 3;

    let tasks: Vec<Task> = (0..8)
        .map(|i| task(&server.uri(), &format!("/item{}", i), i + 1))
        .collect();
    let report = harvest(&config, tasks).await.unwrap();

    assert_eq!(report.results.len(), 8);
    let mut rows: Vec<usize> = report.results.iter().map(|r| r.task.row).collect();
    rows.sort_unstable();
    assert_eq!(rows, (1..=8).collect::<Vec<_>>());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 8);
}

#[tokio::test]
async fn test_run_from_input_file_to_outputs() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    let base = server.uri();

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());

    let input = dir.path().join("products.csv");
    std::fs::write(
        &input,
        format!(
            "Title,URL\nKettle,{base}/kettle\nBroken,not a url\nGone,{base}/gone\nToaster,{base}/toaster\n"
        ),
    )
    .unwrap();

    let load = load_tasks(&input).expect("Failed to load tasks");
    assert_eq!(load.tasks.len(), 3);
    assert_eq!(load.rejected.len(), 1);

    let mut storage =
        SqliteStorage::new(Path::new(&config.output.database_path)).expect("Failed to open DB");
    let run_id = storage.create_run("test-hash", load.tasks.len()).unwrap();
    let storage = Arc::new(Mutex::new(storage));

    let csv = CsvSink::create(
        Path::new(&config.output.results_path),
        Path::new(&config.output.failures_path),
    )
    .unwrap();
    let sink = FanoutSink::new()
        .with(Arc::new(SqliteSink::new(storage.clone(), run_id)))
        .with(Arc::new(csv));

    let report = http_driver(&config)
        .unwrap()
        .with_sink(Arc::new(sink))
        .run(load.tasks)
        .await
        .unwrap();
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.failures.len(), 1);

    // Database
    {
        let guard = storage.lock().unwrap();
        assert_eq!(guard.count_records(run_id).unwrap(), 2);
        assert_eq!(guard.count_failures(run_id).unwrap(), 1);
        let run = guard.get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.total_tasks, 3);
    }

    // CSV files
    let mut results = csv::Reader::from_path(&config.output.results_path).unwrap();
    let rows: Vec<csv::StringRecord> = results.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    let kettle = rows.iter().find(|r| &r[3] == "Smart Kettle").unwrap();
    assert_eq!(&kettle[2], "Kettle");
    assert_eq!(&kettle[4], "Brushed Steel");
    assert!(kettle[11].contains("\"label\":\"Red\""));

    let mut failures = csv::Reader::from_path(&config.output.failures_path).unwrap();
    let rows: Vec<csv::StringRecord> = failures.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][3], "not_found");

    // Markdown summary
    let summary = generate_summary(&*storage.lock().unwrap()).unwrap();
    assert_eq!(summary.records, 2);
    assert_eq!(summary.failures, 1);
    generate_markdown_summary(&summary, Path::new(&config.output.summary_path)).unwrap();
    let markdown = std::fs::read_to_string(&config.output.summary_path).unwrap();
    assert!(markdown.contains("| not_found | 1 |"));
    assert!(markdown.contains("| title | 2 | 100.0% |"));
}
