//! End-to-end dispatch behaviour with recording sinks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cspreports_core::report::format::INVALID_JSON_SENTINEL;
use cspreports_core::{
    format_report, Config, DispatchSummary, Dispatcher, Error, HandlerRegistry, LogSink,
    MapSettings, MemoryStore, Outbox, ParsedReport, ReportFilter, ReportRequest, ReportStore,
    Sink, StoredReport,
};
use log::Level;
use parking_lot::Mutex;

const VALID_REPORT: &str = r#"{
    "csp-report": {
        "document-uri": "https://example.com/checkout",
        "referrer": "https://example.com/",
        "blocked-uri": "https://tracker.example.net/pixel.gif",
        "violated-directive": "img-src 'self'",
        "original-policy": "default-src 'self'; img-src 'self'; report-uri /csp/",
        "status-code": 200
    }
}"#;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

#[derive(Default)]
struct RecordingLog {
    lines: Mutex<Vec<(String, Level, String)>>,
}

impl LogSink for RecordingLog {
    fn write(&self, logger: &str, level: Level, message: &str) -> anyhow::Result<()> {
        self.lines
            .lock()
            .push((logger.to_string(), level, message.to_string()));
        Ok(())
    }
}

struct FailingStore;

impl ReportStore for FailingStore {
    fn save(&self, _report: ParsedReport) -> anyhow::Result<StoredReport> {
        anyhow::bail!("database unavailable")
    }

    fn query(&self, _filter: &ReportFilter) -> anyhow::Result<Vec<StoredReport>> {
        Ok(Vec::new())
    }

    fn delete(&self, _filter: &ReportFilter) -> anyhow::Result<usize> {
        Ok(0)
    }
}

struct Harness {
    settings: Arc<MapSettings>,
    outbox: Arc<Outbox>,
    log: Arc<RecordingLog>,
    store: Arc<MemoryStore>,
    registry: Arc<HandlerRegistry>,
    dispatcher: Dispatcher,
}

impl Harness {
    fn new(settings: MapSettings) -> Self {
        Self::with_store(settings, None)
    }

    fn with_store(settings: MapSettings, store: Option<Arc<dyn ReportStore>>) -> Self {
        let settings = Arc::new(settings);
        let outbox = Arc::new(Outbox::new());
        let log = Arc::new(RecordingLog::default());
        let memory = Arc::new(MemoryStore::new());
        let registry = Arc::new(HandlerRegistry::new());

        let dispatcher = Dispatcher::builder(Config::new(settings.clone()))
            .mailer(outbox.clone())
            .log_sink(log.clone())
            .store(store.unwrap_or_else(|| memory.clone() as Arc<dyn ReportStore>))
            .registry(registry.clone())
            .build();

        Self {
            settings,
            outbox,
            log,
            store: memory,
            registry,
            dispatcher,
        }
    }

    fn process(&self, body: &str) -> cspreports_core::Result<DispatchSummary> {
        self.dispatcher
            .process(&ReportRequest::new(body).with_user_agent(USER_AGENT))
    }

    fn sink_actions(&self) -> usize {
        self.outbox.len() + self.log.lines.lock().len() + self.store.len()
    }
}

fn counting_handler(
    registry: &HandlerRegistry,
    name: &str,
    order: &Arc<Mutex<Vec<String>>>,
) {
    let order = Arc::clone(order);
    let label = name.to_string();
    registry
        .register(name, move |_: &ReportRequest| -> anyhow::Result<()> {
            order.lock().push(label.clone());
            Ok(())
        })
        .unwrap();
}

#[test]
fn all_sinks_receive_the_same_report() {
    let harness = Harness::new(MapSettings::new());
    let summary = harness.process(VALID_REPORT).unwrap();

    assert_eq!(summary.completed, vec![Sink::Email, Sink::Log, Sink::Save]);

    let messages = harness.outbox.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].subject, "CSP Violation Report");
    assert_eq!(
        messages[0].body,
        format!(
            "User agent:\n{}\n\nReport:\n{}",
            USER_AGENT,
            format_report(VALID_REPORT)
        )
    );

    let lines = harness.log.lines.lock().clone();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].0, "CSP Reports");
    assert_eq!(lines[0].1, Level::Warn);
    assert_eq!(
        lines[0].2,
        format!(
            "Content Security Policy violation: {}",
            format_report(VALID_REPORT)
        )
    );

    let stored = harness.store.all();
    assert_eq!(stored.len(), 1);
    let report = &stored[0].report;
    assert!(report.is_valid);
    assert_eq!(report.user_agent, USER_AGENT);
    assert_eq!(report.raw.as_bytes(), VALID_REPORT.as_bytes());
    assert_eq!(report.status_code, Some(200));
    assert!(report.created.is_some());
    assert!(report.modified.is_some());
}

#[test]
fn browser_extension_reports_are_ignored() {
    let harness = Harness::new(
        MapSettings::new().with("CSP_REPORTS_IGNORE_BROWSER_EXTENSIONS", true),
    );
    let summary = harness
        .process(r#"{"source-file": "moz-extension://abc"}"#)
        .unwrap();

    assert!(summary.ignored);
    assert!(summary.completed.is_empty());
    assert_eq!(harness.sink_actions(), 0);
}

#[test]
fn extension_reports_dispatch_when_filter_disabled() {
    let harness = Harness::new(MapSettings::new());
    let summary = harness
        .process(r#"{"source-file": "moz-extension://abc"}"#)
        .unwrap();
    assert!(!summary.ignored);
    assert_eq!(harness.sink_actions(), 3);
}

#[test]
fn malformed_payload_fails_ignore_check() {
    let harness = Harness::new(
        MapSettings::new().with("CSP_REPORTS_IGNORE_BROWSER_EXTENSIONS", true),
    );
    let err = harness.process("{not json").unwrap_err();
    assert!(matches!(err, Error::InvalidJson(_)));
    assert_eq!(harness.sink_actions(), 0);
}

#[test]
fn malformed_payload_is_still_recorded() {
    let harness = Harness::new(MapSettings::new());
    harness.process("{not json").unwrap();

    let body = &harness.outbox.messages()[0].body;
    assert!(body.contains(INVALID_JSON_SENTINEL));
    assert!(body.ends_with("{not json"));

    let stored = harness.store.all();
    assert!(!stored[0].report.is_valid);
    assert_eq!(stored[0].report.raw.as_bytes(), b"{not json");
}

#[test]
fn toggles_are_read_per_request() {
    let harness = Harness::new(MapSettings::new().with("CSP_REPORTS_EMAIL_ADMINS", false));
    harness.process(VALID_REPORT).unwrap();
    assert_eq!(harness.outbox.len(), 0);

    harness.settings.set("CSP_REPORTS_EMAIL_ADMINS", true);
    harness.settings.set("CSP_REPORTS_SAVE", false);
    harness.settings.set("CSP_REPORTS_LOG_LEVEL", "error");
    harness.process(VALID_REPORT).unwrap();

    assert_eq!(harness.outbox.len(), 1);
    assert_eq!(harness.store.len(), 1);
    assert_eq!(harness.log.lines.lock()[1].1, Level::Error);
}

#[test]
fn custom_logger_name_is_used() {
    let harness = Harness::new(MapSettings::new().with("CSP_REPORTS_LOGGER_NAME", "security.csp"));
    harness.process(VALID_REPORT).unwrap();
    assert_eq!(harness.log.lines.lock()[0].0, "security.csp");
}

#[test]
fn invalid_log_level_aborts_remaining_sinks() {
    let harness = Harness::new(MapSettings::new().with("CSP_REPORTS_LOG_LEVEL", "shout"));
    let err = harness.process(VALID_REPORT).unwrap_err();

    assert!(matches!(err, Error::InvalidLogLevel(_)));
    assert_eq!(harness.outbox.len(), 1);
    assert_eq!(harness.store.len(), 0);
}

#[test]
fn store_failure_aborts_handlers() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let harness = Harness::with_store(
        MapSettings::new().with("CSP_REPORTS_ADDITIONAL_HANDLERS", vec!["hooks.audit"]),
        Some(Arc::new(FailingStore)),
    );
    counting_handler(&harness.registry, "hooks.audit", &order);

    let err = harness.process(VALID_REPORT).unwrap_err();
    assert!(matches!(err, Error::Sink { sink: Sink::Save, .. }));
    assert!(err.to_string().contains("database unavailable"));
    assert!(order.lock().is_empty());
}

#[test]
fn isolated_failures_let_later_sinks_run() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let harness = Harness::with_store(
        MapSettings::new()
            .with("CSP_REPORTS_ISOLATE_SINK_FAILURES", true)
            .with("CSP_REPORTS_ADDITIONAL_HANDLERS", vec!["hooks.audit"]),
        Some(Arc::new(FailingStore)),
    );
    counting_handler(&harness.registry, "hooks.audit", &order);

    let summary = harness.process(VALID_REPORT).unwrap();
    assert!(!summary.is_success());
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].sink, Sink::Save);
    assert!(summary.stored.is_none());
    assert_eq!(
        summary.completed,
        vec![Sink::Email, Sink::Log, Sink::Handlers]
    );
    assert_eq!(*order.lock(), vec!["hooks.audit"]);
}

#[test]
fn handlers_run_in_configured_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let harness = Harness::new(
        MapSettings::new()
            .with("CSP_REPORTS_EMAIL_ADMINS", false)
            .with("CSP_REPORTS_LOG", false)
            .with("CSP_REPORTS_SAVE", false)
            .with(
                "CSP_REPORTS_ADDITIONAL_HANDLERS",
                vec!["hooks.second", "hooks.first"],
            ),
    );
    counting_handler(&harness.registry, "hooks.first", &order);
    counting_handler(&harness.registry, "hooks.second", &order);

    let summary = harness.process(VALID_REPORT).unwrap();
    assert_eq!(summary.completed, vec![Sink::Handlers]);
    assert_eq!(*order.lock(), vec!["hooks.second", "hooks.first"]);
    assert_eq!(harness.sink_actions(), 0);
}

#[test]
fn handler_receives_original_request() {
    let seen = Arc::new(Mutex::new(None));
    let harness = Harness::new(
        MapSettings::new().with("CSP_REPORTS_ADDITIONAL_HANDLERS", vec!["hooks.capture"]),
    );
    let capture = Arc::clone(&seen);
    harness
        .registry
        .register("hooks.capture", move |request: &ReportRequest| -> anyhow::Result<()> {
            *capture.lock() = Some((
                request.body.as_bytes().to_vec(),
                request.user_agent().to_string(),
            ));
            Ok(())
        })
        .unwrap();

    harness.process(VALID_REPORT).unwrap();
    let (body, user_agent) = seen.lock().clone().unwrap();
    assert_eq!(body, VALID_REPORT.as_bytes());
    assert_eq!(user_agent, USER_AGENT);
}

#[test]
fn handler_errors_propagate_and_stop_later_handlers() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let harness = Harness::new(MapSettings::new().with(
        "CSP_REPORTS_ADDITIONAL_HANDLERS",
        vec!["hooks.broken", "hooks.after"],
    ));
    harness
        .registry
        .register("hooks.broken", |_: &ReportRequest| -> anyhow::Result<()> {
            anyhow::bail!("webhook returned 500")
        })
        .unwrap();
    counting_handler(&harness.registry, "hooks.after", &order);

    let err = harness.process(VALID_REPORT).unwrap_err();
    assert!(matches!(&err, Error::Handler { name, .. } if name == "hooks.broken"));
    assert!(order.lock().is_empty());
    // Earlier sinks already ran.
    assert_eq!(harness.store.len(), 1);
}

#[test]
fn unknown_handler_name_is_an_error() {
    let harness = Harness::new(
        MapSettings::new().with("CSP_REPORTS_ADDITIONAL_HANDLERS", vec!["hooks.missing"]),
    );
    let err = harness.process(VALID_REPORT).unwrap_err();
    assert!(matches!(err, Error::UnknownHandler(_)));
}

#[test]
fn handlers_resolve_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let harness = Harness::new(
        MapSettings::new()
            .with("CSP_REPORTS_SAVE", false)
            .with("CSP_REPORTS_ADDITIONAL_HANDLERS", vec!["hooks.count"]),
    );
    let counter = Arc::clone(&calls);
    harness
        .registry
        .register("hooks.count", move |_: &ReportRequest| -> anyhow::Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    harness.process(VALID_REPORT).unwrap();

    // Replacing the registry entry does not affect the memoized list.
    harness
        .registry
        .register("hooks.count", |_: &ReportRequest| -> anyhow::Result<()> {
            anyhow::bail!("replacement should not run")
        })
        .unwrap();
    harness.process(VALID_REPORT).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn request_encoding_is_used_for_persistence() {
    let harness = Harness::new(MapSettings::new());
    let mut body = br#"{"csp-report": {"document-uri": "http://example.com/caf"#.to_vec();
    body.push(0xe9);
    body.extend_from_slice(br#""}}"#);

    let request = ReportRequest::new(body).with_encoding("iso-8859-1");
    harness.dispatcher.process(&request).unwrap();

    let stored = harness.store.all();
    assert_eq!(
        stored[0].report.document_uri.as_deref(),
        Some("http://example.com/café")
    );
}

#[test]
fn undecodable_body_fails_persistence() {
    let harness = Harness::new(MapSettings::new().with("CSP_REPORTS_EMAIL_ADMINS", false));
    let request = ReportRequest::new(vec![b'{', 0xff, b'}']);
    let err = harness.dispatcher.process(&request).unwrap_err();

    assert!(matches!(err, Error::BodyDecode { .. }));
    assert_eq!(harness.log.lines.lock().len(), 1);
    assert_eq!(harness.store.len(), 0);
}

#[test]
fn dispatcher_is_shareable_across_threads() {
    let harness = Arc::new(Harness::new(MapSettings::new().with("CSP_REPORTS_EMAIL_ADMINS", false)));
    let threads: Vec<_> = (0..4)
        .map(|_| {
            let harness = Arc::clone(&harness);
            std::thread::spawn(move || harness.process(VALID_REPORT).unwrap())
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }
    assert_eq!(harness.store.len(), 4);
    let mut ids: Vec<u64> = harness.store.all().iter().map(|r| r.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3, 4]);
}
