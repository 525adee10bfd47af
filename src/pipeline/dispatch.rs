//! Report dispatch.
//!
//! Runs the sinks for one inbound report, in a fixed order:
//! 1. Browser extension ignore check (strict)
//! 2. Email to administrators
//! 3. Log stream
//! 4. Persistence
//! 5. Additional handlers, in configuration order
//!
//! Every toggle is read from the configuration at the moment the step runs.
//! By default the first failing step aborts the dispatch and its error is
//! returned. With `ISOLATE_SINK_FAILURES` enabled every step runs and the
//! failures are collected in the returned summary instead.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::options::Config;
use crate::config::settings::FigmentSettings;
use crate::error::{Error, Result};
use crate::logging::structured::LogContext;
use crate::pipeline::context::ReportRequest;
use crate::pipeline::handlers::{HandlerRegistry, NamedHandler};
use crate::pipeline::ignore::should_ignore_report;
use crate::report::format::format_report;
use crate::report::parser::parse_with_context;
use crate::sinks::log_sink::{parse_level, LogCrateSink, LogSink};
use crate::sinks::mail::{LogMailer, MailSink, MAIL_SUBJECT};
use crate::storage::models::StoredReport;
use crate::storage::store::{MemoryStore, ReportStore};
use crate::{log_debug, log_error, log_info};

/// A dispatch step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sink {
    Email,
    Log,
    Save,
    Handlers,
}

impl Sink {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sink::Email => "email",
            Sink::Log => "log",
            Sink::Save => "save",
            Sink::Handlers => "handlers",
        }
    }
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A step that failed while failures were isolated.
#[derive(Debug)]
pub struct SinkFailure {
    pub sink: Sink,
    pub error: Error,
}

/// Outcome of dispatching one report.
#[derive(Debug, Default)]
pub struct DispatchSummary {
    pub request_id: String,
    /// The report was dropped by the ignore check; no sink ran.
    pub ignored: bool,
    /// Steps that completed, in execution order.
    pub completed: Vec<Sink>,
    /// The persisted record, when the save step ran.
    pub stored: Option<StoredReport>,
    /// Only populated when failures are isolated.
    pub failures: Vec<SinkFailure>,
}

impl DispatchSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Routes reports to the configured sinks.
pub struct Dispatcher {
    config: Config,
    mailer: Arc<dyn MailSink>,
    log_sink: Arc<dyn LogSink>,
    store: Arc<dyn ReportStore>,
    registry: Arc<HandlerRegistry>,
    /// Resolved once, on first use.
    handlers: RwLock<Option<Arc<[NamedHandler]>>>,
}

impl Dispatcher {
    pub fn builder(config: Config) -> DispatcherBuilder {
        DispatcherBuilder::new(config)
    }

    /// Dispatcher reading `CSP_REPORTS_*` environment variables, with the
    /// bundled sinks and `env_logger` installed.
    pub fn from_env() -> Result<Self> {
        crate::init_logger();
        let settings = FigmentSettings::from_env()?;
        Ok(Self::builder(Config::new(settings)).build())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ReportStore> {
        &self.store
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Process one report request.
    pub fn process(&self, request: &ReportRequest) -> Result<DispatchSummary> {
        let ctx = request.log_context();
        let mut summary = DispatchSummary {
            request_id: request.request_id.clone(),
            ..DispatchSummary::default()
        };

        log_info!(
            ctx,
            "REPORT_RECEIVED",
            bytes = request.body.as_bytes().len(),
            user_agent = request.user_agent(),
        );

        if should_ignore_report(request, &self.config)? {
            log_info!(ctx, "REPORT_IGNORED", reason = "browser_extension");
            summary.ignored = true;
            return Ok(summary);
        }

        let isolate = self.config.isolate_sink_failures();

        if self.config.email_admins() {
            let result = self.email_admins(request, &ctx);
            self.record(Sink::Email, result, isolate, &ctx, &mut summary)?;
        }

        if self.config.log() {
            let result = self.log_report(request, &ctx);
            self.record(Sink::Log, result, isolate, &ctx, &mut summary)?;
        }

        if self.config.save() {
            let result = self.save_report(request, &ctx);
            summary.stored = self.record(Sink::Save, result, isolate, &ctx, &mut summary)?;
        }

        if !self.config.additional_handlers().is_empty() {
            self.run_additional_handlers(request, isolate, &ctx, &mut summary)?;
        }

        log_info!(
            ctx,
            "REPORT_DISPATCHED",
            completed = summary.completed.len(),
            failed = summary.failures.len(),
        );

        Ok(summary)
    }

    /// The configured handlers, resolved on first call and reused afterwards.
    ///
    /// A failed resolution is not remembered, so it is retried next time.
    pub fn additional_handlers(&self) -> Result<Arc<[NamedHandler]>> {
        if let Some(handlers) = self.handlers.read().as_ref() {
            return Ok(Arc::clone(handlers));
        }

        let names = self.config.additional_handlers();
        let resolved: Arc<[NamedHandler]> = self.registry.resolve_all(&names)?.into();
        log::info!("HANDLERS_RESOLVED names={:?}", names);

        let mut slot = self.handlers.write();
        Ok(Arc::clone(slot.get_or_insert(resolved)))
    }

    fn email_admins(&self, request: &ReportRequest, ctx: &LogContext) -> Result<()> {
        let report = format_report(request.body.as_bytes());
        let message = format!(
            "User agent:\n{}\n\nReport:\n{}",
            request.user_agent(),
            report
        );
        self.mailer
            .mail_admins(MAIL_SUBJECT, &message)
            .map_err(|e| Error::sink(Sink::Email, e))?;
        log_debug!(ctx, "REPORT_EMAILED", subject = MAIL_SUBJECT);
        Ok(())
    }

    fn log_report(&self, request: &ReportRequest, ctx: &LogContext) -> Result<()> {
        let level = parse_level(&self.config.log_level())?;
        let logger = self.config.logger_name();
        let message = format!(
            "Content Security Policy violation: {}",
            format_report(request.body.as_bytes())
        );
        self.log_sink
            .write(&logger, level, &message)
            .map_err(|e| Error::sink(Sink::Log, e))?;
        log_debug!(ctx, "REPORT_LOGGED", logger = logger, level = level);
        Ok(())
    }

    fn save_report(&self, request: &ReportRequest, ctx: &LogContext) -> Result<StoredReport> {
        let text = request.decoded_body()?;
        let mut report = parse_with_context(text, ctx);
        report.user_agent = request.user_agent().to_string();

        let stored = self
            .store
            .save(report)
            .map_err(|e| Error::sink(Sink::Save, e))?;
        log_info!(
            ctx,
            "REPORT_SAVED",
            id = stored.id,
            valid = stored.report.is_valid,
        );
        Ok(stored)
    }

    fn run_additional_handlers(
        &self,
        request: &ReportRequest,
        isolate: bool,
        ctx: &LogContext,
        summary: &mut DispatchSummary,
    ) -> Result<()> {
        let handlers = match self.additional_handlers() {
            Ok(handlers) => handlers,
            Err(e) => return self.fail(Sink::Handlers, e, isolate, ctx, summary),
        };

        let mut all_succeeded = true;
        for handler in handlers.iter() {
            log_debug!(ctx, "HANDLER_START", name = handler.name);
            if let Err(e) = handler.call(request) {
                all_succeeded = false;
                self.fail(Sink::Handlers, e, isolate, ctx, summary)?;
            }
        }

        if all_succeeded {
            summary.completed.push(Sink::Handlers);
        }
        Ok(())
    }

    /// Record a step's outcome. Returns the step's value on success, `None`
    /// for an isolated failure, and the error itself otherwise.
    fn record<T>(
        &self,
        sink: Sink,
        result: Result<T>,
        isolate: bool,
        ctx: &LogContext,
        summary: &mut DispatchSummary,
    ) -> Result<Option<T>> {
        match result {
            Ok(value) => {
                summary.completed.push(sink);
                Ok(Some(value))
            }
            Err(e) => self.fail(sink, e, isolate, ctx, summary).map(|()| None),
        }
    }

    fn fail(
        &self,
        sink: Sink,
        error: Error,
        isolate: bool,
        ctx: &LogContext,
        summary: &mut DispatchSummary,
    ) -> Result<()> {
        log_error!(
            ctx,
            "SINK_FAILED",
            sink = sink.as_str(),
            isolated = isolate,
            error = error.to_string(),
        );
        if isolate {
            summary.failures.push(SinkFailure { sink, error });
            Ok(())
        } else {
            Err(error)
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Assembles a `Dispatcher`. Unset sinks default to `LogMailer`,
/// `LogCrateSink` and `MemoryStore`.
pub struct DispatcherBuilder {
    config: Config,
    mailer: Option<Arc<dyn MailSink>>,
    log_sink: Option<Arc<dyn LogSink>>,
    store: Option<Arc<dyn ReportStore>>,
    registry: Option<Arc<HandlerRegistry>>,
}

impl DispatcherBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            mailer: None,
            log_sink: None,
            store: None,
            registry: None,
        }
    }

    pub fn mailer(mut self, mailer: Arc<dyn MailSink>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn log_sink(mut self, log_sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(log_sink);
        self
    }

    pub fn store(mut self, store: Arc<dyn ReportStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn registry(mut self, registry: Arc<HandlerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            config: self.config,
            mailer: self.mailer.unwrap_or_else(|| Arc::new(LogMailer::default())),
            log_sink: self.log_sink.unwrap_or_else(|| Arc::new(LogCrateSink)),
            store: self.store.unwrap_or_else(|| Arc::new(MemoryStore::new())),
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(HandlerRegistry::new())),
            handlers: RwLock::new(None),
        }
    }
}
