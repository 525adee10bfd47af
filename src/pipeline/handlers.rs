//! Custom report handlers.
//!
//! Embedders register callbacks under dotted names (`"alerts.page_oncall"`)
//! and list the names to run in `CSP_REPORTS_ADDITIONAL_HANDLERS`. Handlers
//! receive the original request and own their failure handling: an error
//! they return is passed straight back to the caller of the pipeline.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::pipeline::context::ReportRequest;

/// A custom sink invoked with the raw request.
pub trait ReportHandler: Send + Sync {
    fn handle(&self, request: &ReportRequest) -> anyhow::Result<()>;
}

impl<F> ReportHandler for F
where
    F: Fn(&ReportRequest) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(&self, request: &ReportRequest) -> anyhow::Result<()> {
        self(request)
    }
}

/// A handler resolved from its configured name.
#[derive(Clone)]
pub struct NamedHandler {
    pub name: String,
    handler: Arc<dyn ReportHandler>,
}

impl NamedHandler {
    pub fn call(&self, request: &ReportRequest) -> Result<()> {
        self.handler.handle(request).map_err(|source| Error::Handler {
            name: self.name.clone(),
            source,
        })
    }
}

impl fmt::Debug for NamedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedHandler").field("name", &self.name).finish()
    }
}

/// Directory of handlers by dotted name.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn ReportHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `path`, replacing any previous entry.
    pub fn register(&self, path: &str, handler: impl ReportHandler + 'static) -> Result<()> {
        validate_path(path)?;
        let replaced = self
            .handlers
            .write()
            .insert(path.to_string(), Arc::new(handler))
            .is_some();
        log::debug!("HANDLER_REGISTERED name={} replaced={}", path, replaced);
        Ok(())
    }

    /// Look up a single handler.
    pub fn resolve(&self, path: &str) -> Result<NamedHandler> {
        validate_path(path)?;
        self.handlers
            .read()
            .get(path)
            .map(|handler| NamedHandler {
                name: path.to_string(),
                handler: Arc::clone(handler),
            })
            .ok_or_else(|| Error::UnknownHandler(path.to_string()))
    }

    /// Look up every name, preserving order. Fails on the first bad name.
    pub fn resolve_all(&self, paths: &[String]) -> Result<Vec<NamedHandler>> {
        paths.iter().map(|p| self.resolve(p)).collect()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// A handler name is `<module>.<symbol>` with both parts non-empty.
fn validate_path(path: &str) -> Result<()> {
    match path.rsplit_once('.') {
        Some((module, symbol)) if !module.is_empty() && !symbol.is_empty() => Ok(()),
        _ => Err(Error::InvalidHandlerPath(path.to_string())),
    }
}
