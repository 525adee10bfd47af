//! Administrator notification.

use std::sync::Arc;

use parking_lot::Mutex;

/// Subject line of every report notification.
pub const MAIL_SUBJECT: &str = "CSP Violation Report";

/// Delivers a message to the site administrators.
pub trait MailSink: Send + Sync {
    fn mail_admins(&self, subject: &str, message: &str) -> anyhow::Result<()>;
}

impl<M: MailSink + ?Sized> MailSink for Arc<M> {
    fn mail_admins(&self, subject: &str, message: &str) -> anyhow::Result<()> {
        (**self).mail_admins(subject, message)
    }
}

/// A message handed to a mail sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub subject: String,
    pub body: String,
}

/// Keeps every message in memory, oldest first.
#[derive(Debug, Default)]
pub struct Outbox {
    messages: Mutex<Vec<MailMessage>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<MailMessage> {
        self.messages.lock().clone()
    }

    /// Remove and return every queued message.
    pub fn drain(&self) -> Vec<MailMessage> {
        std::mem::take(&mut *self.messages.lock())
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

impl MailSink for Outbox {
    fn mail_admins(&self, subject: &str, message: &str) -> anyhow::Result<()> {
        self.messages.lock().push(MailMessage {
            subject: subject.to_string(),
            body: message.to_string(),
        });
        Ok(())
    }
}

/// Writes notifications to the log instead of sending them.
///
/// Used when no transport is configured.
#[derive(Debug, Clone)]
pub struct LogMailer {
    target: String,
}

impl LogMailer {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
        }
    }
}

impl Default for LogMailer {
    fn default() -> Self {
        Self::new("cspreports::mail")
    }
}

impl MailSink for LogMailer {
    fn mail_admins(&self, subject: &str, message: &str) -> anyhow::Result<()> {
        log::info!(target: self.target.as_str(), "MAIL_ADMINS subject={:?}\n{}", subject, message);
        Ok(())
    }
}
