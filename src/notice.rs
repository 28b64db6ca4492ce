//! Error reporting shared by every controller.

use std::sync::{Arc, Mutex};

use tracing::{error, warn};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Severity {
    /// Retryable; the screen keeps its previous state.
    Transient,
    /// The screen cannot continue and should navigate away.
    Fatal,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Transient => "transient",
            Severity::Fatal => "fatal",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

impl Notice {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Transient,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Fatal,
            message: message.into(),
        }
    }
}

pub trait ErrorReporter: Send + Sync {
    fn report(&self, notice: Notice);
}

/// Forwards notices to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, notice: Notice) {
        match notice.severity {
            Severity::Transient => warn!(message = %notice.message, "transient error"),
            Severity::Fatal => error!(message = %notice.message, "screen error"),
        }
    }
}

/// Collects notices so the presentation layer can render them, and logs them
/// as they arrive.
#[derive(Debug, Default, Clone)]
pub struct NoticeBoard {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Notice> {
        match self.notices.lock() {
            Ok(mut notices) => std::mem::take(&mut *notices),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn snapshot(&self) -> Vec<Notice> {
        match self.notices.lock() {
            Ok(notices) => notices.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

impl ErrorReporter for NoticeBoard {
    fn report(&self, notice: Notice) {
        TracingReporter.report(notice.clone());
        match self.notices.lock() {
            Ok(mut notices) => notices.push(notice),
            Err(poisoned) => poisoned.into_inner().push(notice),
        }
    }
}
