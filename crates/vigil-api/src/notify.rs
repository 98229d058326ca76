//! User-visible signals for failed requests
//!
//! Server-class failures become persistent notifications, everything else a
//! transient message. Every reported failure is also kept in a bounded
//! in-memory error log.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::classify::ClassifiedError;
use crate::request::ApiRequest;

const ERROR_LOG_CAPACITY: usize = 100;
const NOTIFICATION_DURATION: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Transient inline message
    Message { severity: Severity, text: String },
    /// Persistent notification that stays up for `duration`
    Notification {
        severity: Severity,
        title: String,
        text: String,
        duration: Duration,
    },
    /// Navigate to `target`
    Redirect { target: String },
}

impl Signal {
    /// Signal for a classified failure other than an expired session
    pub fn for_failure(classified: &ClassifiedError) -> Self {
        let severity = classified.severity();
        let text = classified.user_message();

        if !classified.is_server_class() {
            return Signal::Message { severity, text };
        }

        let title = match classified {
            ClassifiedError::Network { .. } => "Network error",
            ClassifiedError::Legacy { status: 503, .. } => "Service unavailable",
            _ => "Server error",
        };

        Signal::Notification {
            severity,
            title: title.to_string(),
            text,
            duration: NOTIFICATION_DURATION,
        }
    }
}

pub trait SignalSink: Send + Sync {
    fn emit(&self, signal: Signal);
}

/// Default sink: signals only reach the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl SignalSink for TracingSink {
    fn emit(&self, signal: Signal) {
        match signal {
            Signal::Message { severity, text } => {
                tracing::info!(severity = %severity, "{}", text);
            }
            Signal::Notification {
                severity,
                title,
                text,
                ..
            } => {
                tracing::warn!(severity = %severity, title = %title, "{}", text);
            }
            Signal::Redirect { target } => {
                tracing::info!(route = %target, "Redirect requested");
            }
        }
    }
}

/// Collects signals for callers without an interactive surface
#[derive(Debug, Default)]
pub struct BufferedSink {
    signals: Mutex<Vec<Signal>>,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.signals.lock().clone()
    }

    pub fn take(&self) -> Vec<Signal> {
        std::mem::take(&mut *self.signals.lock())
    }

    pub fn redirects(&self) -> Vec<String> {
        self.signals
            .lock()
            .iter()
            .filter_map(|signal| match signal {
                Signal::Redirect { target } => Some(target.clone()),
                _ => None,
            })
            .collect()
    }
}

impl SignalSink for BufferedSink {
    fn emit(&self, signal: Signal) {
        self.signals.lock().push(signal);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
    pub context: Value,
}

/// Ring buffer of the most recent reported failures
#[derive(Debug)]
pub struct ErrorLog {
    records: VecDeque<ErrorRecord>,
    capacity: usize,
}

impl ErrorLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(ERROR_LOG_CAPACITY)),
            capacity,
        }
    }

    pub fn push(&mut self, severity: Severity, message: String, context: Value) {
        if self.capacity == 0 {
            return;
        }
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(ErrorRecord {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            severity,
            message,
            context,
        });
    }

    pub fn records(&self) -> Vec<ErrorRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new(ERROR_LOG_CAPACITY)
    }
}

/// Maps classified failures to signals and records them
pub struct NotificationDispatcher {
    sink: Arc<dyn SignalSink>,
    log: Arc<Mutex<ErrorLog>>,
}

impl NotificationDispatcher {
    pub fn new(sink: Arc<dyn SignalSink>) -> Self {
        Self {
            sink,
            log: Arc::new(Mutex::new(ErrorLog::default())),
        }
    }

    /// Record a failure and emit its signal
    pub fn report(&self, request: &ApiRequest, classified: &ClassifiedError) {
        self.record(request, classified);
        self.sink.emit(Signal::for_failure(classified));
    }

    /// Record a failure without emitting anything
    pub fn record(&self, request: &ApiRequest, classified: &ClassifiedError) {
        let context = serde_json::json!({
            "method": request.method.as_str(),
            "path": request.path,
            "status": classified.status(),
            "code": classified.code().map(|c| c.as_str().to_string()),
        });

        self.log
            .lock()
            .push(classified.severity(), classified.user_message(), context);
    }

    /// The server rejected the credential of a live session
    pub fn session_expired(&self, login_route: &str) {
        self.sink.emit(Signal::Message {
            severity: Severity::Error,
            text: "Session expired, please sign in again".to_string(),
        });
        self.sink.emit(Signal::Redirect {
            target: login_route.to_string(),
        });
    }

    pub fn emit(&self, signal: Signal) {
        self.sink.emit(signal);
    }

    pub fn error_log(&self) -> Vec<ErrorRecord> {
        self.log.lock().records()
    }

    pub fn clear_error_log(&self) {
        self.log.lock().clear();
    }
}

impl Clone for NotificationDispatcher {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            log: Arc::clone(&self.log),
        }
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}
