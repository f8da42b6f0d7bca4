//! Message sinks and JSON summary reports

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use crate::continuity::ContinuityStats;
use crate::psi::Pat;

/// Message severity. Declaration order goes from most to least severe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Fatal,
    Severe,
    Error,
    Warning,
    #[default]
    Info,
    Verbose,
    Debug,
}

impl Severity {
    pub fn name(self) -> &'static str {
        match self {
            Severity::Fatal => "FATAL",
            Severity::Severe => "SEVERE",
            Severity::Error => "Error",
            Severity::Warning => "Warning",
            Severity::Info => "Info",
            Severity::Verbose => "Verbose",
            Severity::Debug => "Debug",
        }
    }
}

impl From<Severity> for log::Level {
    fn from(s: Severity) -> Self {
        match s {
            Severity::Fatal | Severity::Severe | Severity::Error => log::Level::Error,
            Severity::Warning => log::Level::Warn,
            Severity::Info => log::Level::Info,
            Severity::Verbose => log::Level::Debug,
            Severity::Debug => log::Level::Trace,
        }
    }
}

/// Destination of diagnostic messages.
pub trait Report {
    /// Deliver one message. Messages above [`Report::max_severity`] are dropped by the caller.
    fn report(&self, severity: Severity, msg: &str);

    /// Least severe level still delivered.
    fn max_severity(&self) -> Severity {
        Severity::Debug
    }

    fn enabled(&self, severity: Severity) -> bool {
        severity <= self.max_severity()
    }

    fn log(&self, severity: Severity, msg: &str) {
        if self.enabled(severity) {
            self.report(severity, msg);
        }
    }
}

/// Drops every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReport;

impl Report for NullReport {
    fn report(&self, _severity: Severity, _msg: &str) {}

    fn max_severity(&self) -> Severity {
        Severity::Fatal
    }

    fn enabled(&self, _severity: Severity) -> bool {
        false
    }
}

/// Forwards messages to the `log` facade.
#[derive(Debug, Clone)]
pub struct LogReport {
    pub target: &'static str,
}

impl Default for LogReport {
    fn default() -> Self {
        Self { target: "mpegts_core" }
    }
}

impl Report for LogReport {
    fn report(&self, severity: Severity, msg: &str) {
        log::log!(target: self.target, log::Level::from(severity), "{msg}");
    }
}

/// Keeps messages in memory.
#[derive(Debug, Default)]
pub struct CollectReport {
    pub max: Option<Severity>,
    messages: RefCell<Vec<(Severity, String)>>,
}

impl CollectReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(Severity, String)> {
        self.messages.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.messages.borrow_mut().clear();
    }
}

impl Report for CollectReport {
    fn report(&self, severity: Severity, msg: &str) {
        self.messages.borrow_mut().push((severity, msg.to_string()));
    }

    fn max_severity(&self) -> Severity {
        self.max.unwrap_or(Severity::Debug)
    }
}

impl<R: Report + ?Sized> Report for std::rc::Rc<R> {
    fn report(&self, severity: Severity, msg: &str) {
        (**self).report(severity, msg)
    }

    fn max_severity(&self) -> Severity {
        (**self).max_severity()
    }
}

/// JSON structure for the continuity summary
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub ts_time: String,
    pub continuity: ContinuityStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pat: Option<Pat>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
}

impl Summary {
    pub fn new(continuity: ContinuityStats, pat: Option<Pat>) -> Self {
        Self {
            ts_time: chrono::Utc::now().to_rfc3339(),
            continuity,
            pat,
            messages: Vec::new(),
        }
    }

    /// Pretty-printed JSON for CLI output
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self)
            .unwrap_or_else(|_| "{\"error\": \"JSON serialization failed\"}".to_string())
    }
}
