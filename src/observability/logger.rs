//! Structured JSON logger
//!
//! - One line per event, `event` first, `severity` second, then fields
//!   sorted by key
//! - Synchronous, no buffering
//! - ERROR and FATAL go to stderr, everything else to stdout
//! - `AEROWAL_LOG_LEVEL` (TRACE..FATAL) sets the minimum severity, INFO by
//!   default

use std::fmt;
use std::io::{self, Write};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Trace = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
    Fatal = 4,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Some(Severity::Trace),
            "INFO" => Some(Severity::Info),
            "WARN" => Some(Severity::Warn),
            "ERROR" => Some(Severity::Error),
            "FATAL" => Some(Severity::Fatal),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static MIN_SEVERITY: OnceLock<Severity> = OnceLock::new();

fn min_severity() -> Severity {
    *MIN_SEVERITY.get_or_init(|| {
        std::env::var("AEROWAL_LOG_LEVEL")
            .ok()
            .and_then(|v| Severity::parse(&v))
            .unwrap_or(Severity::Info)
    })
}

pub struct Logger;

impl Logger {
    pub fn enabled(severity: Severity) -> bool {
        severity >= min_severity()
    }

    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if !Self::enabled(severity) {
            return;
        }
        let line = Self::render(severity, event, fields);
        // a failed log write must never take the engine down
        if severity >= Severity::Error {
            let _ = io::stderr().lock().write_all(line.as_bytes());
        } else {
            let _ = io::stdout().lock().write_all(line.as_bytes());
        }
    }

    /// Format one log line, newline included.
    pub fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(128);
        out.push_str("{\"event\":");
        push_json_string(&mut out, event);
        out.push_str(",\"severity\":\"");
        out.push_str(severity.as_str());
        out.push('"');

        let mut sorted: Vec<&(&str, &str)> = fields.iter().collect();
        sorted.sort_by_key(|(k, _)| *k);
        for (key, value) in sorted {
            out.push(',');
            push_json_string(&mut out, key);
            out.push(':');
            push_json_string(&mut out, value);
        }
        out.push_str("}\n");
        out
    }

    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }

    pub fn fatal(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Fatal, event, fields);
    }
}

fn push_json_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_is_valid_json_with_event_first() {
        let line = Logger::render(
            Severity::Warn,
            "WAL_TORN_TAIL",
            &[("valid_bytes", "96"), ("file", "wal.log")],
        );
        assert!(line.starts_with("{\"event\":\"WAL_TORN_TAIL\",\"severity\":\"WARN\""));
        assert!(line.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["file"], "wal.log");
        assert_eq!(parsed["valid_bytes"], "96");
    }

    #[test]
    fn test_fields_sorted_by_key() {
        let line = Logger::render(Severity::Info, "E", &[("zeta", "1"), ("alpha", "2")]);
        assert!(line.find("alpha").unwrap() < line.find("zeta").unwrap());
    }

    #[test]
    fn test_special_characters_escaped() {
        let line = Logger::render(Severity::Error, "E", &[("reason", "bad \"tag\"\n\u{1}")]);
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["reason"], "bad \"tag\"\n\u{1}");
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("warn"), Some(Severity::Warn));
        assert_eq!(Severity::parse("verbose"), None);
        assert!(Severity::Trace < Severity::Fatal);
    }
}
