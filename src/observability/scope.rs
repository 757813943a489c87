//! Begin/complete bracketing for multi-step operations
//!
//! `{NAME}_BEGIN` is logged on creation, `{NAME}_COMPLETE` (with
//! `elapsed_ms`) on [`complete`](ObservationScope::complete), `{NAME}_FAILED`
//! on [`fail`](ObservationScope::fail) and `{NAME}_INCOMPLETE` if the scope
//! is dropped without either.

use std::time::Instant;

use super::logger::{Logger, Severity};

pub struct ObservationScope<'a> {
    name: &'a str,
    fields: Vec<(&'a str, String)>,
    started: Instant,
    finished: bool,
}

impl<'a> ObservationScope<'a> {
    pub fn new(name: &'a str) -> Self {
        Self::with_fields(name, &[])
    }

    /// Fields given here are repeated on the closing event.
    pub fn with_fields(name: &'a str, fields: &[(&'a str, &str)]) -> Self {
        Logger::info(&format!("{}_BEGIN", name), fields);
        Self {
            name,
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            started: Instant::now(),
            finished: false,
        }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    fn close(mut self, severity: Severity, suffix: &str, extra: &[(&str, &str)]) {
        self.finished = true;
        let elapsed = self.elapsed_ms().to_string();
        let mut fields: Vec<(&str, &str)> =
            self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        fields.extend_from_slice(extra);
        fields.push(("elapsed_ms", &elapsed));
        Logger::log(severity, &format!("{}_{}", self.name, suffix), &fields);
    }

    pub fn complete(self) {
        self.close(Severity::Info, "COMPLETE", &[]);
    }

    pub fn complete_with_fields(self, extra: &[(&str, &str)]) {
        self.close(Severity::Info, "COMPLETE", extra);
    }

    pub fn fail(self, reason: &str) {
        self.close(Severity::Error, "FAILED", &[("reason", reason)]);
    }

    pub fn fail_fatal(self, reason: &str) {
        self.close(Severity::Fatal, "FAILED", &[("reason", reason)]);
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            Logger::warn(
                &format!("{}_INCOMPLETE", self.name),
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}
