//! Terminal UI implementations
//!
//! Builds share one UI sink; a spinner shows liveness while build output
//! scrolls past it, and an optional wrapper prefixes every line with an
//! RFC3339 timestamp.

use std::io::BufRead;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use ironcast_core::error::CoreError;
use ironcast_core::ui::Ui;

/// UI printing through an indicatif spinner so concurrent build output
/// does not tear the status line
pub struct SpinnerUi {
    spinner: ProgressBar,
    input: Mutex<Box<dyn BufRead + Send>>,
}

impl SpinnerUi {
    pub fn new(message: &str) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("valid template"),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(120));

        Self {
            spinner,
            input: Mutex::new(Box::new(std::io::BufReader::new(std::io::stdin()))),
        }
    }

    pub fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl Ui for SpinnerUi {
    fn say(&self, message: &str) {
        self.spinner.println(message);
    }

    fn message(&self, message: &str) {
        self.spinner.println(format!("    {message}"));
    }

    fn error(&self, message: &str) {
        self.spinner.println(message);
    }

    fn ask(&self, query: &str) -> ironcast_core::Result<String> {
        self.spinner.suspend(|| {
            println!("{query}");
            let mut line = String::new();
            self.input
                .lock()
                .unwrap()
                .read_line(&mut line)
                .map_err(|e| CoreError::Io(e.to_string()))?;
            Ok(line.trim().to_string())
        })
    }
}

/// Wrapper prefixing each UI line with an RFC3339 timestamp
pub struct TimestampUi {
    inner: Arc<dyn Ui>,
}

impl TimestampUi {
    pub fn new(inner: Arc<dyn Ui>) -> Self {
        Self { inner }
    }

    fn stamp(message: &str) -> String {
        format!(
            "{}: {message}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

impl Ui for TimestampUi {
    fn say(&self, message: &str) {
        self.inner.say(&Self::stamp(message));
    }

    fn message(&self, message: &str) {
        self.inner.message(&Self::stamp(message));
    }

    fn error(&self, message: &str) {
        self.inner.error(&Self::stamp(message));
    }

    fn ask(&self, query: &str) -> ironcast_core::Result<String> {
        self.inner.ask(query)
    }
}
