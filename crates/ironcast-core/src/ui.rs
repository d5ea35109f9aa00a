//! User interface abstraction
//!
//! Builds running in parallel share one UI sink; writes are serialized
//! behind a lock. The `ask` operation blocks until the operator answers and
//! backs both the debug pause and the `ask` failure policy.

use std::io::{BufRead, Write};
use std::sync::Mutex;

use crate::error::{CoreError, Result};

/// Output and prompt surface handed to builders and provisioners
pub trait Ui: Send + Sync {
    /// Print a top-level progress message
    fn say(&self, message: &str);

    /// Print a secondary, indented message
    fn message(&self, message: &str);

    /// Print an error message
    fn error(&self, message: &str);

    /// Prompt the operator and block until a line is read
    fn ask(&self, query: &str) -> Result<String>;
}

/// UI writing to arbitrary output/error sinks with serialized access
pub struct BasicUi {
    out: Mutex<Box<dyn Write + Send>>,
    err: Mutex<Box<dyn Write + Send>>,
    input: Mutex<Box<dyn BufRead + Send>>,
}

impl BasicUi {
    pub fn new(
        out: impl Write + Send + 'static,
        err: impl Write + Send + 'static,
        input: impl BufRead + Send + 'static,
    ) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
            err: Mutex::new(Box::new(err)),
            input: Mutex::new(Box::new(input)),
        }
    }

    /// UI over the process's stdio
    pub fn stdio() -> Self {
        Self::new(
            std::io::stdout(),
            std::io::stderr(),
            std::io::BufReader::new(std::io::stdin()),
        )
    }
}

impl Ui for BasicUi {
    fn say(&self, message: &str) {
        let mut out = self.out.lock().unwrap();
        let _ = writeln!(out, "{message}");
        let _ = out.flush();
    }

    fn message(&self, message: &str) {
        let mut out = self.out.lock().unwrap();
        let _ = writeln!(out, "    {message}");
        let _ = out.flush();
    }

    fn error(&self, message: &str) {
        let mut err = self.err.lock().unwrap();
        let _ = writeln!(err, "{message}");
        let _ = err.flush();
    }

    fn ask(&self, query: &str) -> Result<String> {
        self.say(query);
        let mut line = String::new();
        self.input
            .lock()
            .unwrap()
            .read_line(&mut line)
            .map_err(|e| CoreError::Io(e.to_string()))?;
        Ok(line.trim().to_string())
    }
}

/// UI that swallows all output; used by tests and machine-readable modes
#[derive(Default)]
pub struct NoopUi;

impl Ui for NoopUi {
    fn say(&self, _message: &str) {}
    fn message(&self, _message: &str) {}
    fn error(&self, _message: &str) {}

    fn ask(&self, _query: &str) -> Result<String> {
        Ok(String::new())
    }
}
