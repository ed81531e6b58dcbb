// SPDX-License-Identifier: Apache-2.0
//! Thread-safe stdout sink: accepts only string `in`, `out` unsupported.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use pathspace_core::{Context, Error, InsertReturn, Layer, LayerValue, Out, OutSlot};

/// A mountable sink that writes every inserted string to stdout.
pub struct StdOutSink {
    prefix: Option<String>,
    newline: bool,
    lock: Mutex<()>,
}

impl StdOutSink {
    /// Creates a sink with no line prefix and a trailing newline after
    /// every write.
    #[must_use]
    pub fn new() -> Self {
        Self { prefix: None, newline: true, lock: Mutex::new(()) }
    }

    /// Sets a string prepended to every write.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Controls whether a trailing newline follows each write.
    #[must_use]
    pub fn with_newline(mut self, newline: bool) -> Self {
        self.newline = newline;
        self
    }
}

impl Default for StdOutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Layer for StdOutSink {
    fn insert(&self, tail: &str, value: LayerValue) -> InsertReturn {
        let mut result = InsertReturn::new();
        match value.into_any().downcast::<String>() {
            Ok(text) => {
                let _guard = self.lock.lock();
                let mut stdout = std::io::stdout().lock();
                let write_result = match (&self.prefix, self.newline) {
                    (Some(prefix), true) => writeln!(stdout, "{prefix}{text}"),
                    (Some(prefix), false) => write!(stdout, "{prefix}{text}"),
                    (None, true) => writeln!(stdout, "{text}"),
                    (None, false) => write!(stdout, "{text}"),
                };
                match write_result {
                    Ok(()) => result.nbr_values_inserted = 1,
                    Err(err) => result.errors.push((tail.to_string(), Error::UnknownError(err.to_string()))),
                }
            }
            Err(_) => result.errors.push((
                tail.to_string(),
                Error::TypeMismatch { expected: "String", found: "other" },
            )),
        }
        result
    }

    fn out(&self, tail: &str, _options: &Out, _slot: &mut OutSlot<'_>) -> Option<Error> {
        Some(Error::InvalidPermissions(format!("stdout sink does not support out at {tail}")))
    }

    fn shutdown(&self) {
        tracing::info!("stdout sink shut down");
    }

    fn adopt_context_and_prefix(&self, _context: Arc<Context>, _prefix: String) {}
}
