//! User feedback surface
//!
//! Transfer phases report every outcome through a [`Notifier`]. They never
//! depend on what the notifier does with a message.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Severity of a user-facing message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Info,
    Success,
    Warning,
    Error,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Info => "info",
            Variant::Success => "success",
            Variant::Warning => "warning",
            Variant::Error => "error",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Displays messages to the user
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, variant: Variant);
}

/// Forwards messages to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, variant: Variant) {
        match variant {
            Variant::Info | Variant::Success => tracing::info!(%variant, "{}", message),
            Variant::Warning => tracing::warn!("{}", message),
            Variant::Error => tracing::error!("{}", message),
        }
    }
}

/// Prints messages to the terminal. Errors and warnings go to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str, variant: Variant) {
        match variant {
            Variant::Info | Variant::Success => println!("[{}] {}", variant, message),
            Variant::Warning | Variant::Error => eprintln!("[{}] {}", variant, message),
        }
    }
}

/// Keeps every message for later inspection
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(Variant, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(Variant, String)> {
        self.messages.lock().clone()
    }

    /// Messages of one variant, in order
    pub fn with_variant(&self, variant: Variant) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|(v, _)| *v == variant)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, variant: Variant) {
        tracing::debug!(%variant, "{}", message);
        self.messages.lock().push((variant, message.to_string()));
    }
}
