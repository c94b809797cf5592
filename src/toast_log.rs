use chrono::Local;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const TOAST_LOG_FILE: &str = "toast.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NotificationLevel::Info => "info",
            NotificationLevel::Success => "success",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
        };
        f.write_str(label)
    }
}

/// Fire-and-forget user feedback.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, level: NotificationLevel);
}

pub fn append_toast_log(path: &Path, msg: &str) {
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(file, "{} - {}", Local::now().to_rfc3339(), msg);
    }
}

/// Appends every notification to a log file and mirrors it to `tracing`.
#[derive(Debug, Clone)]
pub struct ToastLog {
    path: PathBuf,
}

impl Default for ToastLog {
    fn default() -> Self {
        Self::new(TOAST_LOG_FILE)
    }
}

impl ToastLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Notifier for ToastLog {
    fn notify(&self, message: &str, level: NotificationLevel) {
        match level {
            NotificationLevel::Error => tracing::error!(toast = %message),
            NotificationLevel::Warning => tracing::warn!(toast = %message),
            _ => tracing::info!(toast = %message),
        }
        append_toast_log(&self.path, &format!("[{level}] {message}"));
    }
}

/// Keeps notifications in memory until the host drains them for display.
#[derive(Debug, Default)]
pub struct ToastQueue {
    pending: Mutex<Vec<(NotificationLevel, String)>>,
}

impl ToastQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<(NotificationLevel, String)> {
        self.pending
            .lock()
            .map(|mut pending| std::mem::take(&mut *pending))
            .unwrap_or_default()
    }
}

impl Notifier for ToastQueue {
    fn notify(&self, message: &str, level: NotificationLevel) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.push((level, message.to_string()));
        }
    }
}
