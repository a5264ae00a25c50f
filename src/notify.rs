use std::sync::{Arc, Mutex};

use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Severity {
    Info,
    Success,
}

/// Short human-readable message for a major session transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

impl Notification {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity: Severity::Info,
        }
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity: Severity::Success,
        }
    }
}

/// Delivery of notifications belongs to the caller; the session only emits.
pub trait Notifier: Send {
    fn notify(&self, notification: &Notification);
}

/// Writes notifications to the trace log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, n: &Notification) {
        info!(severity = %n.severity, title = %n.title, "{}", n.message);
    }
}

/// Collects notifications in a shared queue for a renderer (or a test) to drain.
#[derive(Debug, Clone, Default)]
pub struct QueueNotifier {
    queue: Arc<Mutex<Vec<Notification>>>,
}

impl QueueNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything queued so far.
    pub fn drain(&self) -> Vec<Notification> {
        match self.queue.lock() {
            Ok(mut q) => std::mem::take(&mut *q),
            Err(_) => Vec::new(),
        }
    }

    pub fn titles(&self) -> Vec<String> {
        match self.queue.lock() {
            Ok(q) => q.iter().map(|n| n.title.clone()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Notifier for QueueNotifier {
    fn notify(&self, notification: &Notification) {
        if let Ok(mut q) = self.queue.lock() {
            q.push(notification.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_notifier_shares_queue_across_clones() {
        let notifier = QueueNotifier::new();
        let handle = notifier.clone();
        notifier.notify(&Notification::info("Step 2", "bend"));
        notifier.notify(&Notification::success("Done", "saved"));

        assert_eq!(handle.titles(), vec!["Step 2", "Done"]);
        let drained = handle.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].severity, Severity::Success);
        assert!(notifier.drain().is_empty());
    }
}
