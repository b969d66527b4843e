//! User-facing notifications, passed explicitly to whatever needs to report
//! the outcome of an action.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use console::style;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, kind: NoticeKind);
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub kind: NoticeKind,
    shown_at: Instant,
}

/// Transient toasts for the TUI. Old toasts expire after `ttl` and at most
/// `capacity` are kept.
pub struct ToastBoard {
    toasts: Mutex<VecDeque<Toast>>,
    ttl: Duration,
    capacity: usize,
}

impl ToastBoard {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            toasts: Mutex::new(VecDeque::new()),
            ttl,
            capacity,
        }
    }

    /// Toasts still on screen at `now`; expired ones are dropped.
    pub fn visible(&self, now: Instant) -> Vec<Toast> {
        let Ok(mut toasts) = self.toasts.lock() else {
            return Vec::new();
        };
        toasts.retain(|t| now.duration_since(t.shown_at) < self.ttl);
        toasts.iter().cloned().collect()
    }
}

impl Default for ToastBoard {
    fn default() -> Self {
        Self::new(Duration::from_secs(3), 3)
    }
}

impl Notifier for ToastBoard {
    fn notify(&self, message: &str, kind: NoticeKind) {
        match kind {
            NoticeKind::Error => tracing::warn!("{}", message),
            _ => tracing::debug!("{}", message),
        }
        if let Ok(mut toasts) = self.toasts.lock() {
            toasts.push_back(Toast {
                message: message.to_string(),
                kind,
                shown_at: Instant::now(),
            });
            while toasts.len() > self.capacity {
                toasts.pop_front();
            }
        }
    }
}

/// Prints to stderr for headless commands.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str, kind: NoticeKind) {
        match kind {
            NoticeKind::Success => eprintln!("{} {}", style("✓").green(), message),
            NoticeKind::Error => eprintln!("{} {}", style("✗").red(), message),
            NoticeKind::Info => eprintln!("{} {}", style("•").cyan(), message),
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    #[derive(Default)]
    pub struct RecordingNotifier {
        pub notices: Mutex<Vec<(String, NoticeKind)>>,
    }

    impl RecordingNotifier {
        pub fn messages(&self) -> Vec<(String, NoticeKind)> {
            self.notices.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, message: &str, kind: NoticeKind) {
            self.notices.lock().unwrap().push((message.to_string(), kind));
        }
    }
}
