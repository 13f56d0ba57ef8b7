//! Toast notifications: an ordered queue of short messages that dismiss
//! themselves after a fixed delay.
//!
//! Each toast owns a spawned timer task. Manual removal aborts that task;
//! removal of an id that is already gone is a no-op.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::task::AbortHandle;

use crate::config::TOAST_DISMISS_AFTER;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ToastKind {
    Success,
    Error,
    Warning,
    #[default]
    Info,
}

impl ToastKind {
    /// Lowercase name used when printing.
    pub fn label(&self) -> &str {
        match self {
            ToastKind::Success => "success",
            ToastKind::Error => "error",
            ToastKind::Warning => "warning",
            ToastKind::Info => "info",
        }
    }
}

/// Millisecond timestamp plus a random component. Unique in practice, not
/// guaranteed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToastId {
    millis: u64,
    nonce: u32,
}

impl ToastId {
    fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            millis,
            nonce: rand::random(),
        }
    }
}

impl fmt::Display for ToastId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:08x}", self.millis, self.nonce)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: ToastId,
    pub message: String,
    pub kind: ToastKind,
}

#[derive(Default)]
struct ToastQueue {
    toasts: Vec<Toast>,
    timers: HashMap<ToastId, AbortHandle>,
}

impl ToastQueue {
    fn remove(&mut self, id: ToastId) -> Option<AbortHandle> {
        if let Some(index) = self.toasts.iter().position(|t| t.id == id) {
            self.toasts.remove(index);
        }
        self.timers.remove(&id)
    }
}

impl Drop for ToastQueue {
    fn drop(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
    }
}

/// Cloneable handle to a shared toast queue.
///
/// `add_toast` spawns onto the current Tokio runtime and must be called
/// from within one.
#[derive(Clone)]
pub struct ToastStore {
    inner: Arc<Mutex<ToastQueue>>,
    dismiss_after: Duration,
}

impl ToastStore {
    /// Empty queue with the default dismiss delay.
    pub fn new() -> Self {
        Self::with_dismiss_after(TOAST_DISMISS_AFTER)
    }

    /// Empty queue whose toasts expire after `dismiss_after`.
    pub fn with_dismiss_after(dismiss_after: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ToastQueue::default())),
            dismiss_after,
        }
    }

    /// Append a toast and schedule its dismissal. Returns immediately.
    pub fn add_toast(&self, message: impl Into<String>, kind: ToastKind) -> ToastId {
        let id = ToastId::generate();
        let mut queue = lock(&self.inner);
        queue.toasts.push(Toast {
            id,
            message: message.into(),
            kind,
        });

        let weak = Arc::downgrade(&self.inner);
        let delay = self.dismiss_after;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            expire(&weak, id);
        });
        queue.timers.insert(id, timer.abort_handle());
        id
    }

    /// Remove a toast and cancel its timer. No-op if it is already gone.
    pub fn remove_toast(&self, id: ToastId) {
        if let Some(timer) = lock(&self.inner).remove(id) {
            timer.abort();
        }
    }

    pub fn success(&self, message: impl Into<String>) -> ToastId {
        self.add_toast(message, ToastKind::Success)
    }

    pub fn error(&self, message: impl Into<String>) -> ToastId {
        self.add_toast(message, ToastKind::Error)
    }

    pub fn warning(&self, message: impl Into<String>) -> ToastId {
        self.add_toast(message, ToastKind::Warning)
    }

    pub fn info(&self, message: impl Into<String>) -> ToastId {
        self.add_toast(message, ToastKind::Info)
    }

    /// Snapshot in insertion order.
    pub fn toasts(&self) -> Vec<Toast> {
        lock(&self.inner).toasts.clone()
    }

    /// Number of queued toasts.
    pub fn len(&self) -> usize {
        lock(&self.inner).toasts.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner).toasts.is_empty()
    }

    /// Take every queued toast, cancelling their timers.
    pub fn drain(&self) -> Vec<Toast> {
        let mut queue = lock(&self.inner);
        for (_, timer) in queue.timers.drain() {
            timer.abort();
        }
        std::mem::take(&mut queue.toasts)
    }
}

impl Default for ToastStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer callback. The store may already be gone or the toast removed.
fn expire(inner: &Weak<Mutex<ToastQueue>>, id: ToastId) {
    if let Some(inner) = inner.upgrade() {
        lock(&inner).remove(id);
    }
}

fn lock(inner: &Mutex<ToastQueue>) -> MutexGuard<'_, ToastQueue> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}
