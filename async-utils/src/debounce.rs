use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::OrCancelExt;

type Sink<T> = Arc<dyn Fn(T) -> BoxFuture<'static, ()> + Send + Sync>;

/// Coalesces rapid successive values into a single delayed delivery.
///
/// Every [`push`](Self::push) replaces the pending value and restarts the
/// quiet window. When the window elapses without another push, the latest
/// value is handed to the sink exactly once. [`flush`](Self::flush) delivers
/// the pending value immediately, and dropping the debouncer flushes on the
/// ambient tokio runtime so the last edit is never lost.
///
/// `push` spawns the window timer, so it must be called from within a tokio
/// runtime.
pub struct Debouncer<T: Send + 'static> {
    window: Duration,
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    sink: Sink<T>,
}

struct Slot<T> {
    value: Option<T>,
    timer: Option<CancellationToken>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Send + 'static> Shared<T> {
    /// Take the pending value if `token` still owns the window.
    fn take_if_current(&self, token: &CancellationToken) -> Option<T> {
        let mut slot = lock(&self.slot);
        if token.is_cancelled() {
            return None;
        }
        slot.timer = None;
        slot.value.take()
    }

    fn take_now(&self) -> Option<T> {
        let mut slot = lock(&self.slot);
        if let Some(timer) = slot.timer.take() {
            timer.cancel();
        }
        slot.value.take()
    }
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new<F, Fut>(window: Duration, sink: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let sink: Sink<T> = Arc::new(move |value| sink(value).boxed());
        Self {
            window,
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    value: None,
                    timer: None,
                }),
                sink,
            }),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Replace the pending value and restart the quiet window.
    pub fn push(&self, value: T) {
        let token = CancellationToken::new();
        {
            let mut slot = lock(&self.shared.slot);
            slot.value = Some(value);
            if let Some(previous) = slot.timer.replace(token.clone()) {
                previous.cancel();
            }
        }

        let shared = Arc::clone(&self.shared);
        let window = self.window;
        tokio::spawn(async move {
            if tokio::time::sleep(window).or_cancel(&token).await.is_err() {
                return;
            }
            if let Some(value) = shared.take_if_current(&token) {
                (shared.sink)(value).await;
            }
        });
    }

    /// Deliver the pending value now. Returns whether anything was delivered.
    pub async fn flush(&self) -> bool {
        match self.shared.take_now() {
            Some(value) => {
                (self.shared.sink)(value).await;
                true
            }
            None => false,
        }
    }

    pub fn has_pending(&self) -> bool {
        lock(&self.shared.slot).value.is_some()
    }

    /// Cancel the window and discard the pending value.
    pub fn cancel(&self) -> bool {
        self.shared.take_now().is_some()
    }
}

impl<T: Clone + Send + 'static> Debouncer<T> {
    pub fn pending(&self) -> Option<T> {
        lock(&self.shared.slot).value.clone()
    }
}

impl<T: Send + 'static> Drop for Debouncer<T> {
    fn drop(&mut self) {
        let Some(value) = self.shared.take_now() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let sink = Arc::clone(&self.shared.sink);
                handle.spawn(async move { sink(value).await });
            }
            Err(_) => {
                tracing::warn!("debouncer dropped outside a tokio runtime; pending value lost");
            }
        }
    }
}
