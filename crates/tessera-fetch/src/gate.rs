//! FIFO rate gate shared by every request path in the process.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tessera_types::{PlanTier, min_interval_ms};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Serializes outbound requests and spaces their dispatch.
///
/// Callers are released strictly in the order they called [`acquire`], and
/// two consecutive releases are never closer than the configured minimum
/// interval. Cloning the gate yields another handle to the same queue, so one
/// gate can be shared by any number of clients hitting the same quota.
///
/// Waiting is driven by a single dispatch task that is spawned on demand when
/// the first caller queues up and exits once the queue drains. If that task is
/// dropped early, for example because its runtime shut down, the next caller
/// to queue up spawns a replacement.
///
/// [`acquire`]: RateLimitGate::acquire
#[derive(Debug, Clone)]
pub struct RateLimitGate {
    inner: Arc<GateInner>,
}

#[derive(Debug)]
struct GateInner {
    min_interval: Duration,
    disabled: AtomicBool,
    state: Mutex<GateState>,
}

#[derive(Debug, Default)]
struct GateState {
    /// Pending acquirers, in arrival order.
    waiters: VecDeque<oneshot::Sender<()>>,
    /// When the last caller was released.
    last_dispatch: Option<Instant>,
    /// Whether a dispatch task is currently running.
    dispatching: bool,
}

impl RateLimitGate {
    /// Creates a gate for a requests-per-minute budget.
    ///
    /// The minimum interval is `ceil((60_000 / requests_per_minute) * 1.1)` ms.
    #[must_use]
    pub fn new(requests_per_minute: u32) -> Self {
        Self::with_interval(Duration::from_millis(min_interval_ms(requests_per_minute)))
    }

    /// Creates a gate for a plan tier.
    #[must_use]
    pub fn for_plan(plan: PlanTier) -> Self {
        Self::with_interval(plan.min_interval())
    }

    /// Creates a gate with an explicit minimum interval between dispatches.
    #[must_use]
    pub fn with_interval(min_interval: Duration) -> Self {
        Self {
            inner: Arc::new(GateInner {
                min_interval,
                disabled: AtomicBool::new(false),
                state: Mutex::new(GateState::default()),
            }),
        }
    }

    /// Returns the minimum interval between two dispatches.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.inner.min_interval
    }

    /// Waits for this caller's turn to dispatch a request.
    ///
    /// The caller's place in the queue is taken when `acquire` is called, not
    /// when the returned future is first polled. Dropping the future gives up
    /// the place without blocking the callers behind it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn acquire(&self) -> impl Future<Output = ()> + Send + 'static {
        let ticket = self.enqueue();
        async move {
            if let Some(rx) = ticket {
                // A dropped sender means the gate was reset; the caller is released.
                let _ = rx.await;
            }
        }
    }

    /// Makes every `acquire` resolve immediately until [`enable`](Self::enable) is called.
    pub fn disable(&self) {
        self.inner.disabled.store(true, Ordering::SeqCst);
    }

    /// Restores request spacing after [`disable`](Self::disable).
    pub fn enable(&self) {
        self.inner.disabled.store(false, Ordering::SeqCst);
    }

    /// Returns true if spacing is bypassed.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.inner.disabled.load(Ordering::SeqCst)
    }

    /// Returns the number of callers waiting for their turn.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.lock().waiters.len()
    }

    /// Clears the queue and the last-dispatch bookkeeping.
    ///
    /// Intended for scope boundaries with no in-flight acquirers. Any caller
    /// still queued is released immediately rather than left hanging.
    pub fn reset(&self) {
        let mut state = self.inner.lock();
        let pending = state.waiters.len();
        state.waiters.clear();
        state.last_dispatch = None;
        drop(state);

        if pending > 0 {
            warn!(pending, "rate gate reset with queued acquirers; releasing them");
        }
    }

    fn enqueue(&self) -> Option<oneshot::Receiver<()>> {
        if self.is_disabled() {
            return None;
        }

        let (tx, rx) = oneshot::channel();
        let start_dispatcher = {
            let mut state = self.inner.lock();
            state.waiters.push_back(tx);
            !std::mem::replace(&mut state.dispatching, true)
        };

        if start_dispatcher {
            tokio::spawn(dispatch(Arc::clone(&self.inner)));
        }

        Some(rx)
    }
}

impl GateInner {
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the `dispatching` flag if the dispatch task is dropped mid-loop.
struct DispatchGuard {
    inner: Arc<GateInner>,
    drained: bool,
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        if !self.drained {
            debug!("rate gate dispatcher dropped before the queue drained");
            self.inner.lock().dispatching = false;
        }
    }
}

/// Releases queued callers one at a time until the queue is empty.
async fn dispatch(inner: Arc<GateInner>) {
    let mut guard = DispatchGuard {
        inner,
        drained: false,
    };

    loop {
        let inner = &guard.inner;
        let (waiter, last_dispatch) = {
            let mut state = inner.lock();
            match state.waiters.pop_front() {
                Some(waiter) => (waiter, state.last_dispatch),
                None => {
                    // Any caller queued after this spawns a fresh task.
                    state.dispatching = false;
                    drop(state);
                    guard.drained = true;
                    return;
                }
            }
        };

        if let Some(last) = last_dispatch
            && !inner.disabled.load(Ordering::SeqCst)
        {
            let ready_at = last + inner.min_interval;
            let now = Instant::now();
            if now < ready_at {
                debug!(wait = ?(ready_at - now), "rate gate delaying dispatch");
                tokio::time::sleep_until(ready_at).await;
            }
        }

        let now = Instant::now();
        if waiter.send(()).is_ok() {
            inner.lock().last_dispatch = Some(now);
        } else {
            trace!("rate gate waiter dropped before release");
        }
    }
}
