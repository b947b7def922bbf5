//! Table of writes that have been submitted and not yet completed.
//!
//! Every entry is removed exactly once, by whichever of response, deadline,
//! teardown or cancellation reaches it first. All mutations go through one
//! mutex and callbacks are only invoked after it has been released.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use log::{debug, warn};
use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{sleep_until, Instant},
};

use crate::{
    callback::{complete, WriteCallback},
    error::WriteError,
};

/// Identifies one submitted write. Ids increase monotonically and are never
/// reused within a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct PendingWrite {
    callback: Box<dyn WriteCallback>,
    issued_at: Instant,
    deadline: Instant,
    cancelled: bool,
    timer: Option<JoinHandle<()>>,
}

impl PendingWrite {
    fn finish(mut self, id: CorrelationId, result: Result<(), WriteError>) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        if self.cancelled {
            debug!("Write {id} was cancelled, dropping its outcome {result:?}");
            return;
        }
        debug!(
            "Write {id} completed after {:?}: {result:?}",
            self.issued_at.elapsed()
        );
        complete(self.callback, result);
    }
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    entries: HashMap<CorrelationId, PendingWrite>,
}

#[derive(Clone, Default)]
pub struct PendingTable {
    inner: Arc<Mutex<Inner>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `callback` and arm a timer failing it with
    /// [`WriteError::Timeout`] once `deadline` has passed.
    pub fn register(&self, callback: Box<dyn WriteCallback>, deadline: Duration) -> CorrelationId {
        let issued_at = Instant::now();
        let deadline = issued_at + deadline;

        let mut inner = self.lock();
        inner.next_id += 1;
        let id = CorrelationId(inner.next_id);
        let timer = self.spawn_timer(id, deadline);
        inner.entries.insert(
            id,
            PendingWrite {
                callback,
                issued_at,
                deadline,
                cancelled: false,
                timer,
            },
        );
        id
    }

    fn spawn_timer(&self, id: CorrelationId, deadline: Instant) -> Option<JoinHandle<()>> {
        let Ok(handle) = Handle::try_current() else {
            warn!("No runtime to arm the deadline of write {id}");
            return None;
        };
        // The timer must not keep a torn down table alive
        let table = Arc::downgrade(&self.inner);
        Some(handle.spawn(async move {
            sleep_until(deadline).await;
            if let Some(inner) = table.upgrade() {
                PendingTable { inner }.expire(id);
            }
        }))
    }

    /// Complete a write with `result`. Returns `false` when the write is no
    /// longer pending, in which case nothing is invoked.
    pub fn resolve(&self, id: CorrelationId, result: Result<(), WriteError>) -> bool {
        let entry = self.lock().entries.remove(&id);
        match entry {
            Some(entry) => {
                entry.finish(id, result);
                true
            }
            None => {
                debug!("No pending write {id}, discarding {result:?}");
                false
            }
        }
    }

    /// Fail a write with [`WriteError::Timeout`].
    pub fn expire(&self, id: CorrelationId) -> bool {
        let entry = self.lock().entries.remove(&id);
        match entry {
            Some(mut entry) => {
                // Detach rather than abort, this may be the timer itself
                entry.timer = None;
                entry.finish(id, Err(WriteError::Timeout));
                true
            }
            None => false,
        }
    }

    /// Suppress the callback of a write. The entry stays until it completes
    /// or expires.
    pub fn cancel(&self, id: CorrelationId) -> bool {
        match self.lock().entries.get_mut(&id) {
            Some(entry) => {
                entry.cancelled = true;
                true
            }
            None => false,
        }
    }

    /// Remove every pending write and fail each with `reason`, in submission
    /// order.
    pub fn drain(&self, reason: WriteError) -> usize {
        let mut entries: Vec<_> = self.lock().entries.drain().collect();
        entries.sort_unstable_by_key(|(id, _)| *id);
        let count = entries.len();
        for (id, entry) in entries {
            entry.finish(id, Err(reason.clone()));
        }
        count
    }

    pub fn contains(&self, id: CorrelationId) -> bool {
        self.lock().entries.contains_key(&id)
    }

    pub fn is_cancelled(&self, id: CorrelationId) -> bool {
        self.lock()
            .entries
            .get(&id)
            .map(|entry| entry.cancelled)
            .unwrap_or_default()
    }

    pub fn deadline(&self, id: CorrelationId) -> Option<Instant> {
        self.lock().entries.get(&id).map(|entry| entry.deadline)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}

impl fmt::Debug for PendingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTable")
            .field("pending", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::callback::{completion, from_fn};

    fn counting(counter: &Arc<AtomicUsize>) -> Box<dyn WriteCallback> {
        let counter = counter.clone();
        from_fn(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let table = PendingTable::new();
        let (callback, completion) = completion();
        let id = table.register(callback, Duration::from_millis(5000));
        assert!(table.contains(id));

        assert_eq!(completion.wait().await, Err(WriteError::Timeout));
        assert!(table.is_empty());
        assert!(!table.resolve(id, Ok(())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_before_deadline() {
        let table = PendingTable::new();
        let (callback, completion) = completion();
        let id = table.register(callback, Duration::from_millis(5000));
        assert!(table.resolve(id, Ok(())));
        assert_eq!(completion.wait().await, Ok(()));

        // The aborted timer never fires
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!table.expire(id));
    }

    #[tokio::test]
    async fn test_duplicate_resolve() {
        let table = PendingTable::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = table.register(counting(&counter), Duration::from_secs(5));
        assert!(table.resolve(id, Ok(())));
        assert!(!table.resolve(id, Ok(())));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_suppresses_callback() {
        let table = PendingTable::new();
        let (callback, completion) = completion();
        let id = table.register(callback, Duration::from_secs(5));
        assert!(table.cancel(id));
        assert!(table.is_cancelled(id));
        assert!(table.contains(id));

        assert!(table.resolve(id, Ok(())));
        assert!(table.is_empty());
        assert_eq!(completion.wait().await, Err(WriteError::Cancelled));
    }

    #[tokio::test]
    async fn test_drain() {
        let table = PendingTable::new();
        let order = Arc::new(Mutex::new(vec![]));
        let ids: Vec<_> = (0..5)
            .map(|_| {
                let order = order.clone();
                table.register(
                    from_fn(move |result| order.lock().unwrap().push(result)),
                    Duration::from_secs(5),
                )
            })
            .collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));

        assert_eq!(table.drain(WriteError::ConnectionLost), 5);
        assert!(table.is_empty());
        assert_eq!(
            *order.lock().unwrap(),
            vec![Err(WriteError::ConnectionLost); 5]
        );
    }

    #[test]
    fn test_concurrent_resolve_and_expire() {
        // No runtime here, so no deadline timers are armed
        let table = PendingTable::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let ids: Vec<_> = (0..64)
            .map(|_| table.register(counting(&counter), Duration::from_secs(5)))
            .collect();

        let threads: Vec<_> = (0..4)
            .map(|thread| {
                let table = table.clone();
                let ids = ids.clone();
                std::thread::spawn(move || {
                    ids.iter()
                        .filter(|id| {
                            if thread % 2 == 0 {
                                table.resolve(**id, Ok(()))
                            } else {
                                table.expire(**id)
                            }
                        })
                        .count()
                })
            })
            .collect();

        let removed: usize = threads.into_iter().map(|t| t.join().unwrap()).sum();
        assert_eq!(removed, 64);
        assert_eq!(counter.load(Ordering::SeqCst), 64);
        assert!(table.is_empty());
    }
}
