//! Background worker that tears down objects reclaimed by the shrink pass

use crate::config::Destructor;
use crate::errors::{PoolError, PoolResult};
use crate::holder::ObjectHolder;
use crate::metrics::MetricsTracker;

use crossbeam::channel::Receiver;
use parking_lot::{Condvar, Mutex};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};

/// Lifecycle of the background destructor
///
/// ```text
/// Running --close--> Draining --queue empty--> Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestructorState {
    /// Accepting and destroying reclaimed objects
    Running,

    /// No more objects will arrive, the backlog is being destroyed
    Draining,

    /// Every queued object has been destroyed
    Stopped,
}

struct Signal {
    state: Mutex<DestructorState>,
    stopped: Condvar,
}

impl Signal {
    fn transition(&self, next: DestructorState) {
        let mut state = self.state.lock();
        if *state != DestructorState::Stopped {
            *state = next;
        }
        if next == DestructorState::Stopped {
            self.stopped.notify_all();
        }
    }
}

/// Handle on the single worker thread started by the pool
pub(crate) struct BackgroundDestructor {
    signal: Arc<Signal>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundDestructor {
    /// Start the worker. It runs until every sender of `queue` is dropped.
    pub fn spawn<T>(
        queue: Receiver<ObjectHolder<T>>,
        destructor: Destructor<T>,
        metrics: Arc<MetricsTracker>,
    ) -> PoolResult<Self>
    where
        T: Send + Sync + 'static,
    {
        let signal = Arc::new(Signal {
            state: Mutex::new(DestructorState::Running),
            stopped: Condvar::new(),
        });
        let worker_signal = Arc::clone(&signal);

        let handle = thread::Builder::new()
            .name("objectpool-destructor".to_string())
            .spawn(move || {
                tracing::debug!("background destructor started");
                for holder in queue.iter() {
                    destroy(&destructor, holder.id(), holder.object());
                    metrics.total_destroyed_async.fetch_add(1, Ordering::Relaxed);
                }
                worker_signal.transition(DestructorState::Stopped);
                tracing::debug!("background destructor stopped");
            })
            .map_err(|err| PoolError::WorkerSpawn(err.to_string()))?;

        Ok(Self {
            signal,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn state(&self) -> DestructorState {
        *self.signal.state.lock()
    }

    /// Announce that the queue is about to close
    pub fn request_stop(&self) {
        self.signal.transition(DestructorState::Draining);
    }

    /// Block until the worker has drained the queue and exited
    pub fn wait_stopped(&self) {
        {
            let mut state = self.signal.state.lock();
            while *state != DestructorState::Stopped {
                self.signal.stopped.wait(&mut state);
            }
        }

        if let Some(handle) = self.handle.lock().take()
            && handle.join().is_err()
        {
            tracing::error!("background destructor thread panicked");
        }
    }
}

/// Run a destructor, containing any panic so the caller keeps going
pub(crate) fn destroy<T>(destructor: &Destructor<T>, object_id: u64, object: &T) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| destructor(object)));
    if result.is_err() {
        tracing::error!(object_id, "destructor panicked");
    }
}
