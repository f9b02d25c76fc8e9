//! Core object pool implementation

use crate::config::{Constructor, Destructor, IdExtractor, PoolConfiguration};
use crate::destructor::{self, BackgroundDestructor, DestructorState};
use crate::errors::{BoxError, PoolError, PoolResult};
use crate::health::HealthStatus;
use crate::holder::ObjectHolder;
#[cfg(feature = "metrics")]
use crate::metrics::MetricsExporter;
use crate::metrics::{MetricsTracker, PoolMetrics};
use crate::shrink::ShrinkPolicy;

use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::panic;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Entry of the active set
enum Slot<T> {
    /// Capacity taken by a construction that has not finished yet
    Reserved,
    Occupied(Arc<T>),
}

struct PoolState<T> {
    /// Oldest return at the front, most recent at the back
    idle: VecDeque<ObjectHolder<T>>,
    active: HashMap<u64, Slot<T>>,
    closed: bool,
    destruct_queue: Option<Sender<ObjectHolder<T>>>,
}

impl<T> PoolState<T> {
    fn object_count(&self) -> usize {
        self.idle.len() + self.active.len()
    }
}

enum Checkout<T> {
    Reused(ObjectHolder<T>),
    Reserved(u64),
}

/// Thread-safe pool of expensive, reusable objects
///
/// Objects are built on demand by the configured constructor, reused
/// most-recently-returned first, and reclaimed in small batches once they have
/// been idle longer than the configured idle time. Reclamation only happens as
/// a side effect of [`return_object`](Self::return_object); an idle pool that
/// sees no returns keeps its objects.
///
/// # Examples
///
/// ```
/// use elastic_objectpool::{ObjectPool, PoolConfiguration, PoolError};
/// use std::time::Duration;
///
/// let pool = ObjectPool::new(
///     PoolConfiguration::new()
///         .with_max_object_count(1)
///         .with_idle_time(Duration::from_secs(60))
///         .with_constructor(|| Ok::<_, std::io::Error>(String::from("session")))
///         .with_destructor(|_session| {})
///         .with_id_extractor(|session| session.clone()),
/// )
/// .unwrap();
///
/// let holder = pool.get_object().unwrap();
/// assert!(matches!(pool.get_object(), Err(PoolError::CapacityExceeded { max: 1 })));
///
/// pool.return_object(holder).unwrap();
/// assert_eq!(pool.idle_object_count(), 1);
///
/// pool.close();
/// assert!(pool.is_closed());
/// assert_eq!(pool.object_count(), 0);
/// ```
pub struct ObjectPool<T: Send + Sync + 'static> {
    state: Mutex<PoolState<T>>,
    constructor: Constructor<T>,
    destructor: Destructor<T>,
    id_extractor: IdExtractor<T>,
    min_objects: usize,
    max_objects: usize,
    idle_time: Duration,
    shrink: ShrinkPolicy,
    next_id: AtomicU64,
    metrics: Arc<MetricsTracker>,
    worker: BackgroundDestructor,
}

impl<T: Send + Sync + 'static> ObjectPool<T> {
    /// Create a pool and start its background destructor
    pub fn new(config: PoolConfiguration<T>) -> PoolResult<Self> {
        config.validate()?;

        let PoolConfiguration {
            min_object_count,
            max_object_count,
            idle_time,
            constructor,
            destructor,
            id_extractor,
        } = config;
        let (Some(constructor), Some(destructor), Some(id_extractor)) =
            (constructor, destructor, id_extractor)
        else {
            return Err(PoolError::Configuration("all callbacks are required".to_string()));
        };

        let shrink = ShrinkPolicy::new(min_object_count, max_object_count, idle_time);
        let (sender, receiver) = channel::bounded(shrink.queue_capacity());
        let metrics = Arc::new(MetricsTracker::new());
        let worker =
            BackgroundDestructor::spawn(receiver, Arc::clone(&destructor), Arc::clone(&metrics))?;

        tracing::debug!(
            min = min_object_count,
            max = max_object_count,
            idle_time = ?idle_time,
            shrink_batch = shrink.batch(),
            "object pool created"
        );

        Ok(Self {
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                active: HashMap::new(),
                closed: false,
                destruct_queue: Some(sender),
            }),
            constructor,
            destructor,
            id_extractor,
            min_objects: min_object_count,
            max_objects: max_object_count,
            idle_time,
            shrink,
            next_id: AtomicU64::new(0),
            metrics,
            worker,
        })
    }

    /// Get an object, reusing the most recently returned one when possible.
    ///
    /// On a miss the constructor runs without the pool lock held, so a slow
    /// constructor only delays its own caller. Fails immediately with
    /// [`PoolError::CapacityExceeded`] when the pool is full.
    pub fn get_object(&self) -> PoolResult<ObjectHolder<T>> {
        let id = match self.checkout()? {
            Checkout::Reused(holder) => return Ok(holder),
            Checkout::Reserved(id) => id,
        };

        let reservation = Reservation::new(self, id);
        let object = (self.constructor)().map_err(|err| self.construction_failed(err))?;
        self.hand_out(reservation.fulfil(object)?)
    }

    /// Get an object, running a needed constructor on tokio's blocking pool.
    ///
    /// Dropping the returned future before it completes gives the reserved
    /// slot back. An object the constructor finishes after that is passed to
    /// the destructor. A panicking constructor resumes its panic here, as it
    /// does in [`get_object`](Self::get_object).
    pub async fn get_object_async(&self) -> PoolResult<ObjectHolder<T>> {
        let id = match self.checkout()? {
            Checkout::Reused(holder) => return Ok(holder),
            Checkout::Reserved(id) => id,
        };

        let reservation = Reservation::new(self, id);
        let constructor = Arc::clone(&self.constructor);
        let destructor = Arc::clone(&self.destructor);
        let metrics = Arc::clone(&self.metrics);
        let task = tokio::task::spawn_blocking(move || {
            constructor().map(|object| Unclaimed {
                object: Some(object),
                id,
                destructor,
                metrics,
            })
        });

        let built = match task.await {
            Ok(built) => built,
            Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
            Err(_) => return Err(PoolError::Cancelled),
        };
        let unclaimed = built.map_err(|err| self.construction_failed(err))?;
        let Some(object) = unclaimed.claim() else {
            return Err(PoolError::Cancelled);
        };
        self.hand_out(reservation.fulfil(object)?)
    }

    /// Give an object back to the pool.
    ///
    /// Passing `None` is a no-op. Usable objects go back to the idle set,
    /// unusable ones are destroyed right away on the calling thread. Every
    /// return also runs one bounded shrink pass over the idle set.
    pub fn return_object(&self, holder: impl Into<Option<ObjectHolder<T>>>) -> PoolResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PoolError::PoolClosed);
        }
        let Some(mut holder) = holder.into() else {
            return Ok(());
        };

        let owned = matches!(
            state.active.get(&holder.id),
            Some(Slot::Occupied(object)) if Arc::ptr_eq(object, &holder.object)
        );
        if !owned {
            return Err(PoolError::NotFound);
        }
        state.active.remove(&holder.id);
        self.metrics.total_returned.fetch_add(1, Ordering::Relaxed);

        self.shrink_idle(&mut state);

        if holder.is_usable() {
            holder.last_use_time = Instant::now();
            state.idle.push_back(holder);
            return Ok(());
        }

        drop(state);
        tracing::debug!(
            object_id = holder.id,
            use_count = holder.use_count,
            "destroying unusable object"
        );
        destructor::destroy(&self.destructor, holder.id, holder.object());
        self.metrics.total_destroyed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Pre-create up to `count` idle objects, stopping early at the maximum.
    ///
    /// Returns how many objects were created.
    pub fn warmup(&self, count: usize) -> PoolResult<usize> {
        let mut created = 0;
        for _ in 0..count {
            let reserved = {
                let mut state = self.state.lock();
                self.reserve_fresh(&mut state)
            };
            let id = match reserved {
                Ok(id) => id,
                Err(PoolError::CapacityExceeded { .. }) => break,
                Err(err) => return Err(err),
            };

            let reservation = Reservation::new(self, id);
            let object = (self.constructor)().map_err(|err| self.construction_failed(err))?;
            let mut holder = reservation.fulfil(object)?;
            self.metrics.total_created.fetch_add(1, Ordering::Relaxed);

            let mut state = self.state.lock();
            if state.active.remove(&holder.id).is_none() {
                // closed meanwhile, close already destroyed it
                return Err(PoolError::PoolClosed);
            }
            holder.last_use_time = Instant::now();
            state.idle.push_back(holder);
            created += 1;
        }

        tracing::debug!(requested = count, created, "pool warmed up");
        Ok(created)
    }

    /// Close the pool and destroy every object, including checked-out ones.
    ///
    /// Holders still owned by callers keep a valid but torn-down object and
    /// must not be used afterwards. Blocks until the background destructor
    /// has drained its queue. Calling this again is a no-op.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }

        state.closed = true;
        self.worker.request_stop();
        state.destruct_queue = None;

        let idle = std::mem::take(&mut state.idle);
        let active = std::mem::take(&mut state.active);

        for holder in &idle {
            destructor::destroy(&self.destructor, holder.id, holder.object());
        }
        let mut checked_out = 0;
        for (id, slot) in &active {
            if let Slot::Occupied(object) = slot {
                destructor::destroy(&self.destructor, *id, object);
                checked_out += 1;
            }
        }
        self.metrics
            .total_destroyed
            .fetch_add(idle.len() + checked_out, Ordering::Relaxed);

        self.worker.wait_stopped();

        tracing::info!(idle = idle.len(), checked_out, "object pool closed");
    }

    /// Close the pool from async code without blocking the runtime
    pub async fn close_async(self: &Arc<Self>) -> PoolResult<()> {
        let pool = Arc::clone(self);
        tokio::task::spawn_blocking(move || pool.close())
            .await
            .map_err(|_| PoolError::Cancelled)
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Idle plus active objects, including constructions in flight
    pub fn object_count(&self) -> usize {
        self.state.lock().object_count()
    }

    pub fn idle_object_count(&self) -> usize {
        self.state.lock().idle.len()
    }

    pub fn active_object_count(&self) -> usize {
        self.state.lock().active.len()
    }

    /// Configured maximum, `0` means unbounded
    pub fn max_object_count(&self) -> usize {
        self.max_objects
    }

    pub fn min_object_count(&self) -> usize {
        self.min_objects
    }

    pub fn idle_time(&self) -> Duration {
        self.idle_time
    }

    /// Most objects a single shrink pass reclaims
    pub fn shrink_batch(&self) -> usize {
        self.shrink.batch()
    }

    pub fn destructor_state(&self) -> DestructorState {
        self.worker.state()
    }

    /// Identity of a held object as reported by the configured id extractor
    pub fn object_id(&self, holder: &ObjectHolder<T>) -> String {
        (self.id_extractor)(holder.object())
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        let (active, idle) = {
            let state = self.state.lock();
            (state.active.len(), state.idle.len())
        };
        self.metrics.get_metrics(active, idle, self.max_objects)
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> PoolResult<String> {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }

    /// Get health status
    pub fn get_health_status(&self) -> HealthStatus {
        let state = self.state.lock();
        HealthStatus::new(state.idle.len(), state.active.len(), self.max_objects, state.closed)
    }

    fn checkout(&self) -> PoolResult<Checkout<T>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PoolError::PoolClosed);
        }

        if let Some(mut holder) = state.idle.pop_back() {
            holder.use_count += 1;
            state
                .active
                .insert(holder.id, Slot::Occupied(Arc::clone(&holder.object)));
            drop(state);

            self.metrics.total_reused.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(
                object_id = holder.id,
                use_count = holder.use_count,
                "reused idle object"
            );
            return Ok(Checkout::Reused(holder));
        }

        match self.reserve_fresh(&mut state) {
            Ok(id) => Ok(Checkout::Reserved(id)),
            Err(err) => {
                drop(state);
                if matches!(err, PoolError::CapacityExceeded { .. }) {
                    self.metrics.capacity_rejections.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(max = self.max_objects, "pool at capacity");
                }
                Err(err)
            }
        }
    }

    /// Take a slot in the active set for an object that is about to be built
    fn reserve_fresh(&self, state: &mut PoolState<T>) -> PoolResult<u64> {
        if state.closed {
            return Err(PoolError::PoolClosed);
        }
        if self.max_objects > 0 && state.object_count() >= self.max_objects {
            return Err(PoolError::CapacityExceeded {
                max: self.max_objects,
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        state.active.insert(id, Slot::Reserved);
        Ok(id)
    }

    fn hand_out(&self, mut holder: ObjectHolder<T>) -> PoolResult<ObjectHolder<T>> {
        holder.use_count = 1;
        self.metrics.total_created.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(object_id = holder.id, "created new object");
        Ok(holder)
    }

    fn construction_failed(&self, err: BoxError) -> PoolError {
        self.metrics.construction_failures.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(error = %err, "creating a new object failed");
        PoolError::construction(err)
    }

    fn shrink_idle(&self, state: &mut PoolState<T>) {
        let PoolState {
            idle,
            active,
            destruct_queue,
            ..
        } = state;
        let Some(queue) = destruct_queue.as_ref() else {
            return;
        };

        let outcome = self.shrink.run(idle, active.len(), Instant::now(), queue);
        if outcome.evicted > 0 {
            self.metrics
                .total_evicted
                .fetch_add(outcome.evicted, Ordering::Relaxed);
            tracing::debug!(
                evicted = outcome.evicted,
                queue_full = outcome.queue_full,
                "queued idle objects for destruction"
            );
        } else if outcome.queue_full {
            tracing::trace!("destruction queue full, shrinking deferred");
        }
    }
}

impl<T: Send + Sync + 'static> Drop for ObjectPool<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Object built on the blocking pool for a caller that may have gone away.
///
/// Destroyed on drop unless claimed.
struct Unclaimed<T> {
    object: Option<T>,
    id: u64,
    destructor: Destructor<T>,
    metrics: Arc<MetricsTracker>,
}

impl<T> Unclaimed<T> {
    fn claim(mut self) -> Option<T> {
        self.object.take()
    }
}

impl<T> Drop for Unclaimed<T> {
    fn drop(&mut self) {
        let Some(object) = self.object.take() else {
            return;
        };
        tracing::debug!(object_id = self.id, "async acquire abandoned, destroying new object");
        destructor::destroy(&self.destructor, self.id, &object);
        self.metrics.total_created.fetch_add(1, Ordering::Relaxed);
        self.metrics.total_destroyed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Active-set slot held while a constructor runs; dropped unfulfilled it is released
struct Reservation<'a, T: Send + Sync + 'static> {
    pool: &'a ObjectPool<T>,
    id: u64,
    armed: bool,
}

impl<'a, T: Send + Sync + 'static> Reservation<'a, T> {
    fn new(pool: &'a ObjectPool<T>, id: u64) -> Self {
        Self {
            pool,
            id,
            armed: true,
        }
    }

    /// Attach a freshly built object to the reserved slot
    fn fulfil(mut self, object: T) -> PoolResult<ObjectHolder<T>> {
        self.armed = false;
        let object = Arc::new(object);

        let mut state = self.pool.state.lock();
        match state.active.get_mut(&self.id) {
            Some(slot) if matches!(slot, Slot::Reserved) => {
                *slot = Slot::Occupied(Arc::clone(&object));
                Ok(ObjectHolder::new(self.id, object))
            }
            _ => {
                drop(state);
                tracing::debug!(object_id = self.id, "pool closed during construction");
                destructor::destroy(&self.pool.destructor, self.id, &object);
                self.pool.metrics.total_destroyed.fetch_add(1, Ordering::Relaxed);
                Err(PoolError::PoolClosed)
            }
        }
    }
}

impl<T: Send + Sync + 'static> Drop for Reservation<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.pool.state.lock();
        if matches!(state.active.get(&self.id), Some(Slot::Reserved)) {
            state.active.remove(&self.id);
        }
    }
}
