//! Idle reclamation run opportunistically on every return

use crate::holder::ObjectHolder;

use crossbeam::channel::{Sender, TrySendError};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Lower bound of the per-return eviction batch
pub const MIN_SHRINK_BATCH: usize = 10;

/// Bounded-batch shrink policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ShrinkPolicy {
    min_objects: usize,
    batch: usize,
    idle_time: Duration,
}

/// What a single shrink pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ShrinkOutcome {
    pub evicted: usize,
    pub queue_full: bool,
}

impl ShrinkPolicy {
    pub fn new(min_objects: usize, max_objects: usize, idle_time: Duration) -> Self {
        Self {
            min_objects,
            batch: Self::batch_size(min_objects, max_objects),
            idle_time,
        }
    }

    /// `max(10, (max - min) / 20)` for bounded pools, 10 otherwise
    pub fn batch_size(min_objects: usize, max_objects: usize) -> usize {
        if max_objects == 0 {
            return MIN_SHRINK_BATCH;
        }
        (max_objects.saturating_sub(min_objects) / 20).max(MIN_SHRINK_BATCH)
    }

    pub fn batch(&self) -> usize {
        self.batch
    }

    /// Capacity of the asynchronous destruction queue
    pub fn queue_capacity(&self) -> usize {
        self.batch * 2
    }

    /// Upper bound on evictions for a pool holding `total` objects, `idle` of them idle
    pub fn target(&self, total: usize, idle: usize) -> usize {
        if total <= self.min_objects {
            return 0;
        }
        self.batch.min(total - self.min_objects).min(idle)
    }

    pub fn is_expired(&self, last_use_time: Instant, now: Instant) -> bool {
        match last_use_time.checked_add(self.idle_time) {
            Some(deadline) => deadline <= now,
            None => false,
        }
    }

    /// Move expired holders from the front of `idle` onto `queue`.
    ///
    /// `active` is the active set size after the returning holder was removed.
    /// Stops at the first holder that is still fresh or when the queue is full.
    pub fn run<T>(
        &self,
        idle: &mut VecDeque<ObjectHolder<T>>,
        active: usize,
        now: Instant,
        queue: &Sender<ObjectHolder<T>>,
    ) -> ShrinkOutcome {
        let target = self.target(idle.len() + active, idle.len());
        let mut outcome = ShrinkOutcome::default();

        while outcome.evicted < target {
            let Some(candidate) = idle.pop_front() else {
                break;
            };
            if !self.is_expired(candidate.last_use_time, now) {
                idle.push_front(candidate);
                break;
            }
            match queue.try_send(candidate) {
                Ok(()) => outcome.evicted += 1,
                Err(TrySendError::Full(candidate)) => {
                    idle.push_front(candidate);
                    outcome.queue_full = true;
                    break;
                }
                Err(TrySendError::Disconnected(candidate)) => {
                    tracing::warn!(object_id = candidate.id, "destruction queue disconnected");
                    idle.push_front(candidate);
                    break;
                }
            }
        }

        outcome
    }
}
