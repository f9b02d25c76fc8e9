//! # elastic_objectpool
//!
//! Thread-safe pool for expensive, reusable resources such as network
//! connections, handles or large buffers.
//!
//! ## Features
//!
//! - Caller supplied constructor, destructor and identity extractor
//! - Bounded growth, failing fast when the maximum is reached
//! - Most-recently-returned reuse to keep resources warm
//! - Bounded-batch shrinking of objects idle longer than the idle time
//! - Background thread for destroying reclaimed objects off the return path
//! - Deterministic shutdown that waits for every destructor to finish
//! - Async acquisition and shutdown on tokio
//! - Metrics, Prometheus export and health status
//!
//! ## Quick Start
//!
//! ```rust
//! use elastic_objectpool::{ObjectPool, PoolConfiguration};
//! use std::time::Duration;
//!
//! let pool = ObjectPool::new(
//!     PoolConfiguration::new()
//!         .with_min_object_count(2)
//!         .with_max_object_count(16)
//!         .with_idle_time(Duration::from_secs(30))
//!         .with_constructor(|| Ok::<_, std::io::Error>(Vec::<u8>::with_capacity(4096)))
//!         .with_destructor(|_buffer| {})
//!         .with_id_extractor(|buffer| format!("{:p}", buffer.as_ptr())),
//! )
//! .unwrap();
//!
//! let holder = pool.get_object().unwrap();
//! println!("Got buffer with capacity {}", holder.capacity());
//! pool.return_object(holder).unwrap();
//!
//! pool.close();
//! ```

mod config;
mod destructor;
mod errors;
mod health;
mod holder;
mod metrics;
mod pool;
mod shrink;

pub use config::{Constructor, DEFAULT_IDLE_TIME, Destructor, IdExtractor, PoolConfiguration};
pub use destructor::DestructorState;
pub use errors::{BoxError, PoolError, PoolResult};
pub use health::HealthStatus;
pub use holder::ObjectHolder;
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use metrics::PoolMetrics;
pub use pool::ObjectPool;
pub use shrink::MIN_SHRINK_BATCH;
