//! The wrapper handed out by the pool

use std::ops::Deref;
use std::sync::Arc;
use std::time::Instant;

/// A pooled object plus the metadata the pool keeps about it
///
/// Holders are handed out by [`ObjectPool::get_object`](crate::ObjectPool::get_object)
/// and must be given back with [`ObjectPool::return_object`](crate::ObjectPool::return_object).
/// Dropping a holder without returning it keeps its slot counted as active
/// until the pool is closed.
///
/// The pool shares the object with [`ObjectPool::close`](crate::ObjectPool::close),
/// so a holder only hands out `&T`. Objects that are written to, such as
/// buffers, need interior mutability in `T`:
///
/// ```
/// use elastic_objectpool::{ObjectPool, PoolConfiguration};
/// use parking_lot::Mutex;
///
/// let pool = ObjectPool::new(
///     PoolConfiguration::new()
///         .with_max_object_count(1)
///         .with_constructor(|| Ok::<_, std::io::Error>(Mutex::new(Vec::<u8>::new())))
///         .with_destructor(|_buf| {})
///         .with_id_extractor(|_buf| "buffer".to_string()),
/// )
/// .unwrap();
///
/// let holder = pool.get_object().unwrap();
/// holder.lock().extend_from_slice(b"payload");
/// pool.return_object(holder).unwrap();
///
/// let holder = pool.get_object().unwrap();
/// assert_eq!(holder.lock().as_slice(), b"payload");
/// pool.return_object(holder).unwrap();
/// ```
///
/// # Examples
///
/// ```
/// use elastic_objectpool::{ObjectPool, PoolConfiguration};
///
/// let pool = ObjectPool::new(
///     PoolConfiguration::new()
///         .with_constructor(|| Ok::<_, std::io::Error>(vec![0u8; 16]))
///         .with_destructor(|_buf| {})
///         .with_id_extractor(|buf| format!("{:p}", buf.as_ptr())),
/// )
/// .unwrap();
///
/// let holder = pool.get_object().unwrap();
/// assert_eq!(holder.len(), 16);
/// assert_eq!(holder.use_count(), 1);
/// assert!(holder.is_usable());
/// pool.return_object(holder).unwrap();
/// ```
#[must_use = "holders must be returned to the pool with `return_object`"]
pub struct ObjectHolder<T> {
    pub(crate) id: u64,
    pub(crate) object: Arc<T>,
    pub(crate) create_time: Instant,
    pub(crate) last_use_time: Instant,
    pub(crate) use_count: u64,
    pub(crate) usable: bool,
}

impl<T> ObjectHolder<T> {
    pub(crate) fn new(id: u64, object: Arc<T>) -> Self {
        let now = Instant::now();
        Self {
            id,
            object,
            create_time: now,
            last_use_time: now,
            use_count: 0,
            usable: true,
        }
    }

    /// The wrapped object
    pub fn object(&self) -> &T {
        &self.object
    }

    /// Token the pool issued for this holder
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn create_time(&self) -> Instant {
        self.create_time
    }

    /// When the holder last went back to the idle set
    pub fn last_use_time(&self) -> Instant {
        self.last_use_time
    }

    /// How many times the pool has handed this holder out
    pub fn use_count(&self) -> u64 {
        self.use_count
    }

    pub fn is_usable(&self) -> bool {
        self.usable
    }

    /// Flag the object as broken so the pool destroys it on return.
    ///
    /// There is no way back.
    pub fn mark_unusable(&mut self) {
        self.usable = false;
    }
}

impl<T> Deref for ObjectHolder<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.object
    }
}

impl<T> std::fmt::Debug for ObjectHolder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectHolder")
            .field("id", &self.id)
            .field("use_count", &self.use_count)
            .field("usable", &self.usable)
            .field("create_time", &self.create_time)
            .field("last_use_time", &self.last_use_time)
            .finish_non_exhaustive()
    }
}
