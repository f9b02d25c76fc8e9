//! Pool configuration options

use crate::errors::{BoxError, PoolError, PoolResult};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Creates a new pooled object
pub type Constructor<T> = Arc<dyn Fn() -> Result<T, BoxError> + Send + Sync>;

/// Tears a pooled object down. Failures are the destructor's own business.
pub type Destructor<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Yields a stable textual identity for a pooled object
pub type IdExtractor<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// Idle time used when none is configured
pub const DEFAULT_IDLE_TIME: Duration = Duration::from_secs(300);

/// Configuration for object pool behavior
///
/// A pool needs all three callbacks; [`ObjectPool::new`](crate::ObjectPool::new)
/// rejects a configuration that is missing any of them.
///
/// # Examples
///
/// ```
/// use elastic_objectpool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::<String>::new()
///     .with_min_object_count(4)
///     .with_max_object_count(64)
///     .with_idle_time(Duration::from_secs(30))
///     .with_constructor(|| Ok::<_, std::io::Error>(String::from("conn")))
///     .with_destructor(|_conn| {})
///     .with_id_extractor(|conn| conn.clone());
///
/// assert_eq!(config.max_object_count, 64);
/// assert!(config.validate().is_ok());
/// ```
pub struct PoolConfiguration<T> {
    /// Number of objects the shrink pass never goes below
    pub min_object_count: usize,

    /// Upper bound on idle plus active objects, `0` means unbounded
    pub max_object_count: usize,

    /// How long an object must sit idle before it may be reclaimed
    pub idle_time: Duration,

    pub(crate) constructor: Option<Constructor<T>>,
    pub(crate) destructor: Option<Destructor<T>>,
    pub(crate) id_extractor: Option<IdExtractor<T>>,
}

impl<T> Default for PoolConfiguration<T> {
    fn default() -> Self {
        Self {
            min_object_count: 0,
            max_object_count: 0,
            idle_time: DEFAULT_IDLE_TIME,
            constructor: None,
            destructor: None,
            id_extractor: None,
        }
    }
}

impl<T> Clone for PoolConfiguration<T> {
    fn clone(&self) -> Self {
        Self {
            min_object_count: self.min_object_count,
            max_object_count: self.max_object_count,
            idle_time: self.idle_time,
            constructor: self.constructor.clone(),
            destructor: self.destructor.clone(),
            id_extractor: self.id_extractor.clone(),
        }
    }
}

impl<T> fmt::Debug for PoolConfiguration<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfiguration")
            .field("min_object_count", &self.min_object_count)
            .field("max_object_count", &self.max_object_count)
            .field("idle_time", &self.idle_time)
            .field("constructor", &self.constructor.is_some())
            .field("destructor", &self.destructor.is_some())
            .field("id_extractor", &self.id_extractor.is_some())
            .finish()
    }
}

impl<T> PoolConfiguration<T> {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum object count
    pub fn with_min_object_count(mut self, count: usize) -> Self {
        self.min_object_count = count;
        self
    }

    /// Set the maximum object count
    ///
    /// # Examples
    ///
    /// ```
    /// use elastic_objectpool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::<u32>::new()
    ///     .with_max_object_count(50);
    ///
    /// assert_eq!(config.max_object_count, 50);
    /// ```
    pub fn with_max_object_count(mut self, count: usize) -> Self {
        self.max_object_count = count;
        self
    }

    /// Set the idle time after which an object becomes eligible for shrinking
    pub fn with_idle_time(mut self, idle_time: Duration) -> Self {
        self.idle_time = idle_time;
        self
    }

    /// Set the constructor used on a cache miss
    pub fn with_constructor<F, E>(mut self, constructor: F) -> Self
    where
        T: 'static,
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        self.constructor = Some(Arc::new(move || constructor().map_err(Into::into)));
        self
    }

    /// Set the destructor
    pub fn with_destructor<F>(mut self, destructor: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.destructor = Some(Arc::new(destructor));
        self
    }

    /// Set the identity extractor
    pub fn with_id_extractor<F>(mut self, id_extractor: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.id_extractor = Some(Arc::new(id_extractor));
        self
    }

    /// Check bounds and callbacks
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_object_count != 0 && self.min_object_count > self.max_object_count {
            return Err(PoolError::Configuration(format!(
                "min_object_count ({}) must not exceed max_object_count ({})",
                self.min_object_count, self.max_object_count
            )));
        }
        if self.constructor.is_none() {
            return Err(PoolError::Configuration("a constructor is required".to_string()));
        }
        if self.destructor.is_none() {
            return Err(PoolError::Configuration("a destructor is required".to_string()));
        }
        if self.id_extractor.is_none() {
            return Err(PoolError::Configuration("an id extractor is required".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> PoolConfiguration<u32> {
        PoolConfiguration::new()
            .with_constructor(|| Ok::<_, std::io::Error>(7))
            .with_destructor(|_| {})
            .with_id_extractor(|v| v.to_string())
    }

    #[test]
    fn test_defaults() {
        let config = PoolConfiguration::<u32>::default();
        assert_eq!(config.min_object_count, 0);
        assert_eq!(config.max_object_count, 0);
        assert_eq!(config.idle_time, DEFAULT_IDLE_TIME);
    }

    #[test]
    fn test_min_above_max_rejected() {
        let config = complete().with_min_object_count(1024).with_max_object_count(512);
        assert!(matches!(config.validate(), Err(PoolError::Configuration(_))));
    }

    #[test]
    fn test_min_above_unbounded_max_allowed() {
        let config = complete().with_min_object_count(1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_callbacks_rejected() {
        let no_constructor = PoolConfiguration::<u32>::new()
            .with_destructor(|_| {})
            .with_id_extractor(|v| v.to_string());
        assert!(no_constructor.validate().is_err());

        let no_destructor = PoolConfiguration::<u32>::new()
            .with_constructor(|| Ok::<_, std::io::Error>(1))
            .with_id_extractor(|v| v.to_string());
        assert!(no_destructor.validate().is_err());

        let no_id_extractor = PoolConfiguration::<u32>::new()
            .with_constructor(|| Ok::<_, std::io::Error>(1))
            .with_destructor(|_| {});
        assert!(no_id_extractor.validate().is_err());
    }

    #[test]
    fn test_debug_hides_callbacks() {
        let rendered = format!("{:?}", complete());
        assert!(rendered.contains("constructor: true"));
    }
}
