//! Health monitoring for object pools

/// Utilization above which a bounded pool reports itself unhealthy
const HIGH_UTILIZATION: f64 = 0.9;

/// Health status of an object pool
///
/// # Examples
///
/// ```
/// use elastic_objectpool::{ObjectPool, PoolConfiguration};
///
/// let pool = ObjectPool::new(
///     PoolConfiguration::new()
///         .with_max_object_count(10)
///         .with_constructor(|| Ok::<_, std::io::Error>(0u8))
///         .with_destructor(|_| {})
///         .with_id_extractor(|v| v.to_string()),
/// )
/// .unwrap();
///
/// let health = pool.get_health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.idle_objects, 0);
/// ```
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Active objects over maximum, `0.0` for unbounded pools
    pub utilization: f64,

    /// Idle objects count
    pub idle_objects: usize,

    /// Active objects count
    pub active_objects: usize,

    /// Maximum object count, `0` means unbounded
    pub max_objects: usize,

    /// Whether the pool has been closed
    pub closed: bool,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    /// Create a new health status
    pub fn new(idle: usize, active: usize, max: usize, closed: bool) -> Self {
        let utilization = if max > 0 {
            active as f64 / max as f64
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if closed {
            warnings.push("Pool is closed".to_string());
            is_healthy = false;
        }

        if utilization > HIGH_UTILIZATION {
            warnings.push(format!("High utilization: {:.1}%", utilization * 100.0));
            is_healthy = false;
        }

        if !closed && idle == 0 && active > 0 {
            warnings.push("No idle objects".to_string());
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization,
            idle_objects: idle,
            active_objects: active,
            max_objects: max,
            closed,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}
