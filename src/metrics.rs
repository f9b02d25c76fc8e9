//! Metrics collection and export for object pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "serde")]
use serde::Serialize;

/// Metrics data for a pool
///
/// # Examples
///
/// ```
/// use elastic_objectpool::{ObjectPool, PoolConfiguration};
///
/// let pool = ObjectPool::new(
///     PoolConfiguration::new()
///         .with_max_object_count(8)
///         .with_constructor(|| Ok::<_, std::io::Error>(0u64))
///         .with_destructor(|_| {})
///         .with_id_extractor(|v| v.to_string()),
/// )
/// .unwrap();
///
/// let holder = pool.get_object().unwrap();
/// let metrics = pool.get_metrics();
/// assert_eq!(metrics.total_created, 1);
/// assert_eq!(metrics.active_objects, 1);
/// pool.return_object(holder).unwrap();
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PoolMetrics {
    /// Objects built by the constructor
    pub total_created: usize,

    /// Acquisitions served from the idle set
    pub total_reused: usize,

    /// Successful returns
    pub total_returned: usize,

    /// Objects destroyed on the caller's thread (unusable returns and close)
    pub total_destroyed: usize,

    /// Objects the shrink pass handed to the background destructor
    pub total_evicted: usize,

    /// Objects the background destructor has finished destroying
    pub total_destroyed_async: usize,

    /// Constructor failures
    pub construction_failures: usize,

    /// Acquisitions rejected because the pool was full
    pub capacity_rejections: usize,

    /// Current active objects
    pub active_objects: usize,

    /// Current idle objects
    pub idle_objects: usize,

    /// Active objects over maximum, `0.0` for unbounded pools
    pub utilization: f64,

    /// Maximum object count, `0` means unbounded
    pub max_objects: usize,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_reused".to_string(), self.total_reused.to_string());
        metrics.insert("total_returned".to_string(), self.total_returned.to_string());
        metrics.insert("total_destroyed".to_string(), self.total_destroyed.to_string());
        metrics.insert("total_evicted".to_string(), self.total_evicted.to_string());
        metrics.insert(
            "total_destroyed_async".to_string(),
            self.total_destroyed_async.to_string(),
        );
        metrics.insert(
            "construction_failures".to_string(),
            self.construction_failures.to_string(),
        );
        metrics.insert(
            "capacity_rejections".to_string(),
            self.capacity_rejections.to_string(),
        );
        metrics.insert("active_objects".to_string(), self.active_objects.to_string());
        metrics.insert("idle_objects".to_string(), self.idle_objects.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics.insert("max_objects".to_string(), self.max_objects.to_string());
        metrics
    }
}

/// Prometheus exporter for pool metrics
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export metrics in Prometheus text exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use elastic_objectpool::{ObjectPool, PoolConfiguration};
    /// use std::collections::HashMap;
    ///
    /// let pool = ObjectPool::new(
    ///     PoolConfiguration::new()
    ///         .with_constructor(|| Ok::<_, std::io::Error>(1u8))
    ///         .with_destructor(|_| {})
    ///         .with_id_extractor(|v| v.to_string()),
    /// )
    /// .unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("conn_pool", Some(&tags)).unwrap();
    /// assert!(output.contains("objectpool_objects_active"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> crate::PoolResult<String> {
        use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Opts, Registry, TextEncoder};

        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());
        if let Some(tags) = tags {
            labels.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let registry = Registry::new();
        let opts = |name: &str, help: &str| Opts::new(name, help).const_labels(labels.clone());

        let gauges = [
            ("objectpool_objects_active", "Current active objects", metrics.active_objects),
            ("objectpool_objects_idle", "Current idle objects", metrics.idle_objects),
            ("objectpool_objects_max", "Maximum object count", metrics.max_objects),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::with_opts(opts(name, help)).map_err(export_error)?;
            gauge.set(value as i64);
            registry.register(Box::new(gauge)).map_err(export_error)?;
        }

        let utilization = Gauge::with_opts(opts("objectpool_utilization", "Pool utilization ratio"))
            .map_err(export_error)?;
        utilization.set(metrics.utilization);
        registry.register(Box::new(utilization)).map_err(export_error)?;

        let counters = [
            ("objectpool_objects_created_total", "Objects created", metrics.total_created),
            (
                "objectpool_objects_reused_total",
                "Objects reused from the idle set",
                metrics.total_reused,
            ),
            ("objectpool_objects_returned_total", "Objects returned", metrics.total_returned),
            (
                "objectpool_objects_destroyed_total",
                "Objects destroyed synchronously",
                metrics.total_destroyed,
            ),
            (
                "objectpool_objects_evicted_total",
                "Objects evicted by shrinking",
                metrics.total_evicted,
            ),
            (
                "objectpool_objects_destroyed_async_total",
                "Objects destroyed by the background destructor",
                metrics.total_destroyed_async,
            ),
            (
                "objectpool_construction_failures_total",
                "Constructor failures",
                metrics.construction_failures,
            ),
            (
                "objectpool_capacity_rejections_total",
                "Acquisitions rejected at capacity",
                metrics.capacity_rejections,
            ),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::with_opts(opts(name, help)).map_err(export_error)?;
            counter.inc_by(value as u64);
            registry.register(Box::new(counter)).map_err(export_error)?;
        }

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .map_err(export_error)?;
        String::from_utf8(buffer).map_err(export_error)
    }
}

#[cfg(feature = "metrics")]
fn export_error(err: impl std::fmt::Display) -> crate::PoolError {
    crate::PoolError::MetricsExport(err.to_string())
}

/// Internal metrics tracker
pub(crate) struct MetricsTracker {
    pub total_created: AtomicUsize,
    pub total_reused: AtomicUsize,
    pub total_returned: AtomicUsize,
    pub total_destroyed: AtomicUsize,
    pub total_evicted: AtomicUsize,
    pub total_destroyed_async: AtomicUsize,
    pub construction_failures: AtomicUsize,
    pub capacity_rejections: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self {
            total_created: AtomicUsize::new(0),
            total_reused: AtomicUsize::new(0),
            total_returned: AtomicUsize::new(0),
            total_destroyed: AtomicUsize::new(0),
            total_evicted: AtomicUsize::new(0),
            total_destroyed_async: AtomicUsize::new(0),
            construction_failures: AtomicUsize::new(0),
            capacity_rejections: AtomicUsize::new(0),
        }
    }

    pub fn get_metrics(&self, active: usize, idle: usize, max: usize) -> PoolMetrics {
        let utilization = if max > 0 {
            active as f64 / max as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_created: self.total_created.load(Ordering::Relaxed),
            total_reused: self.total_reused.load(Ordering::Relaxed),
            total_returned: self.total_returned.load(Ordering::Relaxed),
            total_destroyed: self.total_destroyed.load(Ordering::Relaxed),
            total_evicted: self.total_evicted.load(Ordering::Relaxed),
            total_destroyed_async: self.total_destroyed_async.load(Ordering::Relaxed),
            construction_failures: self.construction_failures.load(Ordering::Relaxed),
            capacity_rejections: self.capacity_rejections.load(Ordering::Relaxed),
            active_objects: active,
            idle_objects: idle,
            utilization,
            max_objects: max,
        }
    }
}
