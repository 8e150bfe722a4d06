// Job Metrics Port

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Sink for job runtime measurements
pub trait JobMetrics: Send + Sync {
    /// Record the wall-clock runtime of one execution
    fn record_runtime(&self, job_type: &str, runtime: Duration);
}

/// Gauge name used for the runtime of a job type
pub fn runtime_gauge_name(job_type: &str) -> String {
    format!("jobs.runtime.{}", job_type.to_lowercase())
}

/// Keeps the last runtime per gauge in memory
#[derive(Default)]
pub struct InMemoryJobMetrics {
    gauges: Mutex<HashMap<String, Duration>>,
}

impl InMemoryJobMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gauge(&self, name: &str) -> Option<Duration> {
        self.gauges
            .lock()
            .ok()
            .and_then(|gauges| gauges.get(name).copied())
    }
}

impl JobMetrics for InMemoryJobMetrics {
    fn record_runtime(&self, job_type: &str, runtime: Duration) {
        let name = runtime_gauge_name(job_type);
        tracing::debug!(gauge = %name, runtime_ms = runtime.as_millis() as u64, "Job runtime recorded");
        if let Ok(mut gauges) = self.gauges.lock() {
            gauges.insert(name, runtime);
        }
    }
}
