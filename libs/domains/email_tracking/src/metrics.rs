//! Prometheus metrics for the webhook worker

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::time::Duration;
use tracing::{info, warn};

use crate::models::DeadLetterReason;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder.
///
/// Call once at startup; later calls return the same handle. When another
/// recorder is already installed, metrics stay disabled and `None` is returned.
pub fn init_metrics() -> Option<&'static PrometheusHandle> {
    let installed = PROMETHEUS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;
        describe_metrics();
        info!("Prometheus metrics initialized");
        Ok::<_, BuildError>(handle)
    });

    match installed {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Failed to install Prometheus recorder, metrics are disabled");
            None
        }
    }
}

pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Render metrics in Prometheus text format, if the recorder is installed
pub fn render_metrics() -> Option<String> {
    prometheus_handle().map(|h| h.render())
}

fn describe_metrics() {
    describe_counter!(
        "webhook_jobs_received_total",
        "Webhook jobs taken off the queue"
    );
    describe_counter!(
        "webhook_jobs_total",
        "Webhook job attempts by outcome (processed, retried, failed)"
    );
    describe_counter!(
        "webhook_jobs_dead_lettered_total",
        "Webhook jobs moved to the dead-letter store"
    );
    describe_histogram!(
        "webhook_job_duration_seconds",
        "Time spent ingesting a webhook job"
    );
    describe_gauge!("webhook_jobs_in_flight", "Webhook jobs currently running");
    describe_gauge!("webhook_queue_depth", "Webhook jobs waiting in the queue");
}

/// Webhook worker metrics helper
#[derive(Clone, Debug)]
pub struct WebhookMetrics {
    /// Processor name for labeling
    processor: &'static str,
}

impl WebhookMetrics {
    pub fn new(processor: &'static str) -> Self {
        Self { processor }
    }

    pub fn job_received(&self, provider: &str) {
        counter!(
            "webhook_jobs_received_total",
            "processor" => self.processor,
            "provider" => provider.to_string()
        )
        .increment(1);
    }

    pub fn job_processed(&self, duration: Duration) {
        counter!(
            "webhook_jobs_total",
            "processor" => self.processor,
            "status" => "processed"
        )
        .increment(1);

        histogram!("webhook_job_duration_seconds", "processor" => self.processor)
            .record(duration.as_secs_f64());
    }

    pub fn job_retried(&self) {
        counter!(
            "webhook_jobs_total",
            "processor" => self.processor,
            "status" => "retried"
        )
        .increment(1);
    }

    /// Final failure; the job goes to the dead-letter store next
    pub fn job_failed(&self) {
        counter!(
            "webhook_jobs_total",
            "processor" => self.processor,
            "status" => "failed"
        )
        .increment(1);
    }

    pub fn job_dead_lettered(&self, reason: DeadLetterReason) {
        counter!(
            "webhook_jobs_dead_lettered_total",
            "processor" => self.processor,
            "reason" => reason.to_string()
        )
        .increment(1);
    }

    pub fn in_flight(&self, count: usize) {
        gauge!("webhook_jobs_in_flight", "processor" => self.processor).set(count as f64);
    }

    pub fn queue_depth(&self, depth: usize) {
        gauge!("webhook_queue_depth", "processor" => self.processor).set(depth as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_metrics_are_rendered() {
        assert!(init_metrics().is_some());
        // Second call hands back the installed recorder
        assert!(init_metrics().is_some());

        let metrics = WebhookMetrics::new("metrics_test");
        metrics.job_processed(Duration::from_millis(5));
        metrics.job_dead_lettered(DeadLetterReason::RetriesExhausted);
        metrics.in_flight(3);

        let rendered = render_metrics().unwrap();
        assert!(rendered.contains("webhook_jobs_total"));
        assert!(rendered.contains(r#"processor="metrics_test""#));
        assert!(rendered.contains(r#"reason="retries_exhausted""#));
        assert!(rendered.contains("webhook_jobs_in_flight"));
    }
}
