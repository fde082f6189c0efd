//! Request statistics for the retention service.

use crate::types::message::RetentionResponse;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

const MAX_SAMPLES: usize = 10_000;

/// Metrics collector for served requests
pub struct ServiceMetrics {
    /// Total requests answered, successful or not
    pub requests_processed: AtomicU64,
    /// Requests that produced an error response
    pub requests_failed: AtomicU64,
    /// Requests that included an explanation
    pub explanations_served: AtomicU64,
    /// Failures by error kind
    failures_by_kind: RwLock<HashMap<String, u64>>,
    /// Predictions by label (0 = may not return, 1 = likely to return)
    labels: RwLock<[u64; 2]>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Probability distribution buckets
    probability_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests_processed: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            explanations_served: AtomicU64::new(0),
            failures_by_kind: RwLock::new(HashMap::new()),
            labels: RwLock::new([0; 2]),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            probability_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record an answered request
    pub fn record_response(&self, response: &RetentionResponse, processing_time: Duration) {
        self.requests_processed.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            if times.len() > MAX_SAMPLES {
                times.drain(0..MAX_SAMPLES / 2);
            }
        }

        if let Some(error) = &response.error {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
            if let Ok(mut by_kind) = self.failures_by_kind.write() {
                *by_kind.entry(error.kind.clone()).or_insert(0) += 1;
            }
            return;
        }

        if let Some(prediction) = &response.prediction {
            if let Ok(mut labels) = self.labels.write() {
                labels[usize::from(prediction.label.min(1))] += 1;
            }
            let bucket = (prediction.probability * 10.0).clamp(0.0, 9.0) as usize;
            if let Ok(mut buckets) = self.probability_buckets.write() {
                buckets[bucket] += 1;
            }
        }

        if response.attributions.is_some() {
            self.explanations_served.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let mut sorted = match self.processing_times.read() {
            Ok(times) if !times.is_empty() => times.clone(),
            _ => return ProcessingStats::default(),
        };
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let percentile = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: percentile(0.5),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Requests per second since startup
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.requests_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_probability_distribution(&self) -> [u64; 10] {
        self.probability_buckets
            .read()
            .map(|b| *b)
            .unwrap_or_default()
    }

    /// Prediction counts as `[may_not_return, likely_to_return]`
    pub fn get_label_counts(&self) -> [u64; 2] {
        self.labels.read().map(|l| *l).unwrap_or_default()
    }

    pub fn get_failures_by_kind(&self) -> HashMap<String, u64> {
        self.failures_by_kind
            .read()
            .map(|f| f.clone())
            .unwrap_or_default()
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let processed = self.requests_processed.load(Ordering::Relaxed);
        let failed = self.requests_failed.load(Ordering::Relaxed);
        let explained = self.explanations_served.load(Ordering::Relaxed);
        let failure_rate = if processed > 0 {
            (failed as f64 / processed as f64) * 100.0
        } else {
            0.0
        };

        let processing = self.get_processing_stats();
        let [may_not_return, likely_to_return] = self.get_label_counts();
        let distribution = self.get_probability_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            CLIENT RETENTION SERVICE - METRICS SUMMARY        ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Requests Processed: {:>8}  │  Throughput: {:>6.1} req/s  ║",
            processed,
            self.get_throughput()
        );
        info!(
            "║ Failed Requests:    {:>8}  │  Failure Rate: {:>6.1}%    ║",
            failed, failure_rate
        );
        info!("║ Explanations Served: {:>7}                                 ║", explained);
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Likely to return: {:>8}  │  May not return: {:>8}      ║",
            likely_to_return, may_not_return
        );
        for (kind, count) in &self.get_failures_by_kind() {
            info!("║   {:12}: {:>6} failures                              ║", kind, count);
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Return Probability Distribution:                             ║");
        let total: u64 = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate() {
            let pct = if total > 0 {
                (count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            let bar = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Prints a metrics summary at a fixed interval
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    /// Run the reporting loop
    pub async fn start(self) {
        let mut interval = tokio::time::interval(self.interval);
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
