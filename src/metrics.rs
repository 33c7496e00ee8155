//! Service metrics and periodic reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Width of an estimate histogram bucket, in minutes
const BUCKET_MINUTES: f64 = 10.0;
const BUCKETS: usize = 12;
/// Latency samples kept for percentile calculation
const LATENCY_WINDOW: usize = 10_000;

/// Metrics collector for the prediction service
pub struct ServiceMetrics {
    /// Successful predictions
    pub predictions: AtomicU64,
    /// Requests whose inference failed
    pub failures: AtomicU64,
    /// Requests rejected before inference
    pub rejected: AtomicU64,
    /// Prediction latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Point estimates in 10-minute buckets, last bucket open-ended
    estimate_buckets: RwLock<[u64; BUCKETS]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            predictions: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            estimate_buckets: RwLock::new([0; BUCKETS]),
            start_time: Instant::now(),
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, latency: Duration, point_estimate: f64) {
        self.predictions.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.latencies.write() {
            times.push(latency.as_micros() as u64);
            if times.len() > LATENCY_WINDOW {
                times.drain(0..LATENCY_WINDOW / 2);
            }
        }

        let bucket = (point_estimate.max(0.0) / BUCKET_MINUTES) as usize;
        if let Ok(mut buckets) = self.estimate_buckets.write() {
            buckets[bucket.min(BUCKETS - 1)] += 1;
        }
    }

    /// Record a failed inference
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request rejected at the boundary
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Latency statistics over the sample window
    pub fn latency_stats(&self) -> LatencyStats {
        let mut sorted = match self.latencies.read() {
            Ok(times) => times.clone(),
            Err(_) => return LatencyStats::default(),
        };
        if sorted.is_empty() {
            return LatencyStats::default();
        }
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let percentile = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: percentile(0.50),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Successful predictions per second since start
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn estimate_distribution(&self) -> [u64; BUCKETS] {
        self.estimate_buckets
            .read()
            .map(|buckets| *buckets)
            .unwrap_or([0; BUCKETS])
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let predictions = self.predictions.load(Ordering::Relaxed);
        let failures = self.failures.load(Ordering::Relaxed);
        let rejected = self.rejected.load(Ordering::Relaxed);
        let latency = self.latency_stats();
        let distribution = self.estimate_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║          DELIVERY TIME PREDICTOR - METRICS SUMMARY           ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Predictions: {:>8}  │  Throughput: {:>8.1} req/s            ║",
            predictions,
            self.throughput()
        );
        info!(
            "║ Failures:    {:>8}  │  Rejected:   {:>8}                  ║",
            failures, rejected
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Latency (μs): mean={:>6} p50={:>6} p95={:>6} p99={:>6}   ║",
            latency.mean_us, latency.p50_us, latency.p95_us, latency.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Estimate Distribution (minutes):                             ║");
        let total: u64 = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate() {
            let pct = if total > 0 {
                (count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            let bar: String = "█".repeat(((pct / 5.0) as usize).min(20));
            let label = if i == BUCKETS - 1 {
                format!("{:>3}+    ", i * 10)
            } else {
                format!("{:>3}-{:<3} ", i * 10, (i + 1) * 10)
            };
            info!("║   {}: {:>6} ({:>5.1}%) {}", label, count, pct, bar);
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Prediction latency statistics
#[derive(Debug, Default)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodic metrics reporter
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
