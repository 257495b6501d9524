//! Throughput, latency and risk distribution tracking for the scorer.

use crate::types::score::{RiskTier, ScoredCustomer};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for scoring runs
pub struct ScoringMetrics {
    /// Records scored successfully
    pub records_scored: AtomicU64,
    /// Records rejected (parse, validation, schema or encoding failures)
    pub records_failed: AtomicU64,
    high: AtomicU64,
    medium: AtomicU64,
    low: AtomicU64,
    /// Per-batch scoring times (in microseconds)
    batch_times: RwLock<Vec<u64>>,
    /// Probability distribution buckets
    probability_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl ScoringMetrics {
    pub fn new() -> Self {
        Self {
            records_scored: AtomicU64::new(0),
            records_failed: AtomicU64::new(0),
            high: AtomicU64::new(0),
            medium: AtomicU64::new(0),
            low: AtomicU64::new(0),
            batch_times: RwLock::new(Vec::with_capacity(1000)),
            probability_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a successfully scored customer
    pub fn record_score(&self, scored: &ScoredCustomer) {
        self.records_scored.fetch_add(1, Ordering::Relaxed);
        let tier = match scored.risk_tier() {
            RiskTier::High => &self.high,
            RiskTier::Medium => &self.medium,
            RiskTier::Low => &self.low,
        };
        tier.fetch_add(1, Ordering::Relaxed);

        let bucket = ((scored.probability() * 10.0) as usize).min(9);
        self.probability_buckets.write()[bucket] += 1;
    }

    /// Record a rejected record
    pub fn record_failure(&self) {
        self.records_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record how long a batch took to score
    pub fn record_batch(&self, elapsed: Duration) {
        let mut times = self.batch_times.write();
        times.push(elapsed.as_micros() as u64);
        // Keep only the most recent samples
        if times.len() > 10000 {
            times.drain(0..5000);
        }
    }

    /// Batch latency statistics
    pub fn get_batch_stats(&self) -> LatencyStats {
        let mut sorted = self.batch_times.read().clone();
        if sorted.is_empty() {
            return LatencyStats::default();
        }
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let pct = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: pct(0.5),
            p95_us: pct(0.95),
            p99_us: pct(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Records scored per second since start
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.records_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_probability_distribution(&self) -> [u64; 10] {
        *self.probability_buckets.read()
    }

    /// (high, medium, low) counts so far
    pub fn get_tier_counts(&self) -> (u64, u64, u64) {
        (
            self.high.load(Ordering::Relaxed),
            self.medium.load(Ordering::Relaxed),
            self.low.load(Ordering::Relaxed),
        )
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let scored = self.records_scored.load(Ordering::Relaxed);
        let failed = self.records_failed.load(Ordering::Relaxed);
        let (high, medium, low) = self.get_tier_counts();
        let batches = self.get_batch_stats();
        let distribution = self.get_probability_distribution();
        let share = |n: u64| {
            if scored > 0 {
                n as f64 / scored as f64 * 100.0
            } else {
                0.0
            }
        };

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║              CHURN SCORER - METRICS SUMMARY                  ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Records Scored: {:>8}  │  Throughput: {:>8.1} rec/s        ║",
            scored,
            self.get_throughput()
        );
        info!("║ Records Failed: {:>8}                                      ║", failed);
        info!(
            "║ Batch Time (μs): mean={:>6} p50={:>6} p95={:>6} p99={:>6}  ║",
            batches.mean_us, batches.p50_us, batches.p95_us, batches.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Risk Tiers:                                                  ║");
        info!("║   High  : {:>8} ({:>5.1}%)                                  ║", high, share(high));
        info!("║   Medium: {:>8} ({:>5.1}%)                                  ║", medium, share(medium));
        info!("║   Low   : {:>8} ({:>5.1}%)                                  ║", low, share(low));
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Churn Probability Distribution:                              ║");
        for (i, &count) in distribution.iter().enumerate() {
            let pct = share(count);
            let bar = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>8} ({:>5.1}%) {}",
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

impl Default for ScoringMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics
#[derive(Debug, Default, PartialEq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Prints a metrics summary on a fixed interval
pub struct MetricsReporter {
    metrics: Arc<ScoringMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ScoringMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Run the periodic reporting loop
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // First tick fires immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
