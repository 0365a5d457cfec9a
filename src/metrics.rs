//! Performance metrics and statistics tracking for the classifier worker.

use crate::types::classification::ClassificationResult;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for classifier performance
pub struct ClassifierMetrics {
    /// Total scans processed
    pub scans_processed: AtomicU64,
    /// Scans answered with a real classification
    pub scans_classified: AtomicU64,
    /// Real classifications that met threshold and margin
    pub threshold_met: AtomicU64,
    /// Fallbacks by kind
    fallbacks_by_kind: RwLock<HashMap<String, u64>>,
    /// Real classifications by disease
    predictions_by_disease: RwLock<HashMap<String, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Confidence distribution buckets for real classifications
    confidence_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ClassifierMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            scans_processed: AtomicU64::new(0),
            scans_classified: AtomicU64::new(0),
            threshold_met: AtomicU64::new(0),
            fallbacks_by_kind: RwLock::new(HashMap::new()),
            predictions_by_disease: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            confidence_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a processed scan
    pub fn record_scan(&self, processing_time: Duration, result: &ClassificationResult) {
        self.scans_processed.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        if !result.success {
            let kind = result
                .fallback_kind
                .map(|k| k.as_str())
                .unwrap_or("unknown");
            if let Ok(mut by_kind) = self.fallbacks_by_kind.write() {
                *by_kind.entry(kind.to_string()).or_insert(0) += 1;
            }
            return;
        }

        self.scans_classified.fetch_add(1, Ordering::Relaxed);
        if result.meets_threshold {
            self.threshold_met.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut by_disease) = self.predictions_by_disease.write() {
            *by_disease
                .entry(result.disease_key.as_str().to_string())
                .or_insert(0) += 1;
        }

        let bucket = ((result.confidence as f64) * 10.0).clamp(0.0, 9.0) as usize;
        if let Ok(mut buckets) = self.confidence_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let times = self
            .processing_times
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        drop(times);
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();
        let percentile = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: percentile(0.50),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Fraction of scans that fell back (0.0 - 1.0)
    pub fn fallback_rate(&self) -> f64 {
        let processed = self.scans_processed.load(Ordering::Relaxed);
        if processed == 0 {
            return 0.0;
        }
        let classified = self.scans_classified.load(Ordering::Relaxed);
        processed.saturating_sub(classified) as f64 / processed as f64
    }

    /// Get current throughput (scans per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.scans_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get confidence distribution
    pub fn get_confidence_distribution(&self) -> [u64; 10] {
        *self
            .confidence_buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Get fallbacks by kind
    pub fn get_fallbacks_by_kind(&self) -> HashMap<String, u64> {
        self.fallbacks_by_kind
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Get real classifications by disease
    pub fn get_predictions_by_disease(&self) -> HashMap<String, u64> {
        self.predictions_by_disease
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let processed = self.scans_processed.load(Ordering::Relaxed);
        let classified = self.scans_classified.load(Ordering::Relaxed);
        let threshold_met = self.threshold_met.load(Ordering::Relaxed);
        let actionable_rate = if classified > 0 {
            (threshold_met as f64 / classified as f64) * 100.0
        } else {
            0.0
        };

        let processing = self.get_processing_stats();
        let throughput = self.get_throughput();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║              LEAF CLASSIFIER - METRICS SUMMARY               ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Scans Processed: {:>8}  │  Throughput: {:>6.1} scans/s      ║",
            processed, throughput
        );
        info!(
            "║ Classified:      {:>8}  │  Fallback Rate: {:>5.1}%          ║",
            classified,
            self.fallback_rate() * 100.0
        );
        info!(
            "║ Actionable:      {:>8}  │  Of Classified: {:>5.1}%          ║",
            threshold_met, actionable_rate
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>6} p50={:>6} p95={:>6} p99={:>6} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Predictions by Disease:                                      ║");
        for (disease, count) in &self.get_predictions_by_disease() {
            info!("║   {:18}: {:>6}                                 ║", disease, count);
        }
        info!("║ Fallbacks by Kind:                                           ║");
        for (kind, count) in &self.get_fallbacks_by_kind() {
            info!("║   {:20}: {:>6}                               ║", kind, count);
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Confidence Distribution:                                     ║");
        let distribution = self.get_confidence_distribution();
        let total: u64 = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
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

impl Default for ClassifierMetrics {
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

/// Periodic metrics reporter
pub struct MetricsReporter {
    metrics: Arc<ClassifierMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ClassifierMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
