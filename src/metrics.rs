//! Request metrics and periodic summaries for the prediction service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

const MAX_SAMPLES: usize = 10_000;

/// Prediction endpoint families tracked separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Predict,
    Ensemble,
    Explain,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Predict => "predict",
            Endpoint::Ensemble => "ensemble",
            Endpoint::Explain => "explain",
        }
    }
}

/// Metrics collector shared by all handlers
pub struct ServiceMetrics {
    /// Successful predictions
    pub predictions: AtomicU64,
    /// Requests rejected or failed
    pub failures: AtomicU64,
    /// Client errors (400) among failures
    pub client_errors: AtomicU64,
    /// Ensemble responses that used a synthesized secondary probability
    pub demo_predictions: AtomicU64,
    requests_by_endpoint: RwLock<HashMap<Endpoint, u64>>,
    /// Keyed by endpoint too: single-model and ensemble tiers share labels
    predictions_by_tier: RwLock<HashMap<(Endpoint, &'static str), u64>>,
    /// Latencies in microseconds
    latencies: RwLock<Vec<u64>>,
    probability_buckets: RwLock<[u64; 10]>,
    /// 1 when the two ensemble members agreed on the class, else 0
    agreements: RwLock<Vec<f64>>,
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            predictions: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            client_errors: AtomicU64::new(0),
            demo_predictions: AtomicU64::new(0),
            requests_by_endpoint: RwLock::new(HashMap::new()),
            predictions_by_tier: RwLock::new(HashMap::new()),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            probability_buckets: RwLock::new([0; 10]),
            agreements: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    fn count_request(&self, endpoint: Endpoint) {
        if let Ok(mut by_endpoint) = self.requests_by_endpoint.write() {
            *by_endpoint.entry(endpoint).or_insert(0) += 1;
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(
        &self,
        endpoint: Endpoint,
        latency: Duration,
        probability: f64,
        risk_tier: &'static str,
    ) {
        self.predictions.fetch_add(1, Ordering::Relaxed);
        self.count_request(endpoint);

        if let Ok(mut latencies) = self.latencies.write() {
            latencies.push(latency.as_micros() as u64);
            if latencies.len() > MAX_SAMPLES {
                latencies.drain(0..MAX_SAMPLES / 2);
            }
        }

        let bucket = (probability.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
        if let Ok(mut buckets) = self.probability_buckets.write() {
            buckets[bucket] += 1;
        }

        if let Ok(mut by_tier) = self.predictions_by_tier.write() {
            *by_tier.entry((endpoint, risk_tier)).or_insert(0) += 1;
        }
    }

    /// Record a failed request
    pub fn record_failure(&self, endpoint: Endpoint, client_error: bool) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        if client_error {
            self.client_errors.fetch_add(1, Ordering::Relaxed);
        }
        self.count_request(endpoint);
    }

    /// Record whether the ensemble members agreed on the class
    pub fn record_ensemble(&self, rf_prediction: u8, nn_prediction: u8, simulated: bool) {
        if simulated {
            self.demo_predictions.fetch_add(1, Ordering::Relaxed);
        }
        if let Ok(mut agreements) = self.agreements.write() {
            agreements.push(if rf_prediction == nn_prediction { 1.0 } else { 0.0 });
            if agreements.len() > MAX_SAMPLES {
                agreements.drain(0..MAX_SAMPLES / 2);
            }
        }
    }

    /// Latency statistics over the retained window
    pub fn latency_stats(&self) -> LatencyStats {
        let mut sorted = match self.latencies.read() {
            Ok(latencies) if !latencies.is_empty() => latencies.clone(),
            _ => return LatencyStats::default(),
        };
        sorted.sort_unstable();

        let count = sorted.len();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sorted.iter().sum::<u64>() / count as u64,
            p50_us: at(0.5),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Fraction of ensemble calls where both members agreed
    pub fn agreement_rate(&self) -> f64 {
        match self.agreements.read() {
            Ok(a) if !a.is_empty() => a.iter().sum::<f64>() / a.len() as f64,
            _ => 0.0,
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

    pub fn probability_distribution(&self) -> [u64; 10] {
        self.probability_buckets
            .read()
            .map(|b| *b)
            .unwrap_or_default()
    }

    pub fn requests_by_endpoint(&self) -> HashMap<Endpoint, u64> {
        self.requests_by_endpoint
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn predictions_by_tier(&self) -> HashMap<(Endpoint, &'static str), u64> {
        self.predictions_by_tier
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Log a summary of everything collected so far
    pub fn log_summary(&self) {
        let predictions = self.predictions.load(Ordering::Relaxed);
        let failures = self.failures.load(Ordering::Relaxed);
        let latency = self.latency_stats();

        info!(
            predictions,
            failures,
            client_errors = self.client_errors.load(Ordering::Relaxed),
            demo_predictions = self.demo_predictions.load(Ordering::Relaxed),
            throughput = %format!("{:.2}/s", self.throughput()),
            agreement = %format!("{:.1}%", self.agreement_rate() * 100.0),
            "Metrics summary"
        );
        info!(
            mean_us = latency.mean_us,
            p50_us = latency.p50_us,
            p95_us = latency.p95_us,
            p99_us = latency.p99_us,
            max_us = latency.max_us,
            "Prediction latency"
        );

        for (endpoint, count) in self.requests_by_endpoint() {
            info!(endpoint = endpoint.as_str(), requests = count, "Requests by endpoint");
        }
        for ((endpoint, tier), count) in self.predictions_by_tier() {
            info!(endpoint = endpoint.as_str(), risk_level = tier, count, "Predictions by risk level");
        }

        let distribution = self.probability_distribution();
        let total: u64 = distribution.iter().sum();
        if total > 0 {
            for (i, &count) in distribution.iter().enumerate() {
                let pct = count as f64 / total as f64 * 100.0;
                info!(
                    "  {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                    i as f64 / 10.0,
                    (i + 1) as f64 / 10.0,
                    count,
                    pct,
                    "█".repeat(((pct / 2.0) as usize).min(20))
                );
            }
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodic summary logger
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

    /// Run forever, logging a summary every interval
    pub async fn start(self) {
        if self.interval_secs == 0 {
            return;
        }
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // first tick fires immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.log_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = ServiceMetrics::new();

        metrics.record_prediction(Endpoint::Predict, Duration::from_micros(100), 0.5, "Moderate Risk");
        metrics.record_prediction(Endpoint::Ensemble, Duration::from_micros(300), 1.0, "Very High Risk");
        metrics.record_failure(Endpoint::Predict, true);

        assert_eq!(metrics.predictions.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.failures.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.client_errors.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.requests_by_endpoint()[&Endpoint::Predict], 2);

        let distribution = metrics.probability_distribution();
        assert_eq!(distribution[5], 1);
        assert_eq!(distribution[9], 1);
        assert_eq!(
            metrics.predictions_by_tier()[&(Endpoint::Ensemble, "Very High Risk")],
            1
        );
    }

    #[test]
    fn test_tier_counts_kept_per_scheme() {
        use crate::types::prediction::{EnsembleRiskLevel, RiskLevel};

        let metrics = ServiceMetrics::new();
        let single = RiskLevel::from_probability(0.9);
        let blended = EnsembleRiskLevel::from_probability(0.5);
        // both schemes label these "High Risk"
        assert_eq!(single.label(), blended.label());

        metrics.record_prediction(Endpoint::Predict, Duration::from_micros(50), 0.9, single.label());
        metrics.record_prediction(Endpoint::Ensemble, Duration::from_micros(50), 0.5, blended.label());

        let by_tier = metrics.predictions_by_tier();
        assert_eq!(by_tier.len(), 2);
        assert_eq!(by_tier[&(Endpoint::Predict, "High Risk")], 1);
        assert_eq!(by_tier[&(Endpoint::Ensemble, "High Risk")], 1);
    }

    #[test]
    fn test_latency_stats() {
        let metrics = ServiceMetrics::new();
        assert_eq!(metrics.latency_stats(), LatencyStats::default());

        for us in [100, 200, 300, 400] {
            metrics.record_prediction(Endpoint::Explain, Duration::from_micros(us), 0.1, "Low Risk");
        }
        let stats = metrics.latency_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean_us, 250);
        assert_eq!(stats.max_us, 400);
        assert_eq!(stats.p99_us, 400);
    }

    #[test]
    fn test_agreement_rate() {
        let metrics = ServiceMetrics::new();
        metrics.record_ensemble(1, 1, true);
        metrics.record_ensemble(1, 0, false);

        assert!((metrics.agreement_rate() - 0.5).abs() < 1e-12);
        assert_eq!(metrics.demo_predictions.load(Ordering::Relaxed), 1);
    }
}
