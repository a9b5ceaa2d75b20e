//! Quorum metrics
//!
//! Counters for every quorum decision a node makes plus latency histograms
//! for coordinated writes and reads, rendered in Prometheus text format.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Histogram bucket boundaries for latency measurements (in milliseconds)
const LATENCY_BUCKETS: [f64; 11] = [
    1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0,
];

/// A simple histogram implementation for latency tracking
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<AtomicU64>,
    boundaries: Vec<f64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    /// Create a new histogram with default latency buckets
    pub fn new() -> Self {
        Self::with_buckets(&LATENCY_BUCKETS)
    }

    /// Create a histogram with custom bucket boundaries
    pub fn with_buckets(boundaries: &[f64]) -> Self {
        let buckets = (0..=boundaries.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            boundaries: boundaries.to_vec(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a value in the histogram
    pub fn observe(&self, value: f64) {
        let bucket_idx = self
            .boundaries
            .iter()
            .position(|&boundary| value <= boundary)
            .unwrap_or(self.boundaries.len());

        self.buckets[bucket_idx].fetch_add(1, Ordering::Relaxed);
        // stored as microseconds
        self.sum
            .fetch_add((value * 1000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_duration(&self, elapsed: Duration) {
        self.observe(elapsed.as_secs_f64() * 1000.0);
    }

    /// Cumulative bucket counts, ending with +Inf
    pub fn get_buckets(&self) -> Vec<(f64, u64)> {
        let mut cumulative = 0u64;
        let mut result = Vec::with_capacity(self.boundaries.len() + 1);

        for (i, &boundary) in self.boundaries.iter().enumerate() {
            cumulative += self.buckets[i].load(Ordering::Relaxed);
            result.push((boundary, cumulative));
        }

        cumulative += self.buckets[self.boundaries.len()].load(Ordering::Relaxed);
        result.push((f64::INFINITY, cumulative));

        result
    }

    /// Get sum of all observed values
    pub fn sum(&self) -> f64 {
        self.sum.load(Ordering::Relaxed) as f64 / 1000.0
    }

    /// Get count of observations
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonic counter
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Per-node quorum metrics
#[derive(Debug)]
pub struct NodeMetrics {
    pub writes_acked: Counter,
    pub writes_quorum_failed: Counter,
    pub reads_served: Counter,
    pub reads_not_found: Counter,
    pub reads_quorum_failed: Counter,
    pub replications_ok: Counter,
    pub replications_failed: Counter,
    pub replicas_applied: Counter,
    pub remote_reads_failed: Counter,
    pub forbidden: Counter,
    pub write_latency: Histogram,
    pub read_latency: Histogram,

    start_time: Instant,
}

impl NodeMetrics {
    pub fn new() -> Self {
        Self {
            writes_acked: Counter::new(),
            writes_quorum_failed: Counter::new(),
            reads_served: Counter::new(),
            reads_not_found: Counter::new(),
            reads_quorum_failed: Counter::new(),
            replications_ok: Counter::new(),
            replications_failed: Counter::new(),
            replicas_applied: Counter::new(),
            remote_reads_failed: Counter::new(),
            forbidden: Counter::new(),
            write_latency: Histogram::new(),
            read_latency: Histogram::new(),
            start_time: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-compatible metrics output
    pub fn to_prometheus(&self, node_id: &str) -> String {
        let mut out = String::new();

        let counters: [(&str, &str, &Counter); 10] = [
            ("quorumkv_writes_acked_total", "Writes acknowledged with W confirmations", &self.writes_acked),
            ("quorumkv_writes_quorum_failed_total", "Writes that did not reach W", &self.writes_quorum_failed),
            ("quorumkv_reads_served_total", "Reads answered with a record", &self.reads_served),
            ("quorumkv_reads_not_found_total", "Reads where no responder had the key", &self.reads_not_found),
            ("quorumkv_reads_quorum_failed_total", "Reads that did not reach R", &self.reads_quorum_failed),
            ("quorumkv_replications_ok_total", "Successful replicate calls to peers", &self.replications_ok),
            ("quorumkv_replications_failed_total", "Failed replicate calls to peers", &self.replications_failed),
            ("quorumkv_replicas_applied_total", "Replicated writes applied on this node", &self.replicas_applied),
            ("quorumkv_remote_reads_failed_total", "Failed remote reads to peers", &self.remote_reads_failed),
            ("quorumkv_forbidden_total", "Requests rejected by topology role", &self.forbidden),
        ];

        for (name, help, counter) in counters {
            let _ = writeln!(out, "# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} counter", name);
            let _ = writeln!(out, "{}{{node=\"{}\"}} {}", name, node_id, counter.get());
        }

        let _ = writeln!(out, "# HELP quorumkv_uptime_seconds Node uptime in seconds");
        let _ = writeln!(out, "# TYPE quorumkv_uptime_seconds gauge");
        let _ = writeln!(
            out,
            "quorumkv_uptime_seconds{{node=\"{}\"}} {}",
            node_id,
            self.uptime_seconds()
        );

        write_histogram(&mut out, "quorumkv_write_duration_ms", node_id, &self.write_latency);
        write_histogram(&mut out, "quorumkv_read_duration_ms", node_id, &self.read_latency);

        out
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn write_histogram(out: &mut String, name: &str, node_id: &str, hist: &Histogram) {
    let _ = writeln!(out, "# TYPE {} histogram", name);
    for (le, count) in hist.get_buckets() {
        if le.is_infinite() {
            let _ = writeln!(
                out,
                "{}_bucket{{node=\"{}\",le=\"+Inf\"}} {}",
                name, node_id, count
            );
        } else {
            let _ = writeln!(
                out,
                "{}_bucket{{node=\"{}\",le=\"{}\"}} {}",
                name, node_id, le, count
            );
        }
    }
    let _ = writeln!(out, "{}_sum{{node=\"{}\"}} {}", name, node_id, hist.sum());
    let _ = writeln!(out, "{}_count{{node=\"{}\"}} {}", name, node_id, hist.count());
}
