//! Catalog Metrics
//!
//! Counters for ingestion and discovery activity. Discovery failures are
//! reported here and in the logs, never through the search API.

use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Atomic counter for thread-safe incrementing
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

    /// Increment the counter by 1
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the counter by a value
    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Atomic gauge for thread-safe value tracking
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Running total of discovery pass durations
#[derive(Debug, Default)]
pub struct DurationStat {
    sum_micros: AtomicU64,
    count: AtomicU64,
}

impl DurationStat {
    pub fn observe(&self, duration: Duration) {
        self.sum_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Total observed time in seconds
    pub fn sum_secs(&self) -> f64 {
        self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }

    /// Mean duration in milliseconds
    pub fn mean_ms(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.sum_micros.load(Ordering::Relaxed) as f64 / count as f64 / 1000.0
    }
}

/// All catalog metrics
#[derive(Debug, Default)]
pub struct CatalogMetrics {
    // Ingestion
    pub records_applied: Counter,
    pub records_discarded: Counter,
    pub subtree_swaps: Counter,

    // Discovery
    pub passes_started: Counter,
    pub passes_completed: Counter,
    pub passes_failed: Counter,
    pub pass_duration: DurationStat,

    // Workers
    pub active_workers: Gauge,
}

impl CatalogMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shareable metrics instance
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Take a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_applied: self.records_applied.get(),
            records_discarded: self.records_discarded.get(),
            subtree_swaps: self.subtree_swaps.get(),
            passes_started: self.passes_started.get(),
            passes_completed: self.passes_completed.get(),
            passes_failed: self.passes_failed.get(),
            pass_duration_ms: self.pass_duration.mean_ms(),
            active_workers: self.active_workers.get(),
        }
    }

    /// Export all metrics in Prometheus exposition format
    pub fn to_prometheus(&self) -> String {
        let mut out = String::with_capacity(1024);

        write_counter(&mut out, "seriesdex_records_applied_total", "Records applied to the catalog", self.records_applied.get());
        write_counter(&mut out, "seriesdex_records_discarded_total", "Records discarded as stale", self.records_discarded.get());
        write_counter(&mut out, "seriesdex_subtree_swaps_total", "Origin subtrees replaced after a discovery pass", self.subtree_swaps.get());

        write_counter(&mut out, "seriesdex_passes_started_total", "Discovery passes started", self.passes_started.get());
        write_counter(&mut out, "seriesdex_passes_completed_total", "Discovery passes completed", self.passes_completed.get());
        write_counter(&mut out, "seriesdex_passes_failed_total", "Discovery passes failed", self.passes_failed.get());

        write_summary(
            &mut out,
            "seriesdex_pass_duration_seconds",
            "Duration of completed discovery passes",
            &self.pass_duration,
        );

        write_gauge(&mut out, "seriesdex_active_workers", "Running origin workers", self.active_workers.get());

        out
    }
}

fn write_counter(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} counter", name);
    let _ = writeln!(out, "{} {}", name, value);
    let _ = writeln!(out);
}

fn write_summary(out: &mut String, name: &str, help: &str, stat: &DurationStat) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} summary", name);
    let _ = writeln!(out, "{}_sum {}", name, stat.sum_secs());
    let _ = writeln!(out, "{}_count {}", name, stat.count());
    let _ = writeln!(out);
}

fn write_gauge(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} gauge", name);
    let _ = writeln!(out, "{} {}", name, value);
    let _ = writeln!(out);
}

/// Point-in-time snapshot of all metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub records_applied: u64,
    pub records_discarded: u64,
    pub subtree_swaps: u64,
    pub passes_started: u64,
    pub passes_completed: u64,
    pub passes_failed: u64,
    pub pass_duration_ms: f64,
    pub active_workers: u64,
}
