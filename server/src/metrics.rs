// Metrics collection and tracking

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

const LATENCY_SAMPLES: usize = 1000;

/// Synthesis latency, tracked per completed job.
#[derive(Debug)]
pub struct LatencyMetrics {
    count: AtomicU64,
    total_ms: AtomicU64,
    min_ms: AtomicU64,
    max_ms: AtomicU64,
    // Last LATENCY_SAMPLES observations, for percentiles.
    samples: Mutex<Vec<u64>>,
}

impl LatencyMetrics {
    pub fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            total_ms: AtomicU64::new(0),
            min_ms: AtomicU64::new(u64::MAX),
            max_ms: AtomicU64::new(0),
            samples: Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, latency_ms: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.min_ms.fetch_min(latency_ms, Ordering::Relaxed);
        self.max_ms.fetch_max(latency_ms, Ordering::Relaxed);

        if let Ok(mut samples) = self.samples.lock() {
            samples.push(latency_ms);
            if samples.len() > LATENCY_SAMPLES {
                samples.remove(0);
            }
        }
    }

    pub fn avg_ms(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.total_ms.load(Ordering::Relaxed) as f64 / count as f64
    }

    fn percentile(&self, p: u8) -> u64 {
        let Ok(samples) = self.samples.lock() else {
            return 0;
        };
        if samples.is_empty() {
            return 0;
        }
        let mut sorted = samples.clone();
        sorted.sort_unstable();
        let index = (sorted.len() * p as usize / 100).min(sorted.len() - 1);
        sorted[index]
    }

    pub fn stats(&self) -> LatencyStats {
        let count = self.count.load(Ordering::Relaxed);
        LatencyStats {
            count,
            avg_ms: self.avg_ms(),
            min_ms: if count == 0 { 0 } else { self.min_ms.load(Ordering::Relaxed) },
            max_ms: self.max_ms.load(Ordering::Relaxed),
            p50_ms: self.percentile(50),
            p95_ms: self.percentile(95),
            p99_ms: self.percentile(99),
        }
    }
}

impl Default for LatencyMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Gateway-wide counters shared by every session.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    pub connections_total: AtomicU64,
    pub messages_received: AtomicU64,
    pub synthesize_requests: AtomicU64,
    pub get_voices_requests: AtomicU64,
    pub ping_requests: AtomicU64,
    pub protocol_errors: AtomicU64,
    pub validation_errors: AtomicU64,
    pub synthesis_errors: AtomicU64,
    pub transport_errors: AtomicU64,
    pub syntheses_completed: AtomicU64,
    pub chunks_sent: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub synthesis_latency: LatencyMetrics,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, kind: &str) {
        let counter = match kind {
            "synthesize" => &self.synthesize_requests,
            "get_voices" => &self.get_voices_requests,
            "ping" => &self.ping_requests,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, kind: &str) {
        let counter = match kind {
            "protocol" => &self.protocol_errors,
            "validation" => &self.validation_errors,
            "synthesis" => &self.synthesis_errors,
            "transport" => &self.transport_errors,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_chunk(&self, bytes: usize) {
        self.chunks_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self, active_sessions: usize, uptime_seconds: u64) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            timestamp: Utc::now(),
            uptime_seconds,
            active_sessions,
            connections_total: load(&self.connections_total),
            messages_received: load(&self.messages_received),
            requests: RequestCounts {
                synthesize: load(&self.synthesize_requests),
                get_voices: load(&self.get_voices_requests),
                ping: load(&self.ping_requests),
            },
            errors: ErrorCounts {
                protocol: load(&self.protocol_errors),
                validation: load(&self.validation_errors),
                synthesis: load(&self.synthesis_errors),
                transport: load(&self.transport_errors),
            },
            syntheses_completed: load(&self.syntheses_completed),
            chunks_sent: load(&self.chunks_sent),
            bytes_sent: load(&self.bytes_sent),
            synthesis_latency: self.synthesis_latency.stats(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub active_sessions: usize,
    pub connections_total: u64,
    pub messages_received: u64,
    pub requests: RequestCounts,
    pub errors: ErrorCounts,
    pub syntheses_completed: u64,
    pub chunks_sent: u64,
    pub bytes_sent: u64,
    pub synthesis_latency: LatencyStats,
}

#[derive(Debug, Serialize)]
pub struct RequestCounts {
    pub synthesize: u64,
    pub get_voices: u64,
    pub ping: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorCounts {
    pub protocol: u64,
    pub validation: u64,
    pub synthesis: u64,
    pub transport: u64,
}

#[derive(Debug, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    pub avg_ms: f64,
    pub min_ms: u64,
    pub max_ms: u64,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
}
