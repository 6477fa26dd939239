//! # Collector de Métricas
//! src/metrics/collector.rs
//!
//! Cuenta conexiones, requests atendidos y fallas por conexión. Lo
//! comparten el accept loop y todos los threads de conexión.

use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Máximo de latencias a guardar (para calcular percentiles)
const MAX_LATENCIES: usize = 10_000;

/// Collector de métricas thread-safe
#[derive(Debug)]
pub struct MetricsCollector {
    inner: Mutex<MetricsData>,
    start_time: Instant,
}

#[derive(Debug, Default)]
struct MetricsData {
    connections_accepted: u64,
    active_connections: u64,
    requests_handled: u64,
    /// Requests por código escrito en la status line
    status_codes: BTreeMap<u16, u64>,
    parse_failures: u64,
    io_failures: u64,
    handler_failures: u64,
    /// Latencias registradas (en microsegundos), ventana de las últimas N
    latencies: VecDeque<u64>,
}

/// Snapshot serializable de las métricas
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections_accepted: u64,
    pub active_connections: u64,
    pub requests_handled: u64,
    pub status_codes: BTreeMap<u16, u64>,
    pub parse_failures: u64,
    pub io_failures: u64,
    pub handler_failures: u64,
    pub latency_p50_us: u64,
    pub latency_p95_us: u64,
    pub latency_p99_us: u64,
    pub latency_avg_us: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsData::default()),
            start_time: Instant::now(),
        }
    }

    fn data(&self) -> MutexGuard<'_, MetricsData> {
        // los contadores siguen siendo válidos aunque otro thread haya hecho panic
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn connection_opened(&self) {
        let mut data = self.data();
        data.connections_accepted += 1;
        data.active_connections += 1;
    }

    pub fn connection_closed(&self) {
        let mut data = self.data();
        data.active_connections = data.active_connections.saturating_sub(1);
    }

    pub fn active_connections(&self) -> u64 {
        self.data().active_connections
    }

    /// Registra un request atendido por el handler
    pub fn record_request(&self, status_code: Option<u16>, latency: Duration) {
        let mut data = self.data();
        data.requests_handled += 1;

        if let Some(code) = status_code {
            *data.status_codes.entry(code).or_insert(0) += 1;
        }

        if data.latencies.len() >= MAX_LATENCIES {
            data.latencies.pop_front();
        }
        let latency_us = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        data.latencies.push_back(latency_us);
    }

    pub fn record_parse_failure(&self) {
        self.data().parse_failures += 1;
    }

    pub fn record_io_failure(&self) {
        self.data().io_failures += 1;
    }

    pub fn record_handler_failure(&self) {
        self.data().handler_failures += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let data = self.data();
        let (p50, p95, p99, avg) = percentiles(&data.latencies);

        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            connections_accepted: data.connections_accepted,
            active_connections: data.active_connections,
            requests_handled: data.requests_handled,
            status_codes: data.status_codes.clone(),
            parse_failures: data.parse_failures,
            io_failures: data.io_failures,
            handler_failures: data.handler_failures,
            latency_p50_us: p50,
            latency_p95_us: p95,
            latency_p99_us: p99,
            latency_avg_us: avg,
        }
    }

    /// Snapshot en JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// (p50, p95, p99, promedio)
fn percentiles(latencies: &VecDeque<u64>) -> (u64, u64, u64, u64) {
    if latencies.is_empty() {
        return (0, 0, 0, 0);
    }

    let mut sorted: Vec<u64> = latencies.iter().copied().collect();
    sorted.sort_unstable();

    let len = sorted.len();
    let sum: u64 = sorted.iter().sum();

    (
        sorted[len * 50 / 100],
        sorted[len * 95 / 100],
        sorted[len * 99 / 100],
        sum / len as u64,
    )
}
