//! Worker statistics
//!
//! Lock-free metrics collection, one cache-line-aligned block per
//! worker so counters never bounce between cores.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Per-worker stats (cache-line aligned)
#[repr(C, align(64))]
pub struct WorkerStats {
    /// Packets pulled from sources
    pub rx_packets: AtomicU64,
    /// Bytes pulled from sources
    pub rx_bytes: AtomicU64,
    /// Packets handed to a dispatch queue
    pub dispatched: AtomicU64,
    /// Packets refused for an unbound ingress interface
    pub unbound: AtomicU64,
    /// Packets lost at dispatch (queue full or closed)
    pub dropped: AtomicU64,
}

impl Default for WorkerStats {
    fn default() -> Self {
        Self {
            rx_packets: AtomicU64::new(0),
            rx_bytes: AtomicU64::new(0),
            dispatched: AtomicU64::new(0),
            unbound: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }
}

impl WorkerStats {
    /// Count a packet pulled from a source
    #[inline(always)]
    pub fn record_rx(&self, bytes: u64) {
        self.rx_packets.fetch_add(1, Ordering::Relaxed);
        self.rx_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Count a successful dispatch
    #[inline(always)]
    pub fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an unbound-interface refusal
    #[inline(always)]
    pub fn record_unbound(&self) {
        self.unbound.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a packet lost at dispatch
    #[inline(always)]
    pub fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            rx_packets: self.rx_packets.load(Ordering::Relaxed),
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            unbound: self.unbound.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Stats snapshot (non-atomic)
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkerStatsSnapshot {
    /// Packets pulled from sources
    pub rx_packets: u64,
    /// Bytes pulled from sources
    pub rx_bytes: u64,
    /// Packets handed to a dispatch queue
    pub dispatched: u64,
    /// Packets refused for an unbound ingress interface
    pub unbound: u64,
    /// Packets lost at dispatch
    pub dropped: u64,
}

impl WorkerStatsSnapshot {
    /// dispatched / rx_packets
    pub fn dispatch_rate(&self) -> f64 {
        if self.rx_packets == 0 {
            return 0.0;
        }
        self.dispatched as f64 / self.rx_packets as f64
    }
}

/// Aggregate stats across all workers
pub struct DataPlaneStats {
    workers: Vec<WorkerStats>,
}

impl DataPlaneStats {
    /// Zeroed blocks for `num_workers` workers
    pub fn new(num_workers: usize) -> Self {
        let mut workers = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            workers.push(WorkerStats::default());
        }
        Self { workers }
    }

    /// One worker's counter block
    pub fn worker(&self, idx: usize) -> &WorkerStats {
        &self.workers[idx]
    }

    /// Sum over all workers
    pub fn total(&self) -> WorkerStatsSnapshot {
        let mut total = WorkerStatsSnapshot::default();
        for worker in &self.workers {
            let snap = worker.snapshot();
            total.rx_packets += snap.rx_packets;
            total.rx_bytes += snap.rx_bytes;
            total.dispatched += snap.dispatched;
            total.unbound += snap.unbound;
            total.dropped += snap.dropped;
        }
        total
    }

    /// Snapshot of every worker block, in worker order
    pub fn per_worker(&self) -> Vec<WorkerStatsSnapshot> {
        self.workers.iter().map(WorkerStats::snapshot).collect()
    }
}
