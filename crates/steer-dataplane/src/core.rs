//! Data plane engine
//!
//! Worker bring-up and the receive → classify → dispatch loop. Each
//! worker owns a disjoint set of packet sources and runs every packet
//! to completion through a shared [`Classifier`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use steer_classify::Classifier;
use steer_common::{SteerError, SteerResult};

use crate::source::PacketSource;
use crate::stats::{DataPlaneStats, WorkerStatsSnapshot};
use crate::{DEFAULT_POLL_BUDGET, MAX_WORKERS};

/// Data plane configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Worker thread count, capped at [`MAX_WORKERS`]
    pub num_workers: usize,
    /// Packets drained from one source per loop pass
    pub poll_budget: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            num_workers: default_workers(),
            poll_budget: DEFAULT_POLL_BUDGET,
        }
    }
}

/// One worker per core, leaving a core for the control plane when more
/// than one is available
fn default_workers() -> usize {
    let cores = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    let workers = if cores > 1 { cores - 1 } else { 1 };
    workers.min(MAX_WORKERS)
}

/// Data plane engine
///
/// Owns the worker threads pulling packets from registered sources into
/// the classifier. Consumers drain the per-class queues through
/// [`CosReceiver`](crate::CosReceiver); `stop` closes every queue and
/// unblocks them.
pub struct DataPlane {
    config: EngineConfig,
    classifier: Arc<Classifier>,
    running: Arc<AtomicBool>,
    workers: Vec<WorkerHandle>,
    sources: Vec<Box<dyn PacketSource>>,
    stats: Arc<DataPlaneStats>,
}

/// Per-worker handle
struct WorkerHandle {
    thread: Option<thread::JoinHandle<()>>,
    worker_id: usize,
}

impl DataPlane {
    /// Engine over `classifier`, with no sources registered yet
    pub fn new(config: EngineConfig, classifier: Arc<Classifier>) -> Self {
        let num_workers = config.num_workers.clamp(1, MAX_WORKERS);
        Self {
            stats: Arc::new(DataPlaneStats::new(num_workers)),
            config: EngineConfig {
                num_workers,
                ..config
            },
            classifier,
            running: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Register a packet source before starting
    ///
    /// Sources are distributed round-robin across the workers; each
    /// source is polled by exactly one worker.
    pub fn add_source(&mut self, source: Box<dyn PacketSource>) {
        self.sources.push(source);
    }

    /// Spawn the worker threads
    ///
    /// Spawns `min(num_workers, sources)` workers so every worker owns
    /// at least one source. Fails with [`SteerError::AlreadyRunning`] on
    /// a running engine and [`SteerError::ConfigError`] when no sources
    /// are registered.
    pub fn start(&mut self) -> SteerResult<()> {
        if self.running.load(Ordering::Acquire) {
            return Err(SteerError::AlreadyRunning);
        }
        if self.sources.is_empty() {
            return Err(SteerError::ConfigError(
                "no packet sources registered".into(),
            ));
        }

        self.running.store(true, Ordering::Release);

        let num_workers = self.config.num_workers.min(self.sources.len());
        let mut per_worker: Vec<Vec<Box<dyn PacketSource>>> =
            (0..num_workers).map(|_| Vec::new()).collect();
        for (idx, source) in self.sources.drain(..).enumerate() {
            per_worker[idx % num_workers].push(source);
        }

        for (worker_id, sources) in per_worker.into_iter().enumerate() {
            let worker = Worker {
                worker_id,
                classifier: Arc::clone(&self.classifier),
                running: Arc::clone(&self.running),
                stats: Arc::clone(&self.stats),
                sources,
                poll_budget: self.config.poll_budget,
            };

            let handle = thread::Builder::new()
                .name(format!("steer-worker-{}", worker_id))
                .spawn(move || worker.run())
                .map_err(|e| SteerError::SpawnFailed(e.to_string()))?;

            self.workers.push(WorkerHandle {
                thread: Some(handle),
                worker_id,
            });
        }

        tracing::info!("data plane started with {} workers", num_workers);
        Ok(())
    }

    /// Stop the workers and close every dispatch queue
    ///
    /// Workers finish their current pass before exiting; consumers
    /// blocked on receive wake with `QueueClosed` once the backlog is
    /// drained. Idempotent.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }

        for worker in &mut self.workers {
            if let Some(handle) = worker.thread.take() {
                let _ = handle.join();
                tracing::debug!("worker {} joined", worker.worker_id);
            }
        }
        self.workers.clear();

        self.classifier.close_queues();
        tracing::info!("data plane stopped");
    }

    /// Check if running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Spawned worker count (zero before start)
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Aggregate worker statistics
    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.stats.total()
    }

    /// Per-worker statistics, in worker order
    pub fn worker_stats(&self) -> Vec<WorkerStatsSnapshot> {
        self.stats.per_worker()
    }

    /// The classifier this engine drives
    pub fn classifier(&self) -> &Arc<Classifier> {
        &self.classifier
    }
}

impl Drop for DataPlane {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Per-thread worker: polls its sources and runs classify → dispatch to
/// completion for each packet
struct Worker {
    worker_id: usize,
    classifier: Arc<Classifier>,
    running: Arc<AtomicBool>,
    stats: Arc<DataPlaneStats>,
    sources: Vec<Box<dyn PacketSource>>,
    poll_budget: usize,
}

impl Worker {
    fn run(mut self) {
        tracing::debug!("worker {} starting", self.worker_id);

        while self.running.load(Ordering::Relaxed) {
            let drained = self.poll_sources();
            if self.sources.iter().all(|source| source.is_exhausted()) {
                break;
            }
            if drained == 0 {
                std::hint::spin_loop();
            }
        }

        tracing::debug!("worker {} stopped", self.worker_id);
    }

    /// One pass over the sources, up to `poll_budget` packets each
    #[inline]
    fn poll_sources(&mut self) -> usize {
        let stats = self.stats.worker(self.worker_id);
        let mut drained = 0;

        for source in &mut self.sources {
            for _ in 0..self.poll_budget {
                match source.poll() {
                    Some(pkt) => {
                        drained += 1;
                        stats.record_rx(pkt.len() as u64);
                        match self.classifier.process(pkt) {
                            Ok(_) => stats.record_dispatched(),
                            Err(SteerError::UnboundInterface(_)) => stats.record_unbound(),
                            Err(_) => stats.record_drop(),
                        }
                    }
                    None => break,
                }
            }
        }

        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receiver::CosReceiver;
    use crate::source::ChannelSource;
    use std::time::{Duration, Instant};
    use steer_common::packet::{ETHERTYPE_IPV4, IPPROTO_UDP};
    use steer_common::{InterfaceId, MatchField, RawPacket};

    fn udp_frame(dst_port: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 1]);
        frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 2]);
        frame.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());
        let total_len = (20 + 8 + payload.len()) as u16;
        frame.push(0x45);
        frame.push(0x00);
        frame.extend_from_slice(&total_len.to_be_bytes());
        frame.extend_from_slice(&[0, 0, 0x40, 0]);
        frame.push(64);
        frame.push(IPPROTO_UDP);
        frame.extend_from_slice(&[0, 0]);
        frame.extend_from_slice(&[192, 168, 1, 1]);
        frame.extend_from_slice(&[10, 0, 0, 1]);
        frame.extend_from_slice(&40000u16.to_be_bytes());
        frame.extend_from_slice(&dst_port.to_be_bytes());
        frame.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
        frame.extend_from_slice(&[0, 0]);
        frame.extend_from_slice(payload);
        frame
    }

    fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let end = Instant::now() + deadline;
        while Instant::now() < end {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        done()
    }

    #[test]
    fn test_engine_lifecycle() {
        let classifier = Arc::new(Classifier::new());
        let mut engine = DataPlane::new(
            EngineConfig {
                num_workers: 2,
                ..Default::default()
            },
            classifier,
        );
        let (injector, source) = ChannelSource::new();
        engine.add_source(Box::new(source));

        assert!(!engine.is_running());
        engine.start().unwrap();
        assert!(engine.is_running());
        // One source, so only one worker spawns
        assert_eq!(engine.num_workers(), 1);

        thread::sleep(Duration::from_millis(10));

        engine.stop();
        assert!(!engine.is_running());
        assert_eq!(engine.num_workers(), 0);
        drop(injector);
    }

    #[test]
    fn test_start_requires_sources() {
        let mut engine = DataPlane::new(EngineConfig::default(), Arc::new(Classifier::new()));
        assert!(matches!(
            engine.start(),
            Err(SteerError::ConfigError(_))
        ));
        assert!(!engine.is_running());
    }

    #[test]
    fn test_double_start_refused() {
        let mut engine = DataPlane::new(EngineConfig::default(), Arc::new(Classifier::new()));
        let (_injector, source) = ChannelSource::new();
        engine.add_source(Box::new(source));

        engine.start().unwrap();
        assert!(matches!(engine.start(), Err(SteerError::AlreadyRunning)));
        engine.stop();
    }

    #[test]
    fn test_default_worker_count() {
        let config = EngineConfig::default();
        assert!(config.num_workers >= 1);
        assert!(config.num_workers <= MAX_WORKERS);
    }

    #[test]
    fn test_end_to_end_udp_steering() {
        let classifier = Arc::new(Classifier::new());
        let cos_udp = classifier.create_class("cos_udp").unwrap();
        let cos_default = classifier.create_class("cos_default_eth1").unwrap();
        let eth1 = classifier.intern_interface("eth1");
        classifier
            .bind_interface(eth1, cos_default, cos_default)
            .unwrap();
        classifier
            .add_rule(MatchField::UdpDstPort, 54321, 0xFFFF, cos_default, cos_udp)
            .unwrap();

        let udp_rx = CosReceiver::attach(&classifier, "cos_udp").unwrap();
        let default_rx = CosReceiver::attach(&classifier, "cos_default_eth1").unwrap();

        let mut engine = DataPlane::new(
            EngineConfig {
                num_workers: 2,
                ..Default::default()
            },
            Arc::clone(&classifier),
        );
        let (injector, source) = ChannelSource::new();
        engine.add_source(Box::new(source));
        engine.start().unwrap();

        injector
            .inject(RawPacket::new(eth1, udp_frame(54321, b"ping")))
            .unwrap();
        injector
            .inject(RawPacket::new(eth1, udp_frame(12345, b"noise")))
            .unwrap();
        injector.inject(RawPacket::new(eth1, vec![0xAB; 5])).unwrap();

        // Matching UDP packet surfaces on the cos_udp receiver
        let matched = udp_rx
            .recv_timeout(Duration::from_secs(2))
            .unwrap()
            .expect("steered packet");
        assert_eq!(matched.udp_payload(), Some(&b"ping"[..]));
        assert_eq!(matched.iface, eth1);

        // The non-matching and unparseable packets fall to the default
        // class, which also serves as the error class here
        for _ in 0..2 {
            default_rx
                .recv_timeout(Duration::from_secs(2))
                .unwrap()
                .expect("default packet");
        }

        engine.stop();

        // Shutdown closed the queues and unblocks consumers
        assert!(matches!(udp_rx.recv(), Err(SteerError::QueueClosed)));
        assert!(matches!(default_rx.recv(), Err(SteerError::QueueClosed)));

        let stats = engine.stats();
        assert_eq!(stats.rx_packets, 3);
        assert_eq!(stats.dispatched, 3);
        assert_eq!(stats.dropped, 0);
        assert_eq!(stats.unbound, 0);

        let engine_stats = classifier.stats();
        assert_eq!(engine_stats.rule_hits, 1);
        assert_eq!(engine_stats.default_hits, 1);
        assert_eq!(engine_stats.parse_errors, 1);
    }

    #[test]
    fn test_unbound_packets_counted() {
        let classifier = Arc::new(Classifier::new());
        let mut engine = DataPlane::new(
            EngineConfig {
                num_workers: 1,
                ..Default::default()
            },
            Arc::clone(&classifier),
        );
        let (injector, source) = ChannelSource::new();
        engine.add_source(Box::new(source));
        engine.start().unwrap();

        injector
            .inject(RawPacket::new(InterfaceId(7), udp_frame(80, b"")))
            .unwrap();

        assert!(wait_until(Duration::from_secs(2), || {
            engine.stats().unbound == 1
        }));
        engine.stop();

        let stats = engine.stats();
        assert_eq!(stats.rx_packets, 1);
        assert_eq!(stats.dispatched, 0);
        assert_eq!(stats.unbound, 1);
    }

    #[test]
    fn test_sources_spread_across_workers() {
        let classifier = Arc::new(Classifier::new());
        let cos = classifier.create_class("cos_all").unwrap();
        let eth0 = classifier.intern_interface("eth0");
        let eth1 = classifier.intern_interface("eth1");
        classifier.bind_interface(eth0, cos, cos).unwrap();
        classifier.bind_interface(eth1, cos, cos).unwrap();

        let receiver = CosReceiver::attach(&classifier, "cos_all").unwrap();

        let mut engine = DataPlane::new(
            EngineConfig {
                num_workers: 2,
                ..Default::default()
            },
            Arc::clone(&classifier),
        );
        let (inject_a, source_a) = ChannelSource::new();
        let (inject_b, source_b) = ChannelSource::new();
        engine.add_source(Box::new(source_a));
        engine.add_source(Box::new(source_b));
        engine.start().unwrap();
        assert_eq!(engine.num_workers(), 2);

        for port in 0..10u16 {
            inject_a
                .inject(RawPacket::new(eth0, udp_frame(port, b"a")))
                .unwrap();
            inject_b
                .inject(RawPacket::new(eth1, udp_frame(port, b"b")))
                .unwrap();
        }

        for _ in 0..20 {
            receiver
                .recv_timeout(Duration::from_secs(2))
                .unwrap()
                .expect("packet from either source");
        }

        engine.stop();
        let stats = engine.stats();
        assert_eq!(stats.rx_packets, 20);
        assert_eq!(stats.dispatched, 20);

        // Both workers actually carried traffic
        let per_worker = engine.worker_stats();
        assert_eq!(per_worker.len(), 2);
        assert!(per_worker.iter().all(|w| w.rx_packets == 10));
    }
}
