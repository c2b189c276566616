use crate::rates::RateState;
use crate::snapshot::Snapshot;
use crate::sources::{StatsError, StatsSource, Subsystem};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    Cancelled,
    ConsumerGone,
}

pub struct Collector<S> {
    source: S,
    rates: RateState,
}

impl<S: StatsSource> Collector<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            rates: RateState::default(),
        }
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn collect_once(&mut self) -> Snapshot {
        self.collect_at(SystemTime::now())
    }

    pub(crate) fn collect_at(&mut self, timestamp: SystemTime) -> Snapshot {
        let mut snapshot = Snapshot::empty(timestamp);

        if let Some(cpu) = degrade(Subsystem::Cpu, self.source.query_cpu()) {
            snapshot.cpu = cpu;
        }
        if let Some(memory) = degrade(Subsystem::Memory, self.source.query_memory()) {
            snapshot.memory = memory;
        }
        if let Some(disk) = degrade(Subsystem::Disk, self.source.query_disk()) {
            snapshot.disk = disk;
        }
        if let Some(mut network) = degrade(Subsystem::Network, self.source.query_network()) {
            self.rates.advance(&mut network, timestamp);
            snapshot.network = network;
        }

        snapshot
    }
}

impl<S: StatsSource + 'static> Collector<S> {
    /// Collects immediately, then once per `interval`, handing each snapshot to
    /// `output`. Returns when `cancel` fires or the receiver is dropped; `output`
    /// is dropped on return, which closes the channel for the consumer.
    pub async fn run(
        self,
        interval: Duration,
        output: mpsc::Sender<Snapshot>,
        cancel: CancellationToken,
    ) -> RunExit {
        let interval = if interval.is_zero() {
            warn!(interval = ?MIN_INTERVAL, "zero collection interval raised to the minimum");
            MIN_INTERVAL
        } else {
            interval
        };
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut collector = self;

        let exit = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break RunExit::Cancelled,
                _ = ticker.tick() => {}
            }

            // OS queries may stall (hung network mounts); keep them off the async workers
            let collecting = tokio::task::spawn_blocking(move || {
                let snapshot = collector.collect_once();
                (collector, snapshot)
            });
            let snapshot = tokio::select! {
                biased;
                _ = cancel.cancelled() => break RunExit::Cancelled,
                joined = collecting => match joined {
                    Ok((returned, snapshot)) => {
                        collector = returned;
                        snapshot
                    }
                    Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                    Err(_) => break RunExit::Cancelled,
                },
            };
            debug!(
                disks = snapshot.disk.len(),
                interfaces = snapshot.network.len(),
                "snapshot collected"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break RunExit::Cancelled,
                sent = output.send(snapshot) => {
                    if sent.is_err() {
                        break RunExit::ConsumerGone;
                    }
                }
            }
        };

        info!(reason = ?exit, "collector stopped");
        exit
    }
}

fn degrade<T>(subsystem: Subsystem, result: Result<T, StatsError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(subsystem = %subsystem, error = %err, "collection failed, section left empty");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{CpuStats, MemoryStats, NetworkStats};
    use crate::sources::mock::MockSource;
    use std::time::UNIX_EPOCH;
    use tokio::time::timeout;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
    }

    // CPU query blocks the calling thread, like a statfs on a dead NFS server
    struct StalledSource {
        inner: MockSource,
        stall: Duration,
    }

    impl StatsSource for StalledSource {
        fn query_cpu(&mut self) -> Result<CpuStats, StatsError> {
            std::thread::sleep(self.stall);
            self.inner.query_cpu()
        }

        fn query_memory(&mut self) -> Result<MemoryStats, StatsError> {
            self.inner.query_memory()
        }

        fn query_disk(&mut self) -> Result<Vec<crate::snapshot::DiskStats>, StatsError> {
            self.inner.query_disk()
        }

        fn query_network(&mut self) -> Result<Vec<NetworkStats>, StatsError> {
            self.inner.query_network()
        }
    }

    #[test]
    fn collects_mock_values() {
        let mut collector = Collector::new(MockSource::default());
        let snapshot = collector.collect_once();

        assert_eq!(snapshot.cpu.overall, 25.5);
        assert_eq!(snapshot.cpu.per_core, vec![20.0, 30.0, 25.0, 28.0]);
        assert_eq!(snapshot.memory.percent, 50.0);
        assert_eq!(snapshot.disk.len(), 1);
        assert_eq!(snapshot.disk[0].mountpoint, "/");
        assert_eq!(snapshot.network[0].interface, "eth0");
    }

    #[test]
    fn every_failure_combination_degrades_only_the_failed_sections() {
        for mask in 1_u8..16 {
            let failing: Vec<Subsystem> = Subsystem::ALL
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, s)| *s)
                .collect();
            let expected = MockSource::default();
            let mut collector = Collector::new(MockSource::failing(&failing));
            let snapshot = collector.collect_once();

            let fails = |s: Subsystem| failing.contains(&s);
            if fails(Subsystem::Cpu) {
                assert_eq!(snapshot.cpu, CpuStats::default(), "mask {mask}");
            } else {
                assert_eq!(snapshot.cpu, expected.cpu, "mask {mask}");
            }
            if fails(Subsystem::Memory) {
                assert_eq!(snapshot.memory, MemoryStats::default(), "mask {mask}");
            } else {
                assert_eq!(snapshot.memory, expected.memory, "mask {mask}");
            }
            if fails(Subsystem::Disk) {
                assert!(snapshot.disk.is_empty(), "mask {mask}");
            } else {
                assert_eq!(snapshot.disk, expected.disk, "mask {mask}");
            }
            if fails(Subsystem::Network) {
                assert!(snapshot.network.is_empty(), "mask {mask}");
            } else {
                assert_eq!(snapshot.network, expected.network, "mask {mask}");
            }
        }
    }

    #[test]
    fn first_network_sample_has_zero_rates() {
        let mut source = MockSource::default();
        source.network = vec![
            NetworkStats {
                send_rate: 1.0,
                recv_rate: 2.0,
                ..NetworkStats::new("eth0", 10, 20)
            },
            NetworkStats::new("wlan0", 30, 40),
        ];
        let mut collector = Collector::new(source);
        let snapshot = collector.collect_once();
        assert!(snapshot
            .network
            .iter()
            .all(|n| n.send_rate == 0.0 && n.recv_rate == 0.0));
    }

    #[test]
    fn rate_between_two_cycles_one_second_apart() {
        let mut source = MockSource::default();
        source.network = vec![NetworkStats::new("eth0", 1_000_000, 0)];
        let mut collector = Collector::new(source);
        collector.collect_at(at(0));

        collector.source_mut().network = vec![NetworkStats::new("eth0", 1_100_000, 0)];
        let snapshot = collector.collect_at(at(1));
        assert_eq!(snapshot.network[0].send_rate, 100_000.0);
        assert_eq!(snapshot.network[0].recv_rate, 0.0);
    }

    #[test]
    fn failed_network_cycle_keeps_the_old_baseline() {
        let mut source = MockSource::default();
        source.network = vec![NetworkStats::new("eth0", 0, 0)];
        let mut collector = Collector::new(source);
        collector.collect_at(at(0));

        collector.source_mut().fail(Subsystem::Network);
        let degraded = collector.collect_at(at(1));
        assert!(degraded.network.is_empty());
        assert_eq!(collector.rates.baseline_time(), Some(at(0)));

        collector.source_mut().recover(Subsystem::Network);
        collector.source_mut().network = vec![NetworkStats::new("eth0", 300, 600)];
        let snapshot = collector.collect_at(at(3));
        // rate spans both intervals
        assert_eq!(snapshot.network[0].send_rate, 100.0);
        assert_eq!(snapshot.network[0].recv_rate, 200.0);
    }

    #[test]
    fn same_timestamp_twice_yields_zero_rates() {
        let mut collector = Collector::new(MockSource::default());
        collector.collect_at(at(5));
        collector.source_mut().network[0].bytes_sent += 1_000;
        let snapshot = collector.collect_at(at(5));
        assert_eq!(snapshot.network[0].send_rate, 0.0);
    }

    #[tokio::test]
    async fn run_publishes_at_the_configured_interval() {
        let interval = Duration::from_millis(100);
        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Collector::new(MockSource::default()).run(
            interval,
            tx,
            cancel.clone(),
        ));

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(interval * 5 - Duration::from_millis(50)).await;
                cancel.cancel();
            })
        };

        let mut received = Vec::new();
        while let Some(snapshot) = rx.recv().await {
            received.push(snapshot.timestamp);
        }
        canceller.await.unwrap();
        assert_eq!(task.await.unwrap(), RunExit::Cancelled);

        assert!(
            (4..=6).contains(&received.len()),
            "published {} snapshots",
            received.len()
        );
        for pair in received.windows(2) {
            let gap = pair[1].duration_since(pair[0]).unwrap();
            assert!(
                gap >= Duration::from_millis(50) && gap <= Duration::from_millis(170),
                "gap {gap:?}"
            );
        }
    }

    #[tokio::test]
    async fn cancel_closes_the_channel_promptly() {
        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Collector::new(MockSource::default()).run(
            Duration::from_secs(3600),
            tx,
            cancel.clone(),
        ));

        let first = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert!(first.is_some(), "first snapshot is published immediately");

        cancel.cancel();
        let next = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert!(next.is_none());
        assert_eq!(task.await.unwrap(), RunExit::Cancelled);
    }

    #[tokio::test]
    async fn cancel_interrupts_a_blocked_publish() {
        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Collector::new(MockSource::default()).run(
            Duration::from_millis(10),
            tx,
            cancel.clone(),
        ));

        // nobody reads: the buffer fills and the collector blocks on send
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        let exit = timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
        assert_eq!(exit, RunExit::Cancelled);

        // at most the one buffered snapshot, then end of stream
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn dropped_receiver_stops_the_loop() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let exit = timeout(
            Duration::from_secs(1),
            Collector::new(MockSource::default()).run(
                Duration::from_millis(10),
                tx,
                CancellationToken::new(),
            ),
        )
        .await
        .unwrap();
        assert_eq!(exit, RunExit::ConsumerGone);
    }

    #[tokio::test]
    async fn snapshots_arrive_in_timestamp_order() {
        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Collector::new(MockSource::default()).run(
            Duration::from_millis(5),
            tx,
            cancel.clone(),
        ));

        let mut last = None;
        for _ in 0..10 {
            let snapshot = rx.recv().await.unwrap();
            if let Some(prev) = last {
                assert!(snapshot.timestamp > prev);
            }
            last = Some(snapshot.timestamp);
        }
        cancel.cancel();
        while rx.recv().await.is_some() {}
        task.await.unwrap();
    }

    #[tokio::test]
    async fn cancel_interrupts_a_stalled_collection() {
        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let source = StalledSource {
            inner: MockSource::default(),
            stall: Duration::from_millis(400),
        };
        let task = tokio::spawn(Collector::new(source).run(
            Duration::from_secs(3600),
            tx,
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        let exit = timeout(Duration::from_millis(200), task)
            .await
            .expect("run must not wait for the stalled query")
            .unwrap();
        assert_eq!(exit, RunExit::Cancelled);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn zero_interval_still_runs() {
        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Collector::new(MockSource::default()).run(
            Duration::ZERO,
            tx,
            cancel.clone(),
        ));

        for _ in 0..3 {
            let next = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
            assert!(next.is_some());
        }
        cancel.cancel();
        while rx.recv().await.is_some() {}
        assert_eq!(task.await.unwrap(), RunExit::Cancelled);
    }
}
