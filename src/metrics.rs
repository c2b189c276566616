use crate::snapshot::Snapshot;
use prometheus::core::Collector;
use prometheus::{opts, Counter, Encoder, Gauge, GaugeVec, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub cpu_usage_percent: Gauge,
    pub cpu_core_usage_percent: GaugeVec,
    pub memory_total_bytes: Gauge,
    pub memory_used_bytes: Gauge,
    pub memory_available_bytes: Gauge,
    pub memory_usage_percent: Gauge,
    pub disk_total_bytes: GaugeVec,
    pub disk_used_bytes: GaugeVec,
    pub disk_available_bytes: GaugeVec,
    pub disk_usage_percent: GaugeVec,
    pub net_rx_bytes_total: GaugeVec,
    pub net_tx_bytes_total: GaugeVec,
    pub net_rx_bytes_per_sec: GaugeVec,
    pub net_tx_bytes_per_sec: GaugeVec,
    pub last_collect_timestamp_seconds: Gauge,
    pub snapshots_total: Counter,
    pub scrape_count_total: Counter,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let cpu_usage_percent = Gauge::with_opts(opts!(
            "sysmon_cpu_usage_percent",
            "Overall CPU usage in percent (0..100)"
        ))?;
        let cpu_core_usage_percent = GaugeVec::new(
            opts!(
                "sysmon_cpu_core_usage_percent",
                "Per-core CPU usage in percent (0..100)"
            ),
            &["core"],
        )?;
        let memory_total_bytes =
            Gauge::with_opts(opts!("sysmon_memory_total_bytes", "Total memory in bytes"))?;
        let memory_used_bytes =
            Gauge::with_opts(opts!("sysmon_memory_used_bytes", "Used memory in bytes"))?;
        let memory_available_bytes = Gauge::with_opts(opts!(
            "sysmon_memory_available_bytes",
            "Available memory in bytes"
        ))?;
        let memory_usage_percent = Gauge::with_opts(opts!(
            "sysmon_memory_usage_percent",
            "Memory usage in percent (0..100)"
        ))?;
        let disk_total_bytes = GaugeVec::new(
            opts!("sysmon_disk_total_bytes", "Filesystem size in bytes"),
            &["mount"],
        )?;
        let disk_used_bytes = GaugeVec::new(
            opts!("sysmon_disk_used_bytes", "Filesystem used bytes"),
            &["mount"],
        )?;
        let disk_available_bytes = GaugeVec::new(
            opts!("sysmon_disk_available_bytes", "Filesystem available bytes"),
            &["mount"],
        )?;
        let disk_usage_percent = GaugeVec::new(
            opts!(
                "sysmon_disk_usage_percent",
                "Filesystem usage in percent (0..100)"
            ),
            &["mount"],
        )?;
        let net_rx_bytes_total = GaugeVec::new(
            opts!(
                "sysmon_net_rx_bytes_total",
                "Bytes received since the interface came up"
            ),
            &["iface"],
        )?;
        let net_tx_bytes_total = GaugeVec::new(
            opts!(
                "sysmon_net_tx_bytes_total",
                "Bytes sent since the interface came up"
            ),
            &["iface"],
        )?;
        let net_rx_bytes_per_sec = GaugeVec::new(
            opts!("sysmon_net_rx_bytes_per_sec", "Receive rate in bytes/s"),
            &["iface"],
        )?;
        let net_tx_bytes_per_sec = GaugeVec::new(
            opts!("sysmon_net_tx_bytes_per_sec", "Send rate in bytes/s"),
            &["iface"],
        )?;
        let last_collect_timestamp_seconds = Gauge::with_opts(opts!(
            "sysmon_last_collect_timestamp_seconds",
            "Unix time of the latest snapshot"
        ))?;
        let snapshots_total = Counter::with_opts(opts!(
            "sysmon_snapshots_total",
            "Snapshots received from the collector"
        ))?;
        let scrape_count_total = Counter::with_opts(opts!(
            "sysmon_scrape_count_total",
            "Requests served by /metrics"
        ))?;

        register(&registry, &cpu_usage_percent)?;
        register(&registry, &cpu_core_usage_percent)?;
        register(&registry, &memory_total_bytes)?;
        register(&registry, &memory_used_bytes)?;
        register(&registry, &memory_available_bytes)?;
        register(&registry, &memory_usage_percent)?;
        register(&registry, &disk_total_bytes)?;
        register(&registry, &disk_used_bytes)?;
        register(&registry, &disk_available_bytes)?;
        register(&registry, &disk_usage_percent)?;
        register(&registry, &net_rx_bytes_total)?;
        register(&registry, &net_tx_bytes_total)?;
        register(&registry, &net_rx_bytes_per_sec)?;
        register(&registry, &net_tx_bytes_per_sec)?;
        register(&registry, &last_collect_timestamp_seconds)?;
        register(&registry, &snapshots_total)?;
        register(&registry, &scrape_count_total)?;

        Ok(Arc::new(Self {
            registry,
            cpu_usage_percent,
            cpu_core_usage_percent,
            memory_total_bytes,
            memory_used_bytes,
            memory_available_bytes,
            memory_usage_percent,
            disk_total_bytes,
            disk_used_bytes,
            disk_available_bytes,
            disk_usage_percent,
            net_rx_bytes_total,
            net_tx_bytes_total,
            net_rx_bytes_per_sec,
            net_tx_bytes_per_sec,
            last_collect_timestamp_seconds,
            snapshots_total,
            scrape_count_total,
        }))
    }

    pub fn update_from_snapshot(&self, snapshot: &Snapshot) {
        self.snapshots_total.inc();
        self.last_collect_timestamp_seconds
            .set(snapshot.unix_seconds());

        self.cpu_usage_percent.set(snapshot.cpu.overall);
        self.cpu_core_usage_percent.reset();
        for (core, pct) in snapshot.cpu.per_core.iter().enumerate() {
            self.cpu_core_usage_percent
                .with_label_values(&[&core.to_string()])
                .set(*pct);
        }

        self.memory_total_bytes.set(snapshot.memory.total as f64);
        self.memory_used_bytes.set(snapshot.memory.used as f64);
        self.memory_available_bytes
            .set(snapshot.memory.available as f64);
        self.memory_usage_percent.set(snapshot.memory.percent);

        self.disk_total_bytes.reset();
        self.disk_used_bytes.reset();
        self.disk_available_bytes.reset();
        self.disk_usage_percent.reset();
        for d in &snapshot.disk {
            let labels = [d.mountpoint.as_str()];
            self.disk_total_bytes
                .with_label_values(&labels)
                .set(d.total as f64);
            self.disk_used_bytes
                .with_label_values(&labels)
                .set(d.used as f64);
            self.disk_available_bytes
                .with_label_values(&labels)
                .set(d.available as f64);
            self.disk_usage_percent
                .with_label_values(&labels)
                .set(d.percent);
        }

        self.net_rx_bytes_total.reset();
        self.net_tx_bytes_total.reset();
        self.net_rx_bytes_per_sec.reset();
        self.net_tx_bytes_per_sec.reset();
        for n in &snapshot.network {
            let labels = [n.interface.as_str()];
            self.net_rx_bytes_total
                .with_label_values(&labels)
                .set(n.bytes_recv as f64);
            self.net_tx_bytes_total
                .with_label_values(&labels)
                .set(n.bytes_sent as f64);
            self.net_rx_bytes_per_sec
                .with_label_values(&labels)
                .set(n.recv_rate);
            self.net_tx_bytes_per_sec
                .with_label_values(&labels)
                .set(n.send_rate);
        }
    }

    pub fn inc_scrape_count(&self) {
        self.scrape_count_total.inc();
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf)?;
        Ok(buf)
    }
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}
