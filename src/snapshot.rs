use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(with = "rfc3339")]
    pub timestamp: SystemTime,
    pub cpu: CpuStats,
    pub memory: MemoryStats,
    pub disk: Vec<DiskStats>,
    pub network: Vec<NetworkStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuStats {
    pub overall: f64,
    pub per_core: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskStats {
    pub mountpoint: String,
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub interface: String,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub send_rate: f64,
    pub recv_rate: f64,
}

impl Snapshot {
    pub fn empty(timestamp: SystemTime) -> Self {
        Self {
            timestamp,
            cpu: CpuStats::default(),
            memory: MemoryStats::default(),
            disk: Vec::new(),
            network: Vec::new(),
        }
    }

    pub fn unix_seconds(&self) -> f64 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl MemoryStats {
    pub fn from_available(total: u64, available: u64) -> Self {
        let available = available.min(total);
        Self::reconciled(total, total - available)
    }

    pub fn from_used(total: u64, used: u64) -> Self {
        Self::reconciled(total, used.min(total))
    }

    fn reconciled(total: u64, used: u64) -> Self {
        Self {
            total,
            used,
            available: total - used,
            percent: percentage(used, total),
        }
    }
}

impl DiskStats {
    pub fn from_available(mountpoint: impl Into<String>, total: u64, available: u64) -> Self {
        let available = available.min(total);
        Self::from_used(mountpoint, total, total - available)
    }

    pub fn from_used(mountpoint: impl Into<String>, total: u64, used: u64) -> Self {
        let used = used.min(total);
        Self {
            mountpoint: mountpoint.into(),
            total,
            used,
            available: total - used,
            percent: percentage(used, total),
        }
    }
}

impl NetworkStats {
    pub fn new(interface: impl Into<String>, bytes_sent: u64, bytes_recv: u64) -> Self {
        Self {
            interface: interface.into(),
            bytes_sent,
            bytes_recv,
            send_rate: 0.0,
            recv_rate: 0.0,
        }
    }
}

pub fn percentage(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((used as f64 / total as f64) * 100.0).clamp(0.0, 100.0)
}

mod rfc3339 {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::SystemTime;

    pub fn serialize<S: Serializer>(ts: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_rfc3339_nanos(*ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SystemTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_rfc3339_weak(&text).map_err(D::Error::custom)
    }
}
