use super::{is_loopback, is_pseudo_filesystem, StatsError, StatsSource, Subsystem};
use crate::snapshot::{CpuStats, DiskStats, MemoryStats, NetworkStats};
use std::collections::HashSet;
use sysinfo::{CpuExt, DiskExt, NetworkExt, NetworksExt, System, SystemExt};

pub struct SystemSource {
    system: System,
    cpu_primed: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct MountedDisk {
    mountpoint: String,
    fstype: String,
    total: u64,
    available: u64,
}

impl SystemSource {
    pub fn new() -> Result<Self, StatsError> {
        if !System::IS_SUPPORTED {
            return Err(StatsError::Unsupported(std::env::consts::OS));
        }
        Ok(Self {
            system: System::new(),
            cpu_primed: false,
        })
    }
}

impl StatsSource for SystemSource {
    fn query_cpu(&mut self) -> Result<CpuStats, StatsError> {
        self.system.refresh_cpu();
        let cpus = self.system.cpus();
        if cpus.is_empty() {
            return Err(StatsError::NoData(Subsystem::Cpu));
        }

        // usage is only meaningful after a second refresh
        if !self.cpu_primed {
            self.cpu_primed = true;
            return Ok(CpuStats {
                overall: 0.0,
                per_core: vec![0.0; cpus.len()],
            });
        }

        let clamp = |v: f32| (v as f64).clamp(0.0, 100.0);
        Ok(CpuStats {
            overall: clamp(self.system.global_cpu_info().cpu_usage()),
            per_core: cpus.iter().map(|c| clamp(c.cpu_usage())).collect(),
        })
    }

    fn query_memory(&mut self) -> Result<MemoryStats, StatsError> {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            return Err(StatsError::NoData(Subsystem::Memory));
        }
        Ok(MemoryStats::from_available(
            total,
            self.system.available_memory(),
        ))
    }

    fn query_disk(&mut self) -> Result<Vec<DiskStats>, StatsError> {
        self.system.refresh_disks_list();
        self.system.refresh_disks();
        let mounted = self.system.disks().iter().map(|d| MountedDisk {
            mountpoint: d.mount_point().to_string_lossy().to_string(),
            fstype: String::from_utf8_lossy(d.file_system()).to_string(),
            total: d.total_space(),
            available: d.available_space(),
        });
        Ok(visible_disks(mounted))
    }

    fn query_network(&mut self) -> Result<Vec<NetworkStats>, StatsError> {
        self.system.refresh_networks_list();
        self.system.refresh_networks();
        Ok(interface_rows(self.system.networks().iter().map(
            |(iface, data)| {
                NetworkStats::new(iface.as_str(), data.total_transmitted(), data.total_received())
            },
        )))
    }
}

// last entry per mountpoint is the mount a size query sees
fn visible_disks(mounted: impl IntoIterator<Item = MountedDisk>) -> Vec<DiskStats> {
    let mounted: Vec<MountedDisk> = mounted.into_iter().collect();
    let mut seen = HashSet::new();
    let mut out: Vec<DiskStats> = mounted
        .into_iter()
        .rev()
        .filter(|d| seen.insert(d.mountpoint.clone()))
        .filter(|d| !is_pseudo_filesystem(&d.fstype))
        .map(|d| DiskStats::from_available(d.mountpoint, d.total, d.available))
        .collect();
    out.reverse();
    out
}

fn interface_rows(rows: impl IntoIterator<Item = NetworkStats>) -> Vec<NetworkStats> {
    let mut seen = HashSet::new();
    let mut out: Vec<NetworkStats> = rows
        .into_iter()
        .filter(|n| !is_loopback(&n.interface))
        .filter(|n| seen.insert(n.interface.clone()))
        .collect();
    // sysinfo iterates a hash map
    out.sort_by(|a, b| a.interface.cmp(&b.interface));
    out
}
