pub mod mock;
pub mod system;

use crate::snapshot::{CpuStats, DiskStats, MemoryStats, NetworkStats};
use std::fmt;
use thiserror::Error;

/// Every query is independent. Sources may keep their own baselines between calls.
pub trait StatsSource: Send {
    fn query_cpu(&mut self) -> Result<CpuStats, StatsError>;
    fn query_memory(&mut self) -> Result<MemoryStats, StatsError>;
    fn query_disk(&mut self) -> Result<Vec<DiskStats>, StatsError>;
    fn query_network(&mut self) -> Result<Vec<NetworkStats>, StatsError>;
}

impl<S: StatsSource + ?Sized> StatsSource for Box<S> {
    fn query_cpu(&mut self) -> Result<CpuStats, StatsError> {
        (**self).query_cpu()
    }

    fn query_memory(&mut self) -> Result<MemoryStats, StatsError> {
        (**self).query_memory()
    }

    fn query_disk(&mut self) -> Result<Vec<DiskStats>, StatsError> {
        (**self).query_disk()
    }

    fn query_network(&mut self) -> Result<Vec<NetworkStats>, StatsError> {
        (**self).query_network()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Cpu,
    Memory,
    Disk,
    Network,
}

impl Subsystem {
    pub const ALL: [Subsystem; 4] = [
        Subsystem::Cpu,
        Subsystem::Memory,
        Subsystem::Disk,
        Subsystem::Network,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Subsystem::Cpu => "cpu",
            Subsystem::Memory => "memory",
            Subsystem::Disk => "disk",
            Subsystem::Network => "network",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("platform reported no {0} data")]
    NoData(Subsystem),
    #[error("{0} query failed (injected)")]
    Injected(Subsystem),
    #[error("unsupported operating system: {0}")]
    Unsupported(&'static str),
}

pub(crate) const PSEUDO_FILESYSTEMS: &[&str] = &[
    "tmpfs",
    "devtmpfs",
    "proc",
    "sysfs",
    "cgroup",
    "cgroup2",
    "devpts",
    "mqueue",
    "debugfs",
    "tracefs",
    "securityfs",
    "pstore",
    "bpf",
    "autofs",
    "hugetlbfs",
    "configfs",
    "fusectl",
    "binfmt_misc",
    "nsfs",
    "ramfs",
    "rpc_pipefs",
    "efivarfs",
    "selinuxfs",
    "squashfs",
    "devfs",
];

pub(crate) fn is_pseudo_filesystem(fstype: &str) -> bool {
    PSEUDO_FILESYSTEMS.contains(&fstype)
}

pub(crate) fn is_loopback(interface: &str) -> bool {
    interface == "lo" || interface == "lo0"
}

pub fn native_source() -> Result<Box<dyn StatsSource>, StatsError> {
    Ok(Box::new(system::SystemSource::new()?))
}
