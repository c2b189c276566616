use super::{StatsError, StatsSource, Subsystem};
use crate::snapshot::{CpuStats, DiskStats, MemoryStats, NetworkStats};

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

#[derive(Debug, Clone)]
pub struct MockSource {
    pub cpu: CpuStats,
    pub memory: MemoryStats,
    pub disk: Vec<DiskStats>,
    pub network: Vec<NetworkStats>,
    pub fail_cpu: bool,
    pub fail_memory: bool,
    pub fail_disk: bool,
    pub fail_network: bool,
}

impl Default for MockSource {
    fn default() -> Self {
        Self {
            cpu: CpuStats {
                overall: 25.5,
                per_core: vec![20.0, 30.0, 25.0, 28.0],
            },
            memory: MemoryStats::from_used(16 * GIB, 8 * GIB),
            disk: vec![DiskStats::from_used("/", 500 * GIB, 300 * GIB)],
            network: vec![NetworkStats::new("eth0", 100 * MIB, 200 * MIB)],
            fail_cpu: false,
            fail_memory: false,
            fail_disk: false,
            fail_network: false,
        }
    }
}

impl MockSource {
    pub fn failing(subsystems: &[Subsystem]) -> Self {
        let mut source = Self::default();
        for subsystem in subsystems {
            source.fail(*subsystem);
        }
        source
    }

    pub fn fail(&mut self, subsystem: Subsystem) {
        *self.flag(subsystem) = true;
    }

    pub fn recover(&mut self, subsystem: Subsystem) {
        *self.flag(subsystem) = false;
    }

    fn flag(&mut self, subsystem: Subsystem) -> &mut bool {
        match subsystem {
            Subsystem::Cpu => &mut self.fail_cpu,
            Subsystem::Memory => &mut self.fail_memory,
            Subsystem::Disk => &mut self.fail_disk,
            Subsystem::Network => &mut self.fail_network,
        }
    }
}

impl StatsSource for MockSource {
    fn query_cpu(&mut self) -> Result<CpuStats, StatsError> {
        if self.fail_cpu {
            return Err(StatsError::Injected(Subsystem::Cpu));
        }
        Ok(self.cpu.clone())
    }

    fn query_memory(&mut self) -> Result<MemoryStats, StatsError> {
        if self.fail_memory {
            return Err(StatsError::Injected(Subsystem::Memory));
        }
        Ok(self.memory.clone())
    }

    fn query_disk(&mut self) -> Result<Vec<DiskStats>, StatsError> {
        if self.fail_disk {
            return Err(StatsError::Injected(Subsystem::Disk));
        }
        Ok(self.disk.clone())
    }

    fn query_network(&mut self) -> Result<Vec<NetworkStats>, StatsError> {
        if self.fail_network {
            return Err(StatsError::Injected(Subsystem::Network));
        }
        Ok(self.network.clone())
    }
}
