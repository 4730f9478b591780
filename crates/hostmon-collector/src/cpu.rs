use crate::Collector;
use anyhow::Result;
use hostmon_common::types::SensorId;
use sysinfo::{System, MINIMUM_CPU_UPDATE_INTERVAL};

/// Global CPU usage across all cores.
pub struct CpuCollector {
    sensor: SensorId,
    system: System,
    primed: bool,
}

impl CpuCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        Self {
            sensor: SensorId::Cpu,
            system,
            primed: false,
        }
    }
}

impl Default for CpuCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for CpuCollector {
    fn sensor(&self) -> &SensorId {
        &self.sensor
    }

    fn collect(&mut self) -> Result<f64> {
        // Usage is a delta between two refreshes; the first reading needs a
        // second sample taken at least the minimum interval later.
        if !self.primed {
            std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
            self.primed = true;
        }
        self.system.refresh_cpu_all();
        if self.system.cpus().is_empty() {
            anyhow::bail!("no CPU reported by the system");
        }
        Ok(self.system.global_cpu_usage() as f64)
    }
}
