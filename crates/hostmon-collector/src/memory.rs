use crate::{usage_percent, Collector};
use anyhow::Result;
use hostmon_common::types::SensorId;
use sysinfo::System;

pub struct MemoryCollector {
    sensor: SensorId,
    system: System,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self {
            sensor: SensorId::Ram,
            system: System::new(),
        }
    }
}

impl Default for MemoryCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for MemoryCollector {
    fn sensor(&self) -> &SensorId {
        &self.sensor
    }

    fn collect(&mut self) -> Result<f64> {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            anyhow::bail!("total memory reported as zero");
        }
        Ok(usage_percent(self.system.used_memory(), total))
    }
}
