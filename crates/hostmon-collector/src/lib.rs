//! Host probes for the hostmon agent.
//!
//! Each [`Collector`] reads one usage figure from the operating system and
//! reports it as a percentage for its sensor.

pub mod cpu;
pub mod disk;
pub mod memory;


use anyhow::Result;
use hostmon_common::types::SensorId;

pub use cpu::CpuCollector;
pub use disk::DiskCollector;
pub use memory::MemoryCollector;

/// A probe run by the agent on every collection tick.
pub trait Collector: Send {
    /// The sensor this probe reports for.
    fn sensor(&self) -> &SensorId;

    /// Probe name used in logs.
    fn name(&self) -> &str {
        self.sensor().as_str()
    }

    /// Reads the current usage, in percent.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying system query fails or yields
    /// nothing to measure.
    fn collect(&mut self) -> Result<f64>;
}

/// `used / total` as a percentage, or zero when `total` is zero.
pub fn usage_percent(used: u64, total: u64) -> f64 {
    if total > 0 {
        (used as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Builds the probe for a built-in sensor. Custom sensors have no probe.
pub fn for_sensor(sensor: &SensorId, disk_mount: Option<&str>) -> Option<Box<dyn Collector>> {
    match sensor {
        SensorId::Cpu => Some(Box::new(CpuCollector::new())),
        SensorId::Ram => Some(Box::new(MemoryCollector::new())),
        SensorId::Disk => Some(Box::new(DiskCollector::new(disk_mount.map(str::to_string)))),
        SensorId::Custom(_) => None,
    }
}
