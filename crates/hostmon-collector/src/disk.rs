use crate::{usage_percent, Collector};
use anyhow::Result;
use hostmon_common::types::SensorId;
use std::path::Path;
use sysinfo::Disks;

/// Disk usage, summed over every mounted disk or taken from a single mount
/// point.
pub struct DiskCollector {
    sensor: SensorId,
    disks: Disks,
    mount: Option<String>,
}

impl DiskCollector {
    pub fn new(mount: Option<String>) -> Self {
        Self {
            sensor: SensorId::Disk,
            disks: Disks::new_with_refreshed_list(),
            mount,
        }
    }

    pub fn mount(&self) -> Option<&str> {
        self.mount.as_deref()
    }
}

impl Collector for DiskCollector {
    fn sensor(&self) -> &SensorId {
        &self.sensor
    }

    fn collect(&mut self) -> Result<f64> {
        self.disks.refresh();

        let mut total = 0u64;
        let mut used = 0u64;
        let mut matched = 0usize;
        for disk in self.disks.iter() {
            if let Some(mount) = &self.mount {
                if disk.mount_point() != Path::new(mount) {
                    continue;
                }
            }
            let disk_total = disk.total_space();
            total = total.saturating_add(disk_total);
            used = used.saturating_add(disk_total.saturating_sub(disk.available_space()));
            matched += 1;
        }

        match (&self.mount, matched) {
            (Some(mount), 0) => anyhow::bail!("mount point {mount} not found"),
            (None, 0) => anyhow::bail!("no disks reported by the system"),
            _ => Ok(usage_percent(used, total)),
        }
    }
}
