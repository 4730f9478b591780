use hostmon_collector::Collector;
use hostmon_storage::SampleStore;

/// Result of one pass over the probes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub stored: usize,
    pub probe_failures: usize,
    pub store_failures: usize,
}

/// Runs every probe once and appends each reading to `store`.
///
/// A failing probe is skipped; a failing append loses that reading. Neither
/// stops the remaining probes.
pub fn collect_cycle(collectors: &mut [Box<dyn Collector>], store: &dyn SampleStore) -> CycleSummary {
    let mut summary = CycleSummary::default();
    for collector in collectors.iter_mut() {
        let value = match collector.collect() {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(sensor = collector.name(), error = %e, "Probe failed");
                summary.probe_failures += 1;
                continue;
            }
        };
        match store.append(collector.sensor(), value) {
            Ok(_) => summary.stored += 1,
            Err(e) => {
                tracing::error!(sensor = collector.name(), value, error = %e, "Sample lost");
                summary.store_failures += 1;
            }
        }
    }
    summary
}
