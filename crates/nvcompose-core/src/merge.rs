//! GPU injection into compose documents

use tracing::{debug, info};

use crate::{ComposeFile, GpuDeviceSet};

/// Counts of what a merge changed, reported back to the user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Services that received at least one new entry
    pub services_updated: usize,
    /// Device entries appended across all services
    pub devices_added: usize,
    /// Volume entries appended across all services
    pub volumes_added: usize,
    /// Named driver volumes newly declared at the top level
    pub volumes_declared: Vec<String>,
}

/// Inject the GPU device set into every service of `compose`
///
/// Every service gets the same devices and volumes appended to its own
/// lists; entries a service already has are not repeated, so merging
/// twice with the same set is the same as merging once. An empty device
/// set leaves the document untouched.
pub fn merge(compose: &ComposeFile, gpus: &GpuDeviceSet) -> (ComposeFile, MergeSummary) {
    let mut merged = compose.clone();
    let summary = merge_in_place(&mut merged, gpus);
    (merged, summary)
}

/// In-place form of [`merge`], returning what changed
pub fn merge_in_place(compose: &mut ComposeFile, gpus: &GpuDeviceSet) -> MergeSummary {
    let mut summary = MergeSummary::default();

    if gpus.is_empty() {
        info!("GPU runtime reported no devices, compose file passes through unchanged");
        return summary;
    }

    for (name, service) in compose.services_mut() {
        let devices = service.append_devices(gpus.devices.iter().map(String::as_str));
        let volumes = service.append_volumes(gpus.volumes.iter().map(String::as_str));

        debug!(
            service = name,
            devices_added = devices,
            volumes_added = volumes,
            "Injected GPU entries"
        );

        if devices + volumes > 0 {
            summary.services_updated += 1;
        }
        summary.devices_added += devices;
        summary.volumes_added += volumes;
    }

    for name in gpus.named_volumes() {
        if compose.declare_external_volume(name) {
            debug!(volume = name, "Declared external driver volume");
            summary.volumes_declared.push(name.to_string());
        }
    }

    info!(
        services = summary.services_updated,
        devices = summary.devices_added,
        volumes = summary.volumes_added,
        "Merged GPU devices into compose file"
    );

    summary
}
