//! Scanner selection.
//!
//! Probes the scanner library for devices and settles on one: nothing to do
//! when there are none, no question asked when there is exactly one, and a
//! choice list (first device pre-selected) otherwise.

use tracing::info;

use crate::backend::DeviceDescriptor;
use crate::device::DeviceDirectory;
use crate::workflow::{Notice, Prompter};

/// Result of device selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceChoice {
    NoDevices,
    Cancelled,
    Selected(DeviceDescriptor),
}

pub fn pick_device<P>(
    directory: &mut DeviceDirectory,
    prompter: &mut P,
) -> color_eyre::Result<DeviceChoice>
where
    P: Prompter + ?Sized,
{
    let version = directory.init()?;
    prompter.begin_wait(
        &format!("SANE Version {}", version),
        "Please wait, detecting scanners...",
    )?;
    let devices = directory.list_devices();
    prompter.end_wait();
    let mut devices = devices?;

    match devices.len() {
        0 => {
            prompter.notify(Notice::Error, "No scanners found!")?;
            Ok(DeviceChoice::NoDevices)
        }
        1 => {
            let device = devices.remove(0);
            info!(device = %device.bus_id, "Using the only scanner found");
            Ok(DeviceChoice::Selected(device))
        }
        _ => {
            let choice = prompter
                .choose_device(&devices)?
                .filter(|&index| index < devices.len())
                .map(|index| devices.swap_remove(index));
            Ok(choice.map_or(DeviceChoice::Cancelled, DeviceChoice::Selected))
        }
    }
}
