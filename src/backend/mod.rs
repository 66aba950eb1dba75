//! Scanner hardware abstraction.
//!
//! A [`ScannerBackend`] enumerates devices and opens them; an open device is a
//! [`DeviceHandle`]. Two backends ship with paperscan:
//!
//! - [`ScanimageBackend`] drives the SANE `scanimage` frontend
//! - [`SimulatedBackend`] is an in-process scanner with a paper feeder

use image::DynamicImage;
use std::fmt;

use crate::config::{BackendKind, Settings};
use crate::error::ScanError;
use crate::options::{OptionValue, ScanOption};

pub mod scanimage;
pub mod simulated;

pub use scanimage::ScanimageBackend;
pub use simulated::{SimulatedBackend, SimulatedStats};

/// Version triple reported by the scanner library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// An enumerated scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Backend device name, e.g. `epjitsu:libusb:001:004`
    pub bus_id: String,
    pub vendor: String,
    pub model: String,
    /// Device class, usually `scanner`
    pub device_class: String,
}

impl DeviceDescriptor {
    /// Vendor and model, for menus and the banner.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.vendor, self.model)
    }
}

/// Entry point to a scanner library.
pub trait ScannerBackend {
    fn init(&mut self) -> Result<Version, ScanError>;

    /// Probes for attached scanners. May block for several seconds.
    fn devices(&mut self) -> Result<Vec<DeviceDescriptor>, ScanError>;

    fn open(&mut self, bus_id: &str) -> Result<Box<dyn DeviceHandle>, ScanError>;

    /// Releases the library. Called once, after every handle is closed.
    fn exit(&mut self);
}

/// An open scanner.
pub trait DeviceHandle {
    fn get_option(&self, option: ScanOption) -> Result<OptionValue, ScanError>;

    /// Writes an option. The value has already been checked against the option's kind.
    fn set_option(&mut self, option: ScanOption, value: OptionValue) -> Result<(), ScanError>;

    /// Starts acquisition of the next frame.
    ///
    /// Fails with [`ScanError::FeederEmpty`] when the feeder has no paper.
    fn start(&mut self) -> Result<(), ScanError>;

    /// Reads the frame started by [`DeviceHandle::start`], blocking until it is complete.
    fn snap(&mut self) -> Result<DynamicImage, ScanError>;

    /// Aborts any acquisition in progress.
    fn cancel(&mut self);

    fn close(&mut self);
}

/// Builds the backend selected in `settings`.
pub fn from_settings(settings: &Settings) -> Box<dyn ScannerBackend> {
    match settings.backend {
        BackendKind::Scanimage => Box::new(ScanimageBackend::new()),
        BackendKind::Simulated => Box::new(SimulatedBackend::new(
            settings.simulated_devices,
            settings.simulated_pages,
        )),
    }
}
