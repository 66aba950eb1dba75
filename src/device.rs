//! Device directory and scan sessions.
//!
//! [`DeviceDirectory`] owns the scanner backend for the lifetime of the
//! program and releases it when dropped. [`ScanSession`] owns one open device
//! and closes it when dropped, whatever path the caller leaves by.
//! [`CaptureSequence`] pulls frames from the feeder one at a time and cancels
//! the device exactly once when it is dropped.

use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::backend::{DeviceDescriptor, DeviceHandle, ScannerBackend, Version};
use crate::error::ScanError;
use crate::options::{OptionValue, ScanOption};

pub struct DeviceDirectory {
    backend: Box<dyn ScannerBackend>,
    devices: Vec<DeviceDescriptor>,
}

impl DeviceDirectory {
    pub fn new(backend: Box<dyn ScannerBackend>) -> Self {
        Self {
            backend,
            devices: Vec::new(),
        }
    }

    pub fn init(&mut self) -> Result<Version, ScanError> {
        self.backend.init()
    }

    /// Probes for scanners. Blocks until the backend has finished probing.
    ///
    /// An empty list is a normal result.
    pub fn list_devices(&mut self) -> Result<Vec<DeviceDescriptor>, ScanError> {
        self.devices = self.backend.devices()?;
        Ok(self.devices.clone())
    }

    /// Opens a device returned by the last [`DeviceDirectory::list_devices`] call.
    pub fn open(&mut self, bus_id: &str) -> Result<ScanSession, ScanError> {
        let descriptor = self
            .devices
            .iter()
            .find(|d| d.bus_id == bus_id)
            .cloned()
            .ok_or_else(|| ScanError::UnknownDevice(bus_id.to_string()))?;

        let handle = self.backend.open(bus_id)?;
        info!(device = %bus_id, model = %descriptor.model, "Opened scanner");
        Ok(ScanSession {
            descriptor,
            handle: Some(handle),
        })
    }
}

impl Drop for DeviceDirectory {
    fn drop(&mut self) {
        self.backend.exit();
    }
}

/// One open scanner.
pub struct ScanSession {
    descriptor: DeviceDescriptor,
    /// `None` once closed
    handle: Option<Box<dyn DeviceHandle>>,
}

impl std::fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSession")
            .field("descriptor", &self.descriptor)
            .field("open", &self.handle.is_some())
            .finish()
    }
}

impl ScanSession {
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    fn handle(&mut self) -> Result<&mut Box<dyn DeviceHandle>, ScanError> {
        self.handle
            .as_mut()
            .ok_or_else(|| ScanError::Device("device is closed".to_string()))
    }

    /// Reads an option by key.
    pub fn get(&self, name: &str) -> Result<OptionValue, ScanError> {
        let option = parse_key(name)?;
        self.get_option(option)
    }

    pub fn get_option(&self, option: ScanOption) -> Result<OptionValue, ScanError> {
        self.handle
            .as_ref()
            .ok_or_else(|| ScanError::Device("device is closed".to_string()))?
            .get_option(option)
    }

    /// Writes an option by key. Nothing is written when the key or value is rejected.
    pub fn set(&mut self, name: &str, value: impl Into<OptionValue>) -> Result<(), ScanError> {
        let option = parse_key(name)?;
        self.set_option(option, value.into())
    }

    pub fn set_option(&mut self, option: ScanOption, value: OptionValue) -> Result<(), ScanError> {
        if !option.is_writable() {
            return Err(ScanError::ReadOnly(option));
        }
        if !option.accepts(&value) {
            return Err(ScanError::InvalidValue {
                option,
                expected: option.kind(),
            });
        }
        debug!(%option, %value, "Setting scanner option");
        self.handle()?.set_option(option, value)
    }

    /// Applies a list of options in order.
    pub fn apply(&mut self, options: &[(ScanOption, OptionValue)]) -> Result<(), ScanError> {
        for (option, value) in options {
            self.set_option(*option, value.clone())?;
        }
        Ok(())
    }

    /// Captures a single frame, blocking until it is complete.
    ///
    /// Fails with [`ScanError::FeederEmpty`] when there is no paper.
    pub fn capture_one(&mut self) -> Result<DynamicImage, ScanError> {
        let handle = self.handle()?;
        handle.start()?;
        handle.snap()
    }

    /// Returns a lazy sequence of frames pulled from the feeder.
    pub fn capture_sequence(&mut self) -> CaptureSequence<'_> {
        CaptureSequence {
            session: self,
            finished: false,
            pulled: 0,
        }
    }

    /// Releases the device. Dropping the session does the same.
    pub fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.close();
            info!(device = %self.descriptor.bus_id, "Closed scanner");
        }
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn parse_key(name: &str) -> Result<ScanOption, ScanError> {
    name.parse()
        .map_err(|_| ScanError::UnknownOption(name.to_string()))
}

/// Frames pulled from the document feeder.
///
/// Yields `Ok(frame)` per sheet and ends when the feeder reports it is empty.
/// Any other failure is yielded once as `Err` and ends the sequence. Dropping
/// the sequence cancels the device, whether it was exhausted or not.
pub struct CaptureSequence<'a> {
    session: &'a mut ScanSession,
    finished: bool,
    pulled: usize,
}

impl CaptureSequence<'_> {
    /// Frames yielded so far.
    pub fn pulled(&self) -> usize {
        self.pulled
    }
}

impl Iterator for CaptureSequence<'_> {
    type Item = Result<DynamicImage, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.session.capture_one() {
            Ok(frame) => {
                self.pulled += 1;
                debug!(page = self.pulled, "Captured frame");
                Some(Ok(frame))
            }
            Err(ScanError::FeederEmpty) => {
                debug!(pages = self.pulled, "Feeder empty");
                self.finished = true;
                None
            }
            Err(e) => {
                warn!(error = %e, "Capture failed");
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl Drop for CaptureSequence<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.session.handle.as_mut() {
            handle.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SimulatedBackend, SimulatedStats, simulated::page_marker};
    use std::rc::Rc;

    const FUJITSU: &str = "epjitsu:libusb:001:004";

    fn open_session(pages: usize) -> (DeviceDirectory, ScanSession, Rc<SimulatedStats>) {
        let backend = SimulatedBackend::new(1, pages);
        let stats = backend.stats();
        let mut directory = DeviceDirectory::new(Box::new(backend));
        directory.list_devices().unwrap();
        let session = directory.open(FUJITSU).unwrap();
        (directory, session, stats)
    }

    #[test]
    fn test_list_devices_empty() {
        let mut directory = DeviceDirectory::new(Box::new(SimulatedBackend::new(0, 0)));
        assert!(directory.list_devices().unwrap().is_empty());
    }

    #[test]
    fn test_open_requires_enumerated_device() {
        let mut directory = DeviceDirectory::new(Box::new(SimulatedBackend::new(1, 0)));
        assert!(matches!(
            directory.open(FUJITSU),
            Err(ScanError::UnknownDevice(_))
        ));
    }

    #[test]
    fn test_get_and_set() {
        let (_directory, mut session, _) = open_session(0);

        assert_eq!(session.get("resolution").unwrap(), OptionValue::Int(300));
        session.set("resolution", 600_i64).unwrap();
        assert_eq!(session.get("resolution").unwrap(), OptionValue::Int(600));
        session.set("mode", "Gray").unwrap();
        assert_eq!(session.get("mode").unwrap(), OptionValue::from("Gray"));
    }

    #[test]
    fn test_unknown_option_leaves_values_unchanged() {
        let (_directory, mut session, _) = open_session(0);
        let before: Vec<_> = ScanOption::ALL
            .iter()
            .map(|o| session.get_option(*o).unwrap())
            .collect();

        let err = session.set("bogus", 1_i64).unwrap_err();
        assert!(matches!(err, ScanError::UnknownOption(ref key) if key == "bogus"));
        assert!(matches!(session.get("bogus"), Err(ScanError::UnknownOption(_))));

        let after: Vec<_> = ScanOption::ALL
            .iter()
            .map(|o| session.get_option(*o).unwrap())
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_set_wrong_kind() {
        let (_directory, mut session, _) = open_session(0);
        assert!(matches!(
            session.set("resolution", "high"),
            Err(ScanError::InvalidValue {
                option: ScanOption::Resolution,
                ..
            })
        ));
        assert_eq!(session.get("resolution").unwrap(), OptionValue::Int(300));
    }

    #[test]
    fn test_capture_sequence_yields_every_page() {
        let (_directory, mut session, stats) = open_session(3);

        let mut sequence = session.capture_sequence();
        let markers: Vec<u8> = sequence
            .by_ref()
            .map(|frame| page_marker(&frame.unwrap()))
            .collect();
        assert_eq!(markers, vec![1, 2, 3]);
        assert_eq!(sequence.pulled(), 3);
        // Exhausted sequences stay exhausted
        assert!(sequence.next().is_none());
        drop(sequence);

        assert_eq!(stats.frames(), 3);
        assert_eq!(stats.cancels(), 1);
    }

    #[test]
    fn test_capture_sequence_empty_feeder() {
        let (_directory, mut session, stats) = open_session(0);
        assert_eq!(session.capture_sequence().count(), 0);
        assert_eq!(stats.cancels(), 1);
    }

    #[test]
    fn test_capture_sequence_abandoned_early_cancels_once() {
        let (_directory, mut session, stats) = open_session(5);
        {
            let mut sequence = session.capture_sequence();
            assert!(sequence.next().unwrap().is_ok());
        }
        assert_eq!(stats.frames(), 1);
        assert_eq!(stats.cancels(), 1);
    }

    #[test]
    fn test_capture_sequence_propagates_device_error() {
        let backend = SimulatedBackend::new(1, 5).fail_on_page(2);
        let stats = backend.stats();
        let mut directory = DeviceDirectory::new(Box::new(backend));
        directory.list_devices().unwrap();
        let mut session = directory.open(FUJITSU).unwrap();

        let results: Vec<_> = session.capture_sequence().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ScanError::Device(_))));
        assert_eq!(stats.cancels(), 1);
    }

    #[test]
    fn test_capture_one_out_of_paper() {
        let (_directory, mut session, _) = open_session(1);
        assert!(session.capture_one().is_ok());
        assert!(matches!(session.capture_one(), Err(ScanError::FeederEmpty)));
    }

    #[test]
    fn test_session_closes_once_and_backend_exits() {
        let (directory, mut session, stats) = open_session(0);
        session.close();
        assert!(matches!(session.get("mode"), Err(ScanError::Device(_))));
        drop(session);
        assert_eq!(stats.closes(), 1);

        drop(directory);
        assert_eq!(stats.exits(), 1);
    }
}
