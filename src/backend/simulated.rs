//! In-process scanner with a paper feeder.
//!
//! Used when `backend = "simulated"` is configured and by the test suite. Each
//! device starts with the same number of pages in its feeder; every frame is a
//! small generated image whose red channel carries the 1-based page number.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

use super::{DeviceDescriptor, DeviceHandle, ScannerBackend, Version};
use crate::error::ScanError;
use crate::options::{OptionValue, ScanOption};

const PAGE_WIDTH: u32 = 48;
const PAGE_HEIGHT: u32 = 64;

/// Counters shared between a [`SimulatedBackend`] and its devices.
#[derive(Debug, Default)]
pub struct SimulatedStats {
    opens: Cell<usize>,
    cancels: Cell<usize>,
    closes: Cell<usize>,
    exits: Cell<usize>,
    frames: Cell<usize>,
}

impl SimulatedStats {
    pub fn opens(&self) -> usize {
        self.opens.get()
    }

    pub fn cancels(&self) -> usize {
        self.cancels.get()
    }

    pub fn closes(&self) -> usize {
        self.closes.get()
    }

    pub fn exits(&self) -> usize {
        self.exits.get()
    }

    pub fn frames(&self) -> usize {
        self.frames.get()
    }

    fn bump(cell: &Cell<usize>) {
        cell.set(cell.get() + 1);
    }
}

pub struct SimulatedBackend {
    devices: Vec<DeviceDescriptor>,
    pages: usize,
    fail_on_page: Option<usize>,
    stats: Rc<SimulatedStats>,
}

impl SimulatedBackend {
    pub fn new(device_count: usize, pages: usize) -> Self {
        let devices = (0..device_count).map(simulated_device).collect();
        Self {
            devices,
            pages,
            fail_on_page: None,
            stats: Rc::new(SimulatedStats::default()),
        }
    }

    /// Makes the given 1-based page fail with a device error instead of scanning.
    pub fn fail_on_page(mut self, page: usize) -> Self {
        self.fail_on_page = Some(page);
        self
    }

    pub fn stats(&self) -> Rc<SimulatedStats> {
        Rc::clone(&self.stats)
    }
}

fn simulated_device(index: usize) -> DeviceDescriptor {
    let (bus_id, vendor, model) = match index {
        0 => ("epjitsu:libusb:001:004", "Fujitsu", "ScanSnap S1300i"),
        1 => ("epson:libusb:001:005", "Epson", "DummyScanner"),
        _ => {
            return DeviceDescriptor {
                bus_id: format!("test:{}", index),
                vendor: "Noname".to_string(),
                model: format!("frontend-tester {}", index),
                device_class: "virtual device".to_string(),
            };
        }
    };

    DeviceDescriptor {
        bus_id: bus_id.to_string(),
        vendor: vendor.to_string(),
        model: model.to_string(),
        device_class: "scanner".to_string(),
    }
}

impl ScannerBackend for SimulatedBackend {
    fn init(&mut self) -> Result<Version, ScanError> {
        Ok(Version {
            major: 1,
            minor: 0,
            patch: 0,
        })
    }

    fn devices(&mut self) -> Result<Vec<DeviceDescriptor>, ScanError> {
        Ok(self.devices.clone())
    }

    fn open(&mut self, bus_id: &str) -> Result<Box<dyn DeviceHandle>, ScanError> {
        if !self.devices.iter().any(|d| d.bus_id == bus_id) {
            return Err(ScanError::UnknownDevice(bus_id.to_string()));
        }

        SimulatedStats::bump(&self.stats.opens);
        let options = ScanOption::ALL
            .iter()
            .filter(|o| o.is_writable())
            .map(|o| (*o, o.default_value()))
            .collect();

        Ok(Box::new(SimulatedDevice {
            options,
            remaining: self.pages,
            next_page: 1,
            started: false,
            fail_on_page: self.fail_on_page,
            stats: Rc::clone(&self.stats),
        }))
    }

    fn exit(&mut self) {
        SimulatedStats::bump(&self.stats.exits);
    }
}

struct SimulatedDevice {
    options: HashMap<ScanOption, OptionValue>,
    remaining: usize,
    next_page: usize,
    started: bool,
    fail_on_page: Option<usize>,
    stats: Rc<SimulatedStats>,
}

impl DeviceHandle for SimulatedDevice {
    fn get_option(&self, option: ScanOption) -> Result<OptionValue, ScanError> {
        if option == ScanOption::PageLoaded {
            return Ok(OptionValue::Bool(self.remaining > 0));
        }
        Ok(self
            .options
            .get(&option)
            .cloned()
            .unwrap_or_else(|| option.default_value()))
    }

    fn set_option(&mut self, option: ScanOption, value: OptionValue) -> Result<(), ScanError> {
        if !option.is_writable() {
            return Err(ScanError::ReadOnly(option));
        }
        self.options.insert(option, value);
        Ok(())
    }

    fn start(&mut self) -> Result<(), ScanError> {
        if self.remaining == 0 {
            return Err(ScanError::FeederEmpty);
        }
        if self.fail_on_page == Some(self.next_page) {
            return Err(ScanError::Device(format!(
                "paper jam on page {}",
                self.next_page
            )));
        }
        self.started = true;
        Ok(())
    }

    fn snap(&mut self) -> Result<DynamicImage, ScanError> {
        if !self.started {
            return Err(ScanError::Device("no scan in progress".to_string()));
        }
        self.started = false;

        let page = self.next_page;
        self.next_page += 1;
        self.remaining -= 1;
        SimulatedStats::bump(&self.stats.frames);
        debug!(page, remaining = self.remaining, "Simulated frame");

        let gray = matches!(
            self.options.get(&ScanOption::Mode),
            Some(OptionValue::Str(mode)) if mode != "Color"
        );
        Ok(render_page(page, gray))
    }

    fn cancel(&mut self) {
        self.started = false;
        SimulatedStats::bump(&self.stats.cancels);
    }

    fn close(&mut self) {
        SimulatedStats::bump(&self.stats.closes);
    }
}

fn render_page(page: usize, gray: bool) -> DynamicImage {
    let marker = (page % 256) as u8;
    if gray {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(
            PAGE_WIDTH,
            PAGE_HEIGHT,
            Luma([marker]),
        ))
    } else {
        // Green and blue follow the coordinates so orientation is observable.
        DynamicImage::ImageRgb8(RgbImage::from_fn(PAGE_WIDTH, PAGE_HEIGHT, |x, y| {
            Rgb([marker, x as u8, y as u8])
        }))
    }
}

/// Reads back the page number stamped into a simulated frame.
pub fn page_marker(image: &DynamicImage) -> u8 {
    image.to_rgb8().get_pixel(0, 0)[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_list() {
        let mut backend = SimulatedBackend::new(2, 0);
        let devices = backend.devices().unwrap();

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].bus_id, "epjitsu:libusb:001:004");
        assert_eq!(devices[1].vendor, "Epson");
    }

    #[test]
    fn test_open_unknown_device() {
        let mut backend = SimulatedBackend::new(1, 0);
        assert!(matches!(
            backend.open("nope"),
            Err(ScanError::UnknownDevice(_))
        ));
        assert_eq!(backend.stats().opens(), 0);
    }

    #[test]
    fn test_feeder_runs_dry() {
        let mut backend = SimulatedBackend::new(1, 2);
        let mut device = backend.open("epjitsu:libusb:001:004").unwrap();

        assert_eq!(
            device.get_option(ScanOption::PageLoaded).unwrap(),
            OptionValue::Bool(true)
        );
        for expected in 1..=2u8 {
            device.start().unwrap();
            assert_eq!(page_marker(&device.snap().unwrap()), expected);
        }
        assert!(matches!(device.start(), Err(ScanError::FeederEmpty)));
        assert_eq!(
            device.get_option(ScanOption::PageLoaded).unwrap(),
            OptionValue::Bool(false)
        );
    }

    #[test]
    fn test_snap_without_start() {
        let mut backend = SimulatedBackend::new(1, 1);
        let mut device = backend.open("epjitsu:libusb:001:004").unwrap();
        assert!(matches!(device.snap(), Err(ScanError::Device(_))));
    }

    #[test]
    fn test_gray_mode_produces_luma() {
        let mut backend = SimulatedBackend::new(1, 1);
        let mut device = backend.open("epjitsu:libusb:001:004").unwrap();
        device
            .set_option(ScanOption::Mode, OptionValue::from("Gray"))
            .unwrap();

        device.start().unwrap();
        let frame = device.snap().unwrap();
        assert!(matches!(frame, DynamicImage::ImageLuma8(_)));
        assert_eq!(page_marker(&frame), 1);
    }

    #[test]
    fn test_page_loaded_is_read_only() {
        let mut backend = SimulatedBackend::new(1, 1);
        let mut device = backend.open("epjitsu:libusb:001:004").unwrap();
        assert!(matches!(
            device.set_option(ScanOption::PageLoaded, OptionValue::Bool(false)),
            Err(ScanError::ReadOnly(ScanOption::PageLoaded))
        ));
    }
}
