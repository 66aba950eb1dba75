//! Backend driving the SANE `scanimage` command-line frontend.
//!
//! Every frame is one `scanimage` invocation writing PNM to stdout. With an
//! automatic document feeder selected, each invocation pulls the next sheet;
//! when the feeder is empty `scanimage` exits with `SANE_STATUS_NO_DOCS`.

use image::{DynamicImage, ImageFormat};
use std::io;
use std::process::{Command, Output};
use tracing::{debug, info};

use super::{DeviceDescriptor, DeviceHandle, ScannerBackend, Version};
use crate::error::ScanError;
use crate::options::{OptionValue, ScanOption};

/// Exit status `scanimage` uses for `SANE_STATUS_NO_DOCS`.
const STATUS_NO_DOCS: i32 = 7;

/// One device per line: name, vendor, model, type.
const DEVICE_LIST_FORMAT: &str = "%d\t%v\t%m\t%t%n";

pub struct ScanimageBackend {
    program: String,
}

impl Default for ScanimageBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanimageBackend {
    pub fn new() -> Self {
        Self::with_program("scanimage")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

fn run(program: &str, args: &[String]) -> Result<Output, ScanError> {
    debug!(program, ?args, "Running scanner frontend");
    Command::new(program).args(args).output().map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            ScanError::Device(format!(
                "{} not found. Please install sane-utils (or sane-backends).",
                program
            ))
        } else {
            ScanError::Io(e)
        }
    })
}

impl ScannerBackend for ScanimageBackend {
    fn init(&mut self) -> Result<Version, ScanError> {
        let output = run(&self.program, &["--version".to_string()])?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = parse_version(&stdout).ok_or_else(|| {
            ScanError::Device(format!("unrecognized version output: {}", stdout.trim()))
        })?;
        info!(%version, "SANE initialized");
        Ok(version)
    }

    fn devices(&mut self) -> Result<Vec<DeviceDescriptor>, ScanError> {
        let output = run(&self.program, &["-f".to_string(), DEVICE_LIST_FORMAT.to_string()])?;
        if !output.status.success() {
            return Err(ScanError::Device(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        let devices = parse_device_list(&String::from_utf8_lossy(&output.stdout));
        info!(count = devices.len(), "Enumerated scanners");
        Ok(devices)
    }

    fn open(&mut self, bus_id: &str) -> Result<Box<dyn DeviceHandle>, ScanError> {
        Ok(Box::new(ScanimageDevice {
            program: self.program.clone(),
            bus_id: bus_id.to_string(),
            options: Vec::new(),
            pending: None,
            feeder_empty: false,
        }))
    }

    fn exit(&mut self) {}
}

struct ScanimageDevice {
    program: String,
    bus_id: String,
    /// Options written so far, in write order. Only these are passed to `scanimage`.
    options: Vec<(ScanOption, OptionValue)>,
    pending: Option<DynamicImage>,
    feeder_empty: bool,
}

impl DeviceHandle for ScanimageDevice {
    fn get_option(&self, option: ScanOption) -> Result<OptionValue, ScanError> {
        if option == ScanOption::PageLoaded {
            return Ok(OptionValue::Bool(!self.feeder_empty));
        }
        Ok(self
            .options
            .iter()
            .find(|(o, _)| *o == option)
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| option.default_value()))
    }

    fn set_option(&mut self, option: ScanOption, value: OptionValue) -> Result<(), ScanError> {
        if !option.is_writable() {
            return Err(ScanError::ReadOnly(option));
        }
        match self.options.iter_mut().find(|(o, _)| *o == option) {
            Some(entry) => entry.1 = value,
            None => self.options.push((option, value)),
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), ScanError> {
        let args = scan_args(&self.bus_id, &self.options);
        let output = run(&self.program, &args)?;
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            if is_feeder_empty(output.status.code(), &stderr) {
                self.feeder_empty = true;
                return Err(ScanError::FeederEmpty);
            }
            return Err(ScanError::Device(stderr.trim().to_string()));
        }

        let frame = image::load_from_memory_with_format(&output.stdout, ImageFormat::Pnm)?;
        self.feeder_empty = false;
        self.pending = Some(frame);
        Ok(())
    }

    fn snap(&mut self) -> Result<DynamicImage, ScanError> {
        self.pending
            .take()
            .ok_or_else(|| ScanError::Device("no scan in progress".to_string()))
    }

    fn cancel(&mut self) {
        if self.pending.take().is_some() {
            debug!(device = %self.bus_id, "Discarded unread frame");
        }
    }

    fn close(&mut self) {}
}

/// Extracts the backend version from `scanimage --version` output.
///
/// The output looks like `scanimage (sane-backends) 1.2.1; backend version 1.2.1`.
pub fn parse_version(output: &str) -> Option<Version> {
    let text = output
        .split("backend version")
        .nth(1)
        .unwrap_or(output);

    text.split(|c: char| c.is_whitespace() || c == ';')
        .find_map(|token| {
            let mut parts = token.split('.').map(|p| p.parse::<u32>());
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(Ok(major)), Some(Ok(minor)), Some(Ok(patch)), None) => Some(Version {
                    major,
                    minor,
                    patch,
                }),
                _ => None,
            }
        })
}

/// Parses device lines produced with [`DEVICE_LIST_FORMAT`].
pub fn parse_device_list(output: &str) -> Vec<DeviceDescriptor> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let bus_id = fields.next()?.trim();
            if bus_id.is_empty() {
                return None;
            }
            Some(DeviceDescriptor {
                bus_id: bus_id.to_string(),
                vendor: fields.next().unwrap_or("").trim().to_string(),
                model: fields.next().unwrap_or("").trim().to_string(),
                device_class: fields.next().unwrap_or("").trim().to_string(),
            })
        })
        .collect()
}

/// Command-line flag for a writable option.
fn option_flag(option: ScanOption) -> Option<&'static str> {
    match option {
        ScanOption::Mode => Some("--mode"),
        ScanOption::Resolution => Some("--resolution"),
        ScanOption::PageHeight => Some("--page-height"),
        ScanOption::Contrast => Some("--contrast"),
        ScanOption::Source => Some("--source"),
        ScanOption::PageLoaded => None,
    }
}

/// Arguments for capturing one frame from `bus_id`.
pub fn scan_args(bus_id: &str, options: &[(ScanOption, OptionValue)]) -> Vec<String> {
    let mut args = vec![
        "-d".to_string(),
        bus_id.to_string(),
        "--format=pnm".to_string(),
    ];
    for (option, value) in options {
        if let Some(flag) = option_flag(*option) {
            args.push(flag.to_string());
            args.push(value.to_string());
        }
    }
    args
}

fn is_feeder_empty(code: Option<i32>, stderr: &str) -> bool {
    code == Some(STATUS_NO_DOCS) || stderr.contains("out of documents")
}
