//! # paperscan - Terminal Document Scanner
//!
//! paperscan drives a SANE scanner from a text-mode menu. It feeds every sheet
//! through the scanner, stores the pages in a temporary directory and merges
//! them into one PDF named after the time of the scan.
//!
//! ## Features
//!
//! - **Scan Profiles**: Named sets of scanner options loaded from TOML, switchable at runtime
//! - **Multi-Page Capture**: Pulls pages from the document feeder until it runs dry
//! - **First-Page Rotation**: Optionally turns the first page upside down before merging
//! - **Environment Setup**: Exports configured variables (e.g. `SANE_CONFIG_DIR`) at startup
//! - **Themed Terminal UI**: Menus, spinners and status messages in a configurable colour
//!
//! ## Command Line Usage
//!
//! ```bash
//! # Search ~/.config/paperscan.toml, then /etc/paperscan.toml
//! paperscan
//!
//! # Use a specific configuration file
//! paperscan -c ./office.toml
//!
//! # Show debug logging on stderr
//! PAPERSCAN_LOG=paperscan=debug paperscan
//! ```
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use paperscan::assemble::{ConvertMerger, assemble};
//! use paperscan::backend::SimulatedBackend;
//! use paperscan::device::DeviceDirectory;
//! use std::path::Path;
//!
//! fn main() -> color_eyre::Result<()> {
//!     let mut directory = DeviceDirectory::new(Box::new(SimulatedBackend::new(1, 3)));
//!     directory.init()?;
//!     let devices = directory.list_devices()?;
//!     let mut session = directory.open(&devices[0].bus_id)?;
//!     session.set("resolution", 300_i64)?;
//!
//!     let merger = ConvertMerger::new("convert");
//!     let pdf = assemble(session.capture_sequence(), Path::new("."), None, &merger)?;
//!     println!("Saved {}", pdf.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```toml
//! [settings]
//! theme = "cyan"
//! output_dir = "~/Documents/Scans"
//!
//! [env]
//! SANE_CONFIG_DIR = "$HOME/.sane"
//!
//! [[configs]]
//! _name = "Duplex"
//! _description = "Both sides, grey"
//! source = "ADF Duplex"
//! mode = "Gray"
//! resolution = 300
//! rotate_first = true
//! ```
//!
//! ## Module Organization
//!
//! - [`assemble`]: Page files and the PDF merge step
//! - [`backend`]: Scanner backends (`scanimage` and simulated)
//! - [`cli`]: Command-line argument parsing
//! - [`config`]: Configuration loading and environment expansion
//! - [`device`]: Device directory, scan sessions and capture sequences
//! - [`device_picker`]: Scanner selection
//! - [`error`]: Device and assembly errors
//! - [`logging`]: Diagnostic logging setup
//! - [`options`]: The recognized scanner options
//! - [`tui`]: Terminal user interface components
//! - [`workflow`]: The menu-driven scanning workflow

pub mod assemble;
pub mod backend;
pub mod cli;
pub mod config;
pub mod device;
pub mod device_picker;
pub mod error;
pub mod logging;
pub mod options;
pub mod tui;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::{Configuration, Profile};
pub use device::{DeviceDirectory, ScanSession};
pub use error::{AssembleError, ScanError};
pub use options::{OptionValue, ScanOption};
pub use workflow::{Outcome, Workflow};
