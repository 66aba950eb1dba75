//! Error types for device access and document assembly.
//!
//! Configuration errors live next to the loader in [`crate::config`].

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

use crate::options::{ScanOption, ValueKind};

/// Errors raised by a scanner backend or an open scan session.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("unknown option: {0}")]
    UnknownOption(String),

    #[error("unknown device: {0}")]
    UnknownDevice(String),

    #[error("option {option} expects a {} value", expected.as_str())]
    InvalidValue {
        option: ScanOption,
        expected: ValueKind,
    },

    #[error("option {0} is read-only")]
    ReadOnly(ScanOption),

    /// The document feeder has no more pages. Ends a capture sequence normally.
    #[error("document feeder out of documents")]
    FeederEmpty,

    #[error("device error: {0}")]
    Device(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not decode scanned frame: {0}")]
    Image(#[from] image::ImageError),
}

/// Errors raised while turning captured frames into an output document.
#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("no pages were scanned")]
    NoPages,

    #[error("capture failed: {0}")]
    Capture(#[from] ScanError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image processing failed for {}: {source}", path.display())]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("could not run {program}: {source}")]
    MergeSpawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    MergeFailed { program: String, status: ExitStatus },
}
