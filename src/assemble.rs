//! Document assembly.
//!
//! Captured frames are written as numbered PNM pages into a temporary
//! directory, the first page is optionally turned upside down, and an external
//! program merges the pages into one PDF named after the current time. The
//! temporary directory is removed when assembly returns, on success or failure.

use chrono::{Local, NaiveDateTime};
use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::{ColorType, DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat, ImageReader};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use crate::config::Profile;
use crate::error::{AssembleError, ScanError};
use crate::options::ScanOption;

/// Density passed to the merge step when the profile sets no resolution.
pub const DEFAULT_DENSITY: i64 = 300;

const PAGE_PREFIX: &str = "page_";

/// Merges ordered page images into one output document.
pub trait PageMerger {
    fn merge(&self, density: &str, pages: &[PathBuf], output: &Path) -> Result<(), AssembleError>;
}

/// Merges pages with ImageMagick's `convert` (or a compatible program).
#[derive(Debug, Clone)]
pub struct ConvertMerger {
    program: String,
}

impl ConvertMerger {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// `-density <density> <pages…> <output>`
    pub fn args(density: &str, pages: &[PathBuf], output: &Path) -> Vec<OsString> {
        let mut args = Vec::with_capacity(pages.len() + 3);
        args.push(OsString::from("-density"));
        args.push(OsString::from(density));
        args.extend(pages.iter().map(|p| p.as_os_str().to_os_string()));
        args.push(output.as_os_str().to_os_string());
        args
    }
}

impl PageMerger for ConvertMerger {
    fn merge(&self, density: &str, pages: &[PathBuf], output: &Path) -> Result<(), AssembleError> {
        info!(
            program = %self.program,
            pages = pages.len(),
            output = %output.display(),
            "Merging pages"
        );
        let status = Command::new(&self.program)
            .args(Self::args(density, pages, output))
            .status()
            .map_err(|source| AssembleError::MergeSpawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(AssembleError::MergeFailed {
                program: self.program.clone(),
                status,
            });
        }
        Ok(())
    }
}

/// `Scan_<YYYYMMDDHHMMSS>.pdf`
pub fn output_filename(timestamp: NaiveDateTime) -> String {
    format!("Scan_{}.pdf", timestamp.format("%Y%m%d%H%M%S"))
}

/// Resolution requested by the profile, or [`DEFAULT_DENSITY`].
pub fn density_for(profile: Option<&Profile>) -> String {
    profile
        .and_then(|p| p.option(ScanOption::Resolution))
        .and_then(|v| v.as_int())
        .unwrap_or(DEFAULT_DENSITY)
        .to_string()
}

fn is_gray(image: &DynamicImage) -> bool {
    matches!(
        image.color(),
        ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16
    )
}

/// Fixed-width page name, so name order is capture order.
fn page_filename(number: usize, image: &DynamicImage) -> String {
    let extension = if is_gray(image) { "pgm" } else { "ppm" };
    format!("{}{:04}.{}", PAGE_PREFIX, number, extension)
}

/// Encodes `image` to `path`. PNM pages are written as binary graymap or pixmap.
fn encode(image: &DynamicImage, path: &Path, format: ImageFormat) -> image::ImageResult<()> {
    if format != ImageFormat::Pnm {
        return image.save_with_format(path, format);
    }

    let writer = BufWriter::new(File::create(path)?);
    if is_gray(image) {
        let gray = image.to_luma8();
        PnmEncoder::new(writer)
            .with_subtype(PnmSubtype::Graymap(SampleEncoding::Binary))
            .write_image(gray.as_raw(), gray.width(), gray.height(), ExtendedColorType::L8)
    } else {
        let rgb = image.to_rgb8();
        PnmEncoder::new(writer)
            .with_subtype(PnmSubtype::Pixmap(SampleEncoding::Binary))
            .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
    }
}

/// Rotates the image at `path` by 180° in place, keeping its format.
pub fn rotate_in_place(path: &Path) -> Result<(), AssembleError> {
    let image_error = |source: image::ImageError| AssembleError::Image {
        path: path.to_path_buf(),
        source,
    };

    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let format = reader.format().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unrecognized image format: {}", path.display()),
        )
    })?;
    let image = reader.decode().map_err(image_error)?;

    encode(&image.rotate180(), path, format).map_err(image_error)?;
    debug!(path = %path.display(), ?format, "Rotated page");
    Ok(())
}

/// Page number parsed from a `page_NNNN.*` file name.
fn page_number(path: &Path) -> Option<usize> {
    path.file_stem()?
        .to_str()?
        .strip_prefix(PAGE_PREFIX)?
        .parse()
        .ok()
}

/// Page files in `dir`, in page-number order.
fn collect_pages(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut pages = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let is_page = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(PAGE_PREFIX));
        if is_page && entry.file_type()?.is_file() {
            pages.push(entry.path());
        }
    }
    pages.sort_by(|a, b| page_number(a).cmp(&page_number(b)).then_with(|| a.cmp(b)));
    Ok(pages)
}

/// Assembles `frames` into `output_dir`, naming the document after the current time.
///
/// Returns the path of the merged document.
pub fn assemble<I>(
    frames: I,
    output_dir: &Path,
    profile: Option<&Profile>,
    merger: &dyn PageMerger,
) -> Result<PathBuf, AssembleError>
where
    I: IntoIterator<Item = Result<DynamicImage, ScanError>>,
{
    assemble_at(frames, output_dir, profile, merger, Local::now().naive_local())
}

/// [`assemble`] with an explicit timestamp for the output name.
pub fn assemble_at<I>(
    frames: I,
    output_dir: &Path,
    profile: Option<&Profile>,
    merger: &dyn PageMerger,
    timestamp: NaiveDateTime,
) -> Result<PathBuf, AssembleError>
where
    I: IntoIterator<Item = Result<DynamicImage, ScanError>>,
{
    let output = output_dir.join(output_filename(timestamp));
    let workdir = tempfile::Builder::new().prefix("paperscan-").tempdir()?;

    for (index, frame) in frames.into_iter().enumerate() {
        let frame = frame?;
        let path = workdir.path().join(page_filename(index + 1, &frame));
        encode(&frame, &path, ImageFormat::Pnm).map_err(|source| AssembleError::Image {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "Wrote page");
    }

    let pages = collect_pages(workdir.path())?;
    let Some(first) = pages.first() else {
        return Err(AssembleError::NoPages);
    };

    if profile.is_some_and(Profile::rotate_first) {
        rotate_in_place(first)?;
    }

    merger.merge(&density_for(profile), &pages, &output)?;
    info!(
        output = %output.display(),
        pages = pages.len(),
        "Document assembled"
    );
    Ok(output)
}
