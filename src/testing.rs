//! Test doubles shared by the unit tests.

use image::{DynamicImage, GrayImage, ImageFormat, ImageReader, Luma, Rgb, RgbImage};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use crate::assemble::PageMerger;
use crate::backend::DeviceDescriptor;
use crate::backend::simulated::page_marker;
use crate::config::Profile;
use crate::error::AssembleError;
use crate::workflow::{MainAction, Notice, Prompter, SetupAction};

/// 48x64 colour frame whose red channel is `marker`.
pub fn frame(marker: u8) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(48, 64, |x, y| {
        Rgb([marker, x as u8, y as u8])
    }))
}

pub fn gray_frame(marker: u8) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_pixel(48, 64, Luma([marker])))
}

/// Snapshot of the pages handed to one merge.
#[derive(Debug, Clone)]
pub struct MergeCall {
    pub density: String,
    pub file_names: Vec<String>,
    pub markers: Vec<u8>,
    pub contents: Vec<Vec<u8>>,
    pub formats: Vec<Option<ImageFormat>>,
    pub first_page: Option<DynamicImage>,
    /// Directory the pages were in; gone once assembly returns
    pub workdir: PathBuf,
}

/// Records every merge and writes an empty document in place of the real one.
#[derive(Debug, Default)]
pub struct RecordingMerger {
    calls: RefCell<Vec<MergeCall>>,
}

impl RecordingMerger {
    pub fn calls(&self) -> Vec<MergeCall> {
        self.calls.borrow().clone()
    }
}

impl PageMerger for RecordingMerger {
    fn merge(&self, density: &str, pages: &[PathBuf], output: &Path) -> Result<(), AssembleError> {
        let mut decoded = Vec::with_capacity(pages.len());
        let mut formats = Vec::with_capacity(pages.len());
        let mut contents = Vec::with_capacity(pages.len());
        for page in pages {
            contents.push(fs::read(page)?);
            let reader = ImageReader::open(page)?.with_guessed_format()?;
            formats.push(reader.format());
            decoded.push(reader.decode().map_err(|source| AssembleError::Image {
                path: page.clone(),
                source,
            })?);
        }

        self.calls.borrow_mut().push(MergeCall {
            density: density.to_string(),
            file_names: pages
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect(),
            markers: decoded.iter().map(page_marker).collect(),
            contents,
            formats,
            first_page: decoded.into_iter().next(),
            workdir: pages
                .first()
                .and_then(|p| p.parent())
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        });

        fs::write(output, b"")?;
        Ok(())
    }
}

/// Replays scripted operator answers and records what was shown.
///
/// The main menu answers `Quit` once its script runs out; every other
/// prompt answers `None`.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    device_choice: Option<usize>,
    main_actions: VecDeque<MainAction>,
    setup_actions: VecDeque<Option<SetupAction>>,
    profile_choices: VecDeque<Option<usize>>,
    directory_choices: VecDeque<Option<PathBuf>>,

    pub banners: Vec<String>,
    pub waits: usize,
    pub notices: Vec<(Notice, String)>,
    pub device_prompts: Vec<Vec<DeviceDescriptor>>,
    pub summaries: Vec<String>,
    pub setup_offers: Vec<bool>,
}

impl ScriptedPrompter {
    pub fn with_device_choice(mut self, choice: Option<usize>) -> Self {
        self.device_choice = choice;
        self
    }

    pub fn with_main_actions(mut self, actions: impl IntoIterator<Item = MainAction>) -> Self {
        self.main_actions.extend(actions);
        self
    }

    pub fn with_setup_actions(
        mut self,
        actions: impl IntoIterator<Item = Option<SetupAction>>,
    ) -> Self {
        self.setup_actions.extend(actions);
        self
    }

    pub fn with_profile_choices(mut self, choices: impl IntoIterator<Item = Option<usize>>) -> Self {
        self.profile_choices.extend(choices);
        self
    }

    pub fn with_directory_choices(
        mut self,
        choices: impl IntoIterator<Item = Option<PathBuf>>,
    ) -> Self {
        self.directory_choices.extend(choices);
        self
    }
}

impl Prompter for ScriptedPrompter {
    fn set_banner(&mut self, banner: &str) {
        self.banners.push(banner.to_string());
    }

    fn begin_wait(&mut self, _title: &str, _message: &str) -> color_eyre::Result<()> {
        self.waits += 1;
        Ok(())
    }

    fn end_wait(&mut self) {}

    fn notify(&mut self, notice: Notice, message: &str) -> color_eyre::Result<()> {
        self.notices.push((notice, message.to_string()));
        Ok(())
    }

    fn choose_device(&mut self, devices: &[DeviceDescriptor]) -> color_eyre::Result<Option<usize>> {
        self.device_prompts.push(devices.to_vec());
        Ok(self.device_choice)
    }

    fn main_menu(&mut self, summary: &str) -> color_eyre::Result<MainAction> {
        self.summaries.push(summary.to_string());
        Ok(self.main_actions.pop_front().unwrap_or(MainAction::Quit))
    }

    fn setup_menu(&mut self, can_choose_profile: bool) -> color_eyre::Result<Option<SetupAction>> {
        self.setup_offers.push(can_choose_profile);
        Ok(self.setup_actions.pop_front().flatten())
    }

    fn choose_profile(
        &mut self,
        _profiles: &[Profile],
        _current: Option<usize>,
    ) -> color_eyre::Result<Option<usize>> {
        Ok(self.profile_choices.pop_front().flatten())
    }

    fn choose_directory(&mut self, _current: &Path) -> color_eyre::Result<Option<PathBuf>> {
        Ok(self.directory_choices.pop_front().flatten())
    }
}
