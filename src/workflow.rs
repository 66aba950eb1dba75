//! The menu-driven scanning workflow.
//!
//! Select a device, open it, then loop on the main menu until the operator
//! quits. Scanning applies the active profile to the device and hands the
//! capture sequence to the assembler. Setup changes the active profile or the
//! output directory and always returns to the main menu.
//!
//! All terminal interaction goes through [`Prompter`] so the flow can be
//! driven without a terminal.

use color_eyre::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::assemble::{PageMerger, assemble};
use crate::backend::DeviceDescriptor;
use crate::config::{Configuration, Profile};
use crate::device::{DeviceDirectory, ScanSession};
use crate::device_picker::{DeviceChoice, pick_device};
use crate::error::AssembleError;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Width of a rendered option line, indent included.
pub const SUMMARY_WIDTH: usize = 42;
pub const SUMMARY_INDENT: usize = 4;

const NBSP: char = '\u{a0}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainAction {
    Scan,
    Setup,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupAction {
    ChooseProfile,
    ChooseDirectory,
}

/// How a workflow run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NoDevices,
    Cancelled,
    Finished,
}

/// Operator interaction used by the workflow.
///
/// Methods returning `Option` yield `None` when the operator cancels.
pub trait Prompter {
    /// Title shown above every later screen.
    fn set_banner(&mut self, banner: &str);

    /// Shows a busy indicator until [`Prompter::end_wait`] is called.
    fn begin_wait(&mut self, title: &str, message: &str) -> Result<()>;

    fn end_wait(&mut self);

    /// Shows a message and waits for the operator to acknowledge it.
    fn notify(&mut self, notice: Notice, message: &str) -> Result<()>;

    /// Picks one of several scanners. The first entry is pre-selected.
    fn choose_device(&mut self, devices: &[DeviceDescriptor]) -> Result<Option<usize>>;

    fn main_menu(&mut self, summary: &str) -> Result<MainAction>;

    /// `can_choose_profile` is false when no profiles were loaded.
    fn setup_menu(&mut self, can_choose_profile: bool) -> Result<Option<SetupAction>>;

    fn choose_profile(&mut self, profiles: &[Profile], current: Option<usize>)
    -> Result<Option<usize>>;

    fn choose_directory(&mut self, current: &Path) -> Result<Option<PathBuf>>;
}

/// Mutable selection state for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Index into the loaded profiles
    pub active_profile: Option<usize>,
    pub output_dir: PathBuf,
}

pub struct Workflow<'a, P, M> {
    config: &'a Configuration,
    prompter: P,
    merger: M,
    state: SessionState,
}

impl<'a, P, M> Workflow<'a, P, M>
where
    P: Prompter,
    M: PageMerger,
{
    /// The first profile, if any, starts out active.
    pub fn new(config: &'a Configuration, prompter: P, merger: M) -> Self {
        let state = SessionState {
            active_profile: (!config.profiles.is_empty()).then_some(0),
            output_dir: config.settings.output_dir(),
        };
        Self {
            config,
            prompter,
            merger,
            state,
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state.output_dir = dir.into();
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    pub fn merger(&self) -> &M {
        &self.merger
    }

    pub fn active_profile(&self) -> Option<&Profile> {
        self.state
            .active_profile
            .and_then(|i| self.config.profiles.get(i))
    }

    /// Runs the whole workflow. The opened device is closed before returning.
    pub fn run(&mut self, directory: &mut DeviceDirectory) -> Result<Outcome> {
        self.prompter.set_banner(&banner(None));

        let device = match pick_device(directory, &mut self.prompter)? {
            DeviceChoice::Selected(device) => device,
            DeviceChoice::NoDevices => return Ok(Outcome::NoDevices),
            DeviceChoice::Cancelled => {
                info!("Device selection cancelled");
                return Ok(Outcome::Cancelled);
            }
        };

        let mut session = directory.open(&device.bus_id)?;
        self.prompter.set_banner(&banner(Some(session.descriptor())));

        loop {
            let summary = render_summary(self.active_profile(), &self.state.output_dir);
            match self.prompter.main_menu(&summary)? {
                MainAction::Scan => {
                    self.scan(&mut session)?;
                }
                MainAction::Setup => self.setup()?,
                MainAction::Quit => break,
            }
        }

        info!("Quitting");
        Ok(Outcome::Finished)
    }

    /// Applies the active profile and runs one scan-and-assemble cycle.
    ///
    /// Returns the document path, or `None` when the feeder produced no pages.
    pub fn scan(&mut self, session: &mut ScanSession) -> Result<Option<PathBuf>> {
        let profile = self.active_profile().cloned();
        if let Some(profile) = &profile {
            info!(profile = %profile.name, "Applying profile");
            session.apply(&profile.options)?;
        }

        let assembled = assemble(
            session.capture_sequence(),
            &self.state.output_dir,
            profile.as_ref(),
            &self.merger,
        );

        match assembled {
            Ok(path) => {
                self.prompter
                    .notify(Notice::Success, &format!("Saved {}", path.display()))?;
                Ok(Some(path))
            }
            Err(AssembleError::NoPages) => {
                warn!("Scan produced no pages");
                self.prompter.notify(
                    Notice::Warning,
                    "No pages were scanned. Check that the feeder is loaded.",
                )?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn setup(&mut self) -> Result<()> {
        let can_choose_profile = !self.config.profiles.is_empty();
        match self.prompter.setup_menu(can_choose_profile)? {
            Some(SetupAction::ChooseProfile) if can_choose_profile => {
                let choice = self
                    .prompter
                    .choose_profile(&self.config.profiles, self.state.active_profile)?;
                if let Some(index) = choice.filter(|&i| i < self.config.profiles.len()) {
                    info!(profile = %self.config.profiles[index].name, "Profile selected");
                    self.state.active_profile = Some(index);
                }
            }
            Some(SetupAction::ChooseDirectory) => {
                if let Some(dir) = self.prompter.choose_directory(&self.state.output_dir)? {
                    info!(dir = %dir.display(), "Output directory selected");
                    self.state.output_dir = dir;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// `paperscan <version>`, followed by ` [<vendor> <model>]` once a device is open.
pub fn banner(device: Option<&DeviceDescriptor>) -> String {
    match device {
        Some(device) => format!("{} {} [{}]", APP_NAME, APP_VERSION, device.display_name()),
        None => format!("{} {}", APP_NAME, APP_VERSION),
    }
}

/// Main menu text for the active profile.
pub fn render_summary(profile: Option<&Profile>, output_dir: &Path) -> String {
    let mut lines = vec![
        format!("Output directory: {}", output_dir.display()),
        format!("Config: {}", profile.map_or("<none>", |p| p.name.as_str())),
        String::new(),
    ];

    if let Some(profile) = profile {
        lines.push(profile.description.clone());
        for (option, value) in &profile.options {
            lines.push(option_line(option.as_str(), &value.to_string()));
        }
        if let Some(rotate) = profile.rotate_first {
            lines.push(option_line(
                crate::config::ROTATE_FIRST_KEY,
                &rotate.to_string(),
            ));
        }
    }

    lines.join("\n")
}

fn option_line(key: &str, value: &str) -> String {
    let label = title_case(key);
    let fill = SUMMARY_WIDTH
        .saturating_sub(SUMMARY_INDENT)
        .saturating_sub(label.chars().count())
        .saturating_sub(value.chars().count());

    let mut line = String::with_capacity(SUMMARY_WIDTH + 8);
    line.extend(std::iter::repeat_n(NBSP, SUMMARY_INDENT));
    line.push_str(&label);
    line.extend(std::iter::repeat_n('.', fill));
    line.push_str(value);
    line
}

/// `page_height` becomes `Page_Height`.
fn title_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut word_start = true;
    for c in key.chars() {
        if c.is_alphabetic() {
            if word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            out.push(c);
            word_start = true;
        }
    }
    out
}
