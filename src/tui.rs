//! Terminal user interface.
//!
//! [`UI`] owns the terminal and the themed styles; [`DialogPrompter`] drives
//! the workflow's menus with dialoguer and shows a spinner while scanners are
//! probed.

use color_eyre::Result;
use console::{Color, Style, Term, style};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::backend::DeviceDescriptor;
use crate::config::Profile;
use crate::workflow::{MainAction, Notice, Prompter, SetupAction};

const RULE_WIDTH: usize = 70;

/// Styles derived from one theme colour.
#[derive(Debug, Clone)]
pub struct Palette {
    pub color: Color,
    /// Colour name as used in indicatif templates
    pub color_name: &'static str,
    pub info: Style,
    pub warning: Style,
    pub error: Style,
    pub success: Style,
}

impl Palette {
    /// Unknown theme names fall back to white.
    pub fn for_theme(theme: &str) -> Self {
        // base colour, then 256-colour shades for warning, error and success
        let (color, color_name, shades) = match theme {
            "cyan" => (Color::Cyan, "cyan", [51, 87, 123]),
            "magenta" => (Color::Magenta, "magenta", [201, 126, 213]),
            "yellow" => (Color::Yellow, "yellow", [226, 178, 227]),
            "green" => (Color::Green, "green", [46, 28, 120]),
            "red" => (Color::Red, "red", [196, 124, 210]),
            "blue" => (Color::Blue, "blue", [39, 25, 117]),
            _ => (Color::White, "white", [255, 250, 255]),
        };
        let [warning, error, success] = shades;

        Self {
            color,
            color_name,
            info: Style::new().fg(color),
            warning: Style::new().color256(warning),
            error: Style::new().color256(error),
            success: Style::new().color256(success),
        }
    }

    pub fn accent(&self) -> Style {
        Style::new().fg(self.color)
    }

    pub fn dialog_theme(&self) -> ColorfulTheme {
        ColorfulTheme {
            values_style: self.accent(),
            active_item_style: self.accent().bold(),
            active_item_prefix: style("❯".to_string()).fg(self.color).bold(),
            ..ColorfulTheme::default()
        }
    }
}

pub struct UI {
    pub term: Term,
    palette: Palette,
    banner: String,
}

impl UI {
    pub fn new(theme: &str) -> Self {
        Self {
            term: Term::stdout(),
            palette: Palette::for_theme(theme),
            banner: String::new(),
        }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn set_banner(&mut self, banner: &str) {
        self.banner = banner.to_string();
    }

    /// Clears the screen and prints the banner with a section title.
    pub fn screen(&self, title: &str) -> io::Result<()> {
        let white_bold = Style::new().white().bold();

        self.term.clear_screen()?;
        println!("{}", self.palette.accent().bold().apply_to(&self.banner));
        println!("{}", white_bold.apply_to("=".repeat(RULE_WIDTH)));
        println!("{}", self.palette.accent().bold().apply_to(title));
        println!("{}", white_bold.apply_to("=".repeat(RULE_WIDTH)));
        println!();
        Ok(())
    }

    pub fn print_info(&self, message: &str) -> io::Result<()> {
        self.print_status(&self.palette.info, "[*]", message)
    }

    pub fn print_error(&self, message: &str) -> io::Result<()> {
        self.print_status(&self.palette.error, "[!] ERROR:", message)
    }

    pub fn print_success(&self, message: &str) -> io::Result<()> {
        self.print_status(&self.palette.success, "[✓]", message)
    }

    pub fn print_warning(&self, message: &str) -> io::Result<()> {
        self.print_status(&self.palette.warning, "[!] WARNING:", message)
    }

    fn print_status(&self, prefix_style: &Style, prefix: &str, message: &str) -> io::Result<()> {
        let white_bold = Style::new().white().bold();
        self.term.write_line(&format!(
            "{} {}",
            prefix_style.apply_to(prefix).bold(),
            white_bold.apply_to(message)
        ))
    }

    /// Spinner for blocking operations without progress information.
    pub fn create_spinner(&self, message: &str) -> Result<ProgressBar> {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template(&format!("{{spinner:.{}}} {{msg}}", self.palette.color_name))?
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Ok(pb)
    }

    /// Restores the terminal for the shell.
    pub fn cleanup(&self) -> io::Result<()> {
        self.term.show_cursor()?;
        self.term.clear_screen()
    }

    /// [`UI::cleanup`], logging a failure instead of returning it.
    pub fn restore(&self) -> bool {
        match self.cleanup() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to restore terminal");
                false
            }
        }
    }
}

impl Drop for UI {
    fn drop(&mut self) {
        let _ = self.term.show_cursor();
    }
}

/// [`Prompter`] backed by dialoguer menus.
pub struct DialogPrompter {
    ui: UI,
    spinner: Option<ProgressBar>,
}

impl DialogPrompter {
    pub fn new(ui: UI) -> Self {
        Self { ui, spinner: None }
    }

    pub fn ui(&self) -> &UI {
        &self.ui
    }

    fn select(&self, prompt: &str, items: &[String], default: usize) -> Result<Option<usize>> {
        let theme = self.ui.palette().dialog_theme();
        let selection = Select::with_theme(&theme)
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact_opt()?;
        Ok(selection)
    }
}

impl Prompter for DialogPrompter {
    fn set_banner(&mut self, banner: &str) {
        self.ui.set_banner(banner);
    }

    fn begin_wait(&mut self, title: &str, message: &str) -> Result<()> {
        self.ui.screen(title)?;
        self.spinner = Some(self.ui.create_spinner(message)?);
        Ok(())
    }

    fn end_wait(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }

    fn notify(&mut self, notice: Notice, message: &str) -> Result<()> {
        self.ui.screen("NOTICE")?;
        match notice {
            Notice::Success => self.ui.print_success(message)?,
            Notice::Warning => self.ui.print_warning(message)?,
            Notice::Error => self.ui.print_error(message)?,
        }
        println!();
        self.ui.print_info("Press any key to continue...")?;
        self.ui.term.read_key()?;
        Ok(())
    }

    fn choose_device(&mut self, devices: &[DeviceDescriptor]) -> Result<Option<usize>> {
        self.ui.screen("SCANNER SELECTION")?;
        let items: Vec<String> = devices
            .iter()
            .map(|d| format!("{} ({})", d.display_name(), d.bus_id))
            .collect();
        self.select("Select a scanner", &items, 0)
    }

    fn main_menu(&mut self, summary: &str) -> Result<MainAction> {
        self.ui.screen("MAIN MENU")?;
        println!("{}", summary);
        println!();

        const ACTIONS: [(&str, MainAction); 3] = [
            ("Scan", MainAction::Scan),
            ("Setup", MainAction::Setup),
            ("Quit", MainAction::Quit),
        ];
        let items: Vec<String> = ACTIONS.iter().map(|(label, _)| label.to_string()).collect();
        let action = self
            .select("Choose an action", &items, 0)?
            .map_or(MainAction::Quit, |i| ACTIONS[i].1);
        Ok(action)
    }

    fn setup_menu(&mut self, can_choose_profile: bool) -> Result<Option<SetupAction>> {
        self.ui.screen("SETUP")?;
        let mut actions = Vec::with_capacity(2);
        if can_choose_profile {
            actions.push(("Choose profile", SetupAction::ChooseProfile));
        }
        actions.push(("Choose output directory", SetupAction::ChooseDirectory));

        let items: Vec<String> = actions.iter().map(|(label, _)| label.to_string()).collect();
        Ok(self
            .select("Setup", &items, 0)?
            .and_then(|i| actions.get(i))
            .map(|(_, action)| *action))
    }

    fn choose_profile(&mut self, profiles: &[Profile], current: Option<usize>) -> Result<Option<usize>> {
        self.ui.screen("PROFILE")?;
        let items: Vec<String> = profiles
            .iter()
            .map(|p| {
                if p.description.is_empty() {
                    p.name.clone()
                } else {
                    format!("{} - {}", p.name, p.description)
                }
            })
            .collect();
        self.select("Select a profile", &items, current.unwrap_or(0))
    }

    fn choose_directory(&mut self, current: &Path) -> Result<Option<PathBuf>> {
        self.ui.screen("OUTPUT DIRECTORY")?;
        let theme = self.ui.palette().dialog_theme();
        let input: String = Input::with_theme(&theme)
            .with_prompt("Output directory (empty keeps the current one)")
            .with_initial_text(current.display().to_string())
            .allow_empty(true)
            .validate_with(|input: &String| -> std::result::Result<(), String> {
                let trimmed = input.trim();
                if trimmed.is_empty() || Path::new(trimmed).is_dir() {
                    Ok(())
                } else {
                    Err(format!("{} is not a directory", trimmed))
                }
            })
            .interact_text()?;

        let trimmed = input.trim();
        Ok((!trimmed.is_empty()).then(|| PathBuf::from(trimmed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_known_theme() {
        let palette = Palette::for_theme("cyan");
        assert_eq!(palette.color, Color::Cyan);
        assert_eq!(palette.color_name, "cyan");
    }

    #[test]
    fn test_palette_unknown_theme_is_white() {
        let palette = Palette::for_theme("chartreuse");
        assert_eq!(palette.color, Color::White);
        assert_eq!(palette.color_name, "white");
    }

    #[test]
    fn test_restore_outside_a_terminal() {
        // stdout is not a terminal under the test harness, so restoring is a no-op
        let ui = UI::new("green");
        assert!(ui.restore());
    }

    #[test]
    fn test_spinner_template_is_valid() {
        for theme in ["cyan", "magenta", "yellow", "green", "red", "blue", "white"] {
            let ui = UI::new(theme);
            let pb = ui.create_spinner("probing").unwrap();
            pb.finish_and_clear();
        }
    }
}
