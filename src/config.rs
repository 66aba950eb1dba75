//! Configuration loading for paperscan.
//!
//! The configuration file is TOML. It holds an optional `[settings]` table, an
//! `[env]` table of environment variables to export before the scanner backend
//! starts, and an ordered `[[configs]]` list of scan profiles:
//!
//! ```toml
//! [settings]
//! theme = "cyan"
//! output_dir = "$HOME/Documents/Scans"
//!
//! [env]
//! SANE_CONFIG_DIR = "$HOME/.config/sane.d"
//!
//! [[configs]]
//! _name = "Default"
//! _description = "Colour, both sides"
//! mode = "Color"
//! resolution = 300
//! source = "ADF Duplex"
//! rotate_first = false
//! ```
//!
//! Loading is a pure function of an explicit search path. Exporting `[env]`
//! into the process is a separate step, [`Configuration::apply_environment`].

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::options::{OptionValue, ScanOption};

/// File name looked up in each search directory when none is given.
pub const DEFAULT_NAME: &str = "paperscan.toml";

/// Profile key holding the display name.
pub const NAME_KEY: &str = "_name";
/// Profile key holding the description.
pub const DESCRIPTION_KEY: &str = "_description";
/// Profile key asking the assembler to turn the first page upside down.
pub const ROTATE_FIRST_KEY: &str = "rotate_first";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read config file '{}': {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("profile '{profile}': unknown option '{key}'")]
    UnknownOption { profile: String, key: String },

    #[error("profile '{profile}': option '{key}' expects a {expected} value")]
    InvalidValue {
        profile: String,
        key: String,
        expected: &'static str,
    },

    #[error("profile '{profile}': option '{key}' is read-only")]
    ReadOnlyOption { profile: String, key: String },

    #[error("env variable '{key}' must be a string")]
    InvalidEnv { key: String },
}

/// Which scanner backend to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The SANE `scanimage` command-line frontend
    #[default]
    Scanimage,
    /// An in-process scanner with a paper feeder, for demos and tests
    Simulated,
}

/// Application settings from the optional `[settings]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Theme name: "default", "cyan", "magenta", "yellow", "green", "red", "blue", "white"
    pub theme: String,
    /// Initial output directory. `$VAR` references and a leading `~` are expanded.
    pub output_dir: Option<String>,
    /// Program that merges page images into the output document
    pub merge_program: String,
    pub backend: BackendKind,
    pub simulated_devices: usize,
    pub simulated_pages: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: "default".to_string(),
            output_dir: None,
            merge_program: "convert".to_string(),
            backend: BackendKind::Scanimage,
            simulated_devices: 1,
            simulated_pages: 3,
        }
    }
}

impl Settings {
    /// Resolves the initial output directory, falling back to the working directory.
    pub fn output_dir(&self) -> PathBuf {
        let Some(raw) = self.output_dir.as_deref() else {
            return std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        };

        let expanded = expand_vars(raw, |name| std::env::var(name).ok());
        match (expanded.strip_prefix("~/"), dirs::home_dir()) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => PathBuf::from(expanded),
        }
    }
}

/// A named set of scan options.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub name: String,
    pub description: String,
    /// Device options in file order
    pub options: Vec<(ScanOption, OptionValue)>,
    /// `None` when the profile does not mention `rotate_first`
    pub rotate_first: Option<bool>,
}

impl Profile {
    /// Builds a profile from one `[[configs]]` table.
    ///
    /// `index` names the profile when `_name` is missing. Keys starting with
    /// an underscore other than `_name` and `_description` are reserved and
    /// ignored.
    pub fn from_table(index: usize, table: &toml::Table) -> Result<Self, ConfigError> {
        let name = match table.get(NAME_KEY) {
            Some(toml::Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(ConfigError::InvalidValue {
                    profile: format!("#{}", index + 1),
                    key: NAME_KEY.to_string(),
                    expected: "string",
                });
            }
            None => format!("Profile {}", index + 1),
        };

        let invalid = |key: &str, expected: &'static str| ConfigError::InvalidValue {
            profile: name.clone(),
            key: key.to_string(),
            expected,
        };

        let mut description = String::new();
        let mut options = Vec::new();
        let mut rotate_first = None;

        for (key, value) in table {
            if key == NAME_KEY {
                continue;
            }
            if key == DESCRIPTION_KEY {
                description = value
                    .as_str()
                    .ok_or_else(|| invalid(key, "string"))?
                    .to_string();
                continue;
            }
            if key.starts_with('_') {
                debug!(profile = %name, key = %key, "Ignoring reserved profile key");
                continue;
            }
            if key == ROTATE_FIRST_KEY {
                rotate_first = Some(value.as_bool().ok_or_else(|| invalid(key, "boolean"))?);
                continue;
            }

            let option: ScanOption =
                key.parse().map_err(|_| ConfigError::UnknownOption {
                    profile: name.clone(),
                    key: key.clone(),
                })?;
            if !option.is_writable() {
                return Err(ConfigError::ReadOnlyOption {
                    profile: name.clone(),
                    key: key.clone(),
                });
            }
            let value = OptionValue::from_toml(value)
                .filter(|v| option.accepts(v))
                .ok_or_else(|| invalid(key, option.kind().as_str()))?;
            options.push((option, value));
        }

        Ok(Self {
            name,
            description,
            options,
            rotate_first,
        })
    }

    pub fn option(&self, option: ScanOption) -> Option<&OptionValue> {
        self.options
            .iter()
            .find(|(o, _)| *o == option)
            .map(|(_, v)| v)
    }

    pub fn rotate_first(&self) -> bool {
        self.rotate_first.unwrap_or(false)
    }
}

/// A parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    pub settings: Settings,
    /// `[env]` entries in file order, not yet expanded
    pub env: Vec<(String, String)>,
    pub profiles: Vec<Profile>,
}

#[derive(Deserialize)]
struct RawConfiguration {
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    env: toml::Table,
    #[serde(default)]
    configs: Vec<toml::Table>,
}

impl Configuration {
    /// Parses configuration text. `path` is only used in error messages.
    pub fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfiguration =
            toml::from_str(contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let env = raw
            .env
            .into_iter()
            .map(|(key, value)| match value {
                toml::Value::String(s) => Ok((key, s)),
                _ => Err(ConfigError::InvalidEnv { key }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let profiles = raw
            .configs
            .iter()
            .enumerate()
            .map(|(index, table)| Profile::from_table(index, table))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            settings: raw.settings,
            env,
            profiles,
        })
    }

    /// Expands the `[env]` table against `lookup` without touching the process.
    ///
    /// Entries are expanded in file order and each entry sees the entries
    /// before it, which is what exporting them one by one would produce.
    pub fn expanded_environment<F>(&self, lookup: F) -> Vec<(String, String)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut exported: HashMap<&str, String> = HashMap::new();
        let mut expanded = Vec::with_capacity(self.env.len());

        for (key, value) in &self.env {
            let value = expand_vars(value, |name| {
                exported.get(name).cloned().or_else(|| lookup(name))
            });
            exported.insert(key.as_str(), value.clone());
            expanded.push((key.clone(), value));
        }

        expanded
    }

    /// Expands `[env]` and exports every entry into the process environment.
    ///
    /// Must run before any other thread is started.
    pub fn apply_environment(&self) -> Vec<(String, String)> {
        let expanded = self.expanded_environment(|name| std::env::var(name).ok());
        for (key, value) in &expanded {
            debug!(key = %key, value = %value, "Exporting environment variable");
            // SAFETY: called from main before the scanner backend or any
            // other thread is started.
            unsafe { std::env::set_var(key, value) };
        }
        expanded
    }
}

/// The default search path: the user config directory, then `/etc`.
pub fn default_search_path() -> Vec<PathBuf> {
    let mut path = Vec::with_capacity(2);
    if let Some(dir) = dirs::config_dir() {
        path.push(dir);
    }
    path.push(PathBuf::from("/etc"));
    path
}

/// Loads `name` from the first directory in `search_path` that has it.
///
/// Returns `Ok(None)` when no directory contains the file. A file that exists
/// but cannot be read or parsed is an error and stops the search.
pub fn load(search_path: &[PathBuf], name: &str) -> Result<Option<Configuration>, ConfigError> {
    for dir in search_path {
        let path = dir.join(name);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file here");
                continue;
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };

        let config = Configuration::parse(&contents, &path)?;
        info!(
            path = %path.display(),
            profiles = config.profiles.len(),
            "Loaded configuration"
        );
        return Ok(Some(config));
    }

    Ok(None)
}

/// Loads configuration from the default search path and file name.
pub fn load_default() -> Result<Option<Configuration>, ConfigError> {
    load(&default_search_path(), DEFAULT_NAME)
}

/// Loads configuration from one explicit file.
///
/// Unlike [`load`], a missing file is an error.
pub fn load_from_file(file: &Path) -> Result<Configuration, ConfigError> {
    let absolute = std::path::absolute(file).map_err(|source| ConfigError::Io {
        path: file.to_path_buf(),
        source,
    })?;
    let dir = absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));
    let name = absolute
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ConfigError::NotFound {
            path: file.to_path_buf(),
        })?;

    load(&[dir], name)?.ok_or_else(|| ConfigError::NotFound {
        path: file.to_path_buf(),
    })
}

/// Expands `$NAME` and `${NAME}` references using `lookup`.
///
/// Names are ASCII letters, digits and underscores. References to unset
/// variables, and malformed references, are left as written.
pub fn expand_vars<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let is_name_char = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        output.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, reference_len) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after.find(|c: char| !is_name_char(c)).unwrap_or(after.len());
            (&after[..end], end)
        };

        match (name.is_empty(), lookup(name)) {
            (false, Some(value)) => output.push_str(&value),
            _ => output.push_str(&rest[pos..pos + 1 + reference_len]),
        }
        rest = &after[reference_len..];
    }

    output.push_str(rest);
    output
}
