use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::command::CommandPattern;
use crate::compiler::CompileOptions;
use crate::import::ImportOptions;
use crate::remote::RetryPolicy;
use crate::timecode::TimeUnits;

const SETTINGS_FILE: &str = ".cuegraph.json";
const LIGHT_CUE_CACHE_FILE: &str = ".cuegraph_lightcues.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetKind {
    /// Tab separated `name, start, duration` rows exported from a timeline.
    #[default]
    Song,
    /// Comma separated `key, name...` rows, one group per key.
    Show,
}

/// Persisted settings. Missing fields fall back to their defaults, so files written by older
/// versions keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub workspace_id: String,
    pub destination_cue_list: String,
    pub sheet_kind: SheetKind,
    /// Replace a cue in the destination list that already has the sheet's cue number.
    pub replace_existing: bool,
    /// Color name given to each imported sheet's root group.
    pub root_group_color: Option<String>,
    pub use_light_cue_cache: bool,
    pub light_cue_cache_path: Option<PathBuf>,
    pub chase_fixture_removal_on_matching_fixture: bool,
    pub timeline_resolution_ms: TimeUnits,
    pub reply_attempts: u32,
    pub reply_interval_ms: u64,
    pub light_cues_list: String,
    pub command_prefix: String,
    pub command_first_channel: u32,
    pub command_last_channel: u32,
    pub command_patch: u32,
    pub command_template: String,
}

impl Default for Settings {
    fn default() -> Self {
        let commands = CommandPattern::default();
        Self {
            host: "127.0.0.1".to_string(),
            port: 53000,
            workspace_id: String::new(),
            destination_cue_list: String::new(),
            sheet_kind: SheetKind::Song,
            replace_existing: false,
            root_group_color: None,
            use_light_cue_cache: true,
            light_cue_cache_path: None,
            chase_fixture_removal_on_matching_fixture: false,
            timeline_resolution_ms: 10,
            reply_attempts: 10,
            reply_interval_ms: 100,
            light_cues_list: "Light Cues".to_string(),
            command_prefix: commands.prefix,
            command_first_channel: commands.first_channel,
            command_last_channel: commands.last_channel,
            command_patch: commands.patch,
            command_template: commands.template,
        }
    }
}

impl Settings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.reply_attempts,
            interval: Duration::from_millis(self.reply_interval_ms),
        }
    }

    pub fn command_pattern(&self) -> CommandPattern {
        CommandPattern {
            prefix: self.command_prefix.clone(),
            first_channel: self.command_first_channel,
            last_channel: self.command_last_channel,
            patch: self.command_patch,
            template: self.command_template.clone(),
        }
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            destination: self.destination_cue_list.clone(),
            resolution: self.timeline_resolution_ms,
            compile: CompileOptions {
                chase_fixture_removal: self.chase_fixture_removal_on_matching_fixture,
            },
            replace_existing: self.replace_existing,
            root_color: self.root_group_color.clone(),
        }
    }

    /// The configured light cue cache file, or `~/.cuegraph_lightcues.json`.
    pub fn light_cue_cache_path(&self) -> PathBuf {
        self.light_cue_cache_path
            .clone()
            .unwrap_or_else(|| home_file(LIGHT_CUE_CACHE_FILE))
    }
}

fn home_file(name: &str) -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(name))
        .unwrap_or_else(|| PathBuf::from(name))
}

/// Loads and saves [`Settings`] as a versioned JSON file, `~/.cuegraph.json` by default.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

/// Bounds and choices for the validated settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub port: ConfigOption<u16>,
    pub timeline_resolution_ms: ConfigOption<TimeUnits>,
    pub reply_attempts: ConfigOption<u32>,
    pub reply_interval_ms: ConfigOption<u64>,
    pub command_channels: ConfigOption<u32>,
    pub root_group_color: ConfigOption<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOption<T> {
    pub default: T,
    pub valid_range: Option<(T, T)>,
    pub valid_choices: Option<Vec<String>>,
    pub description: String,
}

/// Persisted configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: Settings,
    pub created_at: String,
    pub modified_at: String,
}

impl ConfigManager {
    /// Create a new configuration manager
    /// If no path is provided, defaults to `.cuegraph.json` in the home directory
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config_path = config_path.unwrap_or_else(|| home_file(SETTINGS_FILE));

        Self {
            config_path,
            settings: Settings::default(),
        }
    }

    /// Load settings from configuration file
    /// Writes and returns the defaults when the file doesn't exist yet
    pub fn load(&mut self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            self.save()?;
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if config_file.version != env!("CARGO_PKG_VERSION") {
            warn!(
                "Config file version {} doesn't match application version {}. Using defaults for new settings.",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        self.settings = config_file.settings;
        Ok(self.settings.clone())
    }

    /// Save current settings to configuration file, keeping the original creation time
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let created_at = fs::read_to_string(&self.config_path)
            .ok()
            .and_then(|content| serde_json::from_str::<ConfigFile>(&content).ok())
            .map(|existing| existing.created_at)
            .unwrap_or_else(|| now.clone());

        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
            created_at,
            modified_at: now,
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(&self.config_path, content)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Validate, then update settings and save to file
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ConfigError> {
        Self::validate_settings(&settings).map_err(ConfigError::ValidationError)?;
        self.settings = settings;
        self.save()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn schema() -> ConfigSchema {
        ConfigSchema {
            port: ConfigOption {
                default: 53000,
                valid_choices: None,
                valid_range: Some((1, 65535)),
                description: "TCP port of the show controller".to_string(),
            },
            timeline_resolution_ms: ConfigOption {
                default: 10,
                valid_choices: None,
                valid_range: Some((1, 1000)),
                description: "Timestamps closer than this are treated as equal".to_string(),
            },
            reply_attempts: ConfigOption {
                default: 10,
                valid_choices: None,
                valid_range: Some((1, 100)),
                description: "Polls for an acknowledgment before a request fails".to_string(),
            },
            reply_interval_ms: ConfigOption {
                default: 100,
                valid_choices: None,
                valid_range: Some((1, 10_000)),
                description: "Time to wait for each acknowledgment poll".to_string(),
            },
            command_channels: ConfigOption {
                default: 1,
                valid_choices: None,
                valid_range: Some((1, 99)),
                description: "Channels addressable by command cues (two digits)".to_string(),
            },
            root_group_color: ConfigOption {
                default: None,
                valid_range: None,
                valid_choices: Some(
                    ["none", "red", "orange", "green", "blue", "purple"]
                        .iter()
                        .map(|c| c.to_string())
                        .collect(),
                ),
                description: "Color of each imported sheet's root group".to_string(),
            },
        }
    }

    /// Validate settings against schema, returning every violation
    pub fn validate_settings(settings: &Settings) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let schema = Self::schema();

        fn check<T: PartialOrd + std::fmt::Display>(
            errors: &mut Vec<String>,
            name: &str,
            value: T,
            option: &ConfigOption<T>,
        ) {
            if let Some((min, max)) = &option.valid_range {
                if value < *min || value > *max {
                    errors.push(format!("{} must be between {} and {}", name, min, max));
                }
            }
        }

        check(&mut errors, "port", settings.port, &schema.port);
        check(
            &mut errors,
            "timeline_resolution_ms",
            settings.timeline_resolution_ms,
            &schema.timeline_resolution_ms,
        );
        check(
            &mut errors,
            "reply_attempts",
            settings.reply_attempts,
            &schema.reply_attempts,
        );
        check(
            &mut errors,
            "reply_interval_ms",
            settings.reply_interval_ms,
            &schema.reply_interval_ms,
        );
        check(
            &mut errors,
            "command_first_channel",
            settings.command_first_channel,
            &schema.command_channels,
        );
        check(
            &mut errors,
            "command_last_channel",
            settings.command_last_channel,
            &schema.command_channels,
        );

        if settings.command_first_channel > settings.command_last_channel {
            errors.push("command_first_channel must not be after command_last_channel".to_string());
        }
        for placeholder in ["{channel}", "{value}"] {
            if !settings.command_template.contains(placeholder) {
                errors.push(format!("command_template must contain {}", placeholder));
            }
        }
        if let (Some(color), Some(choices)) = (
            &settings.root_group_color,
            &schema.root_group_color.valid_choices,
        ) {
            if !choices.contains(color) {
                errors.push(format!(
                    "root_group_color must be one of {}",
                    choices.join(", ")
                ));
            }
        }
        if settings.light_cues_list.trim().is_empty() {
            errors.push("light_cues_list cannot be blank".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    ReadError(String),
    WriteError(String),
    ParseError(String),
    SerializeError(String),
    ValidationError(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(msg) => write!(f, "Failed to read config file: {}", msg),
            ConfigError::WriteError(msg) => write!(f, "Failed to write config file: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config file: {}", msg),
            ConfigError::SerializeError(msg) => write!(f, "Failed to serialize config: {}", msg),
            ConfigError::ValidationError(errors) => {
                write!(f, "Config validation errors: {}", errors.join(", "))
            }
        }
    }
}

impl std::error::Error for ConfigError {}
