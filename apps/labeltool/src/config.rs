use std::{fs, path::Path};

use serde::Deserialize;
use shared::domain::{is_color_hex, ViewMode, DEFAULT_COLOR_HEX_LIST};
use tracing::warn;

pub const CONFIG_FILE: &str = "labeltool.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub log_filter: String,
    pub view_mode: ViewMode,
    pub default_group_names: Vec<String>,
    pub default_group_colors: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_filter: "info".into(),
            view_mode: ViewMode::Grouped,
            default_group_names: Vec::new(),
            default_group_colors: default_palette(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    log_filter: Option<String>,
    view_mode: Option<String>,
    default_group_names: Option<Vec<String>>,
    default_group_colors: Option<Vec<String>>,
}

fn default_palette() -> Vec<String> {
    DEFAULT_COLOR_HEX_LIST.iter().map(|c| c.to_string()).collect()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(CONFIG_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the toml file at `path` if readable, then environment
/// overrides resolved through `env`.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => settings.apply_file(file_cfg),
            Err(err) => warn!(path = %path.display(), %err, "ignoring malformed config file"),
        }
    }

    if let Some(v) = env("LABELTOOL_LOG") {
        settings.log_filter = v;
    }
    if let Some(v) = env("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
    if let Some(v) = env("APP__VIEW_MODE") {
        settings.set_view_mode(&v);
    }
    if let Some(v) = env("APP__DEFAULT_GROUP_NAMES") {
        settings.default_group_names = split_list(&v);
    }
    if let Some(v) = env("APP__DEFAULT_GROUP_COLORS") {
        settings.default_group_colors = split_list(&v);
    }

    settings.sanitize_colors();
    settings
}

impl Settings {
    fn apply_file(&mut self, file_cfg: FileSettings) {
        if let Some(v) = file_cfg.log_filter {
            self.log_filter = v;
        }
        if let Some(v) = file_cfg.view_mode {
            self.set_view_mode(&v);
        }
        if let Some(v) = file_cfg.default_group_names {
            self.default_group_names = v;
        }
        if let Some(v) = file_cfg.default_group_colors {
            self.default_group_colors = v;
        }
    }

    fn set_view_mode(&mut self, raw: &str) {
        match raw.parse() {
            Ok(mode) => self.view_mode = mode,
            Err(err) => warn!(%err, "keeping view mode {:?}", self.view_mode),
        }
    }

    fn sanitize_colors(&mut self) {
        self.default_group_colors.retain(|color| {
            let valid = is_color_hex(color);
            if !valid {
                warn!(color = %color, "dropping invalid default group color");
            }
            valid
        });
        if self.default_group_colors.is_empty() {
            self.default_group_colors = default_palette();
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
