use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SCALE: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub boot_rom: Option<PathBuf>,
    pub scale: u32,
    pub palette: String,
    pub show_fps: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            boot_rom: None,
            scale: DEFAULT_SCALE,
            palette: "dmg".to_string(),
            show_fps: false,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("dmg-emu").join("config.toml");
    }

    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("dmg-emu")
            .join("config.toml");
    }

    PathBuf::from("config.toml")
}

/// A missing file yields the defaults silently; a malformed one warns.
pub fn load_from_file(path: &Path) -> Config {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return Config::default(),
    };

    match toml::from_str::<Config>(&text) {
        Ok(mut cfg) => {
            if cfg.scale == 0 {
                warn!("Config {}: scale 0 is invalid; using {DEFAULT_SCALE}", path.display());
                cfg.scale = DEFAULT_SCALE;
            }
            cfg
        }
        Err(e) => {
            warn!("Failed to parse config {}: {e}; using defaults", path.display());
            Config::default()
        }
    }
}
