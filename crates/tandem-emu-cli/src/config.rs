use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Runner defaults read from `tandem.toml`. Command-line flags override them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RunnerConfig {
    pub boot_rom: Option<PathBuf>,
    /// Emulated seconds to run when neither limit is given on the command
    /// line.
    pub seconds: u64,
    pub trace: bool,
    pub trace_interrupts: bool,
    /// Inclusive physical address range for instruction tracing.
    pub trace_range: Option<[u32; 2]>,
    pub save_on_exit: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            boot_rom: None,
            seconds: 1,
            trace: false,
            trace_interrupts: false,
            trace_range: None,
            save_on_exit: true,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("tandem").join("tandem.toml");
        }
    }

    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("tandem").join("tandem.toml");
    }

    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("tandem")
            .join("tandem.toml");
    }

    PathBuf::from("tandem.toml")
}

pub fn load_from_file(path: &Path) -> RunnerConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return RunnerConfig::default(),
    };

    match toml::from_str::<RunnerConfig>(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(
                "Failed to parse runner config {}: {e}; using defaults",
                path.display()
            );
            RunnerConfig::default()
        }
    }
}
