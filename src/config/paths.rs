//! Platform-specific data directory paths.
//!
//!   Windows: %APPDATA%/edumind/data
//!   macOS:   ~/Library/Application Support/edumind/data
//!   Linux:   $XDG_CONFIG_HOME/edumind/data (default ~/.config)

use std::path::PathBuf;

/// Data directory for config, sessions, and logs.
pub fn get_data_dir() -> PathBuf {
    get_config_base().join("edumind").join("data")
}

/// Directory for rotated log files.
pub fn get_log_dir() -> PathBuf {
    get_data_dir().join("logs")
}

/// Platform-appropriate base config directory.
fn get_config_base() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata);
        }
        dirs::config_dir().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("AppData")
                .join("Roaming")
        })
    }

    #[cfg(target_os = "macos")]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Library")
            .join("Application Support")
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
    }
}
