//! Configuration reading and data directory paths.

pub mod paths;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use paths::get_data_dir;

/// config.json shape (written by the UI settings panel).
///
/// Every field is optional on disk; defaults fill the gaps, and the
/// `GEMINI_API_KEY` environment variable overrides the stored key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudyConfig {
    pub api_key: Option<String>,
    /// Model for mind maps, flashcards, and chat.
    pub text_model: String,
    /// Model for exam generation and extraction.
    pub exam_model: String,
    /// Native-audio model for the live voice tutor.
    pub live_model: String,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub playback_volume: f32,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            text_model: "gemini-3-flash-preview".to_string(),
            exam_model: "gemini-3-pro-preview".to_string(),
            live_model: "gemini-2.5-flash-native-audio-preview-12-2025".to_string(),
            input_device: None,
            output_device: None,
            playback_volume: 1.0,
        }
    }
}

impl StudyConfig {
    /// API key from the environment, falling back to the config file.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.api_key.clone())
    }
}

/// Read config.json from the data directory.
pub fn read_config() -> StudyConfig {
    read_json_file(&get_config_path()).unwrap_or_default()
}

/// Path to config.json.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.json")
}

/// Generic helper: read a JSON file and deserialize it.
fn read_json_file<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Option<T> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(val) => Some(val),
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        },
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to read {}: {}", path.display(), e);
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: StudyConfig =
            serde_json::from_str(r#"{"apiKey": "k-123", "playbackVolume": 0.5}"#).unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("k-123"));
        assert_eq!(cfg.playback_volume, 0.5);
        assert_eq!(cfg.text_model, StudyConfig::default().text_model);
        assert!(cfg.input_device.is_none());
    }
}
