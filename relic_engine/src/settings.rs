use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::render_mode::RenderMode;

/// Optional defaults read from a JSON file. Command-line flags take
/// precedence over every field here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub target: Option<String>,
    pub render_mode: Option<RenderMode>,
    pub save_dir: Option<PathBuf>,
    pub store_size: Option<usize>,
    pub string_capacity: Option<usize>,
}

impl Settings {
    /// Missing files yield the empty settings.
    pub fn from_json_file(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Settings::default());
        };
        if !path.exists() {
            log::info!("settings file {} not found, using defaults", path.display());
            return Ok(Settings::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse settings json: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_partial_settings() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("relic.json");
        fs::write(&path, r#"{ "target": "fortress", "render_mode": "EGA" }"#)?;

        let settings = Settings::from_json_file(Some(&path))?;
        assert_eq!(settings.target.as_deref(), Some("fortress"));
        assert_eq!(settings.render_mode, Some(RenderMode::Ega));
        assert_eq!(settings.save_dir, None);
        Ok(())
    }

    #[test]
    fn missing_file_gives_defaults() -> Result<()> {
        let dir = tempdir()?;
        let settings = Settings::from_json_file(Some(&dir.path().join("absent.json")))?;
        assert_eq!(settings, Settings::default());
        assert_eq!(Settings::from_json_file(None)?, Settings::default());
        Ok(())
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("relic.json");
        fs::write(&path, r#"{ "targte": "typo" }"#).unwrap();
        let err = Settings::from_json_file(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse settings json"));
    }
}
