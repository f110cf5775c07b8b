//! Global settings document
//!
//! The settings file tells the compiler where each repository lives on the
//! host by default and where its source can be downloaded from. It is loaded
//! once and then passed by reference through the whole conversion.

use crate::catalog::Repository;
use crate::error::{EmulationError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the settings file location
pub const CONFIGURATION_FILE_LOCATION_VAR_NAME: &str = "CONFIGURATION_FILE_LOCATION";

/// Token substituted with the revision in commit URL templates
pub const COMMIT_SHA_TOKEN: &str = "{{commit-sha}}";

/// Entire settings document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    #[serde(default)]
    pub global_settings: GlobalSettings,
    pub emulation_settings: EmulationSettings,
}

/// Settings shared by every command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GlobalSettings {
    #[serde(default)]
    pub default_folder_paths: DefaultFolderPaths,
}

/// Default host checkout of each repository
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DefaultFolderPaths {
    #[serde(default)]
    pub opentrons: Option<PathBuf>,
    #[serde(default)]
    pub ot3_firmware: Option<PathBuf>,
    #[serde(default)]
    pub modules: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EmulationSettings {
    pub source_download_locations: SourceDownloadLocations,
}

/// Where to download source code from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDownloadLocations {
    /// Download URL of each default branch tip
    pub heads: RepoLocations,
    /// URL templates containing `{{commit-sha}}`
    pub commits: RepoLocations,
}

/// One string per repository
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RepoLocations {
    pub opentrons: String,
    pub ot3_firmware: String,
    pub modules: String,
}

impl RepoLocations {
    fn get(&self, repo: Repository) -> &str {
        match repo {
            Repository::Monorepo => &self.opentrons,
            Repository::Ot3Firmware => &self.ot3_firmware,
            Repository::OpentronsModules => &self.modules,
        }
    }
}

impl Settings {
    /// Parse settings from a JSON string
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| EmulationError::Settings(format!("Failed to parse settings: {}", e)))
    }

    /// Load settings from a file path
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(EmulationError::Settings(format!(
                "configuration file not found at: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Load settings from the explicit path, the environment, or the
    /// per-user config directory, in that order
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(CONFIGURATION_FILE_LOCATION_VAR_NAME).ok();
        let path = settings_path(explicit, env_path.as_deref())?;
        tracing::debug!("Loading settings from {}", path.display());
        Self::from_file(&path)
    }

    /// Download URL of a repository's default branch tip
    pub fn repo_head(&self, repo: Repository) -> &str {
        self.emulation_settings
            .source_download_locations
            .heads
            .get(repo)
    }

    /// Download URL of a specific revision of a repository
    pub fn repo_commit(&self, repo: Repository, revision: &str) -> String {
        self.emulation_settings
            .source_download_locations
            .commits
            .get(repo)
            .replace(COMMIT_SHA_TOKEN, revision)
    }

    /// Default host checkout of a repository, if configured
    pub fn default_folder_path(&self, repo: Repository) -> Option<&Path> {
        let paths = &self.global_settings.default_folder_paths;
        match repo {
            Repository::Monorepo => paths.opentrons.as_deref(),
            Repository::Ot3Firmware => paths.ot3_firmware.as_deref(),
            Repository::OpentronsModules => paths.modules.as_deref(),
        }
    }
}

/// Decide which settings file to read
pub fn settings_path(explicit: Option<&Path>, env_value: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(value) = env_value.filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(value));
    }
    dirs::config_dir()
        .map(|dir| dir.join("opentrons-emulation").join("configuration.json"))
        .ok_or_else(|| {
            EmulationError::Settings(format!(
                "no configuration directory found; set {}",
                CONFIGURATION_FILE_LOCATION_VAR_NAME
            ))
        })
}

#[cfg(test)]
pub(crate) fn test_settings() -> Settings {
    Settings::from_json_str(
        r#"{
            "global-settings": {
                "default-folder-paths": {
                    "opentrons": "/home/user/opentrons"
                }
            },
            "emulation-settings": {
                "source-download-locations": {
                    "heads": {
                        "opentrons": "https://github.com/Opentrons/opentrons/archive/refs/heads/edge.zip",
                        "ot3-firmware": "https://github.com/Opentrons/ot3-firmware/archive/refs/heads/main.zip",
                        "modules": "https://github.com/Opentrons/opentrons-modules/archive/refs/heads/edge.zip"
                    },
                    "commits": {
                        "opentrons": "https://github.com/Opentrons/opentrons/archive/{{commit-sha}}.zip",
                        "ot3-firmware": "https://github.com/Opentrons/ot3-firmware/archive/{{commit-sha}}.zip",
                        "modules": "https://github.com/Opentrons/opentrons-modules/archive/{{commit-sha}}.zip"
                    }
                }
            }
        }"#,
    )
    .unwrap()
}
