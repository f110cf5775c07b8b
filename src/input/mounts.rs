//! Extra bind mounts declared on robots and modules

use crate::compose::VolumeMount;
use crate::error::{EmulationError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::LazyLock;

static MOUNT_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9_]+$").expect("mount name regex is valid"));

/// What the host side of an extra mount must be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MountType {
    File,
    Directory,
}

impl std::fmt::Display for MountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MountType::File => write!(f, "file"),
            MountType::Directory => write!(f, "directory"),
        }
    }
}

/// One `extra-mounts` entry as written in the input file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ExtraMountInput {
    pub name: String,
    #[serde(rename = "type")]
    pub mount_type: MountType,
    pub source_path: PathBuf,
    pub mount_path: String,
}

/// Validated extra bind mount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraMount {
    pub name: String,
    pub mount_type: MountType,
    pub source_path: PathBuf,
    pub mount_path: String,
}

impl ExtraMount {
    fn from_input(field: &str, input: &ExtraMountInput) -> Result<Self> {
        let invalid = |value: String, reason: String| EmulationError::InvalidMount {
            field: field.to_string(),
            value,
            reason,
        };

        if !MOUNT_NAME_REGEX.is_match(&input.name) {
            return Err(invalid(
                input.name.clone(),
                "name must match ^[A-Z0-9_]+$".to_string(),
            ));
        }
        if input.mount_path.is_empty() {
            return Err(invalid(
                input.name.clone(),
                "mount-path must not be empty".to_string(),
            ));
        }

        let source = &input.source_path;
        let matches_type = match input.mount_type {
            MountType::File => source.is_file(),
            MountType::Directory => source.is_dir(),
        };
        if !matches_type {
            return Err(invalid(
                source.display().to_string(),
                format!("source-path must be an existing {}", input.mount_type),
            ));
        }

        Ok(Self {
            name: input.name.clone(),
            mount_type: input.mount_type,
            source_path: source.clone(),
            mount_path: input.mount_path.clone(),
        })
    }

    pub fn to_volume(&self) -> VolumeMount {
        VolumeMount::bind(self.source_path.display().to_string(), self.mount_path.as_str())
    }
}

/// Validate the `extra-mounts` list of one robot or module.
///
/// `owner` prefixes error fields, e.g. `robot` or `modules[0]`.
pub fn extra_mounts_from_input(owner: &str, inputs: &[ExtraMountInput]) -> Result<Vec<ExtraMount>> {
    let mut names = HashSet::new();
    let mut targets = HashSet::new();
    let mut mounts = Vec::with_capacity(inputs.len());

    for (index, input) in inputs.iter().enumerate() {
        let field = format!("{}.extra-mounts[{}]", owner, index);
        let mount = ExtraMount::from_input(&field, input)?;

        if !names.insert(mount.name.clone()) {
            return Err(EmulationError::InvalidMount {
                field,
                value: mount.name,
                reason: "duplicate mount name".to_string(),
            });
        }
        if !targets.insert(mount.mount_path.clone()) {
            return Err(EmulationError::InvalidMount {
                field,
                value: mount.mount_path,
                reason: "duplicate mount-path".to_string(),
            });
        }
        mounts.push(mount);
    }

    Ok(mounts)
}
