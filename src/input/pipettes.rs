//! Pipette selection for robot inputs

use crate::catalog::{EEPROM_FILE_NAME, SMOOTHIE_PORT};
use crate::error::{EmulationError, Result};
use serde::{Deserialize, Serialize};

pub const OT3_SERIAL_CODE_MIN_CHARS: usize = 1;
pub const OT3_SERIAL_CODE_MAX_CHARS: usize = 12;
pub const OT3_MODEL_MAX_VALUE: u32 = 99;
pub const DEFAULT_OT3_SERIAL_CODE: &str = "00000000";

pub const DEFAULT_OT2_PIPETTE_MODEL: &str = "p20_single_v2.0";
pub const DEFAULT_OT2_PIPETTE_ID: &str = "P20SV202020070101";

pub const LEFT_PIPETTE_ENV_VAR_NAME: &str = "LEFT_OT3_PIPETTE_DEFINITION";
pub const RIGHT_PIPETTE_ENV_VAR_NAME: &str = "RIGHT_OT3_PIPETTE_DEFINITION";

/// Pipette mount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mount {
    Left,
    Right,
}

impl std::fmt::Display for Mount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mount::Left => write!(f, "left"),
            Mount::Right => write!(f, "right"),
        }
    }
}

impl Mount {
    fn field(&self) -> &'static str {
        match self {
            Mount::Left => "left-pipette",
            Mount::Right => "right-pipette",
        }
    }
}

/// Pipette selector as written in `hardware-specific-attributes`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PipetteInput {
    /// OT-3 shorthand: just the pipette name
    Name(String),
    /// Full selector
    Detailed(PipetteInputFull),
}

/// Full pipette selector.
///
/// OT-2 robots use `model` and `id`. OT-3 robots use `model` (or its
/// alias `name`), `model-number` and `serial-code`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PipetteInputFull {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model_number: Option<u32>,
    #[serde(default)]
    pub serial_code: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

/// Robot `hardware-specific-attributes`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RobotAttributesInput {
    #[serde(default)]
    pub left_pipette: Option<PipetteInput>,
    #[serde(default)]
    pub right_pipette: Option<PipetteInput>,
}

fn invalid(mount: Mount, value: impl Into<String>, reason: impl Into<String>) -> EmulationError {
    EmulationError::InvalidPipette {
        field: mount.field().to_string(),
        value: value.into(),
        reason: reason.into(),
    }
}

/// Smoothie pipette settings for one OT-2 mount
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ot2Pipette {
    pub model: String,
    pub id: String,
}

impl Default for Ot2Pipette {
    fn default() -> Self {
        Self {
            model: DEFAULT_OT2_PIPETTE_MODEL.to_string(),
            id: DEFAULT_OT2_PIPETTE_ID.to_string(),
        }
    }
}

impl Ot2Pipette {
    fn from_input(mount: Mount, input: Option<&PipetteInput>) -> Result<Self> {
        let full = match input {
            None => return Ok(Self::default()),
            Some(PipetteInput::Name(name)) => {
                return Err(invalid(
                    mount,
                    name.as_str(),
                    "OT-2 pipettes are selected with \"model\" and \"id\"",
                ))
            }
            Some(PipetteInput::Detailed(full)) => full,
        };
        if let Some(name) = &full.name {
            return Err(invalid(mount, name.as_str(), "\"name\" is only valid for OT-3 pipettes"));
        }
        if full.model_number.is_some() || full.serial_code.is_some() {
            return Err(invalid(
                mount,
                "",
                "\"model-number\" and \"serial-code\" are only valid for OT-3 pipettes",
            ));
        }
        let default = Self::default();
        Ok(Self {
            model: full.model.clone().unwrap_or(default.model),
            id: full.id.clone().unwrap_or(default.id),
        })
    }
}

/// Both OT-2 mounts
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Ot2Pipettes {
    pub left: Ot2Pipette,
    pub right: Ot2Pipette,
}

impl Ot2Pipettes {
    pub fn from_input(attributes: &RobotAttributesInput) -> Result<Self> {
        Ok(Self {
            left: Ot2Pipette::from_input(Mount::Left, attributes.left_pipette.as_ref())?,
            right: Ot2Pipette::from_input(Mount::Right, attributes.right_pipette.as_ref())?,
        })
    }

    /// Value of the smoothie's `OT_EMULATOR_smoothie` env var
    pub fn smoothie_env_value(&self) -> String {
        serde_json::json!({
            "left": self.left,
            "right": self.right,
            "port": SMOOTHIE_PORT,
        })
        .to_string()
    }
}

/// Simulator binary family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipetteType {
    Single,
    Multi,
    Channel96,
}

impl PipetteType {
    pub fn simulator_name(&self) -> &'static str {
        match self {
            PipetteType::Single => "pipettes-single-simulator",
            PipetteType::Multi => "pipettes-multi-simulator",
            PipetteType::Channel96 => "pipettes-96-simulator",
        }
    }
}

/// OT-3 pipette catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ot3PipetteKind {
    P50Single,
    P50Multi,
    P1000Single,
    P1000Multi,
    P1000_96,
}

impl Ot3PipetteKind {
    pub const ALL: [Ot3PipetteKind; 5] = [
        Ot3PipetteKind::P50Single,
        Ot3PipetteKind::P50Multi,
        Ot3PipetteKind::P1000Single,
        Ot3PipetteKind::P1000Multi,
        Ot3PipetteKind::P1000_96,
    ];

    pub fn pipette_name(&self) -> &'static str {
        match self {
            Ot3PipetteKind::P50Single => "p50_single_gen3",
            Ot3PipetteKind::P50Multi => "p50_multi_gen3",
            Ot3PipetteKind::P1000Single => "p1000_single_gen3",
            Ot3PipetteKind::P1000Multi => "p1000_multi_gen3",
            Ot3PipetteKind::P1000_96 => "p1000_96",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Ot3PipetteKind::P50Single => "P50 Single",
            Ot3PipetteKind::P50Multi => "P50 Multi",
            Ot3PipetteKind::P1000Single => "P1000 Single",
            Ot3PipetteKind::P1000Multi => "P1000 Multi",
            Ot3PipetteKind::P1000_96 => "P1000 96 Channel",
        }
    }

    pub fn pipette_type(&self) -> PipetteType {
        match self {
            Ot3PipetteKind::P50Single | Ot3PipetteKind::P1000Single => PipetteType::Single,
            Ot3PipetteKind::P50Multi | Ot3PipetteKind::P1000Multi => PipetteType::Multi,
            Ot3PipetteKind::P1000_96 => PipetteType::Channel96,
        }
    }

    /// Model number used when the input does not give one
    pub fn default_model(&self) -> u32 {
        match self {
            Ot3PipetteKind::P1000_96 => 35,
            _ => 34,
        }
    }

    pub fn left_mount_only(&self) -> bool {
        matches!(self, Ot3PipetteKind::P1000_96)
    }

    pub fn blocks_other_mount(&self) -> bool {
        matches!(self, Ot3PipetteKind::P1000_96)
    }

    /// Look a pipette up by internal or display name
    pub fn lookup(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.pipette_name() == name || kind.display_name() == name)
    }
}

/// A pipette attached to one OT-3 mount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ot3Pipette {
    pub kind: Ot3PipetteKind,
    pub model: u32,
    pub serial_code: String,
}

impl Ot3Pipette {
    fn from_input(mount: Mount, input: &PipetteInput) -> Result<Self> {
        let full = match input {
            PipetteInput::Name(name) => PipetteInputFull {
                name: Some(name.clone()),
                ..Default::default()
            },
            PipetteInput::Detailed(full) => full.clone(),
        };
        if let Some(id) = full.id {
            return Err(invalid(mount, id, "\"id\" is only valid for OT-2 pipettes"));
        }
        let name = match (full.name, full.model) {
            (Some(name), None) | (None, Some(name)) => name,
            (Some(name), Some(_)) => {
                return Err(invalid(mount, name, "set either \"model\" or \"name\", not both"))
            }
            (None, None) => {
                return Err(invalid(mount, "", "OT-3 pipettes require a \"model\""));
            }
        };
        let kind = Ot3PipetteKind::lookup(&name)
            .ok_or_else(|| invalid(mount, name.as_str(), "unknown OT-3 pipette"))?;

        let model = full.model_number.unwrap_or_else(|| kind.default_model());
        if model > OT3_MODEL_MAX_VALUE {
            return Err(invalid(
                mount,
                model.to_string(),
                format!("model number must be between 0 and {}", OT3_MODEL_MAX_VALUE),
            ));
        }

        let serial_code = full
            .serial_code
            .unwrap_or_else(|| DEFAULT_OT3_SERIAL_CODE.to_string());
        let length_ok = (OT3_SERIAL_CODE_MIN_CHARS..=OT3_SERIAL_CODE_MAX_CHARS)
            .contains(&serial_code.chars().count());
        if !length_ok || !serial_code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid(
                mount,
                serial_code,
                format!(
                    "serial code must be {} to {} alphanumeric characters",
                    OT3_SERIAL_CODE_MIN_CHARS, OT3_SERIAL_CODE_MAX_CHARS
                ),
            ));
        }

        Ok(Self {
            kind,
            model,
            serial_code,
        })
    }
}

/// Both OT-3 mounts; an empty mount is `None`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ot3Pipettes {
    pub left: Option<Ot3Pipette>,
    pub right: Option<Ot3Pipette>,
}

impl Ot3Pipettes {
    pub fn from_input(attributes: &RobotAttributesInput) -> Result<Self> {
        let left = attributes
            .left_pipette
            .as_ref()
            .map(|input| Ot3Pipette::from_input(Mount::Left, input))
            .transpose()?;
        let right = attributes
            .right_pipette
            .as_ref()
            .map(|input| Ot3Pipette::from_input(Mount::Right, input))
            .transpose()?;

        if let Some(pipette) = &right {
            if pipette.kind.left_mount_only() {
                return Err(invalid(
                    Mount::Right,
                    pipette.kind.pipette_name(),
                    "pipette is restricted to the left mount",
                ));
            }
        }
        if let (Some(pipette), Some(_)) = (&left, &right) {
            if pipette.kind.blocks_other_mount() {
                return Err(invalid(
                    Mount::Right,
                    pipette.kind.pipette_name(),
                    format!(
                        "left pipette \"{}\" blocks both mounts; remove the right pipette",
                        pipette.kind.display_name()
                    ),
                ));
            }
        }

        Ok(Self { left, right })
    }

    pub fn get(&self, mount: Mount) -> Option<&Ot3Pipette> {
        match mount {
            Mount::Left => self.left.as_ref(),
            Mount::Right => self.right.as_ref(),
        }
    }

    /// Simulator binary the pipette service on this mount runs
    pub fn simulator_name(&self, mount: Mount) -> &'static str {
        self.get(mount)
            .map(|p| p.kind.pipette_type())
            .unwrap_or(PipetteType::Single)
            .simulator_name()
    }

    fn definition(&self, mount: Mount) -> serde_json::Value {
        match self.get(mount) {
            Some(pipette) => serde_json::json!({
                "pipette_name": pipette.kind.pipette_name(),
                "pipette_model": format!("{:02}", pipette.model),
                "pipette_serial_code": pipette.serial_code,
            }),
            None => serde_json::json!({
                "pipette_name": "EMPTY",
                "pipette_model": "-1",
                "pipette_serial_code": "",
            }),
        }
    }

    /// `OT3_PIPETTE_DEFINITION` value for the pipette service on a mount
    pub fn definition_env_value(&self, mount: Mount) -> String {
        self.definition(mount).to_string()
    }

    /// Env var the firmware builder uses to write the mount's eeprom
    pub fn builder_env_var(&self, mount: Mount) -> (String, String) {
        let mut value = self.definition(mount);
        value["eeprom_file_path"] = serde_json::Value::String(format!(
            "/volumes/{}-pipette-eeprom/{}",
            mount, EEPROM_FILE_NAME
        ));
        let name = match mount {
            Mount::Left => LEFT_PIPETTE_ENV_VAR_NAME,
            Mount::Right => RIGHT_PIPETTE_ENV_VAR_NAME,
        };
        (name.to_string(), value.to_string())
    }
}
