//! System description model
//!
//! `SystemDescriptionInput` mirrors the input file one to one. It is turned
//! into a validated `SystemDescription` by [`SystemDescription::from_input`],
//! which is the only place user input is checked.

use super::mounts::{extra_mounts_from_input, ExtraMount, ExtraMountInput};
use super::pipettes::{Ot2Pipettes, Ot3Pipettes, RobotAttributesInput};
use super::source::SourceSelector;
use crate::catalog::{
    self, EmulationLevel, Hardware, Repository, SourceMode, CAN_SERVER_IMAGE,
    DEFAULT_COMPOSE_VERSION, EMULATOR_PROXY_IMAGE, ROBOT_SERVER_PORT, SMOOTHIE_IMAGE,
    STATE_MANAGER_IMAGE,
};
use crate::error::{EmulationError, Result};
use crate::settings::Settings;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

static ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("id regex is valid"));

/// Environment variable values accepted in override maps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Bool(bool),
    /// Kept as written so `1.0` does not render as `1`
    Number(serde_yaml::Number),
    Str(String),
}

impl std::fmt::Display for EnvValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvValue::Bool(b) => write!(f, "{}", b),
            EnvValue::Number(n) => write!(f, "{}", n),
            EnvValue::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Raw env var override map
pub type EnvVarsInput = BTreeMap<String, EnvValue>;

/// Rendered env var map
pub type EnvVars = BTreeMap<String, String>;

fn render_env(input: Option<&EnvVarsInput>) -> EnvVars {
    input
        .map(|vars| {
            vars.iter()
                .map(|(key, value)| (key.clone(), value.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn default_exposed_port() -> u16 {
    ROBOT_SERVER_PORT
}

/// Top level input document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SystemDescriptionInput {
    #[serde(default)]
    pub system_unique_id: Option<String>,
    #[serde(default)]
    pub compose_file_version: Option<String>,
    pub monorepo_source: String,
    pub ot3_firmware_source: String,
    pub opentrons_modules_source: String,
    #[serde(default)]
    pub robot: Option<RobotInput>,
    #[serde(default)]
    pub modules: Vec<ModuleInput>,
}

/// Robot as written in the input file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RobotInput {
    pub id: String,
    pub hardware: Hardware,
    pub emulation_level: EmulationLevel,
    #[serde(default = "default_exposed_port")]
    pub exposed_port: u16,
    #[serde(default)]
    pub can_server_exposed_port: Option<u16>,
    #[serde(default)]
    pub state_manager_exposed_port: Option<u16>,
    #[serde(default)]
    pub hardware_specific_attributes: RobotAttributesInput,
    #[serde(default)]
    pub extra_mounts: Vec<ExtraMountInput>,
    #[serde(default)]
    pub robot_server_env_vars: Option<EnvVarsInput>,
    #[serde(default)]
    pub emulator_proxy_env_vars: Option<EnvVarsInput>,
    #[serde(default)]
    pub smoothie_env_vars: Option<EnvVarsInput>,
    #[serde(default)]
    pub can_server_env_vars: Option<EnvVarsInput>,
    #[serde(default)]
    pub state_manager_env_vars: Option<EnvVarsInput>,
    #[serde(default)]
    pub pipettes_env_vars: Option<EnvVarsInput>,
    #[serde(default)]
    pub gripper_env_vars: Option<EnvVarsInput>,
    #[serde(default)]
    pub head_env_vars: Option<EnvVarsInput>,
    #[serde(default)]
    pub gantry_x_env_vars: Option<EnvVarsInput>,
    #[serde(default)]
    pub gantry_y_env_vars: Option<EnvVarsInput>,
    #[serde(default)]
    pub bootloader_env_vars: Option<EnvVarsInput>,
}

/// Temperature behaviour of a heating element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TemperatureModel {
    #[serde(default = "TemperatureModel::default_starting")]
    pub starting: f64,
    #[serde(default = "TemperatureModel::default_degrees_per_tick")]
    pub degrees_per_tick: f64,
}

impl TemperatureModel {
    fn default_starting() -> f64 {
        23.0
    }

    fn default_degrees_per_tick() -> f64 {
        2.0
    }

    fn to_json(self) -> serde_json::Value {
        serde_json::json!({
            "starting": self.starting,
            "degrees_per_tick": self.degrees_per_tick,
        })
    }
}

impl Default for TemperatureModel {
    fn default() -> Self {
        Self {
            starting: Self::default_starting(),
            degrees_per_tick: Self::default_degrees_per_tick(),
        }
    }
}

/// Module `hardware-specific-attributes`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ModuleAttributesInput {
    /// Temperature module only
    #[serde(default)]
    pub temperature: Option<TemperatureModel>,
    /// Thermocycler only
    #[serde(default)]
    pub lid_temperature: Option<TemperatureModel>,
    /// Thermocycler only
    #[serde(default)]
    pub plate_temperature: Option<TemperatureModel>,
}

/// Module as written in the input file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ModuleInput {
    pub id: String,
    pub hardware: Hardware,
    pub emulation_level: EmulationLevel,
    #[serde(default)]
    pub module_env_vars: Option<EnvVarsInput>,
    #[serde(default)]
    pub hardware_specific_attributes: ModuleAttributesInput,
    #[serde(default)]
    pub extra_mounts: Vec<ExtraMountInput>,
}

/// Classified source selectors, one per repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sources {
    pub monorepo: SourceSelector,
    pub ot3_firmware: SourceSelector,
    pub opentrons_modules: SourceSelector,
}

impl Sources {
    pub fn get(&self, repo: Repository) -> &SourceSelector {
        match repo {
            Repository::Monorepo => &self.monorepo,
            Repository::Ot3Firmware => &self.ot3_firmware,
            Repository::OpentronsModules => &self.opentrons_modules,
        }
    }

    pub fn mode(&self, repo: Repository) -> SourceMode {
        self.get(repo).mode()
    }
}

/// Pipettes of the declared robot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RobotPipettes {
    Ot2(Ot2Pipettes),
    Ot3(Ot3Pipettes),
}

/// Per service env var overrides supplied on the robot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotEnvOverrides {
    pub robot_server: EnvVars,
    pub emulator_proxy: EnvVars,
    pub smoothie: EnvVars,
    pub can_server: EnvVars,
    pub state_manager: EnvVars,
    pub pipettes: EnvVars,
    pub gripper: EnvVars,
    pub head: EnvVars,
    pub gantry_x: EnvVars,
    pub gantry_y: EnvVars,
    pub bootloader: EnvVars,
}

/// Validated robot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Robot {
    pub id: String,
    pub hardware: Hardware,
    pub emulation_level: EmulationLevel,
    pub exposed_port: u16,
    pub can_server_exposed_port: Option<u16>,
    pub state_manager_exposed_port: Option<u16>,
    pub pipettes: RobotPipettes,
    pub env: RobotEnvOverrides,
    pub extra_mounts: Vec<ExtraMount>,
}

impl Robot {
    fn from_input(input: &RobotInput) -> Result<Self> {
        validate_id("robot.id", &input.id)?;
        if !input.hardware.is_robot() {
            return Err(EmulationError::InvalidInput(format!(
                "robot.hardware: \"{}\" is not a robot",
                input.hardware
            )));
        }
        input.hardware.check_level(input.emulation_level)?;

        let attributes = &input.hardware_specific_attributes;
        let pipettes = match input.hardware {
            Hardware::Ot2 => RobotPipettes::Ot2(Ot2Pipettes::from_input(attributes)?),
            _ => RobotPipettes::Ot3(Ot3Pipettes::from_input(attributes)?),
        };

        if input.hardware == Hardware::Ot2
            && (input.can_server_exposed_port.is_some()
                || input.state_manager_exposed_port.is_some())
        {
            return Err(EmulationError::InvalidInput(
                "robot: can-server-exposed-port and state-manager-exposed-port are only valid for ot3"
                    .to_string(),
            ));
        }

        let extra_mounts = extra_mounts_from_input("robot", &input.extra_mounts)?;

        Ok(Self {
            id: input.id.clone(),
            hardware: input.hardware,
            emulation_level: input.emulation_level,
            exposed_port: input.exposed_port,
            can_server_exposed_port: input.can_server_exposed_port,
            state_manager_exposed_port: input.state_manager_exposed_port,
            pipettes,
            env: RobotEnvOverrides {
                robot_server: render_env(input.robot_server_env_vars.as_ref()),
                emulator_proxy: render_env(input.emulator_proxy_env_vars.as_ref()),
                smoothie: render_env(input.smoothie_env_vars.as_ref()),
                can_server: render_env(input.can_server_env_vars.as_ref()),
                state_manager: render_env(input.state_manager_env_vars.as_ref()),
                pipettes: render_env(input.pipettes_env_vars.as_ref()),
                gripper: render_env(input.gripper_env_vars.as_ref()),
                head: render_env(input.head_env_vars.as_ref()),
                gantry_x: render_env(input.gantry_x_env_vars.as_ref()),
                gantry_y: render_env(input.gantry_y_env_vars.as_ref()),
                bootloader: render_env(input.bootloader_env_vars.as_ref()),
            },
            extra_mounts,
        })
    }

    pub fn is_ot2(&self) -> bool {
        self.hardware == Hardware::Ot2
    }

    pub fn is_ot3(&self) -> bool {
        self.hardware == Hardware::Ot3
    }

    pub fn ot2_pipettes(&self) -> Option<&Ot2Pipettes> {
        match &self.pipettes {
            RobotPipettes::Ot2(pipettes) => Some(pipettes),
            RobotPipettes::Ot3(_) => None,
        }
    }

    pub fn ot3_pipettes(&self) -> Option<&Ot3Pipettes> {
        match &self.pipettes {
            RobotPipettes::Ot3(pipettes) => Some(pipettes),
            RobotPipettes::Ot2(_) => None,
        }
    }
}

/// Validated module
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub id: String,
    pub hardware: Hardware,
    pub emulation_level: EmulationLevel,
    pub env: EnvVars,
    pub attributes: ModuleAttributesInput,
    pub extra_mounts: Vec<ExtraMount>,
}

impl Module {
    fn from_input(index: usize, input: &ModuleInput) -> Result<Self> {
        validate_id(&format!("modules[{}].id", index), &input.id)?;
        if !input.hardware.is_module() {
            return Err(EmulationError::InvalidInput(format!(
                "modules[{}].hardware: \"{}\" is not a module",
                index, input.hardware
            )));
        }
        input.hardware.check_level(input.emulation_level)?;

        let attributes = &input.hardware_specific_attributes;
        let temperature_ok = attributes.temperature.is_none()
            || input.hardware == Hardware::Temperature;
        let thermocycler_ok = (attributes.lid_temperature.is_none()
            && attributes.plate_temperature.is_none())
            || input.hardware == Hardware::Thermocycler;
        if !temperature_ok || !thermocycler_ok {
            return Err(EmulationError::InvalidInput(format!(
                "modules[{}].hardware-specific-attributes: attribute not valid for {}",
                index, input.hardware
            )));
        }

        let extra_mounts =
            extra_mounts_from_input(&format!("modules[{}]", index), &input.extra_mounts)?;

        Ok(Self {
            id: input.id.clone(),
            hardware: input.hardware,
            emulation_level: input.emulation_level,
            env: render_env(input.module_env_vars.as_ref()),
            attributes: attributes.clone(),
            extra_mounts,
        })
    }

    pub fn source_repository(&self) -> Repository {
        self.hardware.source_repository(self.emulation_level)
    }

    /// Attributes reported alongside the serial number by firmware emulators
    pub fn firmware_attributes(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        match self.hardware {
            Hardware::Temperature => {
                let model = self.attributes.temperature.unwrap_or_default();
                map.insert("temperature".to_string(), model.to_json());
            }
            Hardware::Thermocycler => {
                let lid = self.attributes.lid_temperature.unwrap_or_default();
                let plate = self.attributes.plate_temperature.unwrap_or_default();
                map.insert("lid_temperature".to_string(), lid.to_json());
                map.insert("plate_temperature".to_string(), plate.to_json());
            }
            _ => {}
        }
        map
    }
}

/// Validated system description
#[derive(Debug, Clone, PartialEq)]
pub struct SystemDescription {
    pub system_unique_id: Option<String>,
    pub compose_file_version: String,
    pub robot: Option<Robot>,
    pub modules: Vec<Module>,
    pub sources: Sources,
}

fn validate_id(field: &str, value: &str) -> Result<()> {
    if ID_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(EmulationError::InvalidIdentifier {
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}

/// Canonical names of generated services; input ids may not collide with these
const RESERVED_NAMES: &[&str] = &[
    CAN_SERVER_IMAGE,
    EMULATOR_PROXY_IMAGE,
    SMOOTHIE_IMAGE,
    STATE_MANAGER_IMAGE,
    catalog::MONOREPO_BUILDER_IMAGE,
    catalog::OT3_FIRMWARE_BUILDER_IMAGE,
    catalog::OPENTRONS_MODULES_BUILDER_IMAGE,
    "ot3-head",
    "ot3-gantry-x",
    "ot3-gantry-y",
    "ot3-gripper",
    "ot3-left-pipette",
    "ot3-right-pipette",
    "ot3-bootloader",
];

impl SystemDescription {
    /// Parse and validate a YAML or JSON document
    pub fn from_yaml_str(content: &str, settings: &Settings) -> Result<Self> {
        let input: SystemDescriptionInput = serde_yaml::from_str(content)
            .map_err(|e| EmulationError::InvalidInput(e.to_string()))?;
        Self::from_input(&input, settings)
    }

    /// Read, parse and validate an input file
    pub fn from_file(path: &Path, settings: &Settings) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content, settings)
    }

    /// Validate a parsed input document
    pub fn from_input(input: &SystemDescriptionInput, settings: &Settings) -> Result<Self> {
        if let Some(id) = &input.system_unique_id {
            validate_id("system-unique-id", id)?;
        }

        let robot = input.robot.as_ref().map(Robot::from_input).transpose()?;
        let modules = input
            .modules
            .iter()
            .enumerate()
            .map(|(index, module)| Module::from_input(index, module))
            .collect::<Result<Vec<_>>>()?;

        let mut seen: HashSet<&str> = RESERVED_NAMES.iter().copied().collect();
        let ids = robot
            .iter()
            .map(|r| r.id.as_str())
            .chain(modules.iter().map(|m| m.id.as_str()));
        for id in ids {
            if !seen.insert(id) {
                return Err(EmulationError::DuplicateIdentifier(id.to_string()));
            }
        }

        let sources = Sources {
            monorepo: SourceSelector::classify(
                Repository::Monorepo,
                &input.monorepo_source,
                settings,
            )?,
            ot3_firmware: SourceSelector::classify(
                Repository::Ot3Firmware,
                &input.ot3_firmware_source,
                settings,
            )?,
            opentrons_modules: SourceSelector::classify(
                Repository::OpentronsModules,
                &input.opentrons_modules_source,
                settings,
            )?,
        };

        Ok(Self {
            system_unique_id: input.system_unique_id.clone(),
            compose_file_version: input
                .compose_file_version
                .clone()
                .unwrap_or_else(|| DEFAULT_COMPOSE_VERSION.to_string()),
            robot,
            modules,
            sources,
        })
    }

    /// Whether every source selector is remote
    pub fn is_remote(&self) -> bool {
        Repository::ALL
            .iter()
            .all(|repo| !self.sources.get(*repo).is_local())
    }

    /// Fail with `NotRemoteOnly` naming the first local source
    pub fn require_remote(&self) -> Result<()> {
        match Repository::ALL
            .iter()
            .find(|repo| self.sources.get(**repo).is_local())
        {
            Some(repo) => Err(EmulationError::NotRemoteOnly(repo.input_field().to_string())),
            None => Ok(()),
        }
    }

    pub fn has_ot2(&self) -> bool {
        self.robot.as_ref().is_some_and(Robot::is_ot2)
    }

    pub fn has_ot3(&self) -> bool {
        self.robot.as_ref().is_some_and(Robot::is_ot3)
    }

    /// Name of the single network every service joins
    pub fn network_name(&self) -> &str {
        self.system_unique_id
            .as_deref()
            .unwrap_or(catalog::DEFAULT_NETWORK_NAME)
    }

    /// Prefix a canonical name with the system unique id, if any
    pub fn container_name(&self, canonical: &str) -> String {
        match &self.system_unique_id {
            Some(id) => format!("{}-{}", id, canonical),
            None => canonical.to_string(),
        }
    }
}
