//! Hardware catalog
//!
//! Static tables mapping hardware kinds, emulation levels and source modes to
//! image names, plus the named volumes, ports and environment keys each
//! runtime component needs. Every lookup here is pure.

use crate::error::{EmulationError, Result};
use serde::{Deserialize, Serialize};

/// Compose file version emitted when the input does not override it
pub const DEFAULT_COMPOSE_VERSION: &str = "3.8";
/// Network name used when no system unique id is set
pub const DEFAULT_NETWORK_NAME: &str = "local-network";

/// Port the robot server listens on inside its container
pub const ROBOT_SERVER_PORT: u16 = 31950;
/// Port the CAN server listens on inside its container
pub const CAN_SERVER_PORT: u16 = 9898;
/// Port the OT-3 state manager listens on inside its container
pub const STATE_MANAGER_PORT: u16 = 9999;
/// Port the smoothie emulator listens on
pub const SMOOTHIE_PORT: u16 = 11000;

pub const DOCKERFILE_NAME: &str = "Dockerfile";
pub const DEV_DOCKERFILE_NAME: &str = "dev_Dockerfile";
pub const DEFAULT_DOCKER_DIR: &str = "./docker";
pub const ENTRYPOINT_DEST: &str = "/entrypoint.sh";
pub const EEPROM_FILE_NAME: &str = "eeprom.bin";

pub const MONOREPO_WHEELS_VOLUME: &str = "monorepo-wheels";
pub const MONOREPO_WHEELS_DEST: &str = "/dist";
pub const STATE_MANAGER_DIST_VOLUME: &str = "state-manager-dist";
pub const STATE_MANAGER_VENV_VOLUME: &str = "state-manager-venv";
pub const STATE_MANAGER_DIST_DEST: &str = "/state-manager-dist";
pub const STATE_MANAGER_VENV_DEST: &str = "/.venv";

/// Fixed images and canonical container names
pub const CAN_SERVER_IMAGE: &str = "can-server";
pub const EMULATOR_PROXY_IMAGE: &str = "emulator-proxy";
pub const SMOOTHIE_IMAGE: &str = "smoothie";
pub const STATE_MANAGER_IMAGE: &str = "ot3-state-manager";
pub const ROBOT_SERVER_IMAGE: &str = "robot-server";
pub const MONOREPO_BUILDER_IMAGE: &str = "monorepo-builder";
pub const OT3_FIRMWARE_BUILDER_IMAGE: &str = "ot3-firmware-builder";
pub const OPENTRONS_MODULES_BUILDER_IMAGE: &str = "opentrons-modules-builder";

/// Hardware that can be declared in an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hardware {
    #[serde(rename = "ot2")]
    Ot2,
    #[serde(rename = "ot3")]
    Ot3,
    #[serde(rename = "heater-shaker-module")]
    HeaterShaker,
    #[serde(rename = "magnetic-module")]
    Magnetic,
    #[serde(rename = "temperature-module")]
    Temperature,
    #[serde(rename = "thermocycler-module")]
    Thermocycler,
}

impl std::fmt::Display for Hardware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Hardware::Ot2 => write!(f, "ot2"),
            Hardware::Ot3 => write!(f, "ot3"),
            Hardware::HeaterShaker => write!(f, "heater-shaker-module"),
            Hardware::Magnetic => write!(f, "magnetic-module"),
            Hardware::Temperature => write!(f, "temperature-module"),
            Hardware::Thermocycler => write!(f, "thermocycler-module"),
        }
    }
}

impl Hardware {
    /// Module kinds in the order their proxy entries are emitted
    pub const MODULES: [Hardware; 4] = [
        Hardware::HeaterShaker,
        Hardware::Magnetic,
        Hardware::Temperature,
        Hardware::Thermocycler,
    ];

    pub fn is_robot(&self) -> bool {
        matches!(self, Hardware::Ot2 | Hardware::Ot3)
    }

    pub fn is_module(&self) -> bool {
        !self.is_robot()
    }

    /// Whether the hardware can be emulated at the given level
    pub fn supports(&self, level: EmulationLevel) -> bool {
        match (self, level) {
            (Hardware::Ot2, EmulationLevel::Firmware) => true,
            (Hardware::Ot3, EmulationLevel::Hardware) => true,
            (Hardware::HeaterShaker | Hardware::Thermocycler, _) => true,
            (Hardware::Magnetic | Hardware::Temperature, EmulationLevel::Firmware) => true,
            _ => false,
        }
    }

    /// Fail with `UnsupportedCombination` when the pair has no image
    pub fn check_level(&self, level: EmulationLevel) -> Result<()> {
        if self.supports(level) {
            Ok(())
        } else {
            Err(EmulationError::UnsupportedCombination {
                hardware: self.to_string(),
                level: level.to_string(),
            })
        }
    }

    /// Repository the runtime image for this hardware is compiled from.
    ///
    /// Robots and firmware level modules run out of the monorepo, hardware
    /// level modules run opentrons-modules simulators.
    pub fn source_repository(&self, level: EmulationLevel) -> Repository {
        match (self, level) {
            (Hardware::HeaterShaker | Hardware::Thermocycler, EmulationLevel::Hardware) => {
                Repository::OpentronsModules
            }
            _ => Repository::Monorepo,
        }
    }

    /// Executable subsystem backing a hardware level module
    pub fn module_subsystem(&self) -> Option<Subsystem> {
        match self {
            Hardware::HeaterShaker => Some(Subsystem::HeaterShaker),
            Hardware::Thermocycler => Some(Subsystem::Thermocycler),
            _ => None,
        }
    }
}

/// Level at which a piece of hardware is emulated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmulationLevel {
    Hardware,
    Firmware,
}

impl std::fmt::Display for EmulationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmulationLevel::Hardware => write!(f, "hardware"),
            EmulationLevel::Firmware => write!(f, "firmware"),
        }
    }
}

/// Whether a repository is compiled from a host directory or downloaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceMode {
    Local,
    Remote,
}

impl SourceMode {
    fn suffix(&self) -> &'static str {
        match self {
            SourceMode::Local => "local",
            SourceMode::Remote => "remote",
        }
    }
}

/// Source repositories the emulators are built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Repository {
    Monorepo,
    Ot3Firmware,
    OpentronsModules,
}

impl std::fmt::Display for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical_name())
    }
}

impl std::str::FromStr for Repository {
    type Err = EmulationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "opentrons" | "monorepo" => Ok(Repository::Monorepo),
            "ot3-firmware" => Ok(Repository::Ot3Firmware),
            "opentrons-modules" | "modules" => Ok(Repository::OpentronsModules),
            other => Err(EmulationError::UnknownRepository(other.to_string())),
        }
    }
}

impl Repository {
    pub const ALL: [Repository; 3] = [
        Repository::Monorepo,
        Repository::Ot3Firmware,
        Repository::OpentronsModules,
    ];

    /// Directory name the source is mounted at inside builder containers
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Repository::Monorepo => "opentrons",
            Repository::Ot3Firmware => "ot3-firmware",
            Repository::OpentronsModules => "opentrons-modules",
        }
    }

    /// Build argument the Dockerfile reads the download location from
    pub fn build_arg_name(&self) -> &'static str {
        match self {
            Repository::Monorepo => "OPENTRONS_SOURCE_DOWNLOAD_LOCATION",
            Repository::Ot3Firmware => "FIRMWARE_SOURCE_DOWNLOAD_LOCATION",
            Repository::OpentronsModules => "MODULE_SOURCE_DOWNLOAD_LOCATION",
        }
    }

    pub fn default_branch(&self) -> &'static str {
        match self {
            Repository::Monorepo => "edge",
            Repository::Ot3Firmware => "main",
            Repository::OpentronsModules => "edge",
        }
    }

    /// Input file key holding this repository's source selector
    pub fn input_field(&self) -> &'static str {
        match self {
            Repository::Monorepo => "monorepo-source",
            Repository::Ot3Firmware => "ot3-firmware-source",
            Repository::OpentronsModules => "opentrons-modules-source",
        }
    }

    /// Image of the builder service compiling this repository
    pub fn builder_image(&self) -> &'static str {
        match self {
            Repository::Monorepo => MONOREPO_BUILDER_IMAGE,
            Repository::Ot3Firmware => OT3_FIRMWARE_BUILDER_IMAGE,
            Repository::OpentronsModules => OPENTRONS_MODULES_BUILDER_IMAGE,
        }
    }

    /// Build cache volumes mounted into the builder (name, destination)
    pub fn cache_volumes(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Repository::Monorepo => &[],
            Repository::Ot3Firmware => &[
                (
                    "ot3-firmware-build-host-docker-cache",
                    "/ot3-firmware/build-host",
                ),
                (
                    "ot3-firmware-stm32-tools-docker-cache",
                    "/ot3-firmware/stm32-tools",
                ),
            ],
            Repository::OpentronsModules => &[
                (
                    "opentrons-modules-build-host-docker-cache",
                    "/opentrons-modules/build-host",
                ),
                (
                    "opentrons-modules-stm32-tools-docker-cache",
                    "/opentrons-modules/stm32-tools",
                ),
            ],
        }
    }

    /// Subsystems whose executables this repository's builder produces
    pub fn subsystems(&self) -> &'static [Subsystem] {
        match self {
            Repository::Monorepo => &[],
            Repository::Ot3Firmware => &Subsystem::OT3,
            Repository::OpentronsModules => &Subsystem::MODULES,
        }
    }
}

/// Emulator subsystems that run a compiled executable out of a named volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Head,
    GantryX,
    GantryY,
    Gripper,
    LeftPipette,
    RightPipette,
    Bootloader,
    HeaterShaker,
    Thermocycler,
}

impl std::fmt::Display for Subsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

impl Subsystem {
    /// OT-3 subsystems in emission order
    pub const OT3: [Subsystem; 7] = [
        Subsystem::Head,
        Subsystem::LeftPipette,
        Subsystem::RightPipette,
        Subsystem::GantryX,
        Subsystem::GantryY,
        Subsystem::Gripper,
        Subsystem::Bootloader,
    ];

    /// opentrons-modules subsystems
    pub const MODULES: [Subsystem; 2] = [Subsystem::HeaterShaker, Subsystem::Thermocycler];

    pub fn short_name(&self) -> &'static str {
        match self {
            Subsystem::Head => "head",
            Subsystem::GantryX => "gantry-x",
            Subsystem::GantryY => "gantry-y",
            Subsystem::Gripper => "gripper",
            Subsystem::LeftPipette => "left-pipette",
            Subsystem::RightPipette => "right-pipette",
            Subsystem::Bootloader => "bootloader",
            Subsystem::HeaterShaker => "heater-shaker",
            Subsystem::Thermocycler => "thermocycler",
        }
    }

    pub fn repository(&self) -> Repository {
        match self {
            Subsystem::HeaterShaker | Subsystem::Thermocycler => Repository::OpentronsModules,
            _ => Repository::Ot3Firmware,
        }
    }

    pub fn is_pipette(&self) -> bool {
        matches!(self, Subsystem::LeftPipette | Subsystem::RightPipette)
    }

    /// Subsystems persisting an eeprom image between runs
    pub fn has_eeprom(&self) -> bool {
        self.is_pipette() || matches!(self, Subsystem::Gripper)
    }

    /// Whether the subsystem talks to the OT-3 state manager
    pub fn uses_state_manager(&self) -> bool {
        self.repository() == Repository::Ot3Firmware && *self != Subsystem::Bootloader
    }

    /// Image of the OT-3 firmware service for this subsystem
    pub fn ot3_image(&self) -> Result<&'static str> {
        match self {
            Subsystem::Head => Ok("ot3-head-hardware"),
            Subsystem::GantryX => Ok("ot3-gantry-x-hardware"),
            Subsystem::GantryY => Ok("ot3-gantry-y-hardware"),
            Subsystem::Gripper => Ok("ot3-gripper-hardware"),
            Subsystem::LeftPipette | Subsystem::RightPipette => Ok("ot3-pipettes-hardware"),
            Subsystem::Bootloader => Ok("ot3-bootloader-hardware"),
            other => Err(EmulationError::ImageUndefined(format!(
                "no OT-3 image for subsystem {}",
                other
            ))),
        }
    }
}

/// Canonical container name of an OT-3 firmware service
pub fn ot3_service_name(subsystem: Subsystem) -> String {
    format!("ot3-{}", subsystem.short_name())
}

/// Named volume holding the compiled executable of a subsystem
pub fn builder_volume_name(subsystem: Subsystem) -> String {
    format!("{}-executable", subsystem.short_name())
}

/// Where the builder writes a subsystem's executable
pub fn builder_volume_dest(subsystem: Subsystem) -> String {
    format!("/volumes/{}", builder_volume_name(subsystem))
}

/// Where an emulator reads its executable from
pub fn emulator_volume_dest(_subsystem: Subsystem) -> String {
    "/executable".to_string()
}

pub fn eeprom_volume_name(subsystem: Subsystem) -> String {
    format!("{}-eeprom", subsystem.short_name())
}

pub fn eeprom_builder_dest(subsystem: Subsystem) -> String {
    format!("/volumes/{}", eeprom_volume_name(subsystem))
}

pub fn eeprom_emulator_dest(_subsystem: Subsystem) -> String {
    "/eeprom".to_string()
}

/// Image for an input-declared robot or module
pub fn image_name(hardware: Hardware, level: EmulationLevel, mode: SourceMode) -> Result<String> {
    hardware.check_level(level)?;
    let base = match (hardware, level) {
        (Hardware::Ot2 | Hardware::Ot3, _) => return Ok(ROBOT_SERVER_IMAGE.to_string()),
        (Hardware::HeaterShaker, EmulationLevel::Hardware) => "heater-shaker-hardware",
        (Hardware::HeaterShaker, EmulationLevel::Firmware) => "heater-shaker-firmware",
        (Hardware::Thermocycler, EmulationLevel::Hardware) => "thermocycler-hardware",
        (Hardware::Thermocycler, EmulationLevel::Firmware) => "thermocycler-firmware",
        (Hardware::Magnetic, EmulationLevel::Firmware) => "magdeck-firmware",
        (Hardware::Temperature, EmulationLevel::Firmware) => "tempdeck-firmware",
        (hardware, level) => {
            return Err(EmulationError::ImageUndefined(format!(
                "{} at {} level",
                hardware, level
            )))
        }
    };
    Ok(format!("{}-{}", base, mode.suffix()))
}

/// Fixed proxy ports of a module kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyInfo {
    pub env_var_name: &'static str,
    pub emulator_port: u16,
    pub driver_port: u16,
}

impl ProxyInfo {
    /// JSON value carried in the proxy env var
    pub fn env_value(&self) -> String {
        serde_json::json!({
            "emulator_port": self.emulator_port,
            "driver_port": self.driver_port,
        })
        .to_string()
    }
}

pub fn proxy_info(module: Hardware) -> Result<ProxyInfo> {
    match module {
        Hardware::Temperature => Ok(ProxyInfo {
            env_var_name: "OT_EMULATOR_temperature_proxy",
            emulator_port: 10001,
            driver_port: 11001,
        }),
        Hardware::Magnetic => Ok(ProxyInfo {
            env_var_name: "OT_EMULATOR_magdeck_proxy",
            emulator_port: 10002,
            driver_port: 11002,
        }),
        Hardware::Thermocycler => Ok(ProxyInfo {
            env_var_name: "OT_EMULATOR_thermocycler_proxy",
            emulator_port: 10003,
            driver_port: 11003,
        }),
        Hardware::HeaterShaker => Ok(ProxyInfo {
            env_var_name: "OT_EMULATOR_heatershaker_proxy",
            emulator_port: 10004,
            driver_port: 11004,
        }),
        robot => Err(EmulationError::ImageUndefined(format!(
            "no proxy info for {}",
            robot
        ))),
    }
}

/// Identity a firmware level module reports over its serial protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialInfo {
    pub env_var_name: &'static str,
    pub model: &'static str,
    pub version: &'static str,
}

pub fn serial_info(module: Hardware) -> Result<SerialInfo> {
    match module {
        Hardware::HeaterShaker => Ok(SerialInfo {
            env_var_name: "OT_EMULATOR_heatershaker",
            model: "v01",
            version: "v0.0.1",
        }),
        Hardware::Magnetic => Ok(SerialInfo {
            env_var_name: "OT_EMULATOR_magdeck",
            model: "mag_deck_v20",
            version: "2.0.0",
        }),
        Hardware::Temperature => Ok(SerialInfo {
            env_var_name: "OT_EMULATOR_tempdeck",
            model: "temp_deck_v20",
            version: "v2.0.1",
        }),
        Hardware::Thermocycler => Ok(SerialInfo {
            env_var_name: "OT_EMULATOR_thermocycler",
            model: "v02",
            version: "v1.1.0",
        }),
        robot => Err(EmulationError::ImageUndefined(format!(
            "no serial info for {}",
            robot
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_levels() {
        assert!(Hardware::Ot2.supports(EmulationLevel::Firmware));
        assert!(!Hardware::Ot2.supports(EmulationLevel::Hardware));
        assert!(Hardware::Ot3.supports(EmulationLevel::Hardware));
        assert!(!Hardware::Ot3.supports(EmulationLevel::Firmware));
        assert!(Hardware::HeaterShaker.supports(EmulationLevel::Firmware));
        assert!(Hardware::Thermocycler.supports(EmulationLevel::Hardware));
        assert!(!Hardware::Magnetic.supports(EmulationLevel::Hardware));
        assert!(!Hardware::Temperature.supports(EmulationLevel::Hardware));
    }

    #[test]
    fn test_image_name() {
        assert_eq!(
            image_name(Hardware::HeaterShaker, EmulationLevel::Hardware, SourceMode::Local).unwrap(),
            "heater-shaker-hardware-local"
        );
        assert_eq!(
            image_name(Hardware::Magnetic, EmulationLevel::Firmware, SourceMode::Remote).unwrap(),
            "magdeck-firmware-remote"
        );
        assert_eq!(
            image_name(Hardware::Ot3, EmulationLevel::Hardware, SourceMode::Local).unwrap(),
            "robot-server"
        );
    }

    #[test]
    fn test_image_name_unsupported() {
        let err = image_name(Hardware::Ot3, EmulationLevel::Firmware, SourceMode::Remote)
            .unwrap_err();
        assert!(matches!(
            err,
            EmulationError::UnsupportedCombination { ref hardware, ref level }
                if hardware == "ot3" && level == "firmware"
        ));
    }

    #[test]
    fn test_proxy_info_env_value() {
        let info = proxy_info(Hardware::HeaterShaker).unwrap();
        assert_eq!(info.env_var_name, "OT_EMULATOR_heatershaker_proxy");
        let value: serde_json::Value = serde_json::from_str(&info.env_value()).unwrap();
        assert_eq!(value["emulator_port"], 10004);
        assert_eq!(value["driver_port"], 11004);
        assert!(proxy_info(Hardware::Ot2).is_err());
    }

    #[test]
    fn test_volume_names() {
        assert_eq!(builder_volume_name(Subsystem::GantryX), "gantry-x-executable");
        assert_eq!(
            builder_volume_dest(Subsystem::HeaterShaker),
            "/volumes/heater-shaker-executable"
        );
        assert_eq!(emulator_volume_dest(Subsystem::Head), "/executable");
        assert_eq!(eeprom_volume_name(Subsystem::LeftPipette), "left-pipette-eeprom");
    }

    #[test]
    fn test_subsystem_properties() {
        assert!(!Subsystem::Bootloader.uses_state_manager());
        assert!(Subsystem::Head.uses_state_manager());
        assert!(Subsystem::Gripper.has_eeprom());
        assert!(!Subsystem::GantryY.has_eeprom());
        assert_eq!(Subsystem::RightPipette.ot3_image().unwrap(), "ot3-pipettes-hardware");
        assert!(Subsystem::Thermocycler.ot3_image().is_err());
    }

    #[test]
    fn test_repository_from_str() {
        assert_eq!("ot3-firmware".parse::<Repository>().unwrap(), Repository::Ot3Firmware);
        assert!(matches!(
            "not-a-repo".parse::<Repository>(),
            Err(EmulationError::UnknownRepository(_))
        ));
    }
}
