//! Container filters
//!
//! Select container names out of an emitted compose file, so scripts can
//! address e.g. every firmware-level module without knowing the ids used in
//! the input.

use super::config::{ComposeOutput, ServiceDefinition};
use crate::catalog::{
    self, EmulationLevel, Hardware, Repository, SourceMode, Subsystem, CAN_SERVER_IMAGE,
    EMULATOR_PROXY_IMAGE, MONOREPO_WHEELS_VOLUME, ROBOT_SERVER_IMAGE, SMOOTHIE_IMAGE,
    STATE_MANAGER_IMAGE,
};
use crate::error::EmulationError;

/// Named container filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFilter {
    All,
    RobotServer,
    Smoothie,
    CanServer,
    EmulatorProxy,
    Ot3StateManager,
    Ot3Firmware,
    Ot3Pipettes,
    AllModules,
    FirmwareModules,
    HardwareModules,
    Module(Hardware),
    SourceBuilders,
    MonorepoContainers,
}

impl ContainerFilter {
    pub const NAMES: [&'static str; 17] = [
        "all",
        "robot-server",
        "smoothie",
        "can-server",
        "emulator-proxy",
        "ot3-state-manager",
        "ot3-firmware",
        "ot3-pipettes",
        "all-modules",
        "firmware-modules",
        "hardware-modules",
        "heater-shaker-modules",
        "magnetic-modules",
        "temperature-modules",
        "thermocycler-modules",
        "source-builders",
        "monorepo-containers",
    ];

    /// Container names matching this filter, in file order
    pub fn select<'a>(&self, output: &'a ComposeOutput) -> Vec<&'a str> {
        output
            .services
            .iter()
            .filter(|service| self.matches(service))
            .map(|service| service.container_name.as_str())
            .collect()
    }

    pub fn matches(&self, service: &ServiceDefinition) -> bool {
        let image = image_base(&service.image);
        match self {
            ContainerFilter::All => true,
            ContainerFilter::RobotServer => image == ROBOT_SERVER_IMAGE,
            ContainerFilter::Smoothie => image == SMOOTHIE_IMAGE,
            ContainerFilter::CanServer => image == CAN_SERVER_IMAGE,
            ContainerFilter::EmulatorProxy => image == EMULATOR_PROXY_IMAGE,
            ContainerFilter::Ot3StateManager => image == STATE_MANAGER_IMAGE,
            ContainerFilter::Ot3Firmware => is_ot3_firmware(image),
            ContainerFilter::Ot3Pipettes => {
                Subsystem::LeftPipette.ot3_image().ok() == Some(image)
            }
            ContainerFilter::AllModules => module_kind(image).is_some(),
            ContainerFilter::FirmwareModules => {
                matches!(module_kind(image), Some((_, EmulationLevel::Firmware)))
            }
            ContainerFilter::HardwareModules => {
                matches!(module_kind(image), Some((_, EmulationLevel::Hardware)))
            }
            ContainerFilter::Module(hardware) => {
                matches!(module_kind(image), Some((kind, _)) if kind == *hardware)
            }
            ContainerFilter::SourceBuilders => is_builder(image),
            ContainerFilter::MonorepoContainers => {
                !is_builder(image)
                    && service
                        .volumes
                        .iter()
                        .any(|m| m.named_source() == Some(MONOREPO_WHEELS_VOLUME))
            }
        }
    }
}

impl std::str::FromStr for ContainerFilter {
    type Err = EmulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(ContainerFilter::All),
            "robot-server" => Ok(ContainerFilter::RobotServer),
            "smoothie" => Ok(ContainerFilter::Smoothie),
            "can-server" => Ok(ContainerFilter::CanServer),
            "emulator-proxy" => Ok(ContainerFilter::EmulatorProxy),
            "ot3-state-manager" => Ok(ContainerFilter::Ot3StateManager),
            "ot3-firmware" => Ok(ContainerFilter::Ot3Firmware),
            "ot3-pipettes" => Ok(ContainerFilter::Ot3Pipettes),
            "all-modules" => Ok(ContainerFilter::AllModules),
            "firmware-modules" => Ok(ContainerFilter::FirmwareModules),
            "hardware-modules" => Ok(ContainerFilter::HardwareModules),
            "heater-shaker-modules" => Ok(ContainerFilter::Module(Hardware::HeaterShaker)),
            "magnetic-modules" => Ok(ContainerFilter::Module(Hardware::Magnetic)),
            "temperature-modules" => Ok(ContainerFilter::Module(Hardware::Temperature)),
            "thermocycler-modules" => Ok(ContainerFilter::Module(Hardware::Thermocycler)),
            "source-builders" => Ok(ContainerFilter::SourceBuilders),
            "monorepo-containers" => Ok(ContainerFilter::MonorepoContainers),
            other => Err(EmulationError::InvalidFilter(format!(
                "\"{}\", expected one of: {}",
                other,
                Self::NAMES.join(", ")
            ))),
        }
    }
}

/// Image name without its tag
fn image_base(image: &str) -> &str {
    image.split_once(':').map_or(image, |(base, _)| base)
}

fn is_builder(image: &str) -> bool {
    Repository::ALL
        .iter()
        .any(|repo| repo.builder_image() == image)
}

fn is_ot3_firmware(image: &str) -> bool {
    Subsystem::OT3
        .iter()
        .any(|subsystem| subsystem.ot3_image().ok() == Some(image))
}

/// Module kind and level an image emulates
fn module_kind(image: &str) -> Option<(Hardware, EmulationLevel)> {
    let levels = [EmulationLevel::Hardware, EmulationLevel::Firmware];
    let modes = [SourceMode::Local, SourceMode::Remote];
    Hardware::MODULES.into_iter().find_map(|hardware| {
        levels.into_iter().find_map(|level| {
            modes
                .into_iter()
                .filter_map(|mode| catalog::image_name(hardware, level, mode).ok())
                .any(|name| name == image)
                .then_some((hardware, level))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::config::VolumeMount;

    fn output() -> ComposeOutput {
        let mut output = ComposeOutput::new("3.8");
        let wheels = || vec![VolumeMount::named("monorepo-wheels", "/dist")];
        for (name, image, volumes) in [
            ("emulator-proxy", "emulator-proxy:latest", wheels()),
            ("robbie", "robot-server:latest", wheels()),
            ("hs1", "heater-shaker-hardware-local:latest", vec![]),
            ("mag1", "magdeck-firmware-remote:latest", wheels()),
            ("ot3-left-pipette", "ot3-pipettes-hardware:latest", vec![]),
            ("ot3-head", "ot3-head-hardware:latest", vec![]),
            ("monorepo-builder", "monorepo-builder:latest", wheels()),
        ] {
            output
                .services
                .insert(ServiceDefinition::new(name, image).volumes(volumes))
                .unwrap();
        }
        output
    }

    fn select(filter: &str) -> Vec<String> {
        let filter: ContainerFilter = filter.parse().unwrap();
        filter
            .select(&output())
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_module_filters() {
        assert_eq!(select("all-modules"), vec!["hs1", "mag1"]);
        assert_eq!(select("hardware-modules"), vec!["hs1"]);
        assert_eq!(select("firmware-modules"), vec!["mag1"]);
        assert_eq!(select("magnetic-modules"), vec!["mag1"]);
        assert!(select("thermocycler-modules").is_empty());
    }

    #[test]
    fn test_ot3_filters() {
        assert_eq!(select("ot3-firmware"), vec!["ot3-left-pipette", "ot3-head"]);
        assert_eq!(select("ot3-pipettes"), vec!["ot3-left-pipette"]);
    }

    #[test]
    fn test_builder_and_monorepo_filters() {
        assert_eq!(select("source-builders"), vec!["monorepo-builder"]);
        assert_eq!(
            select("monorepo-containers"),
            vec!["emulator-proxy", "robbie", "mag1"]
        );
        assert_eq!(select("all").len(), 7);
        assert_eq!(select("robot-server"), vec!["robbie"]);
    }

    #[test]
    fn test_every_name_parses() {
        for name in ContainerFilter::NAMES {
            assert!(name.parse::<ContainerFilter>().is_ok(), "{}", name);
        }
        assert!(matches!(
            "robots".parse::<ContainerFilter>(),
            Err(EmulationError::InvalidFilter(_))
        ));
    }
}
