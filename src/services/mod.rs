//! Service builders
//!
//! One builder per kind of service in the emitted compose file. The
//! orchestrator decides which builders run; each builder turns the validated
//! system description into exactly one [`ServiceDefinition`].
//!
//! Container names are assigned up front into a [`NameTable`] so that
//! builders referencing peer services never need to know how those peers
//! were built.

pub mod can_server;
pub mod emulator_proxy;
pub mod input_service;
pub mod ot3_firmware;
pub mod smoothie;
pub mod source_builders;
pub mod state_manager;

use crate::catalog::{
    self, Hardware, Repository, Subsystem, CAN_SERVER_IMAGE, DEFAULT_DOCKER_DIR,
    DEV_DOCKERFILE_NAME, DOCKERFILE_NAME, EMULATOR_PROXY_IMAGE, SMOOTHIE_IMAGE,
    STATE_MANAGER_IMAGE,
};
use crate::compose::config::{BuildConfig, ServiceDefinition};
use crate::error::{EmulationError, Result};
use crate::input::model::{Module, Robot, SystemDescription};
use crate::resolver::SourceResolver;
use crate::settings::Settings;
use std::collections::BTreeMap;

/// Everything a builder reads
#[derive(Debug, Clone, Copy)]
pub struct ServiceContext<'a> {
    pub system: &'a SystemDescription,
    pub settings: &'a Settings,
    /// Build from the dev Dockerfile
    pub dev: bool,
    pub docker_dir: &'a str,
}

impl<'a> ServiceContext<'a> {
    pub fn new(system: &'a SystemDescription, settings: &'a Settings) -> Self {
        Self {
            system,
            settings,
            dev: false,
            docker_dir: DEFAULT_DOCKER_DIR,
        }
    }

    pub fn dev(mut self, dev: bool) -> Self {
        self.dev = dev;
        self
    }

    pub fn docker_dir(mut self, docker_dir: &'a str) -> Self {
        self.docker_dir = docker_dir;
        self
    }

    pub fn resolver(&self) -> SourceResolver<'a> {
        SourceResolver::new(&self.system.sources, self.settings, self.docker_dir)
    }

    fn dockerfile(&self) -> &'static str {
        if self.dev {
            DEV_DOCKERFILE_NAME
        } else {
            DOCKERFILE_NAME
        }
    }

    /// Service skeleton shared by every builder: name, image, build section
    /// and the system network
    pub fn service(
        &self,
        canonical_name: &str,
        image: &str,
        build_args: BTreeMap<String, String>,
    ) -> ServiceDefinition {
        let container_name = self.system.container_name(canonical_name);
        tracing::debug!("Building service {} from image {}", container_name, image);

        ServiceDefinition::new(&container_name, &format!("{}:latest", image))
            .build(BuildConfig {
                context: self.docker_dir.to_string(),
                dockerfile: self.dockerfile().to_string(),
                target: image.to_string(),
                args: build_args,
            })
            .network(self.system.network_name())
    }

    /// The declared robot, or `MissingRobot` naming the requesting builder
    pub fn robot(&self, builder: &str) -> Result<&'a Robot> {
        self.system
            .robot
            .as_ref()
            .ok_or_else(|| EmulationError::MissingRobot(builder.to_string()))
    }

    /// The declared robot, which must be of the given family
    pub fn robot_of(&self, builder: &str, expected: Hardware) -> Result<&'a Robot> {
        let robot = self.robot(builder)?;
        if robot.hardware != expected {
            return Err(EmulationError::WrongRobotExpected {
                expected: expected.to_string(),
                found: robot.hardware.to_string(),
            });
        }
        Ok(robot)
    }
}

/// Container names of the generated peer services, assigned before any
/// service is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTable {
    pub emulator_proxy: String,
    pub smoothie: Option<String>,
    pub can_server: Option<String>,
    pub state_manager: Option<String>,
}

impl NameTable {
    pub fn assign(system: &SystemDescription) -> Self {
        Self {
            emulator_proxy: system.container_name(EMULATOR_PROXY_IMAGE),
            smoothie: system
                .has_ot2()
                .then(|| system.container_name(SMOOTHIE_IMAGE)),
            can_server: system
                .has_ot3()
                .then(|| system.container_name(CAN_SERVER_IMAGE)),
            state_manager: system
                .has_ot3()
                .then(|| system.container_name(STATE_MANAGER_IMAGE)),
        }
    }

    pub fn smoothie(&self) -> Result<&str> {
        self.smoothie
            .as_deref()
            .ok_or_else(|| EmulationError::MissingRobot(SMOOTHIE_IMAGE.to_string()))
    }

    pub fn can_server(&self) -> Result<&str> {
        self.can_server
            .as_deref()
            .ok_or_else(|| EmulationError::MissingRobot(CAN_SERVER_IMAGE.to_string()))
    }

    pub fn state_manager(&self) -> Result<&str> {
        self.state_manager
            .as_deref()
            .ok_or_else(|| EmulationError::MissingRobot(STATE_MANAGER_IMAGE.to_string()))
    }
}

/// One service to build
#[derive(Debug, Clone, Copy)]
pub enum ServiceBuilder<'a> {
    CanServer,
    EmulatorProxy,
    Smoothie,
    StateManager,
    Ot3Firmware(Subsystem),
    Robot(&'a Robot),
    Module(&'a Module),
    SourceBuilder(Repository),
}

impl std::fmt::Display for ServiceBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceBuilder::CanServer => write!(f, "{}", CAN_SERVER_IMAGE),
            ServiceBuilder::EmulatorProxy => write!(f, "{}", EMULATOR_PROXY_IMAGE),
            ServiceBuilder::Smoothie => write!(f, "{}", SMOOTHIE_IMAGE),
            ServiceBuilder::StateManager => write!(f, "{}", STATE_MANAGER_IMAGE),
            ServiceBuilder::Ot3Firmware(subsystem) => {
                write!(f, "{}", catalog::ot3_service_name(*subsystem))
            }
            ServiceBuilder::Robot(robot) => write!(f, "{}", robot.id),
            ServiceBuilder::Module(module) => write!(f, "{}", module.id),
            ServiceBuilder::SourceBuilder(repo) => write!(f, "{}", repo.builder_image()),
        }
    }
}

impl ServiceBuilder<'_> {
    pub fn build(&self, ctx: &ServiceContext<'_>, names: &NameTable) -> Result<ServiceDefinition> {
        match self {
            ServiceBuilder::CanServer => can_server::build(ctx),
            ServiceBuilder::EmulatorProxy => emulator_proxy::build(ctx),
            ServiceBuilder::Smoothie => smoothie::build(ctx),
            ServiceBuilder::StateManager => state_manager::build(ctx),
            ServiceBuilder::Ot3Firmware(subsystem) => ot3_firmware::build(ctx, names, *subsystem),
            ServiceBuilder::Robot(robot) => input_service::build_robot(ctx, names, robot),
            ServiceBuilder::Module(module) => input_service::build_module(ctx, names, module),
            ServiceBuilder::SourceBuilder(repo) => source_builders::build(ctx, *repo),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::input::model::SystemDescription;
    use crate::settings::test_settings;

    pub const SOURCES: &str = "monorepo-source: latest\not3-firmware-source: latest\nopentrons-modules-source: latest\n";

    pub fn system(yaml: &str) -> SystemDescription {
        SystemDescription::from_yaml_str(&format!("{}{}", SOURCES, yaml), &test_settings())
            .unwrap()
    }

    pub fn ot2() -> SystemDescription {
        system("robot:\n  id: robbie\n  hardware: ot2\n  emulation-level: firmware\n")
    }

    pub fn ot3() -> SystemDescription {
        system("robot:\n  id: edgar\n  hardware: ot3\n  emulation-level: hardware\n")
    }
}
