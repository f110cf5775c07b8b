//! Services declared directly in the input: the robot and each module

use super::{NameTable, ServiceContext};
use crate::catalog::{
    self, EmulationLevel, Hardware, Repository, CAN_SERVER_PORT, ROBOT_SERVER_PORT, SMOOTHIE_PORT,
};
use crate::compose::config::ServiceDefinition;
use crate::error::{EmulationError, Result};
use crate::input::model::{Module, Robot};
use std::collections::BTreeMap;

/// Robot server service for the declared robot
pub fn build_robot(
    ctx: &ServiceContext<'_>,
    names: &NameTable,
    robot: &Robot,
) -> Result<ServiceDefinition> {
    let mode = ctx.system.sources.mode(Repository::Monorepo);
    let image = catalog::image_name(robot.hardware, robot.emulation_level, mode)?;

    let module_server = serde_json::json!({ "host": names.emulator_proxy }).to_string();
    let mut service = ctx
        .service(&robot.id, &image, BTreeMap::new())
        .volumes(ctx.resolver().monorepo_emulator_volumes())
        .volumes(robot.extra_mounts.iter().map(|m| m.to_volume()))
        .port(robot.exposed_port, ROBOT_SERVER_PORT)
        .env("OT_EMULATOR_module_server", module_server)
        .depends_on(&names.emulator_proxy);

    match robot.hardware {
        Hardware::Ot2 => {
            let smoothie = names.smoothie()?;
            service = service
                .env(
                    "OT_SMOOTHIE_EMULATOR_URI",
                    format!("socket://{}:{}", smoothie, SMOOTHIE_PORT),
                )
                .depends_on(smoothie);
        }
        Hardware::Ot3 => {
            service = service
                .env("OT_API_FF_enableOT3HardwareController", "true")
                .env("OT3_CAN_DRIVER_interface", "opentrons_sock")
                .env("OT3_CAN_DRIVER_host", names.can_server()?)
                .env("OT3_CAN_DRIVER_port", CAN_SERVER_PORT.to_string());
        }
        other => {
            return Err(EmulationError::WrongRobotExpected {
                expected: "ot2 or ot3".to_string(),
                found: other.to_string(),
            })
        }
    }

    Ok(service.envs(&robot.env.robot_server))
}

/// Emulator service for one declared module
pub fn build_module(
    ctx: &ServiceContext<'_>,
    names: &NameTable,
    module: &Module,
) -> Result<ServiceDefinition> {
    let repo = module.source_repository();
    let image = catalog::image_name(
        module.hardware,
        module.emulation_level,
        ctx.system.sources.mode(repo),
    )?;
    let resolver = ctx.resolver();

    let volumes = match module.hardware.module_subsystem() {
        Some(subsystem) if repo == Repository::OpentronsModules => {
            resolver.subsystem_emulator_volumes(subsystem)
        }
        _ => resolver.monorepo_emulator_volumes(),
    };

    let proxy = catalog::proxy_info(module.hardware)?;
    let mut service = ctx
        .service(&module.id, &image, BTreeMap::new())
        .volumes(volumes)
        .volumes(module.extra_mounts.iter().map(|m| m.to_volume()))
        .env(proxy.env_var_name, proxy.env_value())
        .depends_on(&names.emulator_proxy);

    service = match module.emulation_level {
        EmulationLevel::Hardware => service.env("SERIAL_NUMBER", module.id.as_str()).env(
            "MODULE_ARGS",
            format!("--socket http://{}:{}", names.emulator_proxy, proxy.emulator_port),
        ),
        EmulationLevel::Firmware => {
            let serial = catalog::serial_info(module.hardware)?;
            let mut value = serde_json::Map::new();
            value.insert("serial_number".to_string(), module.id.clone().into());
            value.insert("model".to_string(), serial.model.into());
            value.insert("version".to_string(), serial.version.into());
            value.extend(module.firmware_attributes());
            service
                .env(serial.env_var_name, serde_json::Value::Object(value).to_string())
                .env("MODULE_ARGS", names.emulator_proxy.as_str())
        }
    };

    Ok(service.envs(&module.env))
}
