//! OT-3 firmware services
//!
//! One service per OT-3 subsystem, each running the executable the
//! ot3-firmware builder compiled for it.

use super::{NameTable, ServiceContext};
use crate::catalog::{self, Hardware, Subsystem, EEPROM_FILE_NAME, STATE_MANAGER_PORT};
use crate::compose::config::ServiceDefinition;
use crate::error::{EmulationError, Result};
use crate::input::model::{EnvVars, Robot};
use crate::input::pipettes::Mount;
use std::collections::BTreeMap;

fn overrides(robot: &Robot, subsystem: Subsystem) -> Option<&EnvVars> {
    let env = &robot.env;
    match subsystem {
        Subsystem::Head => Some(&env.head),
        Subsystem::GantryX => Some(&env.gantry_x),
        Subsystem::GantryY => Some(&env.gantry_y),
        Subsystem::Gripper => Some(&env.gripper),
        Subsystem::LeftPipette | Subsystem::RightPipette => Some(&env.pipettes),
        Subsystem::Bootloader => Some(&env.bootloader),
        Subsystem::HeaterShaker | Subsystem::Thermocycler => None,
    }
}

fn mount(subsystem: Subsystem) -> Option<Mount> {
    match subsystem {
        Subsystem::LeftPipette => Some(Mount::Left),
        Subsystem::RightPipette => Some(Mount::Right),
        _ => None,
    }
}

pub fn build(
    ctx: &ServiceContext<'_>,
    names: &NameTable,
    subsystem: Subsystem,
) -> Result<ServiceDefinition> {
    let name = catalog::ot3_service_name(subsystem);
    let robot = ctx.robot_of(&name, Hardware::Ot3)?;
    let image = subsystem.ot3_image()?;
    let env_overrides = overrides(robot, subsystem).ok_or_else(|| {
        EmulationError::ImageUndefined(format!("{} is not an OT-3 subsystem", subsystem))
    })?;

    let mut service = ctx
        .service(&name, image, BTreeMap::new())
        .volumes(ctx.resolver().subsystem_emulator_volumes(subsystem))
        .env("CAN_SERVER_HOST", names.can_server()?);

    if subsystem.uses_state_manager() {
        service = service
            .env("STATE_MANAGER_HOST", names.state_manager()?)
            .env("STATE_MANAGER_PORT", STATE_MANAGER_PORT.to_string());
    }

    if let Some(mount) = mount(subsystem) {
        let pipettes = robot.ot3_pipettes().ok_or_else(|| EmulationError::WrongRobotExpected {
            expected: Hardware::Ot3.to_string(),
            found: robot.hardware.to_string(),
        })?;
        service = service
            .env("EEPROM_FILENAME", EEPROM_FILE_NAME)
            .env("MOUNT", mount.to_string())
            .env("SIMULATOR_NAME", pipettes.simulator_name(mount))
            .env("OT3_PIPETTE_DEFINITION", pipettes.definition_env_value(mount));
    }

    Ok(service.envs(env_overrides))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{ot2, ot3, system};
    use crate::settings::test_settings;

    fn build_all(description: &crate::input::model::SystemDescription) -> Vec<ServiceDefinition> {
        let settings = test_settings();
        let ctx = ServiceContext::new(description, &settings);
        let names = NameTable::assign(description);
        Subsystem::OT3
            .iter()
            .map(|subsystem| build(&ctx, &names, *subsystem).unwrap())
            .collect()
    }

    #[test]
    fn test_common_env() {
        let services = build_all(&ot3());
        let names: Vec<&str> = services.iter().map(|s| s.container_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "ot3-head",
                "ot3-left-pipette",
                "ot3-right-pipette",
                "ot3-gantry-x",
                "ot3-gantry-y",
                "ot3-gripper",
                "ot3-bootloader",
            ]
        );
        for service in &services {
            assert_eq!(service.environment["CAN_SERVER_HOST"], "can-server");
        }

        let bootloader = &services[6];
        assert!(!bootloader.environment.contains_key("STATE_MANAGER_HOST"));
        assert!(!bootloader.environment.contains_key("STATE_MANAGER_PORT"));
        assert_eq!(services[0].environment["STATE_MANAGER_PORT"], "9999");
        assert_eq!(services[0].environment["STATE_MANAGER_HOST"], "ot3-state-manager");
    }

    #[test]
    fn test_pipette_env() {
        let description = system(
            r#"robot:
  id: edgar
  hardware: ot3
  emulation-level: hardware
  hardware-specific-attributes:
    left-pipette:
      name: p1000_multi_gen3
      model-number: 5
      serial-code: ABC123
  pipettes-env-vars:
    EXTRA: "1"
"#,
        );
        let services = build_all(&description);
        let left = &services[1];
        let right = &services[2];

        assert_eq!(left.image, "ot3-pipettes-hardware:latest");
        assert_eq!(left.environment["MOUNT"], "left");
        assert_eq!(right.environment["MOUNT"], "right");
        assert_eq!(left.environment["EEPROM_FILENAME"], "eeprom.bin");
        assert_eq!(left.environment["SIMULATOR_NAME"], "pipettes-multi-simulator");
        assert_eq!(left.environment["EXTRA"], "1");
        assert_eq!(right.environment["EXTRA"], "1");

        let definition: serde_json::Value =
            serde_json::from_str(&left.environment["OT3_PIPETTE_DEFINITION"]).unwrap();
        assert_eq!(definition["pipette_name"], "p1000_multi_gen3");
        assert_eq!(definition["pipette_model"], "05");
        assert_eq!(definition["pipette_serial_code"], "ABC123");

        assert!(!services[0].environment.contains_key("MOUNT"));
    }

    #[test]
    fn test_eeprom_volumes() {
        let services = build_all(&ot3());
        let gripper = &services[5];
        assert!(gripper
            .volumes
            .iter()
            .any(|m| m.named_source() == Some("gripper-eeprom") && m.target() == "/eeprom"));
        assert!(services[0]
            .volumes
            .iter()
            .any(|m| m.named_source() == Some("head-executable") && m.target() == "/executable"));
    }

    #[test]
    fn test_requires_ot3() {
        let description = ot2();
        let settings = test_settings();
        let names = NameTable::assign(&description);
        let result = build(
            &ServiceContext::new(&description, &settings),
            &names,
            Subsystem::Head,
        );
        assert!(matches!(result, Err(EmulationError::WrongRobotExpected { .. })));
    }
}
