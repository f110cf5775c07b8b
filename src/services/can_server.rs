//! CAN bus server shared by the OT-3 firmware services

use super::ServiceContext;
use crate::catalog::{Hardware, CAN_SERVER_IMAGE, CAN_SERVER_PORT};
use crate::compose::config::ServiceDefinition;
use crate::error::Result;
use std::collections::BTreeMap;

pub fn build(ctx: &ServiceContext<'_>) -> Result<ServiceDefinition> {
    let robot = ctx.robot_of(CAN_SERVER_IMAGE, Hardware::Ot3)?;

    let mut service = ctx
        .service(CAN_SERVER_IMAGE, CAN_SERVER_IMAGE, BTreeMap::new())
        .volumes(ctx.resolver().monorepo_emulator_volumes());

    // Only published when the user asked for a host port
    if let Some(port) = robot.can_server_exposed_port {
        service = service.port(port, CAN_SERVER_PORT);
    }

    Ok(service.envs(&robot.env.can_server))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::config::PortMapping;
    use crate::error::EmulationError;
    use crate::services::test_support::{ot2, ot3, system};
    use crate::settings::test_settings;

    #[test]
    fn test_can_server() {
        let description = ot3();
        let settings = test_settings();
        let service = build(&ServiceContext::new(&description, &settings)).unwrap();

        assert_eq!(service.container_name, "can-server");
        assert_eq!(service.image, "can-server:latest");
        assert!(service.ports.is_none());
        assert!(service.healthcheck.is_none());
        assert!(service
            .volumes
            .iter()
            .any(|m| m.named_source() == Some("monorepo-wheels")));
    }

    #[test]
    fn test_exposed_port_and_overrides() {
        let description = system(
            r#"robot:
  id: edgar
  hardware: ot3
  emulation-level: hardware
  can-server-exposed-port: 9898
  can-server-env-vars:
    LOG_LEVEL: debug
"#,
        );
        let settings = test_settings();
        let service = build(&ServiceContext::new(&description, &settings)).unwrap();

        assert_eq!(
            service.ports,
            Some(vec![PortMapping { host: 9898, container: 9898 }])
        );
        assert_eq!(service.environment["LOG_LEVEL"], "debug");
    }

    #[test]
    fn test_requires_ot3() {
        let description = ot2();
        let settings = test_settings();
        assert!(matches!(
            build(&ServiceContext::new(&description, &settings)),
            Err(EmulationError::WrongRobotExpected { .. })
        ));
    }
}
