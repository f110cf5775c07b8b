//! OT-3 state manager

use super::ServiceContext;
use crate::catalog::{Hardware, STATE_MANAGER_IMAGE, STATE_MANAGER_PORT};
use crate::compose::config::ServiceDefinition;
use crate::error::Result;
use std::collections::BTreeMap;

pub fn build(ctx: &ServiceContext<'_>) -> Result<ServiceDefinition> {
    let robot = ctx.robot_of(STATE_MANAGER_IMAGE, Hardware::Ot3)?;
    let resolver = ctx.resolver();

    let mut service = ctx
        .service(STATE_MANAGER_IMAGE, STATE_MANAGER_IMAGE, BTreeMap::new())
        .volumes(resolver.state_manager_volumes())
        .volumes(resolver.monorepo_emulator_volumes());

    if let Some(port) = robot.state_manager_exposed_port {
        service = service.port(port, STATE_MANAGER_PORT);
    }

    Ok(service.envs(&robot.env.state_manager))
}
