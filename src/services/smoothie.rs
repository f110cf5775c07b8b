//! Smoothie motion controller emulator for the OT-2

use super::ServiceContext;
use crate::catalog::{Hardware, SMOOTHIE_IMAGE};
use crate::compose::config::ServiceDefinition;
use crate::error::{EmulationError, Result};
use std::collections::BTreeMap;

pub const SMOOTHIE_ENV_VAR_NAME: &str = "OT_EMULATOR_smoothie";

pub fn build(ctx: &ServiceContext<'_>) -> Result<ServiceDefinition> {
    let robot = ctx.robot_of(SMOOTHIE_IMAGE, Hardware::Ot2)?;
    let pipettes = robot.ot2_pipettes().ok_or_else(|| EmulationError::WrongRobotExpected {
        expected: Hardware::Ot2.to_string(),
        found: robot.hardware.to_string(),
    })?;

    Ok(ctx
        .service(SMOOTHIE_IMAGE, SMOOTHIE_IMAGE, BTreeMap::new())
        .volumes(ctx.resolver().monorepo_emulator_volumes())
        .env(SMOOTHIE_ENV_VAR_NAME, pipettes.smoothie_env_value())
        .envs(&robot.env.smoothie))
}
