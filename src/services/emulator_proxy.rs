//! Emulator proxy
//!
//! Routes module emulators to the robot server. Its proxy table is fixed by
//! module kind: once any module is declared, every kind gets an entry.

use super::ServiceContext;
use crate::catalog::{self, Hardware, EMULATOR_PROXY_IMAGE};
use crate::compose::config::ServiceDefinition;
use crate::error::Result;
use std::collections::BTreeMap;

pub fn build(ctx: &ServiceContext<'_>) -> Result<ServiceDefinition> {
    let mut service = ctx
        .service(EMULATOR_PROXY_IMAGE, EMULATOR_PROXY_IMAGE, BTreeMap::new())
        .volumes(ctx.resolver().monorepo_emulator_volumes());

    if !ctx.system.modules.is_empty() {
        for module in Hardware::MODULES {
            let proxy = catalog::proxy_info(module)?;
            service = service.env(proxy.env_var_name, proxy.env_value());
        }
    }

    if let Some(robot) = &ctx.system.robot {
        service = service.envs(&robot.env.emulator_proxy);
    }

    Ok(service)
}
