//! Conversion orchestrator
//!
//! Decides which services a system needs, builds them in dependency order
//! and assembles the compose file around them.

use crate::catalog::{Repository, Subsystem};
use crate::compose::config::{ComposeOutput, NetworkConfig, ServiceDefinition, VolumeConfig};
use crate::error::Result;
use crate::input::model::SystemDescription;
use crate::services::{NameTable, ServiceBuilder, ServiceContext};
use crate::settings::Settings;
use std::collections::HashSet;

/// Converts a validated system description into a compose file
pub struct ComposeOrchestrator<'a> {
    ctx: ServiceContext<'a>,
}

impl<'a> ComposeOrchestrator<'a> {
    pub fn new(ctx: ServiceContext<'a>) -> Self {
        Self { ctx }
    }

    /// Runtime services, in emission order
    pub fn runtime_plan(&self) -> Vec<ServiceBuilder<'a>> {
        let system = self.ctx.system;
        let mut plan = vec![ServiceBuilder::EmulatorProxy];

        if system.has_ot2() {
            plan.push(ServiceBuilder::Smoothie);
        }

        if system.has_ot3() {
            plan.push(ServiceBuilder::CanServer);
            plan.push(ServiceBuilder::StateManager);
            plan.extend(Subsystem::OT3.into_iter().map(ServiceBuilder::Ot3Firmware));
        }

        plan.extend(system.robot.iter().map(ServiceBuilder::Robot));
        plan.extend(system.modules.iter().map(ServiceBuilder::Module));
        plan
    }

    /// Whether any runtime service mounts a named volume the repository's
    /// builder publishes
    pub fn needs_builder(&self, repo: Repository, services: &[ServiceDefinition]) -> bool {
        let published: HashSet<String> = self
            .ctx
            .resolver()
            .builder_volumes(repo)
            .iter()
            .filter_map(|m| m.named_source().map(str::to_string))
            .collect();
        // Build caches live in the builder only
        let caches: HashSet<&str> = repo.cache_volumes().iter().map(|(name, _)| *name).collect();

        services
            .iter()
            .flat_map(|service| service.volumes.iter())
            .filter_map(|mount| mount.named_source())
            .any(|name| published.contains(name) && !caches.contains(name))
    }

    pub fn convert(&self) -> Result<ComposeOutput> {
        let system = self.ctx.system;
        let names = NameTable::assign(system);

        let runtime = self
            .runtime_plan()
            .iter()
            .map(|builder| {
                tracing::debug!("Planned {}", builder);
                builder.build(&self.ctx, &names)
            })
            .collect::<Result<Vec<_>>>()?;

        let builders = Repository::ALL
            .into_iter()
            .filter(|repo| self.needs_builder(*repo, &runtime))
            .map(|repo| ServiceBuilder::SourceBuilder(repo).build(&self.ctx, &names))
            .collect::<Result<Vec<_>>>()?;

        let mut output = ComposeOutput::new(&system.compose_file_version);
        for service in runtime.into_iter().chain(builders) {
            output.services.insert(service)?;
        }

        output
            .networks
            .insert(system.network_name().to_string(), NetworkConfig::default());

        let volumes: Vec<String> = output
            .referenced_volumes()
            .into_iter()
            .map(str::to_string)
            .collect();
        for volume in volumes {
            output.volumes.insert(volume, VolumeConfig::default());
        }

        tracing::info!(
            "Generated {} services on network {}",
            output.services.len(),
            system.network_name()
        );
        Ok(output)
    }
}

/// Convert a system description with the given build options
pub fn convert(
    system: &SystemDescription,
    settings: &Settings,
    dev: bool,
    docker_dir: &str,
) -> Result<ComposeOutput> {
    let ctx = ServiceContext::new(system, settings)
        .dev(dev)
        .docker_dir(docker_dir);
    ComposeOrchestrator::new(ctx).convert()
}
