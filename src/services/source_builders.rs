//! Builder services
//!
//! A builder compiles one repository and publishes the results into named
//! volumes that the emulator services mount. Builders are also emitted when
//! every source is remote, since they own those volumes.

use super::ServiceContext;
use crate::catalog::Repository;
use crate::compose::config::{Healthcheck, ServiceDefinition};
use crate::error::Result;
use crate::input::pipettes::Mount;

const HEALTHCHECK_INTERVAL: u32 = 10;
const HEALTHCHECK_TIMEOUT: u32 = 10;
const HEALTHCHECK_RETRIES: u32 = 6;

/// Directories that must be populated before the builder is ready
fn readiness_command(repo: Repository) -> String {
    match repo {
        Repository::Ot3Firmware => format!(
            "(cd /{}) && (cd /{})",
            repo.canonical_name(),
            Repository::Monorepo.canonical_name()
        ),
        other => format!("(cd /{})", other.canonical_name()),
    }
}

pub fn build(ctx: &ServiceContext<'_>, repo: Repository) -> Result<ServiceDefinition> {
    let resolver = ctx.resolver();
    let image = repo.builder_image();

    let mut build_args = resolver.build_args(repo);
    let mut volumes = resolver.builder_volumes(repo);

    // The ot3-firmware build also pulls in the monorepo
    if repo == Repository::Ot3Firmware {
        build_args.extend(resolver.build_args(Repository::Monorepo));
        volumes.extend(resolver.local_source_mount(Repository::Monorepo));
    }

    let mut service = ctx
        .service(image, image, build_args)
        .volumes(volumes)
        .healthcheck(Healthcheck {
            interval: HEALTHCHECK_INTERVAL,
            timeout: HEALTHCHECK_TIMEOUT,
            retries: HEALTHCHECK_RETRIES,
            command: readiness_command(repo),
        });

    match repo {
        Repository::Monorepo if ctx.system.has_ot3() => {
            service = service.env("OPENTRONS_PROJECT", "ot3");
        }
        Repository::Ot3Firmware => {
            service = service.env("OPENTRONS_PROJECT", "ot3");
            if let Some(pipettes) = ctx.system.robot.as_ref().and_then(|r| r.ot3_pipettes()) {
                for mount in [Mount::Left, Mount::Right] {
                    let (key, value) = pipettes.builder_env_var(mount);
                    service = service.env(&key, value);
                }
            }
        }
        _ => {}
    }

    Ok(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::config::VolumeMount;
    use crate::input::model::SystemDescription;
    use crate::services::test_support::{ot2, ot3};
    use crate::settings::test_settings;

    const SHA: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    #[test]
    fn test_readiness_commands() {
        assert_eq!(readiness_command(Repository::Monorepo), "(cd /opentrons)");
        assert_eq!(
            readiness_command(Repository::Ot3Firmware),
            "(cd /ot3-firmware) && (cd /opentrons)"
        );
        assert_eq!(
            readiness_command(Repository::OpentronsModules),
            "(cd /opentrons-modules)"
        );
    }

    #[test]
    fn test_remote_monorepo_builder() {
        let description = ot2();
        let settings = test_settings();
        let service = build(&ServiceContext::new(&description, &settings), Repository::Monorepo)
            .unwrap();

        assert_eq!(service.container_name, "monorepo-builder");
        let build_config = service.build.as_ref().unwrap();
        assert_eq!(build_config.target, "monorepo-builder");
        assert_eq!(
            build_config.args["OPENTRONS_SOURCE_DOWNLOAD_LOCATION"],
            "https://github.com/Opentrons/opentrons/archive/refs/heads/edge.zip"
        );
        let healthcheck = service.healthcheck.as_ref().unwrap();
        assert_eq!(healthcheck.retries, 6);
        assert_eq!(healthcheck.interval, 10);
        assert!(!service.environment.contains_key("OPENTRONS_PROJECT"));
    }

    #[test]
    fn test_ot3_firmware_builder_merges_args() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!(
            "monorepo-source: {}\not3-firmware-source: {}\nopentrons-modules-source: latest\nrobot:\n  id: edgar\n  hardware: ot3\n  emulation-level: hardware\n",
            dir.path().display(),
            SHA
        );
        let settings = test_settings();
        let description = SystemDescription::from_yaml_str(&yaml, &settings).unwrap();
        let service = build(
            &ServiceContext::new(&description, &settings),
            Repository::Ot3Firmware,
        )
        .unwrap();

        let args = &service.build.as_ref().unwrap().args;
        assert_eq!(args.len(), 1);
        assert_eq!(
            args["FIRMWARE_SOURCE_DOWNLOAD_LOCATION"],
            format!("https://github.com/Opentrons/ot3-firmware/archive/{}.zip", SHA)
        );
        assert!(service.volumes.contains(&VolumeMount::bind(
            dir.path().display().to_string(),
            "/opentrons"
        )));
        assert!(!service.volumes.iter().any(|m| m.target() == "/ot3-firmware"));
        assert_eq!(service.environment["OPENTRONS_PROJECT"], "ot3");
        assert!(service.environment.contains_key("LEFT_OT3_PIPETTE_DEFINITION"));
        assert!(service.environment.contains_key("RIGHT_OT3_PIPETTE_DEFINITION"));
    }

    #[test]
    fn test_monorepo_builder_for_ot3() {
        let description = ot3();
        let settings = test_settings();
        let service = build(&ServiceContext::new(&description, &settings), Repository::Monorepo)
            .unwrap();
        assert_eq!(service.environment["OPENTRONS_PROJECT"], "ot3");
    }

    #[test]
    fn test_ot3_firmware_builder_pipette_definitions() {
        let description = crate::services::test_support::system(
            "robot:\n  id: edgar\n  hardware: ot3\n  emulation-level: hardware\n  hardware-specific-attributes:\n    left-pipette: {model: p1000_single_gen3, serial-code: XYZ9}\n",
        );
        let settings = test_settings();
        let service = build(
            &ServiceContext::new(&description, &settings),
            Repository::Ot3Firmware,
        )
        .unwrap();

        let left: serde_json::Value =
            serde_json::from_str(&service.environment["LEFT_OT3_PIPETTE_DEFINITION"]).unwrap();
        assert_eq!(left["pipette_name"], "p1000_single_gen3");
        assert_eq!(left["pipette_serial_code"], "XYZ9");
        assert_eq!(left["eeprom_file_path"], "/volumes/left-pipette-eeprom/eeprom.bin");

        let right: serde_json::Value =
            serde_json::from_str(&service.environment["RIGHT_OT3_PIPETTE_DEFINITION"]).unwrap();
        assert_eq!(right["pipette_name"], "EMPTY");
        assert_eq!(right["eeprom_file_path"], "/volumes/right-pipette-eeprom/eeprom.bin");
    }
}
