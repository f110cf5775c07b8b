//! End to end conversions through the public API

use emulation_system::catalog::{Repository, DEFAULT_DOCKER_DIR, MONOREPO_WHEELS_VOLUME};
use emulation_system::compose::{ComposeOutput, ComposeParser, ContainerFilter};
use emulation_system::error::EmulationError;
use emulation_system::input::{SourceSelector, SystemDescription};
use emulation_system::settings::Settings;
use emulation_system::Result;
use pretty_assertions::assert_eq;
use std::collections::HashSet;

const SHA: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

const REMOTE_SOURCES: &str = r#"
monorepo-source: latest
ot3-firmware-source: latest
opentrons-modules-source: latest
"#;

const OT2_ROBOT: &str = r#"
robot:
  id: robbie
  hardware: ot2
  emulation-level: firmware
  exposed-port: 5000
"#;

const OT3_ROBOT: &str = r#"
robot:
  id: edgar
  hardware: ot3
  emulation-level: hardware
"#;

fn settings() -> Settings {
    Settings::from_json_str(
        r#"{
            "global-settings": {
                "default-folder-paths": {}
            },
            "emulation-settings": {
                "source-download-locations": {
                    "heads": {
                        "opentrons": "https://github.com/Opentrons/opentrons/archive/refs/heads/edge.zip",
                        "ot3-firmware": "https://github.com/Opentrons/ot3-firmware/archive/refs/heads/main.zip",
                        "modules": "https://github.com/Opentrons/opentrons-modules/archive/refs/heads/edge.zip"
                    },
                    "commits": {
                        "opentrons": "https://github.com/Opentrons/opentrons/archive/{{commit-sha}}.zip",
                        "ot3-firmware": "https://github.com/Opentrons/ot3-firmware/archive/{{commit-sha}}.zip",
                        "modules": "https://github.com/Opentrons/opentrons-modules/archive/{{commit-sha}}.zip"
                    }
                }
            }
        }"#,
    )
    .unwrap()
}

fn compile(yaml: &str) -> Result<ComposeOutput> {
    let settings = settings();
    let system = SystemDescription::from_yaml_str(yaml, &settings)?;
    emulation_system::convert(&system, &settings, false, DEFAULT_DOCKER_DIR)
}

fn remote(body: &str) -> ComposeOutput {
    compile(&format!("{}{}", REMOTE_SOURCES, body)).unwrap()
}

fn is_builder(name: &str) -> bool {
    Repository::ALL
        .iter()
        .any(|repo| name.ends_with(repo.builder_image()))
}

/// Checks shared by every valid conversion
fn assert_well_formed(output: &ComposeOutput) {
    let names: HashSet<&str> = output.container_names().into_iter().collect();
    assert_eq!(names.len(), output.services.len(), "container names are unique");

    for service in &output.services {
        if is_builder(&service.container_name) {
            continue;
        }
        for volume in service.volumes.iter().filter_map(|m| m.named_source()) {
            let producers = output
                .services
                .iter()
                .filter(|s| is_builder(&s.container_name))
                .filter(|s| s.volumes.iter().any(|m| m.named_source() == Some(volume)))
                .count();
            assert_eq!(
                producers, 1,
                "{} mounts {} which must come from one builder",
                service.container_name, volume
            );
        }

        for key in ["CAN_SERVER_HOST", "STATE_MANAGER_HOST", "OT3_CAN_DRIVER_host"] {
            if let Some(host) = service.environment.get(key) {
                assert!(names.contains(host.as_str()), "{} = {}", key, host);
            }
        }
        if let Some(uri) = service.environment.get("OT_SMOOTHIE_EMULATOR_URI") {
            let host = uri
                .trim_start_matches("socket://")
                .split(':')
                .next()
                .unwrap();
            assert!(names.contains(host), "smoothie uri {}", uri);
        }
        if let Some(value) = service.environment.get("OT_EMULATOR_module_server") {
            let json: serde_json::Value = serde_json::from_str(value).unwrap();
            assert!(names.contains(json["host"].as_str().unwrap()));
        }
        for dep in service.dependencies() {
            assert!(names.contains(dep.as_str()), "unknown dependency {}", dep);
        }
    }

    let wheels_consumer = output.services.iter().any(|s| {
        s.volumes
            .iter()
            .any(|m| m.named_source() == Some(MONOREPO_WHEELS_VOLUME))
    });
    assert_eq!(
        wheels_consumer,
        output
            .container_names()
            .iter()
            .any(|name| name.ends_with("monorepo-builder"))
    );

    assert_eq!(output.networks.len(), 1);
    assert!(ComposeParser::validate(output).unwrap().is_empty());
}

#[test]
fn test_scenario_a_bare_ot2() {
    let output = remote(OT2_ROBOT);
    assert_well_formed(&output);

    assert_eq!(
        output.container_names(),
        vec!["emulator-proxy", "smoothie", "robbie", "monorepo-builder"]
    );

    let robot = output.service("robbie").unwrap();
    let ports: Vec<String> = robot
        .ports
        .iter()
        .flatten()
        .map(|p| p.to_string())
        .collect();
    assert_eq!(ports, vec!["5000:31950"]);
    assert_eq!(
        robot.environment["OT_SMOOTHIE_EMULATOR_URI"],
        "socket://smoothie:11000"
    );
    assert_eq!(
        robot.environment["OT_EMULATOR_module_server"],
        r#"{"host":"emulator-proxy"}"#
    );

    assert!(!output.services.contains("can-server"));
    assert!(!output.services.contains("ot3-firmware-builder"));
    assert!(!output.services.contains("opentrons-modules-builder"));
}

#[test]
fn test_scenario_b_bare_ot3() {
    let output = remote(OT3_ROBOT);
    assert_well_formed(&output);

    let firmware: Vec<&str> = ContainerFilter::Ot3Firmware.select(&output);
    assert_eq!(
        firmware,
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
    for name in &firmware {
        let service = output.service(name).unwrap();
        assert_eq!(service.environment["CAN_SERVER_HOST"], "can-server");
    }

    assert_eq!(
        output.service("ot3-left-pipette").unwrap().environment["MOUNT"],
        "left"
    );
    assert_eq!(
        output.service("ot3-right-pipette").unwrap().environment["MOUNT"],
        "right"
    );

    let bootloader = output.service("ot3-bootloader").unwrap();
    assert!(!bootloader.environment.contains_key("STATE_MANAGER_HOST"));
    assert!(!bootloader.environment.contains_key("STATE_MANAGER_PORT"));

    for name in [
        "edgar",
        "can-server",
        "ot3-state-manager",
        "emulator-proxy",
        "monorepo-builder",
        "ot3-firmware-builder",
    ] {
        assert!(output.services.contains(name), "missing {}", name);
    }
    assert!(!output.services.contains("smoothie"));
}

#[test]
fn test_scenario_c_prefixed_modules() {
    let output = remote(
        r#"
system-unique-id: zeta
robot:
  id: robbie
  hardware: ot2
  emulation-level: firmware
modules:
  - id: shakey
    hardware: heater-shaker-module
    emulation-level: hardware
  - id: maggie
    hardware: magnetic-module
    emulation-level: firmware
"#,
    );
    assert_well_formed(&output);

    for name in output.container_names() {
        assert!(name.starts_with("zeta-"), "{} is not prefixed", name);
    }
    assert_eq!(output.networks.keys().collect::<Vec<_>>(), vec!["zeta"]);

    let proxy = output.service("zeta-emulator-proxy").unwrap();
    for key in [
        "OT_EMULATOR_heatershaker_proxy",
        "OT_EMULATOR_magdeck_proxy",
        "OT_EMULATOR_temperature_proxy",
        "OT_EMULATOR_thermocycler_proxy",
    ] {
        assert!(proxy.environment.contains_key(key), "missing {}", key);
    }

    assert!(output.services.contains("zeta-opentrons-modules-builder"));
    assert!(output.services.contains("zeta-monorepo-builder"));

    assert_eq!(
        ContainerFilter::HardwareModules.select(&output),
        vec!["zeta-shakey"]
    );
    assert_eq!(
        ContainerFilter::FirmwareModules.select(&output),
        vec!["zeta-maggie"]
    );
    assert_eq!(
        output.service("zeta-maggie").unwrap().environment["MODULE_ARGS"],
        "zeta-emulator-proxy"
    );
}

#[test]
fn test_scenario_d_local_monorepo() {
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().display().to_string();
    let output = compile(&format!(
        "monorepo-source: {}\not3-firmware-source: {}\nopentrons-modules-source: latest\n{}",
        local, SHA, OT3_ROBOT
    ))
    .unwrap();
    assert_well_formed(&output);

    let monorepo = output.service("monorepo-builder").unwrap();
    assert!(monorepo.build.as_ref().unwrap().args.is_empty());
    assert!(monorepo
        .volumes
        .iter()
        .any(|m| m.to_string() == format!("{}:/opentrons", local)));

    let firmware = output.service("ot3-firmware-builder").unwrap();
    assert_eq!(
        firmware.build.as_ref().unwrap().args["FIRMWARE_SOURCE_DOWNLOAD_LOCATION"],
        format!("https://github.com/Opentrons/ot3-firmware/archive/{}.zip", SHA)
    );
    assert!(!firmware
        .volumes
        .iter()
        .any(|m| m.target() == "/ot3-firmware"));
}

#[test]
fn test_scenario_e_duplicate_ids() {
    let result = compile(&format!(
        "{}{}",
        REMOTE_SOURCES,
        r#"
robot:
  id: m1
  hardware: ot2
  emulation-level: firmware
modules:
  - id: m1
    hardware: temperature-module
    emulation-level: firmware
"#
    ));
    assert!(matches!(
        result,
        Err(EmulationError::DuplicateIdentifier(ref id)) if id == "m1"
    ));
}

#[test]
fn test_scenario_f_ot3_firmware_level() {
    let result = compile(&format!(
        "{}{}",
        REMOTE_SOURCES,
        "robot:\n  id: edgar\n  hardware: ot3\n  emulation-level: firmware\n"
    ));
    assert!(matches!(
        result,
        Err(EmulationError::UnsupportedCombination { ref hardware, ref level })
            if hardware == "ot3" && level == "firmware"
    ));
}

#[test]
fn test_source_selector_categories() {
    let settings = settings();
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().display().to_string();

    for (value, local_expected) in [("latest", false), (SHA, false), (local.as_str(), true)] {
        let selector = SourceSelector::classify(Repository::Monorepo, value, &settings).unwrap();
        let again =
            SourceSelector::classify(Repository::Monorepo, &selector.to_string(), &settings)
                .unwrap();
        assert_eq!(selector, again);
        assert_eq!(selector.is_local(), local_expected);
    }
}

#[test]
fn test_conversion_is_idempotent() {
    let body = format!(
        "{}\nmodules:\n  - id: tc\n    hardware: thermocycler-module\n    emulation-level: hardware\n",
        OT3_ROBOT.trim_end()
    );
    let first = remote(&body);
    let second = remote(&body);
    assert_eq!(first, second);
    assert_eq!(
        ComposeParser::to_yaml(&first).unwrap(),
        ComposeParser::to_yaml(&second).unwrap()
    );
}

#[test]
fn test_no_modules_leaves_proxy_table_empty() {
    let output = remote(OT2_ROBOT);
    let proxy = output.service("emulator-proxy").unwrap();
    assert!(proxy.environment.is_empty());

    let empty = remote("");
    assert_eq!(
        empty.container_names(),
        vec!["emulator-proxy", "monorepo-builder"]
    );
    assert_well_formed(&empty);
}

#[test]
fn test_robot_kind_selects_peer_services() {
    let ot2 = remote(OT2_ROBOT);
    assert!(ot2.services.contains("smoothie"));
    assert!(!ot2.services.contains("can-server"));

    let ot3 = remote(OT3_ROBOT);
    assert!(ot3.services.contains("can-server"));
    assert!(!ot3.services.contains("smoothie"));
}

#[test]
fn test_emitted_yaml_round_trip_and_lookup() {
    let output = remote(
        r#"
robot:
  id: robbie
  hardware: ot2
  emulation-level: firmware
modules:
  - id: temp
    hardware: temperature-module
    emulation-level: firmware
    hardware-specific-attributes:
      temperature:
        starting: 40.0
"#,
    );

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("docker-compose.yaml");
    std::fs::write(&path, ComposeParser::to_yaml(&output).unwrap()).unwrap();

    let parsed = ComposeParser::parse_file(&path).unwrap();
    assert_eq!(parsed, output);

    let filter: ContainerFilter = "temperature-modules".parse().unwrap();
    assert_eq!(filter.select(&parsed), vec!["temp"]);
    let filter: ContainerFilter = "source-builders".parse().unwrap();
    assert_eq!(filter.select(&parsed), vec!["monorepo-builder"]);
}

#[test]
fn test_remote_only() {
    let settings = settings();
    let system = SystemDescription::from_yaml_str(
        &format!("{}{}", REMOTE_SOURCES, OT2_ROBOT),
        &settings,
    )
    .unwrap();
    assert!(system.require_remote().is_ok());

    let dir = tempfile::tempdir().unwrap();
    let local = SystemDescription::from_yaml_str(
        &format!(
            "monorepo-source: latest\not3-firmware-source: latest\nopentrons-modules-source: {}\n",
            dir.path().display()
        ),
        &settings,
    )
    .unwrap();
    assert!(matches!(
        local.require_remote(),
        Err(EmulationError::NotRemoteOnly(ref field)) if field == "opentrons-modules-source"
    ));
}

#[test]
fn test_extra_mounts_reach_emitted_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let output = remote(&format!(
        r#"
robot:
  id: robbie
  hardware: ot2
  emulation-level: firmware
  extra-mounts:
    - name: PROTOCOLS
      type: directory
      source-path: {}
      mount-path: /protocols
"#,
        dir.path().display()
    ));
    assert_well_formed(&output);

    let yaml = ComposeParser::to_yaml(&output).unwrap();
    assert!(yaml.contains(&format!("{}:/protocols", dir.path().display())));
    assert!(!output
        .service("smoothie")
        .unwrap()
        .volumes
        .iter()
        .any(|m| m.target() == "/protocols"));
}
