//! emulation-system - Opentrons emulation system compiler
//!
//! Compiles a system description into a docker-compose file and looks up
//! container names in an emitted compose file.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use emulation_system::catalog::DEFAULT_DOCKER_DIR;
use emulation_system::compose::{ComposeParser, ContainerFilter};
use emulation_system::error::EmulationError;
use emulation_system::input::SystemDescription;
use emulation_system::settings::Settings;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Read from stdin or write to stdout
const STDIO: &str = "-";

#[derive(Parser)]
#[command(name = "emulation-system")]
#[command(author = "Evoker Industries")]
#[command(version)]
#[command(about = "Compile Opentrons emulation systems into Docker Compose files", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a system description into a compose file
    #[command(name = "emulation-system", alias = "em-sys")]
    EmulationSystem {
        /// Input file (.yaml, .yml or .json), or - for stdin
        input: String,

        /// Output file, or - for stdout
        output: String,

        /// Use the development Dockerfile
        #[arg(long)]
        dev: bool,

        /// Fail if any source is a local directory
        #[arg(long)]
        remote_only: bool,

        /// Settings file (defaults to $CONFIGURATION_FILE_LOCATION)
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Docker build context directory
        #[arg(long, default_value = DEFAULT_DOCKER_DIR)]
        docker_dir: String,
    },

    /// Print container names in a compose file matching a filter
    Lookup {
        /// Compose file emitted by emulation-system
        compose_file: PathBuf,

        /// Filter name (all, robot-server, firmware-modules, ...)
        filter: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::EmulationSystem {
            input,
            output,
            dev,
            remote_only,
            settings,
            docker_dir,
        } => {
            let settings = Settings::load(settings.as_deref())?;
            let system = load_system(&input, &settings)
                .with_context(|| format!("Invalid system description: {}", input))?;

            if remote_only {
                system.require_remote()?;
            }

            let compose = emulation_system::convert(&system, &settings, dev, &docker_dir)?;
            ComposeParser::validate(&compose)?;
            let yaml = ComposeParser::to_yaml(&compose)?;
            write_output(&output, &yaml)?;
        }

        Commands::Lookup {
            compose_file,
            filter,
        } => {
            let filter: ContainerFilter = filter.parse()?;
            let compose = ComposeParser::parse_file(&compose_file)
                .with_context(|| format!("Failed to load {}", compose_file.display()))?;

            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for name in filter.select(&compose) {
                writeln!(out, "{}", name)?;
            }
        }
    }

    Ok(())
}

fn load_system(input: &str, settings: &Settings) -> Result<SystemDescription> {
    if input == STDIO {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read stdin")?;
        return Ok(SystemDescription::from_yaml_str(&content, settings)?);
    }

    let path = Path::new(input);
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml" | "json") => {}
        _ => {
            return Err(EmulationError::InvalidInput(format!(
                "{} must be a .yaml, .yml or .json file",
                input
            ))
            .into())
        }
    }

    Ok(SystemDescription::from_file(path, settings)?)
}

fn write_output(output: &str, yaml: &str) -> Result<()> {
    if output == STDIO {
        std::io::stdout().write_all(yaml.as_bytes())?;
        return Ok(());
    }

    std::fs::write(output, yaml).with_context(|| format!("Failed to write {}", output))?;
    tracing::info!("Wrote {}", output);
    Ok(())
}
