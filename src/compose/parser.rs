//! Compose file rendering, parsing and validation

use super::config::ComposeOutput;
use crate::error::{EmulationError, Result};
use std::collections::HashSet;
use std::path::Path;

/// Compose file parser
pub struct ComposeParser;

impl ComposeParser {
    /// Render a compose file as YAML
    pub fn to_yaml(output: &ComposeOutput) -> Result<String> {
        serde_yaml::to_string(output).map_err(|e| EmulationError::Yaml(e.to_string()))
    }

    /// Parse compose file from path
    pub fn parse_file(path: &Path) -> Result<ComposeOutput> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EmulationError::ComposeParse(format!("Failed to read file: {}", e)))?;

        Self::parse_str(&content)
    }

    /// Parse compose file from string
    pub fn parse_str(content: &str) -> Result<ComposeOutput> {
        serde_yaml::from_str(content)
            .map_err(|e| EmulationError::ComposeParse(format!("Failed to parse YAML: {}", e)))
    }

    /// Validate compose file, returning non-fatal warnings
    pub fn validate(output: &ComposeOutput) -> Result<Vec<String>> {
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();

        for service in &output.services {
            let name = &service.container_name;

            if !seen.insert(name.as_str()) {
                return Err(EmulationError::ComposeParse(format!(
                    "Container name '{}' is used more than once",
                    name
                )));
            }

            // Service must have either image or build
            if service.image.is_empty() && service.build.is_none() {
                return Err(EmulationError::ComposeParse(format!(
                    "Service '{}' must have either 'image' or 'build' specified",
                    name
                )));
            }

            for dep in service.dependencies() {
                if !output.services.contains(dep) {
                    return Err(EmulationError::ComposeParse(format!(
                        "Service '{}' depends on unknown service '{}'",
                        name, dep
                    )));
                }
            }

            for net in &service.networks {
                if !output.networks.contains_key(net) {
                    warnings.push(format!(
                        "Service '{}' references undefined network '{}' (will be created)",
                        name, net
                    ));
                }
            }

            for source in service.volumes.iter().filter_map(|v| v.named_source()) {
                if !output.volumes.contains_key(source) {
                    warnings.push(format!(
                        "Service '{}' references undefined volume '{}' (will be created)",
                        name, source
                    ));
                }
            }
        }

        Self::start_order(output)?;

        for warning in &warnings {
            tracing::warn!("{}", warning);
        }
        Ok(warnings)
    }

    /// Service start order based on dependencies
    pub fn start_order(output: &ComposeOutput) -> Result<Vec<String>> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();

        for service_name in output.services.names() {
            Self::topological_sort(output, service_name, &mut visited, &mut visiting, &mut order)?;
        }

        Ok(order)
    }

    fn topological_sort(
        output: &ComposeOutput,
        service: &str,
        visited: &mut HashSet<String>,
        visiting: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        if visited.contains(service) {
            return Ok(());
        }

        if visiting.contains(service) {
            return Err(EmulationError::Compose(format!(
                "Circular dependency detected for service: {}",
                service
            )));
        }

        visiting.insert(service.to_string());

        if let Some(definition) = output.services.get(service) {
            for dep in definition.dependencies() {
                Self::topological_sort(output, dep, visited, visiting, order)?;
            }
        }

        visiting.remove(service);
        visited.insert(service.to_string());
        order.push(service.to_string());

        Ok(())
    }
}
