//! Compose file types emitted by the conversion

use crate::error::{EmulationError, Result};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Compose file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeOutput {
    /// Compose file version
    pub version: String,
    /// Services keyed by container name, in emission order
    pub services: ServiceMap,
    /// Networks
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Named volumes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, VolumeConfig>,
}

impl ComposeOutput {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            services: ServiceMap::default(),
            networks: BTreeMap::new(),
            volumes: BTreeMap::new(),
        }
    }

    pub fn service(&self, container_name: &str) -> Option<&ServiceDefinition> {
        self.services.get(container_name)
    }

    pub fn container_names(&self) -> Vec<&str> {
        self.services.names().collect()
    }

    /// Every named volume referenced by any service
    pub fn referenced_volumes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .services
            .iter()
            .flat_map(|service| service.volumes.iter())
            .filter_map(VolumeMount::named_source)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

/// Services in insertion order, serialized as a map keyed by container name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceMap(Vec<ServiceDefinition>);

impl ServiceMap {
    /// Append a service, rejecting a container name already present
    pub fn insert(&mut self, service: ServiceDefinition) -> Result<()> {
        if self.contains(&service.container_name) {
            return Err(EmulationError::DuplicateIdentifier(
                service.container_name.clone(),
            ));
        }
        self.0.push(service);
        Ok(())
    }

    pub fn get(&self, container_name: &str) -> Option<&ServiceDefinition> {
        self.0.iter().find(|s| s.container_name == container_name)
    }

    pub fn contains(&self, container_name: &str) -> bool {
        self.get(container_name).is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ServiceDefinition> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.container_name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a ServiceMap {
    type Item = &'a ServiceDefinition;
    type IntoIter = std::slice::Iter<'a, ServiceDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for ServiceMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for service in &self.0 {
            map.serialize_entry(&service.container_name, service)?;
        }
        map.end()
    }
}

struct ServiceMapVisitor;

impl<'de> Visitor<'de> for ServiceMapVisitor {
    type Value = ServiceMap;

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "a map of service name to service definition")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<ServiceMap, A::Error> {
        let mut services = Vec::new();
        while let Some((name, mut service)) = access.next_entry::<String, ServiceDefinition>()? {
            if service.container_name.is_empty() {
                service.container_name = name;
            }
            services.push(service);
        }
        Ok(ServiceMap(services))
    }
}

impl<'de> Deserialize<'de> for ServiceMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(ServiceMapVisitor)
    }
}

/// One service of the compose file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    /// Container name, unique within the file
    #[serde(default)]
    pub container_name: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildConfig>,
    #[serde(default)]
    pub networks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeMount>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<PortMapping>>,
    #[serde(default)]
    pub tty: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<Healthcheck>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<String>>,
}

impl ServiceDefinition {
    /// Create a service with a tty attached and no other settings
    pub fn new(container_name: &str, image: &str) -> Self {
        Self {
            container_name: container_name.to_string(),
            image: image.to_string(),
            build: None,
            networks: Vec::new(),
            volumes: Vec::new(),
            environment: BTreeMap::new(),
            ports: None,
            tty: true,
            healthcheck: None,
            depends_on: None,
        }
    }

    pub fn build(mut self, build: BuildConfig) -> Self {
        self.build = Some(build);
        self
    }

    pub fn network(mut self, network: &str) -> Self {
        self.networks.push(network.to_string());
        self
    }

    /// Append volume mounts in order
    pub fn volumes<I: IntoIterator<Item = VolumeMount>>(mut self, mounts: I) -> Self {
        self.volumes.extend(mounts);
        self
    }

    /// Add environment variable
    pub fn env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.environment.insert(key.to_string(), value.into());
        self
    }

    /// Merge env vars, overwriting keys already set
    pub fn envs(mut self, vars: &BTreeMap<String, String>) -> Self {
        for (key, value) in vars {
            self.environment.insert(key.clone(), value.clone());
        }
        self
    }

    /// Add port mapping
    pub fn port(mut self, host: u16, container: u16) -> Self {
        self.ports
            .get_or_insert_with(Vec::new)
            .push(PortMapping { host, container });
        self
    }

    pub fn healthcheck(mut self, healthcheck: Healthcheck) -> Self {
        self.healthcheck = Some(healthcheck);
        self
    }

    pub fn depends_on(mut self, service: &str) -> Self {
        self.depends_on
            .get_or_insert_with(Vec::new)
            .push(service.to_string());
        self
    }

    pub fn dependencies(&self) -> &[String] {
        self.depends_on.as_deref().unwrap_or_default()
    }
}

/// Build configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Build context
    pub context: String,
    /// Dockerfile name, relative to the context
    pub dockerfile: String,
    /// Target stage
    pub target: String,
    /// Build arguments
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
}

/// Volume mount in short syntax
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VolumeMount {
    /// Host path mounted at a container path
    Bind { source: String, target: String },
    /// Named volume mounted at a container path
    Named { name: String, target: String },
}

impl VolumeMount {
    pub fn bind(source: impl Into<String>, target: impl Into<String>) -> Self {
        VolumeMount::Bind {
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn named(name: impl Into<String>, target: impl Into<String>) -> Self {
        VolumeMount::Named {
            name: name.into(),
            target: target.into(),
        }
    }

    pub fn target(&self) -> &str {
        match self {
            VolumeMount::Bind { target, .. } | VolumeMount::Named { target, .. } => target,
        }
    }

    /// Volume name when this is a named volume mount
    pub fn named_source(&self) -> Option<&str> {
        match self {
            VolumeMount::Named { name, .. } => Some(name),
            VolumeMount::Bind { .. } => None,
        }
    }
}

impl std::fmt::Display for VolumeMount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VolumeMount::Bind { source, target } => write!(f, "{}:{}", source, target),
            VolumeMount::Named { name, target } => write!(f, "{}:{}", name, target),
        }
    }
}

impl From<VolumeMount> for String {
    fn from(mount: VolumeMount) -> Self {
        mount.to_string()
    }
}

impl TryFrom<String> for VolumeMount {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        let (source, target) = value
            .rsplit_once(':')
            .filter(|(source, target)| !source.is_empty() && target.starts_with('/'))
            .ok_or_else(|| format!("invalid volume mount '{}'", value))?;

        // Host paths are absolute or relative; anything else names a volume
        if source.starts_with('/') || source.starts_with('.') || source.starts_with('~') {
            Ok(VolumeMount::bind(source, target))
        } else {
            Ok(VolumeMount::named(source, target))
        }
    }
}

/// Port mapping in short syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

impl std::fmt::Display for PortMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.container)
    }
}

impl From<PortMapping> for String {
    fn from(port: PortMapping) -> Self {
        port.to_string()
    }
}

impl TryFrom<String> for PortMapping {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        let invalid = || format!("invalid port mapping '{}'", value);
        let (host, container) = value.split_once(':').ok_or_else(invalid)?;
        Ok(PortMapping {
            host: host.parse().map_err(|_| invalid())?,
            container: container.parse().map_err(|_| invalid())?,
        })
    }
}

/// Healthcheck configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Healthcheck {
    /// Interval in seconds
    #[serde(with = "seconds")]
    pub interval: u32,
    /// Timeout in seconds
    #[serde(with = "seconds")]
    pub timeout: u32,
    pub retries: u32,
    /// Shell command run by the probe
    #[serde(rename = "test")]
    pub command: String,
}

/// Durations rendered as compose duration strings, e.g. `10s`
mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}s", value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.strip_suffix('s')
            .unwrap_or(&raw)
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

/// Network configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
}

/// Named volume configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
}
