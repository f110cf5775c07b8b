//! Compose file output
//!
//! Types for the emitted compose file, YAML rendering and parsing, and
//! container filters over an emitted file.

pub mod config;
pub mod filter;
pub mod parser;

pub use config::{ComposeOutput, ServiceDefinition, VolumeMount};
pub use filter::ContainerFilter;
pub use parser::ComposeParser;
