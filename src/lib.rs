//! Emulation system compiler
//!
//! Turns a high level description of an Opentrons emulation system (one
//! robot, any number of modules, and where each repository's source comes
//! from) into a docker-compose file that builds and wires the whole fleet:
//!
//! - Input validation and source selector classification
//! - Builder services that compile each repository into named volumes
//! - Emulator services wired to each other by container name
//! - Container filters over an emitted compose file

pub mod catalog;
pub mod compose;
pub mod error;
pub mod input;
pub mod orchestrator;
pub mod resolver;
pub mod services;
pub mod settings;

pub use error::{EmulationError, Result};
pub use orchestrator::{convert, ComposeOrchestrator};
