//! Input system description
//!
//! Parsing and validation of the user's system description. Everything past
//! this module works on validated types only.

pub mod model;
pub mod mounts;
pub mod pipettes;
pub mod source;

pub use model::{Module, Robot, SystemDescription};
pub use source::SourceSelector;
