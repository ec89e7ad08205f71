//! Data models for Codebreak

mod code;
mod lobby;
mod participant;

pub use code::*;
pub use lobby::*;
pub use participant::*;
