//! Codebreak Core Library
//!
//! Game rules and lobby state for two-player code breaking: feedback
//! scoring, lobby models, and the coordinator that drives each lobby from
//! seating through game over.

pub mod coordinator;
pub mod error;
pub mod feedback;
pub mod invariants;
pub mod models;

pub use coordinator::{Action, Command, LobbyCoordinator, OutboundEvent, Refusal};
pub use error::{Error, Result};
pub use feedback::evaluate;
pub use models::*;
