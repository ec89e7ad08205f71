//! Participant model - one connected player

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Code;

/// Opaque per-connection handle.
///
/// Minted by the transport for every accepted connection, so a reconnecting
/// client always shows up as a new participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub Uuid);

impl ParticipantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A player seated in a lobby
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: ParticipantId,
    /// Code the opponent is trying to break
    pub secret: Option<Code>,
    pub has_guessed_this_round: bool,
    /// Most recent guess, kept for diagnostics only
    pub last_guess: Option<Code>,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    pub fn new(id: ParticipantId) -> Self {
        Self {
            id,
            secret: None,
            has_guessed_this_round: false,
            last_guess: None,
            joined_at: Utc::now(),
        }
    }

    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Forget everything about the current game
    pub fn reset(&mut self) {
        self.secret = None;
        self.has_guessed_this_round = false;
        self.last_guess = None;
    }

    /// Public view of this participant; never includes the secret
    pub fn roster_entry(&self) -> RosterEntry {
        RosterEntry {
            participant_id: self.id,
            has_secret: self.has_secret(),
            has_guessed_this_round: self.has_guessed_this_round,
            joined_at: self.joined_at,
        }
    }
}

/// Roster line sent to clients in a lobby snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub participant_id: ParticipantId,
    pub has_secret: bool,
    pub has_guessed_this_round: bool,
    pub joined_at: DateTime<Utc>,
}
