//! Network protocol message types
//!
//! All messages are JSON-serialized and length-prefixed on the wire. Every
//! object carries a kebab-case `type` tag, e.g. `{"type":"join-lobby",...}`.

use codebreak_core::{
    Command, Feedback, LobbyKey, OutboundEvent, ParticipantId, RosterEntry,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Network protocol messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Message {
    // Client -> server. Keys and codes arrive as raw strings and are
    // validated when converted into a `Command`.
    /// Take a seat in a lobby
    JoinLobby { lobby_key: String },

    /// Choose a secret code
    SetSecret { lobby_key: String, code: String },

    /// Guess the opponent's code
    SubmitGuess { lobby_key: String, code: String },

    /// Reset the lobby for a new game
    Restart { lobby_key: String },

    /// Liveness probe
    Ping,

    // Server -> client
    /// First message on every connection
    Welcome { participant_id: ParticipantId },

    /// Lobby is full; the connection will be closed
    RejectOverflow { lobby_key: LobbyKey },

    /// Roster of the lobby just joined
    LobbySnapshot {
        lobby_key: LobbyKey,
        roster: Vec<RosterEntry>,
    },

    /// Number of players seated in the lobby
    ParticipantCount { lobby_key: LobbyKey, count: usize },

    /// Both secrets set, guessing may start
    GameStart { lobby_key: LobbyKey },

    /// Private feedback for the recipient's own guess
    GuessFeedback {
        lobby_key: LobbyKey,
        statuses: Feedback,
    },

    GameOver {
        lobby_key: LobbyKey,
        winner: ParticipantId,
    },

    NextRound { lobby_key: LobbyKey, round: u32 },

    GameRestarted { lobby_key: LobbyKey },

    /// Request refused; the connection stays open
    Rejected { reason: String },

    /// Pong response to ping
    Pong,

    /// Server is shutting down
    ServerShutdown,
}

impl Message {
    /// Serialize message to JSON bytes
    pub fn to_bytes(&self) -> std::result::Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize message from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Validate a client request into a coordinator command.
    ///
    /// Returns `Ok(None)` for messages that are not lobby commands (pings and
    /// anything only the server should send).
    pub fn into_command(self) -> Result<Option<Command>> {
        let command = match self {
            Message::JoinLobby { lobby_key } => Command::Join {
                lobby: lobby_key.parse()?,
            },
            Message::SetSecret { lobby_key, code } => Command::SetSecret {
                lobby: lobby_key.parse()?,
                code: code.parse()?,
            },
            Message::SubmitGuess { lobby_key, code } => Command::SubmitGuess {
                lobby: lobby_key.parse()?,
                code: code.parse()?,
            },
            Message::Restart { lobby_key } => Command::Restart {
                lobby: lobby_key.parse()?,
            },
            _ => return Ok(None),
        };
        Ok(Some(command))
    }
}

impl From<OutboundEvent> for Message {
    fn from(event: OutboundEvent) -> Self {
        match event {
            OutboundEvent::RejectOverflow { lobby } => Message::RejectOverflow { lobby_key: lobby },
            OutboundEvent::LobbySnapshot { lobby, roster } => Message::LobbySnapshot {
                lobby_key: lobby,
                roster,
            },
            OutboundEvent::ParticipantCount { lobby, count } => Message::ParticipantCount {
                lobby_key: lobby,
                count,
            },
            OutboundEvent::GameStart { lobby } => Message::GameStart { lobby_key: lobby },
            OutboundEvent::GuessFeedback { lobby, feedback } => Message::GuessFeedback {
                lobby_key: lobby,
                statuses: feedback,
            },
            OutboundEvent::GameOver { lobby, winner } => Message::GameOver {
                lobby_key: lobby,
                winner,
            },
            OutboundEvent::NextRound { lobby, round } => Message::NextRound {
                lobby_key: lobby,
                round,
            },
            OutboundEvent::GameRestarted { lobby } => Message::GameRestarted { lobby_key: lobby },
            OutboundEvent::Rejected { reason } => Message::Rejected {
                reason: reason.to_string(),
            },
        }
    }
}
