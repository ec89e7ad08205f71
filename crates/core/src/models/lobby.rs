//! Lobby model - a two-seat game session

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Participant, ParticipantId, RosterEntry};
use crate::error::{Error, Result};

/// Seats per lobby
pub const LOBBY_CAPACITY: usize = 2;

/// Longest accepted lobby key, in characters
pub const MAX_LOBBY_KEY_LEN: usize = 64;

/// Caller-chosen lobby name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LobbyKey(String);

impl LobbyKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for LobbyKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidLobbyKey("empty".into()));
        }
        if trimmed.chars().count() > MAX_LOBBY_KEY_LEN {
            return Err(Error::InvalidLobbyKey(format!(
                "longer than {} characters",
                MAX_LOBBY_KEY_LEN
            )));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for LobbyKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<LobbyKey> for String {
    fn from(key: LobbyKey) -> Self {
        key.0
    }
}

impl fmt::Display for LobbyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a lobby is in its game lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyPhase {
    /// Fewer than two players seated
    Waiting,
    /// Both seats taken, at least one secret missing
    SettingSecrets,
    /// Both secrets set; players are guessing
    InRound,
    /// Someone cracked the opponent's code. Only a restart leaves this phase.
    GameOver { winner: ParticipantId },
}

impl LobbyPhase {
    pub fn name(&self) -> &'static str {
        match self {
            LobbyPhase::Waiting => "waiting",
            LobbyPhase::SettingSecrets => "setting-secrets",
            LobbyPhase::InRound => "in-round",
            LobbyPhase::GameOver { .. } => "game-over",
        }
    }

    pub fn accepts_guesses(&self) -> bool {
        !matches!(self, LobbyPhase::GameOver { .. })
    }
}

impl fmt::Display for LobbyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A lobby and its seated participants, in join order
#[derive(Debug, Clone)]
pub struct Lobby {
    key: LobbyKey,
    participants: Vec<Participant>,
    phase: LobbyPhase,
    /// Current round number, starting at 1
    round: u32,
}

impl Lobby {
    pub fn new(key: LobbyKey) -> Self {
        Self {
            key,
            participants: Vec::with_capacity(LOBBY_CAPACITY),
            phase: LobbyPhase::Waiting,
            round: 1,
        }
    }

    pub fn key(&self) -> &LobbyKey {
        &self.key
    }

    pub fn phase(&self) -> LobbyPhase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= LOBBY_CAPACITY
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant_ids(&self) -> Vec<ParticipantId> {
        self.participants.iter().map(|p| p.id).collect()
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.participants.iter().any(|p| p.id == id)
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn participant_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.id == id)
    }

    /// The other seated participant, if any
    pub fn opponent_of(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id != id)
    }

    pub fn roster(&self) -> Vec<RosterEntry> {
        self.participants.iter().map(Participant::roster_entry).collect()
    }

    /// Both seats taken and both secrets recorded
    pub fn all_secrets_set(&self) -> bool {
        self.is_full() && self.participants.iter().all(Participant::has_secret)
    }

    /// Both seats taken and both players have guessed this round
    pub fn all_guessed(&self) -> bool {
        self.is_full() && self.participants.iter().all(|p| p.has_guessed_this_round)
    }

    /// Seat a new participant. Returns false when the lobby is full or the
    /// participant is already seated.
    pub fn seat(&mut self, id: ParticipantId) -> bool {
        if self.is_full() || self.contains(id) {
            return false;
        }
        self.participants.push(Participant::new(id));
        self.sync_phase_with_roster();
        true
    }

    /// Remove a participant. Returns false if they were not seated.
    pub fn unseat(&mut self, id: ParticipantId) -> bool {
        let before = self.participants.len();
        self.participants.retain(|p| p.id != id);
        let removed = self.participants.len() != before;
        if removed {
            self.sync_phase_with_roster();
        }
        removed
    }

    /// SettingSecrets -> InRound once both secrets are in. Also true while a
    /// round is underway, so a replaced secret re-announces the game.
    pub fn start_game(&mut self) -> bool {
        match self.phase {
            LobbyPhase::SettingSecrets | LobbyPhase::InRound if self.all_secrets_set() => {
                self.phase = LobbyPhase::InRound;
                true
            }
            _ => false,
        }
    }

    /// Clear every round flag and move to the next round
    pub fn advance_round(&mut self) {
        for p in &mut self.participants {
            p.has_guessed_this_round = false;
        }
        self.round = self.round.saturating_add(1);
    }

    pub fn finish(&mut self, winner: ParticipantId) {
        self.phase = LobbyPhase::GameOver { winner };
    }

    /// Wipe all game state and go back to collecting secrets
    pub fn reset(&mut self) {
        for p in &mut self.participants {
            p.reset();
        }
        self.round = 1;
        self.phase = if self.is_full() {
            LobbyPhase::SettingSecrets
        } else {
            LobbyPhase::Waiting
        };
    }

    fn sync_phase_with_roster(&mut self) {
        if !self.is_full() {
            self.phase = LobbyPhase::Waiting;
        } else if self.phase == LobbyPhase::Waiting {
            self.phase = LobbyPhase::SettingSecrets;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> LobbyKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_lobby_key_validation() {
        assert_eq!(key("  room-1 ").as_str(), "room-1");
        assert!("".parse::<LobbyKey>().is_err());
        assert!("   ".parse::<LobbyKey>().is_err());
        assert!("x".repeat(MAX_LOBBY_KEY_LEN + 1).parse::<LobbyKey>().is_err());
        assert!("x".repeat(MAX_LOBBY_KEY_LEN).parse::<LobbyKey>().is_ok());
    }

    #[test]
    fn test_seat_moves_to_setting_secrets() {
        let mut lobby = Lobby::new(key("a"));
        assert_eq!(lobby.phase(), LobbyPhase::Waiting);

        assert!(lobby.seat(ParticipantId::new()));
        assert_eq!(lobby.phase(), LobbyPhase::Waiting);

        assert!(lobby.seat(ParticipantId::new()));
        assert_eq!(lobby.phase(), LobbyPhase::SettingSecrets);
    }

    #[test]
    fn test_seat_rejects_third_and_duplicate() {
        let mut lobby = Lobby::new(key("a"));
        let first = ParticipantId::new();
        assert!(lobby.seat(first));
        assert!(!lobby.seat(first));
        assert!(lobby.seat(ParticipantId::new()));
        assert!(!lobby.seat(ParticipantId::new()));
        assert_eq!(lobby.len(), LOBBY_CAPACITY);
    }

    #[test]
    fn test_unseat_drops_back_to_waiting() {
        let mut lobby = Lobby::new(key("a"));
        let a = ParticipantId::new();
        let b = ParticipantId::new();
        lobby.seat(a);
        lobby.seat(b);
        lobby.finish(a);

        assert!(lobby.unseat(a));
        assert_eq!(lobby.phase(), LobbyPhase::Waiting);
        assert!(!lobby.unseat(a));
        assert_eq!(lobby.participant_ids(), vec![b]);
    }

    #[test]
    fn test_start_game_requires_both_secrets() {
        let mut lobby = Lobby::new(key("a"));
        let a = ParticipantId::new();
        let b = ParticipantId::new();
        lobby.seat(a);
        lobby.seat(b);

        lobby.participant_mut(a).unwrap().secret = Some("1234".parse().unwrap());
        assert!(!lobby.start_game());

        lobby.participant_mut(b).unwrap().secret = Some("5678".parse().unwrap());
        assert!(lobby.start_game());
        assert_eq!(lobby.phase(), LobbyPhase::InRound);
        assert_eq!(lobby.round(), 1);

        // Already started: stays in the same round
        assert!(lobby.start_game());
        assert_eq!(lobby.phase(), LobbyPhase::InRound);
        assert_eq!(lobby.round(), 1);

        lobby.finish(a);
        assert!(!lobby.start_game());
        assert_eq!(lobby.phase(), LobbyPhase::GameOver { winner: a });
    }

    #[test]
    fn test_advance_round_clears_flags() {
        let mut lobby = Lobby::new(key("a"));
        let a = ParticipantId::new();
        let b = ParticipantId::new();
        lobby.seat(a);
        lobby.seat(b);
        for id in [a, b] {
            let p = lobby.participant_mut(id).unwrap();
            p.secret = Some("1234".parse().unwrap());
            p.has_guessed_this_round = true;
        }
        lobby.start_game();
        assert!(lobby.all_guessed());

        lobby.advance_round();
        assert!(!lobby.all_guessed());
        assert_eq!(lobby.phase(), LobbyPhase::InRound);
        assert_eq!(lobby.round(), 2);
    }

    #[test]
    fn test_reset_returns_to_setting_secrets() {
        let mut lobby = Lobby::new(key("a"));
        let a = ParticipantId::new();
        lobby.seat(a);
        lobby.seat(ParticipantId::new());
        lobby.participant_mut(a).unwrap().secret = Some("1234".parse().unwrap());
        lobby.advance_round();
        lobby.finish(a);

        lobby.reset();
        assert_eq!(lobby.phase(), LobbyPhase::SettingSecrets);
        assert_eq!(lobby.round(), 1);
        assert!(lobby.participants().iter().all(|p| !p.has_secret()));
    }

    #[test]
    fn test_roster_hides_secrets() {
        let mut lobby = Lobby::new(key("a"));
        let a = ParticipantId::new();
        lobby.seat(a);
        lobby.participant_mut(a).unwrap().secret = Some("1234".parse().unwrap());

        let roster = lobby.roster();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].participant_id, a);
        assert!(roster[0].has_secret);
    }
}
