//! Lobby coordinator
//!
//! Owns every lobby and drives the per-lobby game state machine. The
//! coordinator does no I/O: each command returns the [`Action`]s the
//! transport must carry out, in order.
//!
//! Commands that reference an unknown lobby, or a lobby the sender is not
//! seated in, are dropped and logged at debug level.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::feedback::evaluate;
use crate::invariants::{assert_lobby_invariants, assert_registry_invariants};
use crate::models::{Code, Feedback, Lobby, LobbyKey, ParticipantId, RosterEntry};

/// A request from one connected participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Take a seat in a lobby, creating it if needed
    Join { lobby: LobbyKey },
    /// Choose the code the opponent must break
    SetSecret { lobby: LobbyKey, code: Code },
    /// Guess the opponent's code
    SubmitGuess { lobby: LobbyKey, code: Code },
    /// Wipe the game and start over with new secrets
    Restart { lobby: LobbyKey },
    /// Connection went away
    Disconnect,
}

/// Why a well-formed command was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Refusal {
    #[error("the game is over, restart to play again")]
    GameOver,
}

/// Events delivered to clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    /// Lobby already has two players
    RejectOverflow { lobby: LobbyKey },
    /// Current roster, sent to a player who just joined
    LobbySnapshot {
        lobby: LobbyKey,
        roster: Vec<RosterEntry>,
    },
    ParticipantCount { lobby: LobbyKey, count: usize },
    /// Both secrets are set; guessing may begin
    GameStart { lobby: LobbyKey },
    /// Private result of the recipient's own guess
    GuessFeedback { lobby: LobbyKey, feedback: Feedback },
    GameOver {
        lobby: LobbyKey,
        winner: ParticipantId,
    },
    /// Both players guessed; the next round has begun
    NextRound { lobby: LobbyKey, round: u32 },
    GameRestarted { lobby: LobbyKey },
    Rejected { reason: Refusal },
}

/// Work for the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Deliver to a single participant
    Send {
        to: ParticipantId,
        event: OutboundEvent,
    },
    /// Deliver to every listed lobby member
    Broadcast {
        recipients: Vec<ParticipantId>,
        event: OutboundEvent,
    },
    /// Forcibly drop a participant's connection
    Close { participant: ParticipantId },
}

/// Registry of live lobbies, keyed by lobby key
#[derive(Debug, Default)]
pub struct LobbyCoordinator {
    lobbies: HashMap<LobbyKey, Lobby>,
}

impl LobbyCoordinator {
    pub fn new() -> Self {
        Self {
            lobbies: HashMap::new(),
        }
    }

    /// Apply one command from `sender` and return the resulting actions
    pub fn handle(&mut self, sender: ParticipantId, command: Command) -> Vec<Action> {
        let actions = match command {
            Command::Join { lobby } => self.join(&lobby, sender),
            Command::SetSecret { lobby, code } => self.set_secret(&lobby, sender, code),
            Command::SubmitGuess { lobby, code } => self.submit_guess(&lobby, sender, code),
            Command::Restart { lobby } => self.restart(&lobby, sender),
            Command::Disconnect => self.disconnect(sender),
        };

        assert_registry_invariants(&self.lobbies);
        actions
    }

    pub fn lobby(&self, key: &LobbyKey) -> Option<&Lobby> {
        self.lobbies.get(key)
    }

    pub fn lobby_count(&self) -> usize {
        self.lobbies.len()
    }

    /// Number of seated participants across all lobbies
    pub fn participant_count(&self) -> usize {
        self.lobbies.values().map(Lobby::len).sum()
    }

    pub fn join(&mut self, key: &LobbyKey, participant: ParticipantId) -> Vec<Action> {
        if let Some(lobby) = self.lobbies.get(key) {
            if lobby.contains(participant) {
                debug!(lobby = %key, participant = %participant, "Duplicate join ignored");
                return Vec::new();
            }
            if lobby.is_full() {
                info!(lobby = %key, participant = %participant, "Lobby full, rejecting joiner");
                return vec![
                    Action::Send {
                        to: participant,
                        event: OutboundEvent::RejectOverflow { lobby: key.clone() },
                    },
                    Action::Close { participant },
                ];
            }
        }

        let lobby = self
            .lobbies
            .entry(key.clone())
            .or_insert_with(|| Lobby::new(key.clone()));
        lobby.seat(participant);
        assert_lobby_invariants(lobby);

        info!(
            lobby = %key,
            participant = %participant,
            count = lobby.len(),
            phase = %lobby.phase(),
            "Participant joined"
        );

        vec![
            Action::Send {
                to: participant,
                event: OutboundEvent::LobbySnapshot {
                    lobby: key.clone(),
                    roster: lobby.roster(),
                },
            },
            broadcast(
                lobby,
                OutboundEvent::ParticipantCount {
                    lobby: key.clone(),
                    count: lobby.len(),
                },
            ),
        ]
    }

    pub fn set_secret(
        &mut self,
        key: &LobbyKey,
        participant: ParticipantId,
        code: Code,
    ) -> Vec<Action> {
        let Some(lobby) = self.seated_lobby_mut(key, participant) else {
            return Vec::new();
        };

        if let Some(p) = lobby.participant_mut(participant) {
            p.secret = Some(code);
        }
        info!(lobby = %key, participant = %participant, phase = %lobby.phase(), "Secret set");

        // A finished game keeps its result until someone restarts it
        let mut actions = Vec::new();
        if lobby.start_game() {
            info!(lobby = %key, round = lobby.round(), "Both secrets set, game starting");
            actions.push(broadcast(lobby, OutboundEvent::GameStart { lobby: key.clone() }));
        }

        assert_lobby_invariants(lobby);
        actions
    }

    pub fn submit_guess(
        &mut self,
        key: &LobbyKey,
        participant: ParticipantId,
        code: Code,
    ) -> Vec<Action> {
        let Some(lobby) = self.seated_lobby_mut(key, participant) else {
            return Vec::new();
        };

        if !lobby.phase().accepts_guesses() {
            debug!(lobby = %key, participant = %participant, "Guess after game over");
            return vec![refuse(participant, Refusal::GameOver)];
        }

        if let Some(p) = lobby.participant_mut(participant) {
            p.last_guess = Some(code);
            p.has_guessed_this_round = true;
        }

        let mut actions = Vec::new();

        // No feedback until the opponent has chosen a secret; the guess
        // still counts toward finishing the round.
        let feedback = lobby
            .opponent_of(participant)
            .and_then(|opponent| opponent.secret)
            .map(|secret| evaluate(&secret, &code));

        if let Some(feedback) = feedback {
            debug!(lobby = %key, participant = %participant, ?feedback, "Guess scored");
            actions.push(Action::Send {
                to: participant,
                event: OutboundEvent::GuessFeedback {
                    lobby: key.clone(),
                    feedback,
                },
            });

            if feedback.is_solved() {
                lobby.finish(participant);
                info!(lobby = %key, winner = %participant, "Game over");
                actions.push(broadcast(
                    lobby,
                    OutboundEvent::GameOver {
                        lobby: key.clone(),
                        winner: participant,
                    },
                ));
                assert_lobby_invariants(lobby);
                return actions;
            }
        } else {
            debug!(lobby = %key, participant = %participant, "Opponent has no secret yet, no feedback");
        }

        if lobby.all_guessed() {
            lobby.advance_round();
            let round = lobby.round();
            info!(lobby = %key, round, "Next round");
            actions.push(broadcast(
                lobby,
                OutboundEvent::NextRound {
                    lobby: key.clone(),
                    round,
                },
            ));
        }

        assert_lobby_invariants(lobby);
        actions
    }

    pub fn restart(&mut self, key: &LobbyKey, participant: ParticipantId) -> Vec<Action> {
        let Some(lobby) = self.seated_lobby_mut(key, participant) else {
            return Vec::new();
        };

        lobby.reset();
        info!(lobby = %key, participant = %participant, phase = %lobby.phase(), "Lobby restarted");
        assert_lobby_invariants(lobby);

        vec![broadcast(
            lobby,
            OutboundEvent::GameRestarted { lobby: key.clone() },
        )]
    }

    pub fn disconnect(&mut self, participant: ParticipantId) -> Vec<Action> {
        let keys: Vec<LobbyKey> = self
            .lobbies
            .iter()
            .filter(|(_, lobby)| lobby.contains(participant))
            .map(|(key, _)| key.clone())
            .collect();

        let mut actions = Vec::new();
        for key in keys {
            let Some(lobby) = self.lobbies.get_mut(&key) else {
                continue;
            };
            lobby.unseat(participant);
            info!(lobby = %key, participant = %participant, remaining = lobby.len(), "Participant left");

            actions.push(broadcast(
                lobby,
                OutboundEvent::ParticipantCount {
                    lobby: key.clone(),
                    count: lobby.len(),
                },
            ));

            if lobby.is_empty() {
                self.lobbies.remove(&key);
                debug!(lobby = %key, "Lobby emptied and removed");
            } else {
                assert_lobby_invariants(lobby);
            }
        }

        actions
    }

    fn seated_lobby_mut(&mut self, key: &LobbyKey, participant: ParticipantId) -> Option<&mut Lobby> {
        match self.lobbies.get_mut(key) {
            Some(lobby) if lobby.contains(participant) => Some(lobby),
            Some(_) => {
                debug!(lobby = %key, participant = %participant, "Sender not seated in lobby, ignoring");
                None
            }
            None => {
                debug!(lobby = %key, participant = %participant, "Unknown lobby, ignoring");
                None
            }
        }
    }
}

fn broadcast(lobby: &Lobby, event: OutboundEvent) -> Action {
    Action::Broadcast {
        recipients: lobby.participant_ids(),
        event,
    }
}

fn refuse(participant: ParticipantId, reason: Refusal) -> Action {
    Action::Send {
        to: participant,
        event: OutboundEvent::Rejected { reason },
    }
}
