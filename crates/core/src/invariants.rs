//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible lobby states during development.
//! These checks are compiled out in release builds.

use std::collections::{HashMap, HashSet};

use crate::models::{Lobby, LobbyKey, LobbyPhase, LOBBY_CAPACITY};

/// Validate that a lobby's roster and phase agree
pub fn assert_lobby_invariants(lobby: &Lobby) {
    debug_assert!(
        lobby.len() <= LOBBY_CAPACITY,
        "Lobby {} has {} participants, capacity is {}",
        lobby.key(),
        lobby.len(),
        LOBBY_CAPACITY
    );

    if cfg!(debug_assertions) {
        let unique: HashSet<_> = lobby.participants().iter().map(|p| p.id).collect();
        debug_assert!(
            unique.len() == lobby.len(),
            "Lobby {} seats the same participant twice",
            lobby.key()
        );
    }

    debug_assert!(lobby.round() >= 1, "Lobby {} is in round 0", lobby.key());

    match lobby.phase() {
        LobbyPhase::Waiting => {
            debug_assert!(
                !lobby.is_full(),
                "Lobby {} is full but still waiting",
                lobby.key()
            );
        }
        LobbyPhase::SettingSecrets => {
            debug_assert!(
                lobby.is_full(),
                "Lobby {} collects secrets with {} participants",
                lobby.key(),
                lobby.len()
            );
        }
        LobbyPhase::InRound => {
            debug_assert!(
                lobby.all_secrets_set(),
                "Lobby {} is in a round without both secrets",
                lobby.key()
            );
        }
        LobbyPhase::GameOver { winner } => {
            debug_assert!(
                lobby.is_full() && lobby.contains(winner),
                "Lobby {} is over but winner {} is not seated",
                lobby.key(),
                winner
            );
        }
    }
}

/// Validate the lobby registry as a whole
pub fn assert_registry_invariants(lobbies: &HashMap<LobbyKey, Lobby>) {
    for (key, lobby) in lobbies {
        debug_assert!(
            key == lobby.key(),
            "Lobby {} registered under key {}",
            lobby.key(),
            key
        );

        // Empty lobbies are deleted, never kept around
        debug_assert!(!lobby.is_empty(), "Lobby {} is empty", key);
    }
}
