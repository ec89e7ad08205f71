//! Single-writer dispatcher
//!
//! One task owns the [`LobbyCoordinator`] and the table of connection
//! queues. Connection tasks never touch lobby state; they forward what they
//! read as [`Inbound`] values, and the dispatcher handles each one to
//! completion before looking at the next.

use std::collections::HashMap;

use codebreak_core::{Action, Command, LobbyCoordinator, ParticipantId};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::protocol::Message;

/// Input to the dispatcher, tagged with the originating connection
#[derive(Debug)]
pub(crate) enum Inbound {
    /// A connection was accepted; `tx` is its outbound queue
    Connected {
        participant: ParticipantId,
        tx: mpsc::Sender<Message>,
    },
    /// A decoded frame from a connection
    Message {
        participant: ParticipantId,
        message: Message,
    },
    /// The connection's read side ended
    Disconnected { participant: ParticipantId },
    /// Snapshot counters for diagnostics
    Stats { reply: oneshot::Sender<ServerStats> },
}

/// Point-in-time server counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServerStats {
    pub connections: usize,
    pub lobbies: usize,
    pub participants: usize,
}

pub(crate) struct Dispatcher {
    coordinator: LobbyCoordinator,
    /// Outbound queue per live connection. Dropping a sender closes the
    /// connection once its writer has drained what is already queued.
    connections: HashMap<ParticipantId, mpsc::Sender<Message>>,
}

impl Dispatcher {
    pub(crate) fn new() -> Self {
        Self {
            coordinator: LobbyCoordinator::new(),
            connections: HashMap::new(),
        }
    }

    /// Process inbound events until every sender is gone or shutdown fires
    pub(crate) async fn run(
        mut self,
        mut rx: mpsc::Receiver<Inbound>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                inbound = rx.recv() => {
                    match inbound {
                        Some(inbound) => self.handle(inbound),
                        None => break,
                    }
                }
                _ = shutdown_rx.recv() => {
                    self.shutdown();
                    break;
                }
            }
        }

        debug!("Dispatcher stopped");
    }

    pub(crate) fn handle(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Connected { participant, tx } => {
                self.connections.insert(participant, tx);
                self.send(participant, Message::Welcome {
                    participant_id: participant,
                });
            }
            Inbound::Message {
                participant,
                message,
            } => self.handle_message(participant, message),
            Inbound::Disconnected { participant } => {
                self.connections.remove(&participant);
                let actions = self.coordinator.handle(participant, Command::Disconnect);
                self.execute(actions);
            }
            Inbound::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
    }

    fn handle_message(&mut self, participant: ParticipantId, message: Message) {
        if let Message::Ping = message {
            self.send(participant, Message::Pong);
            return;
        }

        match message.into_command() {
            Ok(Some(command)) => {
                let actions = self.coordinator.handle(participant, command);
                self.execute(actions);
            }
            Ok(None) => {
                debug!(participant = %participant, "Ignoring unexpected message type");
            }
            Err(e) => {
                debug!(participant = %participant, error = %e, "Rejecting malformed request");
                self.send(
                    participant,
                    Message::Rejected {
                        reason: e.to_string(),
                    },
                );
            }
        }
    }

    fn execute(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Send { to, event } => self.send(to, event.into()),
                Action::Broadcast { recipients, event } => {
                    let msg: Message = event.into();
                    for to in recipients {
                        self.send(to, msg.clone());
                    }
                }
                Action::Close { participant } => {
                    if self.connections.remove(&participant).is_some() {
                        info!(participant = %participant, "Closing connection");
                    }
                }
            }
        }
    }

    /// Queue a message without waiting. A connection whose queue is full is
    /// too slow to keep up and gets closed.
    fn send(&mut self, to: ParticipantId, msg: Message) {
        let Some(tx) = self.connections.get(&to) else {
            debug!(participant = %to, "No connection for participant, dropping message");
            return;
        };

        match tx.try_send(msg) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(participant = %to, "Outbound queue full, closing connection");
                self.connections.remove(&to);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(participant = %to, "Connection already gone");
                self.connections.remove(&to);
            }
        }
    }

    fn stats(&self) -> ServerStats {
        ServerStats {
            connections: self.connections.len(),
            lobbies: self.coordinator.lobby_count(),
            participants: self.coordinator.participant_count(),
        }
    }

    fn shutdown(&mut self) {
        info!(connections = self.connections.len(), "Notifying clients of shutdown");
        for tx in self.connections.values() {
            let _ = tx.try_send(Message::ServerShutdown);
        }
        self.connections.clear();
    }
}
