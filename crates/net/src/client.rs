//! TCP client for connecting to a lobby server

use std::net::SocketAddr;
use std::sync::Arc;

use codebreak_core::{Feedback, LobbyKey, ParticipantId, RosterEntry};
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame, DEFAULT_MAX_FRAME_SIZE};
use crate::protocol::Message;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// Event received from the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Joined a lobby; roster at the time of joining
    LobbySnapshot {
        lobby_key: LobbyKey,
        roster: Vec<RosterEntry>,
    },
    /// Lobby was full and the server is closing the connection
    RejectedOverflow { lobby_key: LobbyKey },
    ParticipantCount { lobby_key: LobbyKey, count: usize },
    GameStart { lobby_key: LobbyKey },
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
    /// A request was refused
    Rejected { reason: String },
    Pong,
    /// Server is shutting down
    ServerShutdown,
    /// Connection lost
    Disconnected,
}

/// Client handle for network operations
pub struct Client {
    participant_id: ParticipantId,
    state: Arc<RwLock<ConnectionState>>,
    event_rx: mpsc::Receiver<ServerEvent>,
    cmd_tx: mpsc::Sender<ClientCommand>,
}

enum ClientCommand {
    Send(Message),
    Disconnect,
}

impl Client {
    /// Connect to a lobby server and wait for its welcome
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        info!(addr = %addr, "Connecting to server");

        let stream = TcpStream::connect(addr).await?;
        let (mut reader, writer) = tokio::io::split(stream);

        let participant_id = match read_frame(&mut reader, DEFAULT_MAX_FRAME_SIZE).await? {
            Message::Welcome { participant_id } => participant_id,
            other => {
                return Err(Error::Protocol(format!(
                    "Expected welcome, got {:?}",
                    other
                )))
            }
        };

        debug!(participant = %participant_id, "Welcomed by server");

        let state = Arc::new(RwLock::new(ConnectionState::Connected));
        let (event_tx, event_rx) = mpsc::channel(64);
        let (cmd_tx, cmd_rx) = mpsc::channel(64);

        tokio::spawn(connection_task(
            reader,
            writer,
            state.clone(),
            event_tx,
            cmd_rx,
        ));

        Ok(Client {
            participant_id,
            state,
            event_rx,
            cmd_tx,
        })
    }

    /// Identity the server assigned to this connection
    pub fn participant_id(&self) -> ParticipantId {
        self.participant_id
    }

    /// Get the next server event
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        self.event_rx.recv().await
    }

    pub async fn join_lobby(&self, lobby_key: &str) -> Result<()> {
        self.send(Message::JoinLobby {
            lobby_key: lobby_key.to_string(),
        })
        .await
    }

    pub async fn set_secret(&self, lobby_key: &str, code: &str) -> Result<()> {
        self.send(Message::SetSecret {
            lobby_key: lobby_key.to_string(),
            code: code.to_string(),
        })
        .await
    }

    pub async fn submit_guess(&self, lobby_key: &str, code: &str) -> Result<()> {
        self.send(Message::SubmitGuess {
            lobby_key: lobby_key.to_string(),
            code: code.to_string(),
        })
        .await
    }

    pub async fn restart(&self, lobby_key: &str) -> Result<()> {
        self.send(Message::Restart {
            lobby_key: lobby_key.to_string(),
        })
        .await
    }

    /// Send a ping
    pub async fn ping(&self) -> Result<()> {
        self.send(Message::Ping).await
    }

    /// Disconnect from the server
    pub async fn disconnect(&self) {
        let _ = self.cmd_tx.send(ClientCommand::Disconnect).await;
    }

    /// Get current connection state
    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    async fn send(&self, msg: Message) -> Result<()> {
        self.cmd_tx
            .send(ClientCommand::Send(msg))
            .await
            .map_err(|_| Error::NotConnected)
    }
}

/// Main connection task
async fn connection_task(
    reader: ReadHalf<TcpStream>,
    mut writer: WriteHalf<TcpStream>,
    state: Arc<RwLock<ConnectionState>>,
    event_tx: mpsc::Sender<ServerEvent>,
    mut cmd_rx: mpsc::Receiver<ClientCommand>,
) {
    // Reads run in their own task so a partially read frame is never
    // abandoned when a command arrives
    let mut reader_handle = tokio::spawn(reader_task(reader, event_tx.clone()));

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ClientCommand::Send(msg)) => {
                        if let Err(e) = write_frame(&mut writer, &msg, DEFAULT_MAX_FRAME_SIZE).await {
                            warn!(error = %e, "Write error");
                            break;
                        }
                    }
                    Some(ClientCommand::Disconnect) | None => {
                        debug!("Disconnect requested");
                        break;
                    }
                }
            }
            _ = &mut reader_handle => {
                debug!("Server closed connection");
                break;
            }
        }
    }

    // Cleanup
    reader_handle.abort();
    let _ = writer.shutdown().await;
    *state.write().await = ConnectionState::Disconnected;
    let _ = event_tx.send(ServerEvent::Disconnected).await;
    info!("Disconnected from server");
}

/// Forward server messages as events until the stream ends
async fn reader_task(mut reader: ReadHalf<TcpStream>, event_tx: mpsc::Sender<ServerEvent>) {
    loop {
        match read_frame(&mut reader, DEFAULT_MAX_FRAME_SIZE).await {
            Ok(msg) => {
                if let Some(event) = to_event(msg) {
                    if event_tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
            Err(Error::ConnectionClosed) => return,
            Err(e) => {
                warn!(error = %e, "Read error");
                return;
            }
        }
    }
}

/// Map a server message to a client event
fn to_event(msg: Message) -> Option<ServerEvent> {
    let event = match msg {
        Message::LobbySnapshot { lobby_key, roster } => {
            ServerEvent::LobbySnapshot { lobby_key, roster }
        }
        Message::RejectOverflow { lobby_key } => ServerEvent::RejectedOverflow { lobby_key },
        Message::ParticipantCount { lobby_key, count } => {
            ServerEvent::ParticipantCount { lobby_key, count }
        }
        Message::GameStart { lobby_key } => ServerEvent::GameStart { lobby_key },
        Message::GuessFeedback {
            lobby_key,
            statuses,
        } => ServerEvent::GuessFeedback {
            lobby_key,
            statuses,
        },
        Message::GameOver { lobby_key, winner } => ServerEvent::GameOver { lobby_key, winner },
        Message::NextRound { lobby_key, round } => ServerEvent::NextRound { lobby_key, round },
        Message::GameRestarted { lobby_key } => ServerEvent::GameRestarted { lobby_key },
        Message::Rejected { reason } => ServerEvent::Rejected { reason },
        Message::Pong => ServerEvent::Pong,
        Message::ServerShutdown => ServerEvent::ServerShutdown,
        _ => {
            debug!("Ignoring unexpected message");
            return None;
        }
    };
    Some(event)
}
