//! TCP server for hosting lobbies
//!
//! Each accepted connection gets a fresh participant id, a reader loop, and
//! a writer task draining its outbound queue. All game state lives in the
//! dispatcher task; see [`crate::dispatch`].

use std::net::SocketAddr;

use codebreak_core::ParticipantId;
use tokio::io::{AsyncWriteExt, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::dispatch::{Dispatcher, Inbound, ServerStats};
use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame, DEFAULT_MAX_FRAME_SIZE};
use crate::protocol::Message;

/// Capacity of the dispatcher's inbound channel
const DISPATCH_QUEUE: usize = 1024;

/// Transport settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Largest accepted frame, in bytes
    pub max_frame_size: u32,
    /// Messages buffered per connection before it is considered stalled
    pub outbound_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], crate::DEFAULT_PORT)),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            outbound_queue: 64,
        }
    }
}

/// Held by the dispatcher, the accept loop and every writer. The receiving
/// end sees `None` once all of them have finished.
type DrainGuard = mpsc::Sender<()>;

/// Lobby server handle
pub struct Server {
    addr: SocketAddr,
    dispatch_tx: mpsc::Sender<Inbound>,
    shutdown_tx: broadcast::Sender<()>,
    drained_rx: mpsc::Receiver<()>,
}

impl Server {
    /// Bind and start serving
    pub async fn start(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, "Server started");

        let (shutdown_tx, _) = broadcast::channel(1);
        let (dispatch_tx, dispatch_rx) = mpsc::channel(DISPATCH_QUEUE);
        let (drain_guard, drained_rx) = mpsc::channel(1);

        let dispatcher = Dispatcher::new();
        let dispatcher_guard = drain_guard.clone();
        let dispatcher_shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            dispatcher.run(dispatch_rx, dispatcher_shutdown).await;
            drop(dispatcher_guard);
        });

        tokio::spawn(accept_loop(
            listener,
            config,
            dispatch_tx.clone(),
            shutdown_tx.subscribe(),
            drain_guard,
        ));

        Ok(Server {
            addr: bound_addr,
            dispatch_tx,
            shutdown_tx,
            drained_rx,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Current connection and lobby counters
    pub async fn stats(&self) -> Result<ServerStats> {
        let (reply, rx) = oneshot::channel();
        self.dispatch_tx
            .send(Inbound::Stats { reply })
            .await
            .map_err(|_| Error::ServerClosed)?;
        rx.await.map_err(|_| Error::ServerClosed)
    }

    /// Stop accepting, notify every client, and wait until the dispatcher
    /// and all writers are done
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(());
        info!("Server shutdown initiated");

        let _ = self.drained_rx.recv().await;
        info!("Server stopped");
    }
}

/// Accept incoming connections
async fn accept_loop(
    listener: TcpListener,
    config: ServerConfig,
    dispatch_tx: mpsc::Sender<Inbound>,
    mut shutdown_rx: broadcast::Receiver<()>,
    drain_guard: DrainGuard,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            config.clone(),
                            dispatch_tx.clone(),
                            drain_guard.clone(),
                        ));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Handle a single client connection
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    config: ServerConfig,
    dispatch_tx: mpsc::Sender<Inbound>,
    drain_guard: DrainGuard,
) {
    let participant = ParticipantId::new();
    let (mut reader, writer) = tokio::io::split(stream);

    let (msg_tx, msg_rx) = mpsc::channel(config.outbound_queue.max(1));
    let mut writer_handle = tokio::spawn(writer_task(
        writer,
        msg_rx,
        config.max_frame_size,
        drain_guard,
    ));

    if dispatch_tx
        .send(Inbound::Connected {
            participant,
            tx: msg_tx,
        })
        .await
        .is_err()
    {
        warn!(addr = %addr, "Dispatcher gone, dropping connection");
        writer_handle.abort();
        return;
    }

    info!(addr = %addr, participant = %participant, "Participant connected");

    loop {
        tokio::select! {
            result = read_frame(&mut reader, config.max_frame_size) => {
                match result {
                    Ok(message) => {
                        let inbound = Inbound::Message { participant, message };
                        if dispatch_tx.send(inbound).await.is_err() {
                            break;
                        }
                    }
                    Err(Error::ConnectionClosed) => {
                        debug!(participant = %participant, "Connection closed");
                        break;
                    }
                    Err(e) => {
                        warn!(participant = %participant, error = %e, "Read error");
                        break;
                    }
                }
            }
            // The dispatcher dropped our queue (rejection, stall, shutdown)
            // or the socket stopped accepting writes
            _ = &mut writer_handle => {
                debug!(participant = %participant, "Writer finished");
                break;
            }
        }
    }

    // Cleanup
    writer_handle.abort();
    let _ = dispatch_tx
        .send(Inbound::Disconnected { participant })
        .await;

    info!(participant = %participant, "Participant disconnected");
}

/// Writer task - sends queued messages to the client, then closes the
/// write side once the queue is dropped
async fn writer_task(
    mut writer: WriteHalf<TcpStream>,
    mut rx: mpsc::Receiver<Message>,
    max_frame_size: u32,
    _drain_guard: DrainGuard,
) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &msg, max_frame_size).await {
            debug!(error = %e, "Write failed");
            return;
        }
    }
    let _ = writer.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Client, ServerEvent};
    use codebreak_core::Status;

    fn local_config() -> ServerConfig {
        ServerConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            ..ServerConfig::default()
        }
    }

    /// Next event that is not a participant count update
    async fn next_game_event(client: &mut Client) -> ServerEvent {
        loop {
            match client.next_event().await {
                Some(ServerEvent::ParticipantCount { .. }) => continue,
                Some(event) => return event,
                None => panic!("event stream ended"),
            }
        }
    }

    #[tokio::test]
    async fn test_server_start() {
        let server = Server::start(local_config()).await.unwrap();

        assert!(server.addr().port() > 0);
        assert_eq!(server.stats().await.unwrap(), ServerStats::default());
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_resolves_after_clients_notified() {
        let server = Server::start(local_config()).await.unwrap();
        let mut a = Client::connect(server.addr()).await.unwrap();
        let mut b = Client::connect(server.addr()).await.unwrap();
        a.join_lobby("closing").await.unwrap();
        next_game_event(&mut a).await;

        tokio::time::timeout(std::time::Duration::from_secs(5), server.shutdown())
            .await
            .expect("shutdown did not finish");

        for client in [&mut a, &mut b] {
            assert_eq!(next_game_event(client).await, ServerEvent::ServerShutdown);
            assert_eq!(next_game_event(client).await, ServerEvent::Disconnected);
        }
    }

    #[tokio::test]
    async fn test_full_game_over_tcp() {
        let server = Server::start(local_config()).await.unwrap();
        let mut alice = Client::connect(server.addr()).await.unwrap();
        let mut bob = Client::connect(server.addr()).await.unwrap();

        alice.join_lobby("table").await.unwrap();
        assert!(matches!(
            next_game_event(&mut alice).await,
            ServerEvent::LobbySnapshot { .. }
        ));
        bob.join_lobby("table").await.unwrap();
        match next_game_event(&mut bob).await {
            ServerEvent::LobbySnapshot { roster, .. } => assert_eq!(roster.len(), 2),
            other => panic!("Expected snapshot, got {:?}", other),
        }

        alice.set_secret("table", "1234").await.unwrap();
        bob.set_secret("table", "5678").await.unwrap();
        assert!(matches!(next_game_event(&mut alice).await, ServerEvent::GameStart { .. }));
        assert!(matches!(next_game_event(&mut bob).await, ServerEvent::GameStart { .. }));

        // Round 1: nobody wins
        alice.submit_guess("table", "5600").await.unwrap();
        match next_game_event(&mut alice).await {
            ServerEvent::GuessFeedback { statuses, .. } => assert_eq!(
                statuses.0,
                [Status::Correct, Status::Correct, Status::Absent, Status::Absent]
            ),
            other => panic!("Expected feedback, got {:?}", other),
        }
        bob.submit_guess("table", "4321").await.unwrap();
        assert!(matches!(
            next_game_event(&mut bob).await,
            ServerEvent::GuessFeedback { .. }
        ));
        for client in [&mut alice, &mut bob] {
            assert!(matches!(
                next_game_event(client).await,
                ServerEvent::NextRound { round: 2, .. }
            ));
        }

        // Round 2: alice cracks it
        alice.submit_guess("table", "5678").await.unwrap();
        match next_game_event(&mut alice).await {
            ServerEvent::GuessFeedback { statuses, .. } => assert!(statuses.is_solved()),
            other => panic!("Expected feedback, got {:?}", other),
        }
        let alice_id = alice.participant_id();
        for client in [&mut alice, &mut bob] {
            match next_game_event(client).await {
                ServerEvent::GameOver { winner, .. } => assert_eq!(winner, alice_id),
                other => panic!("Expected game over, got {:?}", other),
            }
        }

        bob.restart("table").await.unwrap();
        for client in [&mut alice, &mut bob] {
            assert!(matches!(
                next_game_event(client).await,
                ServerEvent::GameRestarted { .. }
            ));
        }

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_third_client_rejected_and_disconnected() {
        let server = Server::start(local_config()).await.unwrap();
        let mut a = Client::connect(server.addr()).await.unwrap();
        let mut b = Client::connect(server.addr()).await.unwrap();
        let mut c = Client::connect(server.addr()).await.unwrap();

        a.join_lobby("full").await.unwrap();
        next_game_event(&mut a).await;
        b.join_lobby("full").await.unwrap();
        next_game_event(&mut b).await;

        c.join_lobby("full").await.unwrap();
        assert!(matches!(
            next_game_event(&mut c).await,
            ServerEvent::RejectedOverflow { .. }
        ));
        assert!(matches!(
            next_game_event(&mut c).await,
            ServerEvent::Disconnected
        ));

        let stats = server.stats().await.unwrap();
        assert_eq!(stats.lobbies, 1);
        assert_eq!(stats.participants, 2);

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_last_disconnect_removes_lobby() {
        let server = Server::start(local_config()).await.unwrap();
        let mut a = Client::connect(server.addr()).await.unwrap();

        a.join_lobby("solo").await.unwrap();
        next_game_event(&mut a).await;
        assert_eq!(server.stats().await.unwrap().lobbies, 1);

        a.disconnect().await;
        // Wait for the server to notice
        for _ in 0..50 {
            if server.stats().await.unwrap().lobbies == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let stats = server.stats().await.unwrap();
        assert_eq!(stats.lobbies, 0);
        assert_eq!(stats.connections, 0);

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_malformed_code_rejected_over_wire() {
        let server = Server::start(local_config()).await.unwrap();
        let mut a = Client::connect(server.addr()).await.unwrap();

        a.join_lobby("room").await.unwrap();
        next_game_event(&mut a).await;
        a.set_secret("room", "abcd").await.unwrap();

        match next_game_event(&mut a).await {
            ServerEvent::Rejected { reason } => assert!(reason.contains("Invalid code")),
            other => panic!("Expected rejection, got {:?}", other),
        }

        server.shutdown().await;
    }
}
