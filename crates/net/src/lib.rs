//! Codebreak Network Library
//!
//! Hosts two-player code-breaking lobbies over TCP.
//!
//! # Architecture
//!
//! - **Server**: Accepts connections and forwards their requests to a single
//!   dispatcher task that owns all lobby state
//! - **Client**: Connects to a server and surfaces its messages as events
//! - **Protocol**: Length-prefixed JSON messages tagged by `type`
//!
//! # Usage
//!
//! ```ignore
//! let server = Server::start(ServerConfig::default()).await?;
//!
//! let mut client = Client::connect(server.addr()).await?;
//! client.join_lobby("table-1").await?;
//!
//! while let Some(event) = client.next_event().await {
//!     match event {
//!         ServerEvent::GameStart { .. } => client.submit_guess("table-1", "1234").await?,
//!         _ => {}
//!     }
//! }
//! ```

pub mod client;
mod dispatch;
pub mod error;
pub mod frame;
pub mod protocol;
pub mod server;

pub use client::{Client, ConnectionState, ServerEvent};
pub use dispatch::ServerStats;
pub use error::{Error, Result};
pub use protocol::Message;
pub use server::{Server, ServerConfig};

/// Default port for lobby servers
pub const DEFAULT_PORT: u16 = 4000;
