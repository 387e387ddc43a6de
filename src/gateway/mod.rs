//! Gateway client implementations.
//!
//! The messaging session itself (pairing, encryption, multi-device sync)
//! lives in a gateway process. This module provides a unified interface for
//! reaching it over HTTP or a Unix domain socket.

pub mod http;
pub mod socket;

#[cfg(test)]
pub mod testing;

use crate::config::{Config, GatewayConfig};
use crate::jid::Jid;
use crate::protocol::{Contact, Event, Group, PairingEvent, SendReceipt, SessionStatus};
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Stream of QR pairing events. Ends when pairing concludes.
pub type PairingStream = BoxStream<'static, Result<PairingEvent>>;

/// Stream of account events while connected.
pub type EventStream = BoxStream<'static, Result<Event>>;

/// Operations the console needs from the messaging session.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Short transport name for diagnostics.
    fn name(&self) -> &'static str;

    /// Where the gateway is reached (URL or socket path).
    fn endpoint(&self) -> String;

    /// Current login/connection state.
    async fn status(&self) -> Result<SessionStatus>;

    /// Ask the gateway to connect to the platform.
    async fn connect(&self) -> Result<()>;

    /// Start device pairing and stream the QR channel.
    async fn pair(&self) -> Result<PairingStream>;

    /// Send a plain text message.
    async fn send_text(&self, to: &Jid, text: &str) -> Result<SendReceipt>;

    /// All contacts in the session's store.
    async fn contacts(&self) -> Result<Vec<Contact>>;

    /// Groups the account has joined.
    async fn joined_groups(&self) -> Result<Vec<Group>>;

    /// Subscribe to incoming messages and receipts.
    async fn events(&self) -> Result<EventStream>;

    /// Drop the platform connection.
    async fn disconnect(&self) -> Result<()>;
}

/// Enum-based backend over the available transports.
#[derive(Clone)]
pub enum Backend {
    Http(http::HttpGateway),
    Socket(socket::SocketGateway),
}

#[async_trait]
impl Messenger for Backend {
    fn name(&self) -> &'static str {
        match self {
            Backend::Http(_) => "http",
            Backend::Socket(_) => "socket",
        }
    }

    fn endpoint(&self) -> String {
        match self {
            Backend::Http(g) => g.base_url().to_string(),
            Backend::Socket(g) => g.path().display().to_string(),
        }
    }

    async fn status(&self) -> Result<SessionStatus> {
        match self {
            Backend::Http(g) => g.status().await,
            Backend::Socket(g) => g.status().await,
        }
    }

    async fn connect(&self) -> Result<()> {
        match self {
            Backend::Http(g) => g.connect().await,
            Backend::Socket(g) => g.connect().await,
        }
    }

    async fn pair(&self) -> Result<PairingStream> {
        match self {
            Backend::Http(g) => g.pair().await,
            Backend::Socket(g) => g.pair().await,
        }
    }

    async fn send_text(&self, to: &Jid, text: &str) -> Result<SendReceipt> {
        match self {
            Backend::Http(g) => g.send_text(to, text).await,
            Backend::Socket(g) => g.send_text(to, text).await,
        }
    }

    async fn contacts(&self) -> Result<Vec<Contact>> {
        match self {
            Backend::Http(g) => g.contacts().await,
            Backend::Socket(g) => g.contacts().await,
        }
    }

    async fn joined_groups(&self) -> Result<Vec<Group>> {
        match self {
            Backend::Http(g) => g.joined_groups().await,
            Backend::Socket(g) => g.joined_groups().await,
        }
    }

    async fn events(&self) -> Result<EventStream> {
        match self {
            Backend::Http(g) => g.events().await,
            Backend::Socket(g) => g.events().await,
        }
    }

    async fn disconnect(&self) -> Result<()> {
        match self {
            Backend::Http(g) => g.disconnect().await,
            Backend::Socket(g) => g.disconnect().await,
        }
    }
}

/// Create a backend from configuration.
pub fn create_backend(config: &GatewayConfig) -> Result<Backend> {
    match config {
        GatewayConfig::Http { url, token } => Ok(Backend::Http(http::HttpGateway::new(
            url.clone(),
            token.clone(),
        )?)),
        GatewayConfig::Socket { path } => {
            let path = match path {
                Some(path) => path.clone(),
                None => Config::default_socket_path()?,
            };
            Ok(Backend::Socket(socket::SocketGateway::new(path)))
        }
    }
}
