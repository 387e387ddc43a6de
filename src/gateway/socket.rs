//! Unix socket transport for communicating with the gateway.
//!
//! Every call opens its own connection. Request/response calls read a single
//! [`Reply`]. Streaming calls (`pair`, `subscribe`) read an acknowledging
//! reply and then one frame per item until the gateway closes the socket.

use super::{EventStream, PairingStream};
use crate::jid::Jid;
use crate::protocol::{
    framing, Contact, Group, OutgoingText, Reply, Request, SendReceipt, SessionStatus,
};
use anyhow::{anyhow, Context, Result};
use futures::stream::{self, BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::UnixStream;
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REPLY_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for a gateway listening on a Unix domain socket.
#[derive(Clone)]
pub struct SocketGateway {
    path: PathBuf,
}

impl SocketGateway {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Connect with timeout.
    async fn open(&self) -> Result<UnixStream> {
        tokio::time::timeout(CONNECT_TIMEOUT, UnixStream::connect(&self.path))
            .await
            .map_err(|_| anyhow!("Connection timeout - is the gateway running?"))?
            .with_context(|| {
                format!(
                    "Failed to connect to gateway at {}. Is the gateway running?",
                    self.path.display()
                )
            })
    }

    /// Send a request and wait for its reply.
    async fn call<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        debug!("gateway call: {:?}", request);
        let mut stream = self.open().await?;
        framing::write_message(&mut stream, &request).await?;

        let reply: Reply = tokio::time::timeout(REPLY_TIMEOUT, framing::read_message(&mut stream))
            .await
            .map_err(|_| anyhow!("Request timeout - gateway took too long"))??;

        reply.into_result()
    }

    /// Send a streaming request and yield frames until the gateway hangs up.
    async fn subscribe<T>(&self, request: Request) -> Result<BoxStream<'static, Result<T>>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        debug!("gateway stream: {:?}", request);
        let mut stream = self.open().await?;
        framing::write_message(&mut stream, &request).await?;

        let ack: Reply = tokio::time::timeout(REPLY_TIMEOUT, framing::read_message(&mut stream))
            .await
            .map_err(|_| anyhow!("Request timeout - gateway took too long"))??;
        ack.into_result::<()>()?;

        Ok(stream::unfold(Some(stream), |state| async move {
            let mut stream = state?;
            match framing::read_optional_message::<_, T>(&mut stream).await {
                Ok(Some(item)) => Some((Ok(item), Some(stream))),
                Ok(None) => None,
                Err(e) => Some((Err(e.context("Gateway stream failed")), None)),
            }
        })
        .boxed())
    }

    pub async fn status(&self) -> Result<SessionStatus> {
        self.call(Request::Status).await
    }

    pub async fn connect(&self) -> Result<()> {
        self.call(Request::Connect).await
    }

    pub async fn pair(&self) -> Result<PairingStream> {
        self.subscribe(Request::Pair).await
    }

    pub async fn send_text(&self, to: &Jid, text: &str) -> Result<SendReceipt> {
        self.call(Request::Send(OutgoingText {
            to: to.clone(),
            text: text.to_string(),
        }))
        .await
    }

    pub async fn contacts(&self) -> Result<Vec<Contact>> {
        self.call(Request::Contacts).await
    }

    pub async fn joined_groups(&self) -> Result<Vec<Group>> {
        self.call(Request::Groups).await
    }

    pub async fn events(&self) -> Result<EventStream> {
        self.subscribe(Request::Subscribe).await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.call(Request::Disconnect).await
    }
}
