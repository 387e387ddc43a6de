//! Bringing the messaging session online.
//!
//! A fresh install has to link the device by scanning a QR code; after that
//! the gateway only needs to be told to connect. Either way we wait until it
//! reports a live connection before running commands.

use crate::gateway::Messenger;
use crate::protocol::{PairingEvent, SessionStatus};
use crate::qr;
use anyhow::{Context, Result};
use futures::StreamExt;
use std::io::Write;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How the console was started. Controls chattiness and whether pairing is
/// allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The REPL.
    Interactive,
    /// A one-shot command that may pair first (`list`).
    OneShot,
    /// One-shot `send`; refuses to pair.
    OneShotSend,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("first login required - run `whatsapp-console` without arguments to scan the QR code")]
    LoginRequired,
    #[error("timed out after {}s waiting for the connection", .0.as_secs())]
    ConnectTimeout(Duration),
    #[error("pairing failed: {0}")]
    PairingFailed(String),
    #[error("the QR code expired before it was scanned")]
    PairingTimedOut,
    #[error("pairing ended before the device was linked")]
    PairingIncomplete,
}

/// Make sure the session is linked and connected.
pub async fn ensure_session<M, W>(
    messenger: &M,
    mode: Mode,
    timeout: Duration,
    out: &mut W,
) -> Result<SessionStatus>
where
    M: Messenger + ?Sized,
    W: Write + Send,
{
    let status = messenger
        .status()
        .await
        .context("Failed to query session status")?;
    debug!("session status: {:?}", status);

    if !status.logged_in {
        if mode == Mode::OneShotSend {
            return Err(SessionError::LoginRequired.into());
        }
        writeln!(out, "First login required!")?;
        pair(messenger, out).await?;
    } else if !status.connected {
        if mode == Mode::Interactive {
            writeln!(out, "Connecting to WhatsApp...")?;
        }
        messenger.connect().await.context("Failed to connect")?;
    }

    if mode == Mode::Interactive {
        writeln!(out, "Waiting for connection...")?;
    }
    let status = wait_for_connection(messenger, timeout).await?;
    if mode == Mode::Interactive {
        writeln!(out, "Connected to WhatsApp.")?;
    }
    Ok(status)
}

/// Run QR pairing until the device is linked.
async fn pair<M, W>(messenger: &M, out: &mut W) -> Result<()>
where
    M: Messenger + ?Sized,
    W: Write + Send,
{
    // Open the QR channel before connecting so the first code is not missed.
    let mut events = messenger.pair().await.context("Failed to start pairing")?;
    messenger.connect().await.context("Failed to connect")?;

    writeln!(out, "Scan the QR code with WhatsApp (Settings > Linked devices):\n")?;
    out.flush()?;

    let mut linked = false;
    while let Some(event) = events.next().await {
        match event? {
            PairingEvent::Code(code) => {
                match qr::render(&code) {
                    Ok(art) => writeln!(out, "{}", art)?,
                    Err(e) => warn!("{:#}", e),
                }
                writeln!(out, "QR code text: {}\n", code)?;
            }
            PairingEvent::Timeout => return Err(SessionError::PairingTimedOut.into()),
            PairingEvent::Error(message) => {
                return Err(SessionError::PairingFailed(message).into())
            }
            PairingEvent::Success => {
                writeln!(out, "QR event: {}", PairingEvent::Success.name())?;
                out.flush()?;
                linked = true;
                break;
            }
            other => writeln!(out, "QR event: {}", other.name())?,
        }
        out.flush()?;
    }

    if linked {
        Ok(())
    } else {
        Err(SessionError::PairingIncomplete.into())
    }
}

/// Poll the gateway until it reports a live connection.
pub async fn wait_for_connection<M>(messenger: &M, timeout: Duration) -> Result<SessionStatus>
where
    M: Messenger + ?Sized,
{
    // A timeout too large to represent means no deadline.
    let deadline = Instant::now().checked_add(timeout);
    loop {
        let status = messenger
            .status()
            .await
            .context("Failed to query session status")?;
        if status.connected {
            return Ok(status);
        }

        let pause = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(SessionError::ConnectTimeout(timeout).into());
                }
                POLL_INTERVAL.min(deadline - now)
            }
            None => POLL_INTERVAL,
        };
        tokio::time::sleep(pause).await;
    }
}

/// Disconnect, giving the gateway a few seconds to finish.
pub async fn shutdown<M, W>(messenger: &M, out: &mut W) -> Result<()>
where
    M: Messenger + ?Sized,
    W: Write + Send,
{
    match tokio::time::timeout(DISCONNECT_TIMEOUT, messenger.disconnect()).await {
        Ok(Ok(())) => writeln!(out, "Disconnected cleanly.")?,
        Ok(Err(e)) => {
            warn!("disconnect failed: {:#}", e);
            writeln!(out, "Disconnect failed: {:#}", e)?;
        }
        Err(_) => writeln!(out, "Timed out while disconnecting.")?,
    }
    Ok(())
}
