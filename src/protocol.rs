//! Gateway protocol definitions.
//!
//! The data model is shared by both transports. The HTTP gateway speaks it as
//! plain JSON bodies (and NDJSON for streams); the socket gateway wraps it in
//! length-prefixed JSON frames.

use crate::jid::Jid;
use anyhow::{anyhow, Result};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Login and connection state of the gateway's session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    /// A device is linked (a session store entry exists).
    #[serde(default)]
    pub logged_in: bool,
    /// The gateway currently holds a live connection.
    #[serde(default)]
    pub connected: bool,
    /// Our own address, once linked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jid: Option<String>,
}

/// A contact from the session's contact store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub jid: Jid,
    /// Name the contact set for themselves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_name: Option<String>,
    /// Verified business name, for business accounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
}

/// A group the account has joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub jid: Jid,
    #[serde(default)]
    pub name: String,
    /// Group description.
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub participants: Vec<Jid>,
}

/// A text message to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingText {
    pub to: Jid,
    pub text: String,
}

/// Acknowledgement returned once the gateway has sent a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub id: String,
    /// Server timestamp (unix seconds).
    #[serde(default)]
    pub timestamp: i64,
}

/// An item from the QR pairing channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPairingEvent", into = "RawPairingEvent")]
pub enum PairingEvent {
    /// A new QR code to display. Codes rotate until one is scanned.
    Code(String),
    Success,
    Timeout,
    Error(String),
    /// Any other event name the gateway reports.
    Other(String),
}

impl PairingEvent {
    /// The event name as the gateway spells it.
    pub fn name(&self) -> &str {
        match self {
            PairingEvent::Code(_) => "code",
            PairingEvent::Success => "success",
            PairingEvent::Timeout => "timeout",
            PairingEvent::Error(_) => "error",
            PairingEvent::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawPairingEvent {
    event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl From<RawPairingEvent> for PairingEvent {
    fn from(raw: RawPairingEvent) -> Self {
        match raw.event.as_str() {
            "code" => match raw.code {
                Some(code) => PairingEvent::Code(code),
                None => PairingEvent::Error("code event without a code".to_string()),
            },
            "success" => PairingEvent::Success,
            "timeout" => PairingEvent::Timeout,
            "error" => PairingEvent::Error(raw.message.unwrap_or_default()),
            _ => PairingEvent::Other(raw.event),
        }
    }
}

impl From<PairingEvent> for RawPairingEvent {
    fn from(event: PairingEvent) -> Self {
        let name = event.name().to_string();
        let (code, message) = match event {
            PairingEvent::Code(code) => (Some(code), None),
            PairingEvent::Error(message) => (None, Some(message)),
            _ => (None, None),
        };
        RawPairingEvent {
            event: name,
            code,
            message,
        }
    }
}

/// Kinds of delivery receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptKind {
    Delivered,
    Read,
    /// Read on another of our own devices.
    ReadSelf,
    Played,
    #[serde(other)]
    Other,
}

/// Something that happened on the account while we are connected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An incoming message. `text` is empty for non-text payloads.
    Message {
        sender: String,
        #[serde(default, deserialize_with = "null_as_empty")]
        text: String,
    },
    Receipt { kind: ReceiptKind, source: String },
    #[serde(other)]
    Unknown,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Request sent to the socket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Status,
    Connect,
    /// Start QR pairing; the gateway streams `PairingEvent` frames.
    Pair,
    Send(OutgoingText),
    Contacts,
    Groups,
    /// Stream `Event` frames until the connection closes.
    Subscribe,
    Disconnect,
}

/// Reply from the socket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    /// The call's payload, if successful.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error message, if the call failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reply {
    /// Create a successful reply.
    #[cfg(test)]
    pub fn success(result: impl Serialize) -> Self {
        Self {
            result: serde_json::to_value(result).ok(),
            error: None,
        }
    }

    /// Create an error reply.
    #[cfg(test)]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(message.into()),
        }
    }

    /// Turn the reply into the expected payload type.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T> {
        if let Some(error) = self.error {
            return Err(anyhow!("{}", error));
        }
        let value = self.result.unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| anyhow!("Unexpected reply from gateway: {}", e))
    }
}

/// Framing for messages: length-prefixed JSON.
/// Format: 4 bytes (big-endian u32) length + JSON payload
pub mod framing {
    use anyhow::{anyhow, Result};
    use std::io::ErrorKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Upper bound for a single frame.
    pub const MAX_FRAME_LEN: usize = 1_000_000;

    /// Write a length-prefixed message.
    pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<()>
    where
        W: AsyncWriteExt + Unpin,
        T: serde::Serialize,
    {
        let json = serde_json::to_vec(message)?;
        if json.len() > MAX_FRAME_LEN {
            return Err(anyhow!("Message too large: {} bytes", json.len()));
        }
        let len = json.len() as u32;
        writer.write_all(&len.to_be_bytes()).await?;
        writer.write_all(&json).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read a length-prefixed message.
    pub async fn read_message<R, T>(reader: &mut R) -> Result<T>
    where
        R: AsyncReadExt + Unpin,
        T: serde::de::DeserializeOwned,
    {
        read_optional_message(reader)
            .await?
            .ok_or_else(|| anyhow!("Connection closed by gateway"))
    }

    /// Read a length-prefixed message, returning `None` if the peer closed
    /// the connection before a new frame started.
    pub async fn read_optional_message<R, T>(reader: &mut R) -> Result<Option<T>>
    where
        R: AsyncReadExt + Unpin,
        T: serde::de::DeserializeOwned,
    {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_be_bytes(len_buf) as usize;

        if len > MAX_FRAME_LEN {
            return Err(anyhow!("Message too large: {} bytes", len));
        }

        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).await?;
        let message = serde_json::from_slice(&buf)?;
        Ok(Some(message))
    }
}
