//! REST gateway transport.
//!
//! Plain JSON for request/response calls; the pairing channel and the event
//! feed are newline-delimited JSON streams on long-lived responses.

use super::{EventStream, PairingStream};
use crate::jid::Jid;
use crate::protocol::{Contact, Group, OutgoingText, SendReceipt, SessionStatus};
use anyhow::{anyhow, Context, Result};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Timeout for ordinary request/response calls. Streams have none.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for a gateway exposing the REST API.
#[derive(Clone)]
pub struct HttpGateway {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl HttpGateway {
    /// Create a new HTTP gateway client.
    pub fn new(base_url: String, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the bearer token from config or environment.
    fn token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var("WHATSAPP_GATEWAY_TOKEN").ok())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);
        let builder = self.client.request(method, url);
        match self.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and fail on transport errors or non-2xx statuses.
    async fn execute(&self, builder: RequestBuilder, what: &str) -> Result<Response> {
        let response = builder.send().await.with_context(|| {
            format!(
                "Failed to reach gateway at {} - is it running?",
                self.base_url
            )
        })?;
        check_status(response, what).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let builder = self.request(Method::GET, path).timeout(REQUEST_TIMEOUT);
        let response = self.execute(builder, what).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse gateway response for {}", what))
    }

    async fn post_empty(&self, path: &str, what: &str) -> Result<()> {
        let builder = self.request(Method::POST, path).timeout(REQUEST_TIMEOUT);
        self.execute(builder, what).await?;
        Ok(())
    }

    pub async fn status(&self) -> Result<SessionStatus> {
        self.get_json("/session", "session status").await
    }

    pub async fn connect(&self) -> Result<()> {
        self.post_empty("/session/connect", "connect").await
    }

    pub async fn pair(&self) -> Result<PairingStream> {
        let builder = self.request(Method::GET, "/session/pair");
        let response = self.execute(builder, "pairing").await?;
        Ok(ndjson(response.bytes_stream()))
    }

    pub async fn send_text(&self, to: &Jid, text: &str) -> Result<SendReceipt> {
        let body = OutgoingText {
            to: to.clone(),
            text: text.to_string(),
        };
        let builder = self
            .request(Method::POST, "/messages")
            .timeout(REQUEST_TIMEOUT)
            .json(&body);
        let response = self.execute(builder, "send").await?;
        response
            .json()
            .await
            .context("Failed to parse gateway response for send")
    }

    pub async fn contacts(&self) -> Result<Vec<Contact>> {
        self.get_json("/contacts", "contacts").await
    }

    pub async fn joined_groups(&self) -> Result<Vec<Group>> {
        self.get_json("/groups", "groups").await
    }

    pub async fn events(&self) -> Result<EventStream> {
        let builder = self.request(Method::GET, "/events");
        let response = self.execute(builder, "events").await?;
        Ok(ndjson(response.bytes_stream()))
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.post_empty("/session/disconnect", "disconnect").await
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GatewayError {
    error: String,
}

async fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<GatewayError>(&body)
        .map(|e| e.error)
        .unwrap_or(body);
    Err(anyhow!(
        "Gateway {} request failed with status {}: {}",
        what,
        status,
        message
    ))
}

/// Decode a byte stream of newline-delimited JSON values.
///
/// Values may be split across chunks; blank lines are skipped and a final
/// value without a trailing newline is still decoded.
fn ndjson<S, B, E, T>(bytes: S) -> BoxStream<'static, Result<T>>
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]>,
    E: Into<anyhow::Error>,
    T: DeserializeOwned + Send + 'static,
{
    let chunks: BoxStream<'static, Result<Vec<u8>>> = bytes
        .map(|chunk| chunk.map(|b| b.as_ref().to_vec()).map_err(Into::into))
        .boxed();

    let state = LineBuffer {
        chunks,
        buffer: Vec::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.take_line() {
                if is_blank(&line) {
                    continue;
                }
                return Some((decode_line(&line), state));
            }

            if state.finished {
                let rest = std::mem::take(&mut state.buffer);
                if is_blank(&rest) {
                    return None;
                }
                return Some((decode_line(&rest), state));
            }

            match state.chunks.next().await {
                Some(Ok(chunk)) => state.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    state.finished = true;
                    state.buffer.clear();
                    return Some((Err(e.context("Gateway stream failed")), state));
                }
                None => state.finished = true,
            }
        }
    })
    .boxed()
}

struct LineBuffer {
    chunks: BoxStream<'static, Result<Vec<u8>>>,
    buffer: Vec<u8>,
    finished: bool,
}

impl LineBuffer {
    fn take_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
        line.pop();
        Some(line)
    }
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

fn decode_line<T: DeserializeOwned>(line: &[u8]) -> Result<T> {
    serde_json::from_slice(line).map_err(|e| {
        anyhow!(
            "Malformed line from gateway ({}): {}",
            e,
            String::from_utf8_lossy(line)
        )
    })
}
