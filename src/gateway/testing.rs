//! In-memory messenger for exercising the session flow and the shell.

use super::{EventStream, Messenger, PairingStream};
use crate::jid::Jid;
use crate::protocol::{Contact, Event, Group, PairingEvent, SendReceipt, SessionStatus};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeMessenger {
    pub status: Mutex<SessionStatus>,
    /// Whether `connect` brings the session online.
    pub connects: bool,
    pub pairing: Vec<PairingEvent>,
    /// Keep the pairing stream open after the scripted events.
    pub pairing_stays_open: bool,
    pub contacts: Vec<Contact>,
    pub groups: Vec<Group>,
    pub events: Vec<Event>,
    pub send_error: Option<String>,
    pub disconnect_error: Option<String>,
    /// `disconnect` never resolves.
    pub disconnect_hangs: bool,
    pub sent: Mutex<Vec<(Jid, String)>>,
    pub calls: Mutex<Vec<&'static str>>,
}

impl FakeMessenger {
    /// A device that is already linked and connects on request.
    pub fn linked() -> Self {
        Self {
            status: Mutex::new(SessionStatus {
                logged_in: true,
                connected: false,
                jid: Some("4900:1@s.whatsapp.net".to_string()),
            }),
            connects: true,
            ..Default::default()
        }
    }

    /// A fresh install that still needs QR pairing.
    pub fn unlinked() -> Self {
        Self {
            connects: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<(Jid, String)> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn contact(user: &str, push_name: Option<&str>, business_name: Option<&str>) -> Contact {
    Contact {
        jid: Jid::parse(&format!("{}@s.whatsapp.net", user)).unwrap(),
        push_name: push_name.map(String::from),
        business_name: business_name.map(String::from),
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn endpoint(&self) -> String {
        "memory".to_string()
    }

    async fn status(&self) -> Result<SessionStatus> {
        self.record("status");
        Ok(self.status.lock().unwrap().clone())
    }

    async fn connect(&self) -> Result<()> {
        self.record("connect");
        if self.connects {
            self.status.lock().unwrap().connected = true;
        }
        Ok(())
    }

    async fn pair(&self) -> Result<PairingStream> {
        self.record("pair");
        if self.pairing.contains(&PairingEvent::Success) {
            self.status.lock().unwrap().logged_in = true;
        }
        let scripted = stream::iter(self.pairing.clone().into_iter().map(Ok));
        if self.pairing_stays_open {
            Ok(scripted.chain(stream::pending()).boxed())
        } else {
            Ok(scripted.boxed())
        }
    }

    async fn send_text(&self, to: &Jid, text: &str) -> Result<SendReceipt> {
        self.record("send");
        if let Some(error) = &self.send_error {
            return Err(anyhow!("{}", error));
        }
        self.sent.lock().unwrap().push((to.clone(), text.to_string()));
        Ok(SendReceipt {
            id: "FAKE1".to_string(),
            timestamp: 0,
        })
    }

    async fn contacts(&self) -> Result<Vec<Contact>> {
        self.record("contacts");
        Ok(self.contacts.clone())
    }

    async fn joined_groups(&self) -> Result<Vec<Group>> {
        self.record("groups");
        Ok(self.groups.clone())
    }

    async fn events(&self) -> Result<EventStream> {
        self.record("events");
        Ok(stream::iter(self.events.clone().into_iter().map(Ok)).boxed())
    }

    async fn disconnect(&self) -> Result<()> {
        self.record("disconnect");
        if self.disconnect_hangs {
            std::future::pending::<()>().await;
        }
        if let Some(error) = &self.disconnect_error {
            return Err(anyhow!("{}", error));
        }
        self.status.lock().unwrap().connected = false;
        Ok(())
    }
}
