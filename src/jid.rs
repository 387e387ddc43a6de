//! Platform addresses (JIDs).
//!
//! A JID looks like `491234567890@s.whatsapp.net` for a person or
//! `120363012345678901-1234567890@g.us` for a group. Users type all sorts of
//! shorthand, so [`normalize_recipient`] turns free-form input into a full
//! address before parsing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Server suffix for individual users.
pub const USER_SERVER: &str = "s.whatsapp.net";
/// Server suffix for groups.
pub const GROUP_SERVER: &str = "g.us";

/// Servers that may appear without a user part.
const KNOWN_SERVERS: &[&str] = &[USER_SERVER, GROUP_SERVER, "broadcast", "newsletter", "lid"];

/// Inputs this long (or longer) containing a dash are treated as group IDs.
const GROUP_ID_MIN_LEN: usize = 16;

/// Errors from parsing a JID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JidError {
    #[error("address is empty")]
    Empty,
    #[error("address '{0}' has no server part")]
    MissingServer(String),
    #[error("address '{0}' has no user part")]
    EmptyUser(String),
    #[error("invalid device number in '{0}'")]
    InvalidDevice(String),
    #[error("address '{0}' contains whitespace")]
    Whitespace(String),
}

/// A parsed platform address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
    pub user: String,
    pub device: Option<u16>,
    pub server: String,
}

impl Jid {
    /// Parse `user[:device]@server`.
    pub fn parse(input: &str) -> Result<Self, JidError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(JidError::Empty);
        }
        if input.chars().any(char::is_whitespace) {
            return Err(JidError::Whitespace(input.to_string()));
        }

        let Some((user_part, server)) = input.split_once('@') else {
            if KNOWN_SERVERS.contains(&input) {
                return Ok(Self {
                    user: String::new(),
                    device: None,
                    server: input.to_string(),
                });
            }
            return Err(JidError::MissingServer(input.to_string()));
        };

        if server.is_empty() || server.contains('@') {
            return Err(JidError::MissingServer(input.to_string()));
        }

        let (user, device) = match user_part.split_once(':') {
            Some((user, device)) => {
                let device = device
                    .parse::<u16>()
                    .map_err(|_| JidError::InvalidDevice(input.to_string()))?;
                (user, Some(device))
            }
            None => (user_part, None),
        };

        if user.is_empty() {
            return Err(JidError::EmptyUser(input.to_string()));
        }

        Ok(Self {
            user: user.to_string(),
            device,
            server: server.to_string(),
        })
    }

    /// Whether this address points at a group chat.
    pub fn is_group(&self) -> bool {
        self.server == GROUP_SERVER
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.user.is_empty() {
            return write!(f, "{}", self.server);
        }
        match self.device {
            Some(device) => write!(f, "{}:{}@{}", self.user, device, self.server),
            None => write!(f, "{}@{}", self.user, self.server),
        }
    }
}

impl FromStr for Jid {
    type Err = JidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Jid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Jid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Which normalisation rule produced a recipient address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientKind {
    /// The input already contained a server part.
    Explicit,
    /// Looked like a group ID; `@g.us` was appended.
    Group,
    /// Treated as a phone number; `@s.whatsapp.net` was appended.
    Phone,
}

/// A recipient address in string form, before parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub address: String,
    pub kind: RecipientKind,
}

/// Expand shorthand input into a full address.
pub fn normalize_recipient(input: &str) -> Recipient {
    let input = input.trim();

    if input.contains('@') {
        return Recipient {
            address: input.to_string(),
            kind: RecipientKind::Explicit,
        };
    }

    if input.contains('-') && input.len() >= GROUP_ID_MIN_LEN {
        return Recipient {
            address: format!("{}@{}", input, GROUP_SERVER),
            kind: RecipientKind::Group,
        };
    }

    let number = input.strip_prefix('+').unwrap_or(input);
    Recipient {
        address: format!("{}@{}", number, USER_SERVER),
        kind: RecipientKind::Phone,
    }
}

/// Normalise and parse user input in one step.
pub fn resolve_recipient(input: &str) -> Result<Jid, JidError> {
    Jid::parse(&normalize_recipient(input).address)
}
