use std::{fmt, str::FromStr};

use crate::{errors::Error, Result};

/// Telegram chat id (numeric). Every routing destination is a chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Backend-issued item id. Unique and increasing, not contiguous.
pub type ItemId = u64;

/// One of the two independently monitored environments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub const ALL: [Network; 2] = [Network::Mainnet, Network::Testnet];

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }

    /// Capitalized name for user-facing text.
    pub fn title(self) -> &'static str {
        match self {
            Network::Mainnet => "Mainnet",
            Network::Testnet => "Testnet",
        }
    }

    /// Suffix used by the per-network data files (`""` for mainnet).
    pub fn file_suffix(self) -> &'static str {
        match self {
            Network::Mainnet => "",
            Network::Testnet => "_testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which networks get a background scan loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkSelection {
    Mainnet,
    Testnet,
    Both,
}

impl NetworkSelection {
    pub fn networks(self) -> Vec<Network> {
        match self {
            NetworkSelection::Mainnet => vec![Network::Mainnet],
            NetworkSelection::Testnet => vec![Network::Testnet],
            NetworkSelection::Both => Network::ALL.to_vec(),
        }
    }
}

impl FromStr for NetworkSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            "both" => Ok(Self::Both),
            other => Err(Error::Config(format!(
                "unknown network: {other}. Please use 'testnet', 'mainnet', or 'both'"
            ))),
        }
    }
}

/// Item severity as reported by the backend's `level` field.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Info,
    Debug,
    /// Any level outside the known set, lowercased.
    Other(String),
}

impl Severity {
    pub fn parse(level: &str) -> Self {
        let level = level.trim().to_lowercase();
        match level.as_str() {
            "critical" => Self::Critical,
            "error" => Self::Error,
            "warning" => Self::Warning,
            "info" => Self::Info,
            "debug" => Self::Debug,
            _ => Self::Other(level),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reported error event, as fetched from the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub uuid: String,
    pub severity: Severity,
    /// Backend-assigned environment tag (unrelated to [`Network`]).
    pub environment: String,
    /// Event time, unix seconds.
    pub timestamp: i64,
    pub message: String,
}
