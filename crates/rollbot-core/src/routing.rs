use crate::domain::{ChatId, Network, Severity};

/// Static severity → destination chat mapping, fixed at startup.
///
/// Mainnet routes per severity; testnet has a single catch-all chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Routing {
    pub critical: ChatId,
    pub error: ChatId,
    pub warning: ChatId,
    pub info: ChatId,
    pub testnet: ChatId,
}

impl Routing {
    /// Destination for an item, or `None` when the severity has no route.
    pub fn resolve(&self, network: Network, severity: &Severity) -> Option<ChatId> {
        if network == Network::Testnet {
            return Some(self.testnet);
        }
        match severity {
            Severity::Critical => Some(self.critical),
            Severity::Error => Some(self.error),
            Severity::Warning => Some(self.warning),
            Severity::Info => Some(self.info),
            Severity::Debug | Severity::Other(_) => None,
        }
    }

    /// Chat that carries the network's heartbeat message.
    pub fn status_chat(&self, network: Network) -> ChatId {
        match network {
            Network::Mainnet => self.info,
            Network::Testnet => self.testnet,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_routing() -> Routing {
    Routing {
        critical: ChatId(1),
        error: ChatId(2),
        warning: ChatId(3),
        info: ChatId(4),
        testnet: ChatId(5),
    }
}
