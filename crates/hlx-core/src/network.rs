//! Network endpoints and chain ids.

use std::fmt;

/// Which deployment of the remote exchange the client talks to.
///
/// Selects the HTTP base URL, the websocket URL and the chain id used in
/// every typed-data signing domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    /// Local development endpoint.
    Local,
}

impl Network {
    pub fn api_url(&self) -> &'static str {
        match self {
            Self::Mainnet => "https://api.hyperliquid.xyz",
            Self::Testnet => "https://api.hyperliquid-testnet.xyz",
            Self::Local => "http://localhost:3000",
        }
    }

    /// Websocket endpoint: the API host with a ws scheme and `/ws` path.
    pub fn ws_url(&self) -> String {
        let base = self.api_url();
        // "http" -> "ws", "https" -> "wss"
        format!("ws{}/ws", &base[4..])
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Self::Mainnet => 1,
            Self::Testnet => 5,
            Self::Local => 1337,
        }
    }

    pub fn is_mainnet(&self) -> bool {
        matches!(self, Self::Mainnet)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet => write!(f, "testnet"),
            Self::Local => write!(f, "local"),
        }
    }
}
