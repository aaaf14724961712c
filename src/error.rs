//! Error types for relaychain

use thiserror::Error;

/// Main error type for relaychain
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The route has no nodes to traverse.
    #[error("empty route")]
    EmptyRoute,

    #[error("unsupported network {0}")]
    UnsupportedNetwork(String),

    #[error("addr not found for interface {0}")]
    InterfaceAddrNotFound(String),

    #[error("resolver: {0}")]
    Resolve(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Operation on a listener that has been closed.
    #[error("listener closed")]
    ListenerClosed,

    #[error("Timeout")]
    Timeout,

    #[error("Unsupported feature: {0}")]
    Unsupported(String),
}

impl Error {
    /// True for errors reporting a closed listener.
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::ListenerClosed)
    }
}

/// Result type alias for relaychain
pub type Result<T> = std::result::Result<T, Error>;
