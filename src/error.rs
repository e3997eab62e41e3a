use std::io;
use std::net::SocketAddr;

/// Errors surfaced by the connection, framing and session layers.
///
/// Every variant is fatal to the round in progress. Short or zero header
/// writes are not errors; they are reported through
/// [`HeaderNotice`](crate::HeaderNotice) in the frame report.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The peer address or port failed validation.
    #[error("invalid peer `{0}`: expected an IP literal and a port in 1..=65535")]
    InvalidPeer(String),

    /// Socket creation or the connect handshake failed.
    #[error("could not connect to {peer}: {source}")]
    Connection {
        /// The peer we tried to reach.
        peer: SocketAddr,
        /// Underlying OS error.
        source: io::Error,
    },

    /// The OS refused the requested congestion-control algorithm.
    #[error("congestion control algorithm `{algorithm}` rejected: {source}")]
    CongestionControl {
        /// Algorithm name as given by the operator.
        algorithm: String,
        /// Underlying OS error.
        source: io::Error,
    },

    /// A write failed; `sent` is what reached the socket before the failure.
    #[error("send aborted after {sent} bytes: {source}")]
    Send {
        /// Header and payload bytes written before the failure.
        sent: u64,
        /// Underlying OS error.
        source: io::Error,
    },

    /// The payload length does not fit the 4-byte header.
    #[error("payload of {0} bytes does not fit a 4-byte length header")]
    PayloadTooLarge(usize),

    /// The payload could not be produced.
    #[error("payload unavailable: {0}")]
    Payload(#[source] io::Error),

    /// The repeat prompt could not be read or written.
    #[error("repeat prompt failed: {0}")]
    Prompt(#[source] io::Error),
}

impl Error {
    /// Bytes that reached the socket before this error, if any were written.
    pub fn bytes_sent(&self) -> u64 {
        match self {
            Error::Send { sent, .. } => *sent,
            _ => 0,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
