use std::ffi::OsString;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::{Error, Result};
use crate::frame::{ByteOrder, MAX_CHUNK_SIZE};
use crate::payload::{DEFAULT_PAYLOAD_SIZE, FilePayload, PayloadSource, RandomPayload};

/// Streams a length-prefixed payload to a peer over one TCP connection
/// with a chosen congestion-control algorithm.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Receiver IP address (IPv4 or IPv6 literal). `-ip` is accepted too.
    #[arg(long)]
    pub ip: IpAddr,
    /// Receiver port.
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,
    /// TCP congestion-control algorithm, e.g. cubic or reno. `-algo` is accepted too.
    #[arg(long)]
    pub algo: String,
    /// Size of the random payload in bytes.
    #[arg(long, default_value_t = DEFAULT_PAYLOAD_SIZE)]
    pub size: usize,
    /// Send this file instead of a random payload.
    #[arg(long, conflicts_with = "mirror")]
    pub file: Option<PathBuf>,
    /// Also write each random payload to this file.
    #[arg(long)]
    pub mirror: Option<PathBuf>,
    /// Largest number of bytes handed to one write call.
    #[arg(long, default_value_t = NonZeroUsize::new(MAX_CHUNK_SIZE).unwrap_or(NonZeroUsize::MIN))]
    pub chunk_size: NonZeroUsize,
    /// Byte order of the 4-byte length header.
    #[arg(long, value_enum, default_value_t = ByteOrder::Native)]
    pub byte_order: ByteOrder,
    /// Run this many rounds without prompting.
    #[arg(long)]
    pub rounds: Option<NonZeroUsize>,
    /// Give up connecting after this many milliseconds.
    #[arg(long)]
    pub connect_timeout_ms: Option<u64>,
    /// Fail a write that blocks longer than this many milliseconds.
    #[arg(long)]
    pub write_timeout_ms: Option<u64>,
}

impl Args {
    /// Parses the process arguments, accepting the single-dash `-ip` and `-algo` spellings.
    pub fn parse_legacy() -> Self {
        Args::parse_from(normalize_legacy_flags(std::env::args_os()))
    }

    /// Like [`parse_legacy`](Self::parse_legacy) over an explicit argument list.
    pub fn try_parse_legacy<I, T>(args: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Args::try_parse_from(normalize_legacy_flags(args))
    }

    /// The validated session settings.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            peer: SocketAddr::new(self.ip, self.port),
            algorithm: self.algo.clone(),
            chunk_size: self.chunk_size.get(),
            byte_order: self.byte_order,
            connect_timeout: self.connect_timeout_ms.map(Duration::from_millis),
            write_timeout: self.write_timeout_ms.map(Duration::from_millis),
        }
    }

    /// The payload source selected on the command line.
    pub fn payload_source(&self) -> Box<dyn PayloadSource> {
        match (&self.file, &self.mirror) {
            (Some(path), _) => Box::new(FilePayload::new(path)),
            (None, Some(mirror)) => Box::new(RandomPayload::new(self.size).with_mirror(mirror)),
            (None, None) => Box::new(RandomPayload::new(self.size)),
        }
    }
}

/// Rewrites `-ip` and `-algo` to their double-dash forms so clap can parse them.
pub fn normalize_legacy_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| match arg.to_str() {
            Some("-ip") => OsString::from("--ip"),
            Some("-algo") => OsString::from("--algo"),
            _ => arg,
        })
        .collect()
}

/// Everything a [`Session`](crate::Session) needs to reach and tune the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Receiver address.
    pub peer: SocketAddr,
    /// Congestion-control algorithm applied to every connection.
    pub algorithm: String,
    /// Largest slice handed to one write call.
    pub chunk_size: usize,
    /// Header byte order.
    pub byte_order: ByteOrder,
    /// Bound on the connect handshake. `None` blocks until the OS gives up.
    pub connect_timeout: Option<Duration>,
    /// Bound on each write. `None` blocks indefinitely.
    pub write_timeout: Option<Duration>,
}

impl SessionConfig {
    /// Settings for `ip:port` with the default chunk size, native byte order and no timeouts.
    pub fn new(ip: &str, port: u16, algorithm: impl Into<String>) -> Result<Self> {
        Ok(SessionConfig {
            peer: parse_peer(ip, port)?,
            algorithm: algorithm.into(),
            chunk_size: MAX_CHUNK_SIZE,
            byte_order: ByteOrder::default(),
            connect_timeout: None,
            write_timeout: None,
        })
    }
}

/// Validates an IP literal and a non-zero port.
pub fn parse_peer(ip: &str, port: u16) -> Result<SocketAddr> {
    let addr: IpAddr = ip.parse().map_err(|_| Error::InvalidPeer(format!("{ip}:{port}")))?;
    if port == 0 {
        return Err(Error::InvalidPeer(format!("{ip}:{port}")));
    }
    Ok(SocketAddr::new(addr, port))
}
