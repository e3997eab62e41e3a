//! # cc-send - Congestion-Controlled Frame Sender
//!
//! cc-send pushes a single payload to a receiver over one TCP connection
//! after selecting the connection's TCP congestion-control algorithm. It is
//! meant for comparing algorithms such as `cubic`, `reno` or `bbr` against
//! the same bulk transfer.
//!
//! ## Wire Format
//!
//! Every round sends exactly one frame:
//!
//! - **Header**: the payload length as a 4-byte unsigned integer, in host
//!   byte order unless another [`ByteOrder`] is selected
//! - **Payload**: the raw bytes, handed to the socket in writes of at most
//!   [`MAX_CHUNK_SIZE`] bytes, with no per-chunk framing
//!
//! The receiver reads the header and then keeps reading until it has the
//! announced number of bytes.
//!
//! ## How It Works
//!
//! A [`Session`] repeats rounds until its [`RepeatDecision`] says stop:
//!
//! 1. take the round payload from a [`PayloadSource`]
//! 2. connect to the peer and apply the congestion-control algorithm; a
//!    connection is only writable once the algorithm has been accepted
//! 3. send the frame with a [`FramedTransmitter`], resuming short writes
//! 4. close the connection and report the round
//!
//! Any failure ends the session. There is no retry and no reconnect.
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use cc_send::{FixedRounds, RandomPayload, Session, SessionConfig};
//!
//! let config = SessionConfig::new("127.0.0.1", 5060, "cubic")?;
//! let mut session = Session::new(config, RandomPayload::new(2_200_000), FixedRounds::new(1));
//! let totals = session.run(|round| {
//!     println!("Total Bytes sent: {}", round.total_bytes());
//! })?;
//! println!("{} rounds, {} bytes", totals.rounds, totals.bytes_sent);
//! # Ok::<(), cc_send::Error>(())
//! ```
//!
//! ## Platform Support
//!
//! Selecting the congestion-control algorithm relies on `TCP_CONGESTION`,
//! available on Linux and FreeBSD. Elsewhere every round fails with
//! [`Error::CongestionControl`]. Unprivileged processes on Linux may only
//! pick algorithms listed in `net.ipv4.tcp_allowed_congestion_control`.

#![warn(missing_docs)]

mod config;
mod connection;
mod error;
mod frame;
mod payload;
mod receiver;
mod session;

pub use config::*;
pub use connection::*;
pub use error::*;
pub use frame::*;
pub use payload::*;
pub use receiver::*;
pub use session::*;
