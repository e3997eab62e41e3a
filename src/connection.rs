use std::io::{Result as IoResult, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

#[cfg(any(target_os = "linux", target_os = "freebsd"))]
use socket2::SockRef;

use crate::error::{Error, Result};

/// A connected TCP stream whose congestion control has not been set yet.
///
/// It cannot be written to. Call
/// [`apply_congestion_control`](UntunedConnection::apply_congestion_control)
/// to obtain a writable [`Connection`]; dropping it closes the socket.
#[derive(Debug)]
pub struct UntunedConnection {
    stream: TcpStream,
    peer: SocketAddr,
}

/// A connected TCP stream with its congestion-control algorithm applied.
///
/// The connection is the sole owner of the socket. Writes go straight to the
/// underlying stream, so a short write is visible to the caller.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    algorithm: String,
}

impl UntunedConnection {
    /// Opens a blocking TCP connection to `peer`.
    ///
    /// Without a `connect_timeout` the handshake blocks until the OS gives up.
    /// A `write_timeout`, when given, bounds every later write on the stream.
    pub fn open(
        peer: SocketAddr,
        connect_timeout: Option<Duration>,
        write_timeout: Option<Duration>,
    ) -> Result<UntunedConnection> {
        log::debug!("Connecting to {peer}");
        let connected = match connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&peer, timeout),
            None => TcpStream::connect(peer),
        };
        let stream = connected.map_err(|source| Error::Connection { peer, source })?;
        stream
            .set_write_timeout(write_timeout)
            .map_err(|source| Error::Connection { peer, source })?;
        log::info!("Connected to {peer}");
        Ok(UntunedConnection { stream, peer })
    }

    /// The peer this connection was opened to.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Selects the TCP congestion-control algorithm for the lifetime of the connection.
    ///
    /// On failure the socket is closed without a single byte written.
    pub fn apply_congestion_control(self, algorithm: &str) -> Result<Connection> {
        if let Err(source) = set_congestion(&self.stream, algorithm) {
            log::error!("Error setting congestion control algorithm {algorithm}: {source}");
            return Err(Error::CongestionControl { algorithm: algorithm.to_owned(), source });
        }
        let conn = Connection {
            stream: self.stream,
            peer: self.peer,
            algorithm: algorithm.to_owned(),
        };
        match conn.congestion_control() {
            Ok(applied) => log::info!("CC Algorithm set to: {applied}"),
            Err(e) => log::debug!("Could not read back congestion control: {e}"),
        }
        Ok(conn)
    }
}

impl Connection {
    /// Opens a connection and applies `algorithm` before handing it out.
    pub fn establish(
        peer: SocketAddr,
        algorithm: &str,
        connect_timeout: Option<Duration>,
        write_timeout: Option<Duration>,
    ) -> Result<Connection> {
        UntunedConnection::open(peer, connect_timeout, write_timeout)?
            .apply_congestion_control(algorithm)
    }

    /// The peer this connection is bound to.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// The algorithm requested for this connection.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Reads the congestion-control algorithm currently in effect on the socket.
    pub fn congestion_control(&self) -> IoResult<String> {
        get_congestion(&self.stream)
    }

    /// Shuts the connection down and releases the socket.
    pub fn close(self) -> IoResult<()> {
        log::debug!("Closing connection to {}", self.peer);
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != std::io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> IoResult<()> {
        self.stream.flush()
    }
}

#[cfg(any(target_os = "linux", target_os = "freebsd"))]
fn set_congestion(stream: &TcpStream, algorithm: &str) -> IoResult<()> {
    SockRef::from(stream).set_tcp_congestion(algorithm.as_bytes())
}

#[cfg(any(target_os = "linux", target_os = "freebsd"))]
fn get_congestion(stream: &TcpStream) -> IoResult<String> {
    let name = SockRef::from(stream).tcp_congestion()?;
    let name = name.split(|&b| b == 0).next().unwrap_or_default();
    Ok(String::from_utf8_lossy(name).into_owned())
}

#[cfg(not(any(target_os = "linux", target_os = "freebsd")))]
fn set_congestion(_stream: &TcpStream, _algorithm: &str) -> IoResult<()> {
    Err(unsupported())
}

#[cfg(not(any(target_os = "linux", target_os = "freebsd")))]
fn get_congestion(_stream: &TcpStream) -> IoResult<String> {
    Err(unsupported())
}

#[cfg(not(any(target_os = "linux", target_os = "freebsd")))]
fn unsupported() -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "TCP_CONGESTION is not available on this platform",
    )
}
