use std::io::{Error as IoError, ErrorKind, Read, Result as IoResult};

use crate::frame::{ByteOrder, FrameHeader, HEADER_LEN};

/// Largest payload [`FrameReceiver::receive`] buffers unless told otherwise.
pub const DEFAULT_MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Reads frames written by [`FramedTransmitter`](crate::FramedTransmitter).
///
/// Chunk boundaries are not visible on the wire; the receiver reads the
/// header and then keeps reading until it has the announced length.
#[derive(Debug, Clone, Copy)]
pub struct FrameReceiver {
    byte_order: ByteOrder,
    max_len: u32,
}

impl Default for FrameReceiver {
    fn default() -> Self {
        FrameReceiver::new(ByteOrder::default())
    }
}

impl FrameReceiver {
    /// A receiver expecting headers in `byte_order`, buffering at most
    /// [`DEFAULT_MAX_FRAME_LEN`] bytes per frame.
    pub fn new(byte_order: ByteOrder) -> Self {
        FrameReceiver { byte_order, max_len: DEFAULT_MAX_FRAME_LEN }
    }

    /// Changes the largest payload [`receive`](Self::receive) will allocate for.
    pub fn with_max_len(mut self, max_len: u32) -> Self {
        self.max_len = max_len;
        self
    }

    /// Reads one header.
    pub fn read_header<R: Read>(&self, reader: &mut R) -> IoResult<FrameHeader> {
        let mut bytes = [0u8; HEADER_LEN];
        reader.read_exact(&mut bytes)?;
        Ok(FrameHeader::decode(bytes, self.byte_order))
    }

    /// Reads one whole frame and returns its payload.
    ///
    /// The header is untrusted: a length above the configured maximum fails
    /// with `InvalidData` before anything is allocated.
    pub fn receive<R: Read>(&self, reader: &mut R) -> IoResult<Vec<u8>> {
        let header = self.read_header(reader)?;
        log::debug!("Frame Len: {}", header.len);
        if header.len > self.max_len {
            return Err(IoError::new(
                ErrorKind::InvalidData,
                format!("frame of {} bytes exceeds limit of {}", header.len, self.max_len),
            ));
        }
        let mut payload = vec![0u8; header.len as usize];
        reader.read_exact(&mut payload)?;
        Ok(payload)
    }

    /// Reads one whole frame, discarding the payload, and returns its length.
    ///
    /// Nothing is buffered, so no length limit applies.
    pub fn receive_into_sink<R: Read>(&self, reader: &mut R) -> IoResult<u64> {
        let header = self.read_header(reader)?;
        log::debug!("Frame Len: {}", header.len);
        let want = u64::from(header.len);
        let copied = std::io::copy(&mut reader.by_ref().take(want), &mut std::io::sink())?;
        if copied < want {
            return Err(IoError::new(
                ErrorKind::UnexpectedEof,
                format!("frame truncated after {copied} of {want} bytes"),
            ));
        }
        Ok(copied)
    }
}
