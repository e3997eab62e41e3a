use std::io::{ErrorKind, Write};

use crate::error::{Error, Result};

/// Size of the length header that opens every frame.
pub const HEADER_LEN: usize = size_of::<u32>();

/// Largest payload slice handed to a single `write` call.
pub const MAX_CHUNK_SIZE: usize = 1024;

/// Byte order of the length header on the wire.
///
/// `Native` reproduces what existing receivers read on the same architecture.
/// Pick `Big` or `Little` when sender and receiver may differ.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ByteOrder {
    /// Host byte order.
    #[default]
    Native,
    /// Network byte order.
    Big,
    /// Little endian.
    Little,
}

/// The 4-byte length field sent ahead of the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// Payload length in bytes.
    pub len: u32,
}

impl FrameHeader {
    /// Builds the header for `payload_len`, refusing lengths the field cannot carry.
    pub fn for_payload(payload_len: usize) -> Result<Self> {
        let len = u32::try_from(payload_len).map_err(|_| Error::PayloadTooLarge(payload_len))?;
        Ok(FrameHeader { len })
    }

    /// Encodes the header in the given byte order.
    pub fn encode(&self, order: ByteOrder) -> [u8; HEADER_LEN] {
        match order {
            ByteOrder::Native => self.len.to_ne_bytes(),
            ByteOrder::Big => self.len.to_be_bytes(),
            ByteOrder::Little => self.len.to_le_bytes(),
        }
    }

    /// Decodes a header written with the given byte order.
    pub fn decode(bytes: [u8; HEADER_LEN], order: ByteOrder) -> Self {
        let len = match order {
            ByteOrder::Native => u32::from_ne_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
            ByteOrder::Little => u32::from_le_bytes(bytes),
        };
        FrameHeader { len }
    }
}

/// Progress through one payload.
///
/// `offset + remaining == total` holds after every call to [`advance`](Self::advance).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferCounters {
    total: usize,
    offset: usize,
    remaining: usize,
}

impl TransferCounters {
    /// Counters for a payload of `total` bytes, nothing sent yet.
    pub fn new(total: usize) -> Self {
        TransferCounters { total, offset: 0, remaining: total }
    }

    /// Payload length.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Index of the next byte to send.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes still to send.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Records `n` bytes as sent. `n` is clamped to what is left.
    pub fn advance(&mut self, n: usize) {
        let n = n.min(self.remaining);
        self.offset += n;
        self.remaining -= n;
    }
}

/// How the single header write went.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderNotice {
    /// All header bytes were accepted.
    Complete,
    /// Only some of the header bytes were accepted.
    Short(usize),
    /// The peer accepted no header bytes.
    Zero,
}

impl HeaderNotice {
    /// Operator-facing line for an incomplete header write, `None` when it went out whole.
    pub fn message(&self) -> Option<String> {
        match self {
            HeaderNotice::Complete => None,
            HeaderNotice::Short(n) => {
                Some(format!("Not all header bytes sent. Only {n} out of {HEADER_LEN}"))
            }
            HeaderNotice::Zero => Some("Receiver not available for accepting requests.".into()),
        }
    }
}

/// Outcome of a fully transmitted frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameReport {
    /// Length value carried by the header.
    pub header: FrameHeader,
    /// Result of the header write.
    pub header_notice: HeaderNotice,
    /// Header bytes accepted by the socket.
    pub header_bytes: usize,
    /// Payload bytes accepted by the socket.
    pub payload_bytes: usize,
    /// Number of chunk `write` calls that made progress.
    pub chunk_writes: usize,
}

impl FrameReport {
    /// Header plus payload bytes written.
    pub fn total_bytes(&self) -> u64 {
        (self.header_bytes + self.payload_bytes) as u64
    }
}

/// Writes length-prefixed frames in bounded chunks.
#[derive(Clone, Copy, Debug)]
pub struct FramedTransmitter {
    chunk_size: usize,
    byte_order: ByteOrder,
}

impl Default for FramedTransmitter {
    fn default() -> Self {
        FramedTransmitter::new(MAX_CHUNK_SIZE, ByteOrder::default())
    }
}

impl FramedTransmitter {
    /// Creates a transmitter. A zero chunk size is raised to one byte.
    pub fn new(chunk_size: usize, byte_order: ByteOrder) -> Self {
        FramedTransmitter { chunk_size: chunk_size.max(1), byte_order }
    }

    /// The largest slice passed to one `write` call.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Header byte order.
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Sends the header followed by `payload` on `writer`.
    ///
    /// The header goes out in a single write; a short or zero result is only
    /// reported. Payload chunks that are partially accepted are resumed from
    /// where the socket stopped. A chunk write that fails, or that accepts
    /// nothing, aborts the frame with [`Error::Send`] carrying the bytes
    /// already written.
    pub fn send_frame<W: Write>(&self, writer: &mut W, payload: &[u8]) -> Result<FrameReport> {
        let header = FrameHeader::for_payload(payload.len())?;
        let header_bytes = self.write_header(writer, &header)?;
        let header_notice = match header_bytes {
            0 => HeaderNotice::Zero,
            n if n < HEADER_LEN => HeaderNotice::Short(n),
            _ => HeaderNotice::Complete,
        };
        if let Some(message) = header_notice.message() {
            log::warn!("{message}");
        }
        log::debug!("Sent header for {} payload bytes ({:?})", header.len, self.byte_order);

        let mut counters = TransferCounters::new(payload.len());
        let mut chunk_writes = 0;
        while counters.remaining() > 0 {
            let len = counters.remaining().min(self.chunk_size);
            let start = counters.offset();
            let sent_so_far = (header_bytes + start) as u64;
            match writer.write(&payload[start..start + len]) {
                Ok(0) => {
                    log::warn!("Peer accepted no bytes at offset {start}, aborting");
                    return Err(Error::Send {
                        sent: sent_so_far,
                        source: ErrorKind::WriteZero.into(),
                    });
                }
                Ok(n) => {
                    if n < len {
                        log::debug!("Short write at offset {start}: {n} of {len} bytes");
                    }
                    counters.advance(n);
                    chunk_writes += 1;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::error!("Error sending payload at offset {start}: {e}");
                    return Err(Error::Send { sent: sent_so_far, source: e });
                }
            }
        }

        Ok(FrameReport {
            header,
            header_notice,
            header_bytes,
            payload_bytes: counters.offset(),
            chunk_writes,
        })
    }

    fn write_header<W: Write>(&self, writer: &mut W, header: &FrameHeader) -> Result<usize> {
        let bytes = header.encode(self.byte_order);
        loop {
            match writer.write(&bytes) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::error!("Error sending header: {e}");
                    return Err(Error::Send { sent: 0, source: e });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    /// What the scripted writer does on the n-th call.
    #[derive(Clone, Copy)]
    enum Step {
        Accept,
        AcceptAtMost(usize),
        Zero,
        Fail,
        Interrupt,
    }

    /// Records every write call; follows `script` and accepts everything once it runs out.
    struct ScriptedWriter {
        script: Vec<Step>,
        calls: Vec<usize>,
        data: Vec<u8>,
    }

    impl ScriptedWriter {
        fn new(script: Vec<Step>) -> Self {
            ScriptedWriter { script, calls: vec![], data: vec![] }
        }

        fn accepting() -> Self {
            Self::new(vec![])
        }
    }

    impl Write for ScriptedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let step = self.script.get(self.calls.len()).copied().unwrap_or(Step::Accept);
            self.calls.push(buf.len());
            let n = match step {
                Step::Accept => buf.len(),
                Step::AcceptAtMost(max) => buf.len().min(max),
                Step::Zero => 0,
                Step::Fail => return Err(io::Error::new(ErrorKind::BrokenPipe, "peer gone")),
                Step::Interrupt => return Err(ErrorKind::Interrupted.into()),
            };
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| b'A' + (i % 26) as u8).collect()
    }

    #[test]
    fn total_is_payload_plus_header() {
        for len in [1, 7, 1023, 1024, 1025, 4096, 10_000] {
            let mut w = ScriptedWriter::accepting();
            let report = FramedTransmitter::default().send_frame(&mut w, &payload(len)).unwrap();
            assert_eq!(report.total_bytes(), (len + HEADER_LEN) as u64);
            assert_eq!(report.payload_bytes, len);
            assert_eq!(report.header_notice, HeaderNotice::Complete);
        }
    }

    #[test]
    fn chunk_writes_are_ceil_of_len_over_chunk() {
        for chunk in [1, 3, 100, 1024] {
            for len in [1, 99, 100, 101, 2500] {
                let mut w = ScriptedWriter::accepting();
                let tx = FramedTransmitter::new(chunk, ByteOrder::Native);
                assert_eq!(tx.chunk_size(), chunk);
                let report = tx.send_frame(&mut w, &payload(len)).unwrap();
                assert_eq!(report.chunk_writes, len.div_ceil(chunk));
                assert!(w.calls[1..].iter().all(|&n| n <= chunk));
            }
        }
    }

    #[test]
    fn zero_chunk_size_is_raised_to_one() {
        let tx = FramedTransmitter::new(0, ByteOrder::Big);
        assert_eq!(tx.chunk_size(), 1);
        assert_eq!(tx.byte_order(), ByteOrder::Big);
        let mut w = ScriptedWriter::accepting();
        let report = tx.send_frame(&mut w, &payload(3)).unwrap();
        assert_eq!(report.chunk_writes, 3);
        assert_eq!(&w.data[..HEADER_LEN], &3u32.to_be_bytes());
    }

    #[test]
    fn header_notice_messages() {
        assert_eq!(HeaderNotice::Complete.message(), None);
        assert_eq!(
            HeaderNotice::Short(2).message().as_deref(),
            Some("Not all header bytes sent. Only 2 out of 4")
        );
        assert_eq!(
            HeaderNotice::Zero.message().as_deref(),
            Some("Receiver not available for accepting requests.")
        );
    }

    #[test]
    fn empty_payload_sends_only_the_header() {
        let mut w = ScriptedWriter::accepting();
        let report = FramedTransmitter::default().send_frame(&mut w, &[]).unwrap();
        assert_eq!(w.calls, vec![HEADER_LEN]);
        assert_eq!(report.chunk_writes, 0);
        assert_eq!(w.data, 0u32.to_ne_bytes());
    }

    #[test]
    fn payload_below_chunk_size_is_one_write() {
        let mut w = ScriptedWriter::accepting();
        FramedTransmitter::default().send_frame(&mut w, &payload(300)).unwrap();
        assert_eq!(w.calls, vec![HEADER_LEN, 300]);
    }

    #[test]
    fn reference_file_size_splits_into_2149_chunks() {
        let mut w = ScriptedWriter::accepting();
        let data = payload(2_200_000);
        let report = FramedTransmitter::default().send_frame(&mut w, &data).unwrap();

        assert_eq!(report.header.len, 2_200_000);
        assert_eq!(report.chunk_writes, 2149);
        let chunks = &w.calls[1..];
        assert_eq!(chunks.len(), 2149);
        assert!(chunks[..2148].iter().all(|&n| n == 1024));
        assert_eq!(chunks[2148], 576);
        assert_eq!(&w.data[HEADER_LEN..], &data[..]);
    }

    #[test]
    fn repeated_frames_are_identical() {
        let data = payload(5000);
        let tx = FramedTransmitter::default();
        let mut first = ScriptedWriter::accepting();
        let mut second = ScriptedWriter::accepting();
        let a = tx.send_frame(&mut first, &data).unwrap();
        let b = tx.send_frame(&mut second, &data).unwrap();
        assert_eq!(a, b);
        assert_eq!(first.data, second.data);
    }

    #[test]
    fn short_chunk_writes_resume_where_the_socket_stopped() {
        let mut w = ScriptedWriter::new(vec![Step::Accept, Step::AcceptAtMost(1000)]);
        let data = payload(2048);
        let report = FramedTransmitter::default().send_frame(&mut w, &data).unwrap();

        assert_eq!(w.calls, vec![HEADER_LEN, 1024, 1024, 24]);
        assert_eq!(report.chunk_writes, 3);
        assert_eq!(report.payload_bytes, 2048);
        assert_eq!(&w.data[HEADER_LEN..], &data[..]);
    }

    #[test]
    fn short_header_is_reported_not_fatal() {
        let mut w = ScriptedWriter::new(vec![Step::AcceptAtMost(2)]);
        let report = FramedTransmitter::default().send_frame(&mut w, &payload(10)).unwrap();
        assert_eq!(report.header_notice, HeaderNotice::Short(2));
        assert_eq!(report.header_bytes, 2);
        assert_eq!(report.total_bytes(), 12);
        assert_eq!(w.calls.len(), 2);
    }

    #[test]
    fn zero_header_write_is_not_retried() {
        let mut w = ScriptedWriter::new(vec![Step::Zero]);
        let report = FramedTransmitter::default().send_frame(&mut w, &payload(10)).unwrap();
        assert_eq!(report.header_notice, HeaderNotice::Zero);
        assert_eq!(w.calls, vec![HEADER_LEN, 10]);
    }

    #[test]
    fn failure_after_n_chunks_reports_bytes_sent() {
        let n = 3;
        let mut script = vec![Step::Accept; 1 + n];
        script.push(Step::Fail);
        let mut w = ScriptedWriter::new(script);

        let err = FramedTransmitter::default().send_frame(&mut w, &payload(10 * 1024)).unwrap_err();
        match &err {
            Error::Send { sent, source } => {
                assert_eq!(*sent, (HEADER_LEN + n * MAX_CHUNK_SIZE) as u64);
                assert_eq!(source.kind(), ErrorKind::BrokenPipe);
            }
            other => panic!("unexpected error: {other}"),
        }
        // No chunk is attempted after the failing one.
        assert_eq!(w.calls.len(), 2 + n);
    }

    #[test]
    fn zero_chunk_write_aborts() {
        let mut w = ScriptedWriter::new(vec![Step::Accept, Step::Accept, Step::Zero]);
        let err = FramedTransmitter::default().send_frame(&mut w, &payload(4096)).unwrap_err();
        match err {
            Error::Send { sent, source } => {
                assert_eq!(sent, (HEADER_LEN + 1024) as u64);
                assert_eq!(source.kind(), ErrorKind::WriteZero);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(w.calls.len(), 3);
    }

    #[test]
    fn header_error_is_fatal() {
        let mut w = ScriptedWriter::new(vec![Step::Fail]);
        let err = FramedTransmitter::default().send_frame(&mut w, &payload(10)).unwrap_err();
        assert_eq!(err.bytes_sent(), 0);
        assert_eq!(w.calls.len(), 1);
    }

    #[test]
    fn interrupted_writes_are_reissued() {
        let mut w = ScriptedWriter::new(vec![Step::Interrupt, Step::Accept, Step::Interrupt]);
        let report = FramedTransmitter::default().send_frame(&mut w, &payload(100)).unwrap();
        assert_eq!(report.total_bytes(), 104);
        assert_eq!(report.chunk_writes, 1);
    }

    #[test]
    fn header_encodes_in_each_byte_order() {
        let header = FrameHeader { len: 2_200_000 };
        assert_eq!(header.encode(ByteOrder::Big), [0x00, 0x21, 0x91, 0xC0]);
        assert_eq!(header.encode(ByteOrder::Little), [0xC0, 0x91, 0x21, 0x00]);
        assert_eq!(header.encode(ByteOrder::Native), 2_200_000u32.to_ne_bytes());
        for order in [ByteOrder::Native, ByteOrder::Big, ByteOrder::Little] {
            assert_eq!(FrameHeader::decode(header.encode(order), order), header);
        }
    }

    #[test]
    fn counters_keep_offset_plus_remaining_constant() {
        let mut c = TransferCounters::new(10);
        for step in [3, 0, 4, 9] {
            c.advance(step);
            assert_eq!(c.offset() + c.remaining(), c.total());
        }
        assert_eq!(c.offset(), 10);
        assert_eq!(c.remaining(), 0);
    }
}
