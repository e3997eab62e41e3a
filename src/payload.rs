use std::io::Result as IoResult;
use std::path::PathBuf;

use random_number::random;

/// Payload size used when none is given.
pub const DEFAULT_PAYLOAD_SIZE: usize = 2_200_000;

/// Produces the bytes sent in each round.
pub trait PayloadSource {
    /// Returns the payload for the next round.
    fn next_payload(&mut self) -> IoResult<Vec<u8>>;

    /// A short name for status output.
    fn describe(&self) -> String;
}

impl<P: PayloadSource + ?Sized> PayloadSource for Box<P> {
    fn next_payload(&mut self) -> IoResult<Vec<u8>> {
        (**self).next_payload()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Fresh random uppercase letters every round.
#[derive(Debug, Clone)]
pub struct RandomPayload {
    size: usize,
    mirror: Option<PathBuf>,
}

impl RandomPayload {
    /// A generator of `size`-byte payloads.
    pub fn new(size: usize) -> Self {
        RandomPayload { size, mirror: None }
    }

    /// Also writes each generated payload to `path`.
    pub fn with_mirror(mut self, path: impl Into<PathBuf>) -> Self {
        self.mirror = Some(path.into());
        self
    }
}

impl PayloadSource for RandomPayload {
    fn next_payload(&mut self) -> IoResult<Vec<u8>> {
        log::debug!("Generating {} random bytes", self.size);
        let mut data = vec![0u8; self.size];
        for b in data.iter_mut() {
            *b = random!(b'A'..=b'Z');
        }
        if let Some(path) = &self.mirror {
            std::fs::write(path, &data)?;
            log::debug!("Payload written to {}", path.display());
        }
        Ok(data)
    }

    fn describe(&self) -> String {
        match &self.mirror {
            Some(path) => path.display().to_string(),
            None => format!("<random {} bytes>", self.size),
        }
    }
}

/// The contents of an existing file, re-read every round.
#[derive(Debug, Clone)]
pub struct FilePayload {
    path: PathBuf,
}

impl FilePayload {
    /// Sends the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FilePayload { path: path.into() }
    }
}

impl PayloadSource for FilePayload {
    fn next_payload(&mut self) -> IoResult<Vec<u8>> {
        let data = std::fs::read(&self.path)?;
        log::debug!("{} | Size: {} Bytes", self.path.display(), data.len());
        Ok(data)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
