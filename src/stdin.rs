use std::io::{self, Read};

use tracing::debug;

use crate::source::SourceHandle;

/// Name given to sources captured from standard input.
pub const STDIN_NAME: &str = "[stdin]";

/// Hands out standard input at most once.
///
/// Both the main script (`-i -`) and environment files (`-E -`) may ask for
/// stdin; every consumer shares one acquirer so the second request fails
/// instead of silently seeing an empty stream.
pub struct StdinAcquirer<R> {
    reader: R,
    drained: bool,
}

impl<R: Read> StdinAcquirer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            drained: false,
        }
    }

    pub fn is_drained(&self) -> bool {
        self.drained
    }

    /// Drains the reader into a buffer-backed source named `[stdin]`.
    pub fn acquire(&mut self) -> io::Result<SourceHandle> {
        if self.drained {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "can read from stdin only once",
            ));
        }
        self.drained = true;

        let mut bytes = Vec::new();
        self.reader.read_to_end(&mut bytes)?;
        debug!(bytes = bytes.len(), "captured standard input");
        Ok(SourceHandle::buffer(STDIN_NAME, bytes))
    }
}
