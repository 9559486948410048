use std::{
    fs::File,
    io::{self, BufReader, Cursor, Read},
    path::Path,
};

use tracing::debug;

enum Backing {
    File(BufReader<File>),
    Buffer(Cursor<Vec<u8>>),
}

/// A named byte stream with a logical cursor.
///
/// `offset` counts the shebang line bytes after `#!` that were consumed
/// before the engine sees the stream, and `first_line` is the line number of the next unread byte, so diagnostics
/// stay correct after a shebang line has been discarded.
pub struct SourceHandle {
    name: String,
    backing: Backing,
    pushback: Vec<u8>,
    offset: usize,
    first_line: usize,
}

impl SourceHandle {
    /// Opens `path`; the file is read lazily and closed when the handle drops.
    pub fn file(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        debug!(path = %path.display(), "opened file source");
        Ok(Self::with_backing(
            path.display().to_string(),
            Backing::File(BufReader::new(file)),
        ))
    }

    pub fn buffer(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::with_backing(name.into(), Backing::Buffer(Cursor::new(bytes.into())))
    }

    fn with_backing(name: String, backing: Backing) -> Self {
        Self {
            name,
            backing,
            pushback: Vec::new(),
            offset: 0,
            first_line: 1,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn first_line(&self) -> usize {
        self.first_line
    }

    pub fn is_buffer(&self) -> bool {
        matches!(self.backing, Backing::Buffer(_))
    }

    /// Returns bytes to the front of the stream; they are read again next.
    pub fn unread(&mut self, bytes: &[u8]) {
        let mut restored = bytes.to_vec();
        restored.extend_from_slice(&self.pushback);
        self.pushback = restored;
    }

    /// Discards a leading `#!` line.
    ///
    /// When the first two bytes are not `#!` they are pushed back unchanged.
    /// Returns the number of bytes discarded, `#!` included; only the rest of
    /// the line advances `offset`.
    pub fn skip_shebang(&mut self) -> io::Result<usize> {
        let mut peeked = [0u8; 2];
        let mut filled = 0;
        while filled < peeked.len() {
            let read = self.read(&mut peeked[filled..])?;
            if read == 0 {
                break;
            }
            filled += read;
        }

        if &peeked[..filled] != b"#!" {
            self.unread(&peeked[..filled]);
            return Ok(0);
        }

        let mut line = 0;
        let mut byte = [0u8; 1];
        while self.read(&mut byte)? == 1 {
            line += 1;
            if byte[0] == b'\n' {
                self.first_line += 1;
                break;
            }
        }
        self.offset += line;
        let discarded = filled + line;
        debug!(source = %self.name, discarded, "skipped shebang line");
        Ok(discarded)
    }

    /// Reads everything that remains, replacing invalid UTF-8 sequences.
    pub fn read_text(&mut self) -> io::Result<String> {
        let mut bytes = Vec::new();
        self.read_to_end(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Read for SourceHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.pushback.is_empty() {
            let count = self.pushback.len().min(buf.len());
            buf[..count].copy_from_slice(&self.pushback[..count]);
            self.pushback.drain(..count);
            return Ok(count);
        }
        match &mut self.backing {
            Backing::File(reader) => reader.read(buf),
            Backing::Buffer(cursor) => cursor.read(buf),
        }
    }
}

impl std::fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceHandle")
            .field("name", &self.name)
            .field("buffer", &self.is_buffer())
            .field("offset", &self.offset)
            .field("first_line", &self.first_line)
            .finish()
    }
}
