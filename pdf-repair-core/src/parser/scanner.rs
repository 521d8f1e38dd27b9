//! Buffered byte scanner
//!
//! Wraps a seekable source and tracks the absolute position so the lexer and
//! the repair engine can move backwards and forwards over the raw bytes.

use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};

/// Byte-level cursor over a seekable source
pub struct ByteScanner<R> {
    reader: BufReader<R>,
    position: u64,
    len: u64,
    eof: bool,
}

impl<R: Read + Seek> ByteScanner<R> {
    /// Create a scanner positioned at the start of `inner`
    pub fn new(mut inner: R) -> io::Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self {
            reader: BufReader::new(inner),
            position: 0,
            len,
            eof: false,
        })
    }

    /// Current absolute position
    pub fn tell(&self) -> u64 {
        self.position
    }

    /// Total length of the source in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the source holds no bytes at all
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether a read has run into the end of the source since the last seek
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Move to an absolute position. Positions past the end are allowed;
    /// reads from there report end of file.
    pub fn seek(&mut self, position: u64) -> io::Result<()> {
        let delta = i64::try_from(position)
            .ok()
            .zip(i64::try_from(self.position).ok())
            .and_then(|(to, from)| to.checked_sub(from));
        match delta {
            // seek_relative keeps the buffer when the target is already buffered
            Some(delta) => self.reader.seek_relative(delta)?,
            None => {
                self.reader.seek(SeekFrom::Start(position))?;
            }
        }
        self.position = position;
        self.eof = false;
        Ok(())
    }

    /// Read one byte, `None` at end of file
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let byte = self.reader.fill_buf()?.first().copied();
        match byte {
            Some(b) => {
                self.reader.consume(1);
                self.position += 1;
                Ok(Some(b))
            }
            None => {
                self.eof = true;
                Ok(None)
            }
        }
    }

    /// Look at the next byte without consuming it
    pub fn peek_byte(&mut self) -> io::Result<Option<u8>> {
        let byte = self.reader.fill_buf()?.first().copied();
        if byte.is_none() {
            self.eof = true;
        }
        Ok(byte)
    }

    /// Step back over the byte that was just read
    pub fn unread_byte(&mut self) -> io::Result<()> {
        if self.position > 0 {
            self.seek(self.position - 1)?;
        }
        Ok(())
    }

    /// Fill as much of `buf` as the source allows, returning the count read.
    /// A short count means end of file.
    pub fn read_into(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        self.position += filled as u64;
        Ok(filled)
    }

    /// Read exactly `len` bytes starting at `offset`
    pub fn read_range(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        self.seek(offset)?;
        let mut data = vec![0u8; len];
        let n = self.read_into(&mut data)?;
        if n < len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("wanted {len} bytes at offset {offset}, file holds {n}"),
            ));
        }
        Ok(data)
    }

    /// Give back the wrapped source
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}
