//! Streaming package reader.
//!
//! [`PackageReader`] wraps any `Read + Seek` source and decodes exactly the
//! byte ranges of the DBPF layout: the 96-byte header at offset 0, then the
//! directory flags word at `index_offset_long`, then `index_count` entries
//! back-to-back. It never assumes the directory follows the header, and never
//! relies on end-of-file to stop: the entry count in the header is the only
//! terminator.
//!
//! Any short read is a hard [`FormatError`] for that file. Nothing is
//! retried and nothing is cached; every call re-reads from the source.

use std::io::{self, Read, Seek, SeekFrom};
use thiserror::Error;

use crate::header::Header;
use crate::index::{DirectoryFlags, IndexEntry, FLAGS_SIZE};

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("short read on {what}: needed {needed} bytes, got {got}")]
    ShortRead { what: &'static str, needed: usize, got: usize },
    #[error("truncated {what} field")]
    Truncated { what: &'static str },
}

impl FormatError {
    /// Classify a failed fixed-width field read.
    pub(crate) fn field(err: io::Error, what: &'static str) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            FormatError::Truncated { what }
        } else {
            FormatError::Io(err)
        }
    }
}

/// Fill `buf` from `reader` until it is full or the source is exhausted.
/// Returns the number of bytes read; `Interrupted` is retried like
/// `read_exact` does.
pub fn read_up_to<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct PackageReader<R: Read + Seek> {
    reader: R,
}

impl<R: Read + Seek> PackageReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Mutable access to the source, e.g. for range checks outside the
    /// directory. Moving the cursor does not affect later decode calls; each
    /// one seeks first.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn read_header(&mut self) -> Result<Header, FormatError> {
        self.reader.seek(SeekFrom::Start(0))?;
        Header::read(&mut self.reader)
    }

    /// Seek to the long-form index offset and decode the flags word.
    pub fn read_directory_flags(&mut self, header: &Header) -> Result<DirectoryFlags, FormatError> {
        self.reader.seek(SeekFrom::Start(header.index_offset_long))?;
        DirectoryFlags::read(&mut self.reader)
    }

    /// Lazily decode the directory. The returned iterator yields exactly
    /// `header.index_count` entries, or stops after the first error.
    pub fn entries(&mut self, header: &Header) -> Result<Entries<'_, R>, FormatError> {
        let flags = self.read_directory_flags(header)?;
        Ok(Entries {
            reader:    &mut self.reader,
            flags,
            remaining: header.index_count,
            position:  header.index_offset_long + FLAGS_SIZE as u64,
        })
    }

    /// Decode the whole directory eagerly. A partial directory is an error.
    pub fn read_entries(&mut self, header: &Header) -> Result<Vec<IndexEntry>, FormatError> {
        self.entries(header)?.collect()
    }
}

// ── Entry iterator ───────────────────────────────────────────────────────────

/// Ordered, fused iterator over directory entries.
pub struct Entries<'a, R: Read> {
    reader:    &'a mut R,
    flags:     DirectoryFlags,
    remaining: u32,
    position:  u64,
}

impl<'a, R: Read> Entries<'a, R> {
    pub fn flags(&self) -> DirectoryFlags {
        self.flags
    }

    /// Absolute file offset of the next entry to be decoded.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

impl<'a, R: Read> Iterator for Entries<'a, R> {
    type Item = Result<IndexEntry, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        match IndexEntry::read(&mut *self.reader, self.flags) {
            Ok(entry) => {
                self.remaining -= 1;
                self.position += self.flags.entry_size(entry.is_extended()) as u64;
                Some(Ok(entry))
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HEADER_SIZE;
    use crate::index::ExtendedInfo;
    use std::io::Cursor;

    fn entry(n: u32, extended: bool) -> IndexEntry {
        IndexEntry {
            type_id:           None,
            group_id:          None,
            instance_hi:       None,
            instance_lo:       n,
            resource_offset:   n * 10,
            compressed_size:   n + 1,
            uncompressed_size: n + 2,
            extended:          extended.then_some(ExtendedInfo { compression_type: 0xFFFF, committed: 1 }),
        }
    }

    /// Header, then `gap` junk bytes, then the directory.
    fn package(flags: u32, entries: &[IndexEntry], gap: usize) -> Vec<u8> {
        let flags = DirectoryFlags::from_raw(flags);
        let index_offset = (HEADER_SIZE + gap) as u64;
        let mut dir = Vec::new();
        flags.write(&mut dir).unwrap();
        for e in entries {
            e.write(&mut dir, flags).unwrap();
        }
        let header = Header {
            index_count:        entries.len() as u32,
            index_offset_short: index_offset as u32,
            index_size:         dir.len() as u32,
            index_offset_long:  index_offset,
            ..Header::default()
        };
        let mut out = header.to_bytes();
        out.extend(std::iter::repeat(0xEEu8).take(gap));
        out.extend(dir);
        out
    }

    #[test]
    fn seeks_to_long_offset_not_end_of_header() {
        let entries = vec![entry(1, false), entry(2, true), entry(3, false)];
        let bytes = package(0b111, &entries, 37);
        let mut reader = PackageReader::new(Cursor::new(bytes));
        let header = reader.read_header().unwrap();
        assert_eq!(reader.read_entries(&header).unwrap(), entries);
    }

    #[test]
    fn cursor_advances_per_flag_layout() {
        let entries = vec![entry(1, false), entry(2, true), entry(3, false)];
        let bytes = package(0b111, &entries, 0);
        let mut reader = PackageReader::new(Cursor::new(bytes));
        let header = reader.read_header().unwrap();

        let mut it = reader.entries(&header).unwrap();
        let start = it.position();
        assert_eq!(start, HEADER_SIZE as u64 + 4);
        it.next().unwrap().unwrap();
        assert_eq!(it.position(), start + 16);
        it.next().unwrap().unwrap();
        assert_eq!(it.position(), start + 36);
        it.next().unwrap().unwrap();
        assert_eq!(it.position(), start + 52);
        assert!(it.next().is_none());
    }

    #[test]
    fn stops_at_index_count_not_eof() {
        let entries = vec![entry(1, false), entry(2, false)];
        let mut bytes = package(0b111, &entries, 0);
        // Trailing garbage that would decode as more entries.
        bytes.extend([0u8; 64]);
        let mut reader = PackageReader::new(Cursor::new(bytes));
        let header = reader.read_header().unwrap();
        assert_eq!(reader.entries(&header).unwrap().count(), 2);
    }

    #[test]
    fn short_directory_is_one_error_then_fused() {
        let entries = vec![entry(1, false), entry(2, false)];
        let mut bytes = package(0b111, &entries, 0);
        bytes.truncate(bytes.len() - 3);
        let mut reader = PackageReader::new(Cursor::new(bytes));
        let header = reader.read_header().unwrap();

        let mut it = reader.entries(&header).unwrap();
        assert!(it.next().unwrap().is_ok());
        assert!(matches!(it.next(), Some(Err(FormatError::Truncated { .. }))));
        assert!(it.next().is_none());
    }

    #[test]
    fn flags_beyond_eof_is_truncation() {
        let header = Header { index_offset_long: 10_000, index_count: 1, ..Header::default() };
        let mut reader = PackageReader::new(Cursor::new(header.to_bytes()));
        let header = reader.read_header().unwrap();
        assert!(matches!(
            reader.read_directory_flags(&header),
            Err(FormatError::Truncated { what: "directory flags" })
        ));
    }

    #[test]
    fn read_up_to_reports_partial_fill() {
        let mut src = Cursor::new(vec![1u8, 2, 3]);
        let mut buf = [0u8; 8];
        assert_eq!(read_up_to(&mut src, &mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
    }
}
