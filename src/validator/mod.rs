//! Package validation: file metadata, header fields, directory bounds.
//!
//! A validation run walks a fixed sequence of stages and stops at the first
//! violation:
//!
//! ```text
//! NotStarted → MetadataChecked → HeaderChecked → DirectoryChecked → Done
//!        \              \                \                 \
//!         └──────────────┴────────────────┴─────────────────┴──→ Failed(kind)
//! ```
//!
//! Every failure is reported as exactly one [`ValidationError`]. Typed
//! failures pass through unchanged; any other error raised while checking
//! (I/O, short header read) is reported as [`ErrorKind::UnknownError`], so an
//! unexpected condition never reads as a valid file.

pub mod script;

use serde::Serialize;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::header::{Header, HEADER_SIZE, MAGIC};
use crate::io_stream::{FormatError, PackageReader};

pub use script::ScriptValidator;

// ── Error taxonomy ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    FileNotFound,
    FileNotFile,
    FileTooSmall,
    InvalidFileIdentifier,
    InvalidFormatVersion,
    InvalidUnknownConstant,
    EmptyIndexInfo,
    IndexOutOfBounds,
    InvalidIndex,
    IndexParseError,
    UnknownError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::FileNotFound           => "FILE_NOT_FOUND",
            ErrorKind::FileNotFile            => "FILE_NOT_FILE",
            ErrorKind::FileTooSmall           => "FILE_TOO_SMALL",
            ErrorKind::InvalidFileIdentifier  => "INVALID_FILE_IDENTIFIER",
            ErrorKind::InvalidFormatVersion   => "INVALID_FORMAT_VERSION",
            ErrorKind::InvalidUnknownConstant => "INVALID_UNKNOWN_CONSTANT",
            ErrorKind::EmptyIndexInfo         => "EMPTY_INDEX_INFO",
            ErrorKind::IndexOutOfBounds       => "INDEX_OUT_OF_BOUNDS",
            ErrorKind::InvalidIndex           => "INVALID_INDEX",
            ErrorKind::IndexParseError        => "INDEX_PARSE_ERROR",
            ErrorKind::UnknownError           => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single output of a failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{kind}: {detail}")]
pub struct ValidationError {
    pub kind:   ErrorKind,
    pub detail: String,
}

impl ValidationError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self { kind, detail: detail.into() }
    }
}

/// Anything a check can raise. Only [`Check::Failed`] is a typed verdict;
/// the rest are folded into `UNKNOWN_ERROR` by [`settle`].
#[derive(Debug)]
enum Check {
    Failed(ValidationError),
    Format(FormatError),
    Io(io::Error),
}

impl From<ValidationError> for Check {
    fn from(e: ValidationError) -> Self {
        Check::Failed(e)
    }
}

impl From<FormatError> for Check {
    fn from(e: FormatError) -> Self {
        Check::Format(e)
    }
}

impl From<io::Error> for Check {
    fn from(e: io::Error) -> Self {
        Check::Io(e)
    }
}

fn settle(check: Check) -> ValidationError {
    match check {
        Check::Failed(e) => e,
        Check::Format(e) => ValidationError::new(ErrorKind::UnknownError, format!("unexpected decode failure: {e}")),
        Check::Io(e)     => ValidationError::new(ErrorKind::UnknownError, format!("unexpected I/O failure: {e}")),
    }
}

// ── Stage machine ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    NotStarted,
    MetadataChecked,
    HeaderChecked,
    DirectoryChecked,
    Done,
    Failed(ErrorKind),
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed(_))
    }
}

/// One validation run over one seekable source of known length.
///
/// The run owns its source; dropping it releases the handle on every path.
pub struct Validation<R: Read + Seek> {
    reader:    PackageReader<R>,
    file_size: u64,
    header:    Option<Header>,
    stage:     Stage,
}

impl<R: Read + Seek> Validation<R> {
    pub fn new(source: R, file_size: u64) -> Self {
        Self {
            reader: PackageReader::new(source),
            file_size,
            header: None,
            stage:  Stage::NotStarted,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// Run every remaining stage in order and return the verdict.
    pub fn run(mut self) -> Result<(), ValidationError> {
        self.check_metadata()?;
        self.check_header()?;
        self.check_directory()?;
        self.stage = Stage::Done;
        Ok(())
    }

    pub fn check_metadata(&mut self) -> Result<(), ValidationError> {
        let file_size = self.file_size;
        self.step(Stage::NotStarted, Stage::MetadataChecked, |_| {
            check_size(file_size)?;
            Ok(())
        })
    }

    pub fn check_header(&mut self) -> Result<(), ValidationError> {
        self.step(Stage::MetadataChecked, Stage::HeaderChecked, |v| {
            let header = v.reader.read_header()?;
            validate_header(&header)?;
            v.header = Some(header);
            Ok(())
        })
    }

    pub fn check_directory(&mut self) -> Result<(), ValidationError> {
        self.step(Stage::HeaderChecked, Stage::DirectoryChecked, |v| {
            let header = match v.header.take() {
                Some(h) => h,
                None => return Err(Check::Failed(out_of_order("directory", Stage::HeaderChecked))),
            };
            let result = check_directory(&mut v.reader, &header, v.file_size);
            v.header = Some(header);
            result
        })
    }

    fn step<F>(&mut self, from: Stage, to: Stage, check: F) -> Result<(), ValidationError>
    where
        F: FnOnce(&mut Self) -> Result<(), Check>,
    {
        if self.stage != from {
            let err = out_of_order(stage_name(to), from);
            self.stage = Stage::Failed(err.kind);
            return Err(err);
        }
        match check(self) {
            Ok(()) => {
                debug!(stage = ?to, "validation stage passed");
                self.stage = to;
                Ok(())
            }
            Err(check) => {
                let err = settle(check);
                debug!(kind = %err.kind, detail = %err.detail, "validation failed");
                self.stage = Stage::Failed(err.kind);
                Err(err)
            }
        }
    }
}

fn stage_name(stage: Stage) -> &'static str {
    match stage {
        Stage::MetadataChecked  => "metadata",
        Stage::HeaderChecked    => "header",
        Stage::DirectoryChecked => "directory",
        _                       => "validation",
    }
}

fn out_of_order(step: &str, required: Stage) -> ValidationError {
    ValidationError::new(
        ErrorKind::UnknownError,
        format!("{step} check requires stage {required:?}"),
    )
}

// ── Individual checks ─────────────────────────────────────────────────────────

fn check_size(file_size: u64) -> Result<(), ValidationError> {
    if file_size < HEADER_SIZE as u64 {
        return Err(ValidationError::new(
            ErrorKind::FileTooSmall,
            format!("file is {file_size} bytes, a package header needs {HEADER_SIZE}"),
        ));
    }
    Ok(())
}

/// Check that `path` names an existing regular file at least one header long.
/// Returns the file length.
pub fn validate_file_metadata(path: &Path) -> Result<u64, ValidationError> {
    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ValidationError::new(
                ErrorKind::FileNotFound,
                format!("file does not exist: {}", path.display()),
            ));
        }
        Err(e) => return Err(settle(Check::Io(e))),
    };
    if !meta.is_file() {
        return Err(ValidationError::new(
            ErrorKind::FileNotFile,
            format!("path is not a file: {}", path.display()),
        ));
    }
    check_size(meta.len())?;
    Ok(meta.len())
}

pub fn validate_header(header: &Header) -> Result<(), ValidationError> {
    if !header.has_valid_signature() {
        return Err(ValidationError::new(
            ErrorKind::InvalidFileIdentifier,
            format!(
                "expected signature {} ({:?}), found {}",
                hex::encode(MAGIC),
                String::from_utf8_lossy(MAGIC),
                hex::encode(header.signature),
            ),
        ));
    }
    if !header.has_expected_version() {
        return Err(ValidationError::new(
            ErrorKind::InvalidFormatVersion,
            format!(
                "format version {}.{} is not 2.1",
                header.major_format_version, header.minor_format_version
            ),
        ));
    }
    if !header.has_expected_constants() {
        return Err(ValidationError::new(
            ErrorKind::InvalidUnknownConstant,
            format!(
                "constants are ({}, {}), expected (0, 3)",
                header.constant_one, header.constant_three
            ),
        ));
    }
    Ok(())
}

/// Directory checks, in order: declared size, declared range against the
/// file length, a byte-exact read of the declared range, then every entry.
pub fn validate_directory<R: Read + Seek>(
    reader:    &mut PackageReader<R>,
    header:    &Header,
    file_size: u64,
) -> Result<(), ValidationError> {
    check_directory(reader, header, file_size).map_err(settle)
}

fn check_directory<R: Read + Seek>(
    reader:    &mut PackageReader<R>,
    header:    &Header,
    file_size: u64,
) -> Result<(), Check> {
    if header.index_size == 0 {
        return Err(ValidationError::new(ErrorKind::EmptyIndexInfo, "index size is 0").into());
    }

    let start = header.index_offset_short as u64;
    let end   = header.index_end_short();
    if start > file_size || end > file_size {
        return Err(ValidationError::new(
            ErrorKind::IndexOutOfBounds,
            format!("index range {start}..{end} exceeds file size {file_size}"),
        )
        .into());
    }

    let got = read_range(reader.get_mut(), start, header.index_size as u64).map_err(|e| {
        ValidationError::new(ErrorKind::InvalidIndex, format!("couldn't read index at {start}: {e}"))
    })?;
    if got < header.index_size as u64 {
        return Err(ValidationError::new(
            ErrorKind::InvalidIndex,
            format!(
                "couldn't read complete index (expected {} bytes, got {got} bytes)",
                header.index_size
            ),
        )
        .into());
    }

    let mut entries = reader.entries(header).map_err(|e| parse_error(header.index_offset_long, &e))?;
    let mut n = 0u32;
    loop {
        let position = entries.position();
        let entry = match entries.next() {
            None => break,
            Some(Ok(entry)) => entry,
            Some(Err(e)) => {
                return Err(ValidationError::new(
                    ErrorKind::IndexParseError,
                    format!("entry {n} at offset {position}: {e}"),
                )
                .into());
            }
        };
        if entry.resource_end() > file_size {
            return Err(ValidationError::new(
                ErrorKind::IndexOutOfBounds,
                format!(
                    "entry {n} resource {}..{} exceeds file size {file_size}",
                    entry.resource_offset,
                    entry.resource_end()
                ),
            )
            .into());
        }
        n += 1;
    }
    debug!(entries = n, "directory entries checked");
    Ok(())
}

fn parse_error(offset: u64, err: &FormatError) -> ValidationError {
    ValidationError::new(
        ErrorKind::IndexParseError,
        format!("failed to read directory at offset {offset}: {err}"),
    )
}

/// Count how many of `len` bytes starting at `offset` can actually be read.
fn read_range<R: Read + Seek>(reader: &mut R, offset: u64, len: u64) -> io::Result<u64> {
    reader.seek(SeekFrom::Start(offset))?;
    io::copy(&mut reader.by_ref().take(len), &mut io::sink())
}

// ── Entry points ──────────────────────────────────────────────────────────────

/// Validate an in-memory or otherwise already-open package of `file_size`
/// declared bytes.
pub fn validate_stream<R: Read + Seek>(source: R, file_size: u64) -> Result<(), ValidationError> {
    Validation::new(source, file_size).run()
}

/// Validate the package at `path`: metadata, then header, then directory.
pub fn validate(path: &Path) -> Result<(), ValidationError> {
    let file_size = validate_file_metadata(path)?;
    let file = File::open(path).map_err(|e| settle(Check::Io(e)))?;
    validate_stream(BufReader::new(file), file_size)
}

/// Shared seam for per-kind validators.
pub trait Validate: Send + Sync {
    fn validate(&self, path: &Path) -> Result<(), ValidationError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PackageValidator;

impl Validate for PackageValidator {
    fn validate(&self, path: &Path) -> Result<(), ValidationError> {
        validate(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn kind_of(bytes: Vec<u8>) -> Option<ErrorKind> {
        let len = bytes.len() as u64;
        validate_stream(Cursor::new(bytes), len).err().map(|e| e.kind)
    }

    #[test]
    fn wire_names_match_display() {
        assert_eq!(ErrorKind::InvalidFileIdentifier.to_string(), "INVALID_FILE_IDENTIFIER");
        assert_eq!(
            serde_json::to_string(&ErrorKind::IndexOutOfBounds).unwrap(),
            "\"INDEX_OUT_OF_BOUNDS\""
        );
    }

    #[test]
    fn header_checks_run_in_order() {
        let bad_everything = Header {
            signature:            *b"XXXX",
            major_format_version: 9,
            constant_one:         7,
            ..Header::default()
        };
        assert_eq!(kind_of(bad_everything.to_bytes()), Some(ErrorKind::InvalidFileIdentifier));

        let bad_version = Header { major_format_version: 9, constant_one: 7, ..Header::default() };
        assert_eq!(kind_of(bad_version.to_bytes()), Some(ErrorKind::InvalidFormatVersion));

        let bad_one = Header { constant_one: 1, ..Header::default() };
        assert_eq!(kind_of(bad_one.to_bytes()), Some(ErrorKind::InvalidUnknownConstant));

        let bad_three = Header { constant_three: 0, ..Header::default() };
        assert_eq!(kind_of(bad_three.to_bytes()), Some(ErrorKind::InvalidUnknownConstant));
    }

    #[test]
    fn stages_advance_then_stop_on_failure() {
        let bytes = Header::default().to_bytes();
        let len = bytes.len() as u64;
        let mut v = Validation::new(Cursor::new(bytes), len);
        assert_eq!(v.stage(), Stage::NotStarted);
        v.check_metadata().unwrap();
        assert_eq!(v.stage(), Stage::MetadataChecked);
        v.check_header().unwrap();
        assert_eq!(v.stage(), Stage::HeaderChecked);
        assert_eq!(v.check_directory().unwrap_err().kind, ErrorKind::EmptyIndexInfo);
        assert_eq!(v.stage(), Stage::Failed(ErrorKind::EmptyIndexInfo));
        assert!(v.stage().is_terminal());
    }

    #[test]
    fn out_of_order_step_fails_closed() {
        let bytes = Header::default().to_bytes();
        let mut v = Validation::new(Cursor::new(bytes), 96);
        assert_eq!(v.check_header().unwrap_err().kind, ErrorKind::UnknownError);
        assert_eq!(v.stage(), Stage::Failed(ErrorKind::UnknownError));
    }

    #[test]
    fn declared_size_larger_than_stream_is_unknown_error() {
        // The header itself cannot be read: unmapped decode failure.
        let bytes = vec![0u8; 10];
        assert_eq!(
            validate_stream(Cursor::new(bytes), 4096).unwrap_err().kind,
            ErrorKind::UnknownError
        );
    }

    #[test]
    fn directory_checks_run_in_order() {
        let header = Header { index_offset_short: 1_000, index_size: 0, ..Header::default() };
        let mut reader = PackageReader::new(Cursor::new(header.to_bytes()));

        // Empty wins over out-of-range.
        let err = validate_directory(&mut reader, &header, 96).unwrap_err();
        assert_eq!(err.kind, ErrorKind::EmptyIndexInfo);

        let header = Header { index_size: 4, ..header };
        let err = validate_directory(&mut reader, &header, 96).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IndexOutOfBounds);
    }

    #[test]
    fn declared_index_beyond_real_bytes_is_invalid_index() {
        let header = Header {
            index_count:        0,
            index_offset_short: 96,
            index_size:         64,
            index_offset_long:  96,
            ..Header::default()
        };
        // Declare 160 bytes but supply only the header: bounds pass, read comes up short.
        let err = validate_stream(Cursor::new(header.to_bytes()), 160).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidIndex);
        assert!(err.detail.contains("expected 64 bytes, got 0 bytes"));
    }
}
