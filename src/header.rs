//! DBPF 2.x file header: the fixed 96-byte prefix of every `.package` file.
//!
//! # Layout (all fields little-endian)
//!
//! | Offset | Size | Field                                   |
//! |--------|------|-----------------------------------------|
//! | 0x00   | 4    | signature `b"DBPF"`                     |
//! | 0x04   | 4    | major format version (must be 2)        |
//! | 0x08   | 4    | minor format version (must be 1)        |
//! | 0x0C   | 4    | major file version (unused)             |
//! | 0x10   | 4    | minor file version (unused)             |
//! | 0x14   | 4    | constant one, must be 0                 |
//! | 0x18   | 4    | creation time (unused)                  |
//! | 0x1C   | 4    | update time (unused)                    |
//! | 0x20   | 4    | index major version (unused)            |
//! | 0x24   | 4    | index entry count                       |
//! | 0x28   | 4    | index offset, short form (bounds check) |
//! | 0x2C   | 4    | index size in bytes                     |
//! | 0x30   | 4    | hole entry count (unused)               |
//! | 0x34   | 4    | hole offset (unused)                    |
//! | 0x38   | 4    | hole size (unused)                      |
//! | 0x3C   | 4    | constant three, must be 3               |
//! | 0x40   | 8    | index offset, long form (seek target)   |
//! | 0x48   | 24   | padding, kept verbatim                  |
//!
//! The two index offsets serve different purposes and are never unified:
//! the long form is where the directory is decoded from, the short form plus
//! `index_size` is the range checked against the file length.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read, Write};

use crate::io_stream::{read_up_to, FormatError};

pub const MAGIC: &[u8; 4] = b"DBPF";
pub const HEADER_SIZE: usize = 96;
pub const PADDING_SIZE: usize = 24;

pub const EXPECTED_MAJOR_FORMAT_VERSION: u32 = 2;
pub const EXPECTED_MINOR_FORMAT_VERSION: u32 = 1;
pub const EXPECTED_CONSTANT_ONE: u32 = 0;
pub const EXPECTED_CONSTANT_THREE: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub signature:            [u8; 4],
    pub major_format_version: u32,
    pub minor_format_version: u32,
    pub major_file_version:   u32,
    pub minor_file_version:   u32,
    pub constant_one:         u32,
    pub creation_time:        u32,
    pub update_time:          u32,
    pub index_major_version:  u32,
    pub index_count:          u32,
    pub index_offset_short:   u32,
    pub index_size:           u32,
    pub hole_entry_count:     u32,
    pub hole_offset:          u32,
    pub hole_size:            u32,
    pub constant_three:       u32,
    pub index_offset_long:    u64,
    pub padding:              [u8; PADDING_SIZE],
}

impl Default for Header {
    /// A header that passes every header-level check and declares an empty
    /// directory.
    fn default() -> Self {
        Self {
            signature:            *MAGIC,
            major_format_version: EXPECTED_MAJOR_FORMAT_VERSION,
            minor_format_version: EXPECTED_MINOR_FORMAT_VERSION,
            major_file_version:   0,
            minor_file_version:   0,
            constant_one:         EXPECTED_CONSTANT_ONE,
            creation_time:        0,
            update_time:          0,
            index_major_version:  0,
            index_count:          0,
            index_offset_short:   0,
            index_size:           0,
            hole_entry_count:     0,
            hole_offset:          0,
            hole_size:            0,
            constant_three:       EXPECTED_CONSTANT_THREE,
            index_offset_long:    0,
            padding:              [0u8; PADDING_SIZE],
        }
    }
}

impl Header {
    /// Decode the header from the current position of `reader`.
    ///
    /// Reads at most [`HEADER_SIZE`] bytes. Fewer available bytes is a
    /// [`FormatError::ShortRead`]; no field is interpreted in that case.
    pub fn read<R: Read>(mut reader: R) -> Result<Self, FormatError> {
        let mut buf = [0u8; HEADER_SIZE];
        let got = read_up_to(&mut reader, &mut buf)?;
        if got < HEADER_SIZE {
            return Err(FormatError::ShortRead { what: "header", needed: HEADER_SIZE, got });
        }
        Ok(Self::from_bytes(&buf))
    }

    /// Decode a header from exactly [`HEADER_SIZE`] bytes.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Self {
        let signature = [buf[0], buf[1], buf[2], buf[3]];

        // 15 u32 fields between the signature and the long index offset.
        // The slice length is fixed, so these reads cannot run dry.
        let mut c = Cursor::new(&buf[0x04..0x40]);
        let mut u32_le = || c.read_u32::<LittleEndian>().unwrap_or_default();

        let major_format_version = u32_le();
        let minor_format_version = u32_le();
        let major_file_version   = u32_le();
        let minor_file_version   = u32_le();
        let constant_one         = u32_le();
        let creation_time        = u32_le();
        let update_time          = u32_le();
        let index_major_version  = u32_le();
        let index_count          = u32_le();
        let index_offset_short   = u32_le();
        let index_size           = u32_le();
        let hole_entry_count     = u32_le();
        let hole_offset          = u32_le();
        let hole_size            = u32_le();
        let constant_three       = u32_le();

        let mut long = [0u8; 8];
        long.copy_from_slice(&buf[0x40..0x48]);
        let index_offset_long = u64::from_le_bytes(long);

        let mut padding = [0u8; PADDING_SIZE];
        padding.copy_from_slice(&buf[0x48..HEADER_SIZE]);

        Self {
            signature,
            major_format_version,
            minor_format_version,
            major_file_version,
            minor_file_version,
            constant_one,
            creation_time,
            update_time,
            index_major_version,
            index_count,
            index_offset_short,
            index_size,
            hole_entry_count,
            hole_offset,
            hole_size,
            constant_three,
            index_offset_long,
            padding,
        }
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.signature)?;
        writer.write_u32::<LittleEndian>(self.major_format_version)?;
        writer.write_u32::<LittleEndian>(self.minor_format_version)?;
        writer.write_u32::<LittleEndian>(self.major_file_version)?;
        writer.write_u32::<LittleEndian>(self.minor_file_version)?;
        writer.write_u32::<LittleEndian>(self.constant_one)?;
        writer.write_u32::<LittleEndian>(self.creation_time)?;
        writer.write_u32::<LittleEndian>(self.update_time)?;
        writer.write_u32::<LittleEndian>(self.index_major_version)?;
        writer.write_u32::<LittleEndian>(self.index_count)?;
        writer.write_u32::<LittleEndian>(self.index_offset_short)?;
        writer.write_u32::<LittleEndian>(self.index_size)?;
        writer.write_u32::<LittleEndian>(self.hole_entry_count)?;
        writer.write_u32::<LittleEndian>(self.hole_offset)?;
        writer.write_u32::<LittleEndian>(self.hole_size)?;
        writer.write_u32::<LittleEndian>(self.constant_three)?;
        writer.write_u64::<LittleEndian>(self.index_offset_long)?;
        writer.write_all(&self.padding)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE);
        // Writing into a Vec never fails.
        let _ = self.write(&mut out);
        out
    }

    /// End of the bounds-checked index range, computed without overflow.
    pub fn index_end_short(&self) -> u64 {
        self.index_offset_short as u64 + self.index_size as u64
    }

    pub fn has_valid_signature(&self) -> bool {
        &self.signature == MAGIC
    }

    pub fn has_expected_version(&self) -> bool {
        self.major_format_version == EXPECTED_MAJOR_FORMAT_VERSION
            && self.minor_format_version == EXPECTED_MINOR_FORMAT_VERSION
    }

    pub fn has_expected_constants(&self) -> bool {
        self.constant_one == EXPECTED_CONSTANT_ONE && self.constant_three == EXPECTED_CONSTANT_THREE
    }
}
