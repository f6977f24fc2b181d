//! Directory ("index") records: the flags word and the entries that follow it.
//!
//! The directory starts at `Header::index_offset_long` with one u32 flags
//! word. Each set bit removes one field from *every* entry:
//!
//! | Bit | Mask | Field omitted per entry |
//! |-----|------|-------------------------|
//! | 0   | 0x1  | `type_id`               |
//! | 1   | 0x2  | `group_id`              |
//! | 2   | 0x4  | `instance_hi`           |
//!
//! Entries follow the flags word back-to-back. Field presence is fixed for
//! the whole directory, but the byte cursor is cumulative, so an entry can
//! only be decoded after every entry before it.
//!
//! ```text
//! [type_id u32]?  [group_id u32]?  [instance_hi u32]?
//! instance_lo u32
//! resource_offset u32
//! packed u32        bit 31 = extended, bits 0..30 = compressed size
//! uncompressed_size u32
//! [compression_type u16  committed u16]?   only when extended
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use std::io::{self, Read, Write};

use crate::io_stream::FormatError;

pub const FLAG_CONSTANT_TYPE:     u32 = 0x1;
pub const FLAG_CONSTANT_GROUP:    u32 = 0x2;
pub const FLAG_CONSTANT_INSTANCE: u32 = 0x4;

/// Size of the directory flags word.
pub const FLAGS_SIZE: usize = 4;
/// Bytes every entry carries regardless of flags.
pub const FIXED_ENTRY_SIZE: usize = 16;
/// Trailing bytes of an extended entry.
pub const EXTENDED_SIZE: usize = 4;

const EXTENDED_BIT:         u32 = 0x8000_0000;
const COMPRESSED_SIZE_MASK: u32 = 0x7FFF_FFFF;

// ── DirectoryFlags ────────────────────────────────────────────────────────────

/// Directory-wide field presence, derived once from the flags word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DirectoryFlags {
    pub raw:               u32,
    pub constant_type:     bool,
    pub constant_group:    bool,
    pub constant_instance: bool,
}

impl DirectoryFlags {
    pub fn from_raw(raw: u32) -> Self {
        Self {
            raw,
            constant_type:     raw & FLAG_CONSTANT_TYPE != 0,
            constant_group:    raw & FLAG_CONSTANT_GROUP != 0,
            constant_instance: raw & FLAG_CONSTANT_INSTANCE != 0,
        }
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self, FormatError> {
        let raw = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| FormatError::field(e, "directory flags"))?;
        Ok(Self::from_raw(raw))
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.raw)
    }

    /// Bytes of optional key fields each entry carries: 0, 4, 8 or 12.
    pub fn optional_bytes(&self) -> usize {
        [self.constant_type, self.constant_group, self.constant_instance]
            .iter()
            .filter(|constant| !**constant)
            .count()
            * 4
    }

    /// On-disk size of one entry with or without the extended trailer.
    pub fn entry_size(&self, extended: bool) -> usize {
        self.optional_bytes() + FIXED_ENTRY_SIZE + if extended { EXTENDED_SIZE } else { 0 }
    }
}

// ── IndexEntry ────────────────────────────────────────────────────────────────

/// Trailing fields present only on extended entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtendedInfo {
    pub compression_type: u16,
    pub committed:        u16,
}

/// One directory record. Key fields the flags mark constant are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub type_id:           Option<u32>,
    pub group_id:          Option<u32>,
    pub instance_hi:       Option<u32>,
    pub instance_lo:       u32,
    pub resource_offset:   u32,
    /// Low 31 bits of the packed size word.
    pub compressed_size:   u32,
    pub uncompressed_size: u32,
    pub extended:          Option<ExtendedInfo>,
}

impl IndexEntry {
    pub fn read<R: Read>(mut reader: R, flags: DirectoryFlags) -> Result<Self, FormatError> {
        let mut u32_field = |what: &'static str| {
            reader.read_u32::<LittleEndian>().map_err(|e| FormatError::field(e, what))
        };

        let type_id     = if flags.constant_type { None } else { Some(u32_field("type")?) };
        let group_id    = if flags.constant_group { None } else { Some(u32_field("group")?) };
        let instance_hi = if flags.constant_instance { None } else { Some(u32_field("instance high")?) };
        let instance_lo       = u32_field("instance low")?;
        let resource_offset   = u32_field("resource offset")?;
        let packed            = u32_field("compressed size")?;
        let uncompressed_size = u32_field("uncompressed size")?;

        let extended = if packed & EXTENDED_BIT != 0 {
            let compression_type = reader
                .read_u16::<LittleEndian>()
                .map_err(|e| FormatError::field(e, "compression type"))?;
            let committed = reader
                .read_u16::<LittleEndian>()
                .map_err(|e| FormatError::field(e, "committed"))?;
            Some(ExtendedInfo { compression_type, committed })
        } else {
            None
        };

        Ok(Self {
            type_id,
            group_id,
            instance_hi,
            instance_lo,
            resource_offset,
            compressed_size: packed & COMPRESSED_SIZE_MASK,
            uncompressed_size,
            extended,
        })
    }

    /// Encode the entry as it would appear under `flags`.
    ///
    /// Key fields are written iff the flags mark them per-entry; a `None`
    /// in a per-entry slot is written as zero.
    pub fn write<W: Write>(&self, mut writer: W, flags: DirectoryFlags) -> io::Result<()> {
        if !flags.constant_type {
            writer.write_u32::<LittleEndian>(self.type_id.unwrap_or(0))?;
        }
        if !flags.constant_group {
            writer.write_u32::<LittleEndian>(self.group_id.unwrap_or(0))?;
        }
        if !flags.constant_instance {
            writer.write_u32::<LittleEndian>(self.instance_hi.unwrap_or(0))?;
        }
        writer.write_u32::<LittleEndian>(self.instance_lo)?;
        writer.write_u32::<LittleEndian>(self.resource_offset)?;
        writer.write_u32::<LittleEndian>(self.packed_size())?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        if let Some(ext) = self.extended {
            writer.write_u16::<LittleEndian>(ext.compression_type)?;
            writer.write_u16::<LittleEndian>(ext.committed)?;
        }
        Ok(())
    }

    /// The packed on-disk size word: extended bit plus 31-bit compressed size.
    pub fn packed_size(&self) -> u32 {
        let bit = if self.extended.is_some() { EXTENDED_BIT } else { 0 };
        (self.compressed_size & COMPRESSED_SIZE_MASK) | bit
    }

    pub fn is_extended(&self) -> bool {
        self.extended.is_some()
    }

    /// First byte past this entry's stored payload.
    pub fn resource_end(&self) -> u64 {
        self.resource_offset as u64 + self.compressed_size as u64
    }

    /// 64-bit instance id when the high half was stored per entry.
    pub fn instance(&self) -> Option<u64> {
        self.instance_hi.map(|hi| (hi as u64) << 32 | self.instance_lo as u64)
    }
}
