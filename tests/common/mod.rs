#![allow(dead_code)]

use ccvalid::{DirectoryFlags, ExtendedInfo, Header, IndexEntry, HEADER_SIZE};

/// Entry with key fields present exactly where `flags` wants them per entry.
/// The resource lies inside the payload area that `package` lays down.
pub fn entry(n: u32, flags: DirectoryFlags, extended: bool) -> IndexEntry {
    IndexEntry {
        type_id:           (!flags.constant_type).then_some(0x0333_406C),
        group_id:          (!flags.constant_group).then_some(n),
        instance_hi:       (!flags.constant_instance).then_some(0xA000_0000 | n),
        instance_lo:       0x1000 + n,
        resource_offset:   HEADER_SIZE as u32 + n,
        compressed_size:   4,
        uncompressed_size: 16,
        extended:          extended.then_some(ExtendedInfo { compression_type: 0x5A42, committed: 1 }),
    }
}

/// Header | `payload_len` bytes of payload | flags word | entries.
/// Both index offsets point at the flags word.
pub fn package(flags: u32, entries: &[IndexEntry], payload_len: usize) -> (Header, Vec<u8>) {
    let flags = DirectoryFlags::from_raw(flags);
    let index_offset = HEADER_SIZE + payload_len;

    let mut dir = Vec::new();
    flags.write(&mut dir).unwrap();
    for e in entries {
        e.write(&mut dir, flags).unwrap();
    }

    let header = Header {
        index_count:        entries.len() as u32,
        index_offset_short: index_offset as u32,
        index_size:         dir.len() as u32,
        index_offset_long:  index_offset as u64,
        ..Header::default()
    };

    let mut bytes = header.to_bytes();
    bytes.extend((0..payload_len).map(|i| i as u8));
    bytes.extend(dir);
    (header, bytes)
}

/// A small package that passes every check.
pub fn valid_package() -> Vec<u8> {
    let flags = DirectoryFlags::from_raw(0b001);
    let entries: Vec<_> = (0..3).map(|n| entry(n, flags, n == 1)).collect();
    package(flags.raw, &entries, 64).1
}
