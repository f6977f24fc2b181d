use ccvalid::validator::validate_stream;
use ccvalid::{DirectoryFlags, ExtendedInfo, Header, IndexEntry, PackageReader, HEADER_SIZE};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::io::Cursor;

fn build(flags: DirectoryFlags, count: u32) -> (Header, Vec<u8>) {
    let mut dir = Vec::new();
    flags.write(&mut dir).unwrap();
    for n in 0..count {
        let entry = IndexEntry {
            type_id:           (!flags.constant_type).then_some(0x0333_406C),
            group_id:          (!flags.constant_group).then_some(0),
            instance_hi:       (!flags.constant_instance).then_some(n),
            instance_lo:       n,
            resource_offset:   0,
            compressed_size:   HEADER_SIZE as u32,
            uncompressed_size: 1024,
            extended:          (n % 2 == 0).then_some(ExtendedInfo { compression_type: 0x5A42, committed: 1 }),
        };
        entry.write(&mut dir, flags).unwrap();
    }
    let header = Header {
        index_count:        count,
        index_offset_short: HEADER_SIZE as u32,
        index_size:         dir.len() as u32,
        index_offset_long:  HEADER_SIZE as u64,
        ..Header::default()
    };
    let mut bytes = header.to_bytes();
    bytes.extend(dir);
    (header, bytes)
}

fn bench_decode_directory(c: &mut Criterion) {
    for raw in [0b000u32, 0b111] {
        let (header, bytes) = build(DirectoryFlags::from_raw(raw), 10_000);
        c.bench_function(&format!("decode_10k_entries_flags_{raw:03b}"), |b| {
            b.iter(|| {
                let mut reader = PackageReader::new(Cursor::new(black_box(&bytes)));
                reader.read_entries(&header).unwrap()
            })
        });
    }
}

fn bench_validate(c: &mut Criterion) {
    let (_, bytes) = build(DirectoryFlags::from_raw(0b001), 10_000);

    c.bench_function("validate_10k_entries", |b| {
        b.iter(|| validate_stream(Cursor::new(black_box(&bytes)), bytes.len() as u64).unwrap())
    });
}

criterion_group!(benches, bench_decode_directory, bench_validate);
criterion_main!(benches);
