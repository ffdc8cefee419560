//! Property tests for the byte-level building blocks.

use proptest::prelude::*;

use qnms::format::boib::{Endian, MemoryBuffer, SliceBuffer};
use qnms::format::chunk::{begin_block, end_block, read_string, write_string, BlockReader};
use qnms::format::compression::{compress, decompress};

fn written_on(host: Endian, values: (u8, u16, u32, u64, i16, i32, i64, bool)) -> Vec<u8> {
    let mut buf = MemoryBuffer::memory().with_host_endian(host);
    buf.write(values.0);
    buf.write(values.1);
    buf.write(values.2);
    buf.write(values.3);
    buf.write(values.4);
    buf.write(values.5);
    buf.write(values.6);
    buf.write(values.7);
    buf.into_bytes()
}

fn read_on(host: Endian, bytes: &[u8]) -> (u8, u16, u32, u64, i16, i32, i64, bool) {
    let mut buf = SliceBuffer::reader(bytes).with_host_endian(host);
    (
        buf.get(),
        buf.get(),
        buf.get(),
        buf.get(),
        buf.get(),
        buf.get(),
        buf.get(),
        buf.get(),
    )
}

proptest! {
    #[test]
    fn boib_values_survive_any_host_order(
        values in (any::<u8>(), any::<u16>(), any::<u32>(), any::<u64>(),
                   any::<i16>(), any::<i32>(), any::<i64>(), any::<bool>())
    ) {
        let little = written_on(Endian::Little, values);
        let big = written_on(Endian::Big, values);
        prop_assert_eq!(&little, &big);
        prop_assert_eq!(little.len(), 1 + 2 + 4 + 8 + 2 + 4 + 8 + 1);
        prop_assert_eq!(read_on(Endian::Little, &big), values);
        prop_assert_eq!(read_on(Endian::Big, &little), values);
    }

    #[test]
    fn compression_is_lossless(data in proptest::collection::vec(any::<u8>(), 0..4096), level in 1u8..=9) {
        let packed = compress(&data, level).unwrap();
        prop_assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn level_zero_is_identity(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        prop_assert_eq!(compress(&data, 0).unwrap(), data);
    }

    #[test]
    fn unknown_trailing_fields_are_skipped(
        name in "[a-z]{0,24}",
        extra in proptest::collection::vec(any::<u8>(), 0..64),
        next in any::<u32>(),
    ) {
        let mut buf = MemoryBuffer::memory();
        let at = begin_block(&mut buf);
        write_string(&mut buf, &name);
        buf.write_bytes(&extra);
        end_block(&mut buf, at);
        buf.write(next);
        let bytes = buf.into_bytes();

        let mut r = SliceBuffer::reader(&bytes);
        let block = BlockReader::open(&mut r).unwrap();
        prop_assert_eq!(read_string(&mut r).unwrap(), name);
        prop_assert_eq!(block.finish(&mut r).unwrap(), extra.len() as u64);
        prop_assert_eq!(r.read_u32(), next);
        prop_assert_eq!(r.remaining(), 0);
    }
}

#[test]
fn empty_input_compresses_to_empty() {
    for level in 0..=9 {
        assert!(compress(&[], level).unwrap().is_empty());
    }
    assert!(decompress(&[]).unwrap().is_empty());
}

#[test]
fn big_endian_host_writes_little_endian_bytes() {
    let mut buf = MemoryBuffer::memory().with_host_endian(Endian::Big);
    buf.write(0x0102_0304u32);
    assert_eq!(buf.into_bytes(), vec![0x04, 0x03, 0x02, 0x01]);
}
