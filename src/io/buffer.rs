//! In-memory reader and writer over a byte buffer

use crate::io::{BinaryReader, BinaryWriter, Endian};
use crate::types::{DltError, Result};

/// [`BinaryReader`] over an owned in-memory buffer
#[derive(Debug, Clone)]
pub struct BufferReader {
    data: Vec<u8>,
    pos: usize,
    order: Endian,
    marked: Option<usize>,
}

impl BufferReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            order: Endian::Big,
            marked: None,
        }
    }

    /// Copy a slice into a fresh reader
    pub fn wrap(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }

    /// Bytes left between the cursor and the end of the buffer
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl BinaryReader for BufferReader {
    fn set_order(&mut self, order: Endian) {
        self.order = order;
    }

    fn order(&self) -> Endian {
        self.order
    }

    fn has_remaining(&mut self) -> bool {
        self.pos < self.data.len()
    }

    fn position(&self) -> u64 {
        self.pos as u64
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let end = self.pos + buf.len();
        if end > self.data.len() {
            return Err(DltError::UnexpectedEndOfData {
                position: self.pos as u64,
            });
        }
        buf.copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(())
    }

    fn mark(&mut self) {
        self.marked = Some(self.pos);
    }

    fn reset(&mut self) -> Result<()> {
        if let Some(marked) = self.marked.take() {
            self.pos = marked;
        }
        Ok(())
    }
}

/// [`BinaryWriter`] into a growable byte buffer
#[derive(Debug, Default)]
pub struct BufferWriter {
    data: Vec<u8>,
    order: Endian,
}

impl BufferWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl BinaryWriter for BufferWriter {
    fn set_order(&mut self, order: Endian) {
        self.order = order;
    }

    fn order(&self) -> Endian {
        self.order
    }

    fn write_bytes(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 0x00, 0x01, 0x02, ... like the byte patterns in the format notes
    fn sequenced(len: usize) -> Vec<u8> {
        (0..len).map(|i| i as u8).collect()
    }

    #[test]
    fn test_read_bytes_ignores_order() {
        for order in [Endian::Big, Endian::Little] {
            let mut reader = BufferReader::new(sequenced(4));
            reader.set_order(order);
            assert!(reader.has_remaining());
            assert_eq!(reader.position(), 0);
            assert_eq!(reader.read_u8().unwrap(), 0x00);
            assert_eq!(reader.read_u8().unwrap(), 0x01);
            assert_eq!(reader.read_u8().unwrap(), 0x02);
            assert_eq!(reader.read_u8().unwrap(), 0x03);
            assert!(!reader.has_remaining());
            assert!(matches!(
                reader.read_u8(),
                Err(DltError::UnexpectedEndOfData { position: 4 })
            ));
        }
    }

    #[test]
    fn test_read_u16_both_orders() {
        let mut reader = BufferReader::new(sequenced(4));
        reader.set_order(Endian::Big);
        assert_eq!(reader.read_u16().unwrap(), 0x0001);
        assert_eq!(reader.position(), 2);
        assert_eq!(reader.read_u16().unwrap(), 0x0203);
        assert!(!reader.has_remaining());

        let mut reader = BufferReader::new(sequenced(4));
        reader.set_order(Endian::Little);
        assert_eq!(reader.read_u16().unwrap(), 0x0100);
        assert_eq!(reader.read_u16().unwrap(), 0x0302);
    }

    #[test]
    fn test_read_u32_both_orders() {
        let mut reader = BufferReader::new(sequenced(8));
        reader.set_order(Endian::Big);
        assert_eq!(reader.read_u32().unwrap(), 0x00010203);
        assert_eq!(reader.position(), 4);
        assert_eq!(reader.read_u32().unwrap(), 0x04050607);

        let mut reader = BufferReader::new(sequenced(8));
        reader.set_order(Endian::Little);
        assert_eq!(reader.read_u32().unwrap(), 0x03020100);
        assert_eq!(reader.read_u32().unwrap(), 0x07060504);
    }

    #[test]
    fn test_read_u64_both_orders() {
        let mut reader = BufferReader::new(sequenced(16));
        reader.set_order(Endian::Big);
        assert_eq!(reader.read_u64().unwrap(), 0x0001020304050607);
        assert_eq!(reader.read_u64().unwrap(), 0x08090a0b0c0d0e0f);

        let mut reader = BufferReader::new(sequenced(16));
        reader.set_order(Endian::Little);
        assert_eq!(reader.read_u64().unwrap(), 0x0706050403020100);
        assert_eq!(reader.read_u64().unwrap(), 0x0f0e0d0c0b0a0908);
    }

    #[test]
    fn test_order_switch_mid_stream() {
        let mut reader = BufferReader::new(sequenced(8));
        reader.set_order(Endian::Big);
        assert_eq!(reader.read_u32().unwrap(), 0x00010203);
        reader.set_order(Endian::Little);
        assert_eq!(reader.read_u32().unwrap(), 0x07060504);
    }

    #[test]
    fn test_read_array() {
        let mut reader = BufferReader::new(sequenced(64));
        assert_eq!(reader.read_bytes(32).unwrap(), sequenced(32));
        assert_eq!(reader.position(), 32);
        assert_eq!(reader.read_bytes(16).unwrap(), (32..48u8).collect::<Vec<_>>());
        assert_eq!(reader.read_bytes(16).unwrap(), (48..64u8).collect::<Vec<_>>());
        assert!(reader.read_bytes(1).is_err());
    }

    #[test]
    fn test_mark_and_reset() {
        let mut reader = BufferReader::new(sequenced(8));
        assert_eq!(reader.read_u8().unwrap(), 0x00);
        reader.mark();
        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_u8().unwrap(), 0x02);
        reader.reset().unwrap();
        assert_eq!(reader.position(), 1);
        assert_eq!(reader.read_u8().unwrap(), 0x01);
    }

    #[test]
    fn test_reset_without_mark_is_noop() {
        let mut reader = BufferReader::new(sequenced(4));
        assert_eq!(reader.read_u8().unwrap(), 0x00);
        reader.reset().unwrap();
        assert_eq!(reader.position(), 1);
    }

    #[test]
    fn test_write_scalars_big_endian() {
        let mut writer = BufferWriter::new();
        writer.set_order(Endian::Big);
        writer.write_u8(0xab);
        writer.write_u16(0x0102);
        writer.write_u32(0x00010203);
        writer.write_u64(0x0001020304050607);
        assert_eq!(
            writer.as_bytes(),
            &[
                0xab, 0x01, 0x02, 0x00, 0x01, 0x02, 0x03, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05,
                0x06, 0x07
            ]
        );
    }

    #[test]
    fn test_write_scalars_little_endian() {
        let mut writer = BufferWriter::new();
        writer.set_order(Endian::Little);
        writer.write_u16(0x0102);
        writer.write_u32(0x00010203);
        assert_eq!(writer.as_bytes(), &[0x02, 0x01, 0x03, 0x02, 0x01, 0x00]);
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let mut writer = BufferWriter::new();
        writer.set_order(Endian::Big);
        writer.write_i32(-12345);
        writer.set_order(Endian::Little);
        writer.write_i64(-98765);
        writer.write_bytes(b"tail");

        let mut reader = BufferReader::new(writer.into_bytes());
        reader.set_order(Endian::Big);
        assert_eq!(reader.read_i32().unwrap(), -12345);
        reader.set_order(Endian::Little);
        assert_eq!(reader.read_i64().unwrap(), -98765);
        assert_eq!(reader.read_bytes(4).unwrap(), b"tail");
        assert!(!reader.has_remaining());
    }
}
