//! Byte-oriented binary I/O abstraction
//!
//! DLT deliberately mixes big- and little-endian fields within one frame, so
//! the byte order of a reader/writer is mutable per-call-site state rather
//! than fixed at construction. Scalar access goes through the `byteorder`
//! slice codecs, dispatched on the currently selected [`Endian`].
//!
//! Reading past the end of the underlying data fails with
//! [`crate::DltError::UnexpectedEndOfData`] - the single most important
//! failure signal the upper decoding layers react to.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::types::Result;

pub mod buffer;
pub mod windowed;

pub use buffer::{BufferReader, BufferWriter};
pub use windowed::WindowedFileReader;

/// Byte order for multi-byte scalar access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Big,
    Little,
}

/// Order-switchable scalar/array reads over a finite byte source, with
/// position tracking and mark/reset
pub trait BinaryReader {
    /// Select the byte order used by subsequent multi-byte reads
    fn set_order(&mut self, order: Endian);

    /// The currently selected byte order
    fn order(&self) -> Endian;

    /// True while at least one more byte can be read
    fn has_remaining(&mut self) -> bool;

    /// Absolute position of the cursor in bytes
    fn position(&self) -> u64;

    /// Fill `buf` completely or fail without a partial read
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Remember the current position for a later [`Self::reset`]
    fn mark(&mut self);

    /// Restore the cursor to the last mark; without a prior mark this is a no-op
    fn reset(&mut self) -> Result<()>;

    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(match self.order() {
            Endian::Big => BigEndian::read_u16(&buf),
            Endian::Little => LittleEndian::read_u16(&buf),
        })
    }

    fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(match self.order() {
            Endian::Big => BigEndian::read_u32(&buf),
            Endian::Little => LittleEndian::read_u32(&buf),
        })
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(match self.order() {
            Endian::Big => BigEndian::read_u64(&buf),
            Endian::Little => LittleEndian::read_u64(&buf),
        })
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Read exactly `len` bytes into a fresh buffer
    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut data = vec![0u8; len];
        self.read_exact(&mut data)?;
        Ok(data)
    }
}

/// Order-switchable scalar/array writes into a byte sink
pub trait BinaryWriter {
    /// Select the byte order used by subsequent multi-byte writes
    fn set_order(&mut self, order: Endian);

    /// The currently selected byte order
    fn order(&self) -> Endian;

    /// Append raw bytes
    fn write_bytes(&mut self, data: &[u8]);

    fn write_u8(&mut self, value: u8) {
        self.write_bytes(&[value]);
    }

    fn write_i8(&mut self, value: i8) {
        self.write_u8(value as u8);
    }

    fn write_u16(&mut self, value: u16) {
        let mut buf = [0u8; 2];
        match self.order() {
            Endian::Big => BigEndian::write_u16(&mut buf, value),
            Endian::Little => LittleEndian::write_u16(&mut buf, value),
        }
        self.write_bytes(&buf);
    }

    fn write_i16(&mut self, value: i16) {
        self.write_u16(value as u16);
    }

    fn write_u32(&mut self, value: u32) {
        let mut buf = [0u8; 4];
        match self.order() {
            Endian::Big => BigEndian::write_u32(&mut buf, value),
            Endian::Little => LittleEndian::write_u32(&mut buf, value),
        }
        self.write_bytes(&buf);
    }

    fn write_i32(&mut self, value: i32) {
        self.write_u32(value as u32);
    }

    fn write_u64(&mut self, value: u64) {
        let mut buf = [0u8; 8];
        match self.order() {
            Endian::Big => BigEndian::write_u64(&mut buf, value),
            Endian::Little => LittleEndian::write_u64(&mut buf, value),
        }
        self.write_bytes(&buf);
    }

    fn write_i64(&mut self, value: i64) {
        self.write_u64(value as u64);
    }
}
