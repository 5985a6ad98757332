//! DLT frame headers and the frame codec
//!
//! A frame on disk is: 4-byte storage magic, storage header, standard header,
//! optional extended header, payload. The storage header fields are little
//! endian while the standard and extended headers are big endian (MSB first);
//! the payload order is selected per frame by the standard header's MSBF bit.
//!
//! Reading assumes the caller has already consumed (and matched) the storage
//! magic, which is how the streaming parser determines the protocol version.
//! Writing emits the magic as part of the storage header, making
//! `write` the exact inverse of magic-scan + `read`.

use chrono::{DateTime, Utc};

use crate::config::DecoderConfig;
use crate::io::{BinaryReader, BinaryWriter, Endian};
use crate::payload::DltPayload;
use crate::types::{DltError, DltStorageVersion, MessageType, MessageTypeInfo, Result};

/// Capture-time metadata preceding every stored frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DltStorageHeader {
    /// Capture timestamp, seconds since the Unix epoch
    pub seconds: u32,
    /// Sub-second fraction of the capture timestamp
    pub microseconds: u32,
    /// ECU identifier, 4 ASCII characters packed big-endian into an integer
    pub ecu_id: u32,
}

impl DltStorageHeader {
    /// Serialized length excluding the 4-byte magic
    pub const LENGTH: usize = 12;

    pub fn read(reader: &mut impl BinaryReader) -> Result<Self> {
        // unlike every other header, the storage header is little endian
        reader.set_order(Endian::Little);
        let seconds = reader.read_u32()?;
        let microseconds = reader.read_u32()?;
        let ecu_id = reader.read_u32()?;
        Ok(Self {
            seconds,
            microseconds,
            ecu_id,
        })
    }

    pub fn write(&self, writer: &mut impl BinaryWriter) {
        writer.set_order(Endian::Big);
        writer.write_u32(DltStorageVersion::V1.magic());
        writer.set_order(Endian::Little);
        writer.write_u32(self.seconds);
        writer.write_u32(self.microseconds);
        writer.write_u32(self.ecu_id);
    }

    /// Capture timestamp as UTC wall-clock time
    pub fn timestamp(&self) -> DateTime<Utc> {
        let nanos = (u64::from(self.microseconds) * 1000).min(u64::from(u32::MAX)) as u32;
        DateTime::from_timestamp(i64::from(self.seconds), nanos).unwrap_or_default()
    }
}

/// Mandatory per-frame header carrying the length and optional-field flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DltStandardHeader {
    /// Header type bitfield, see the `UEH`/`MSBF`/`WEID`/`WSID`/`WTMS` bits
    pub htyp: u8,
    /// Message counter
    pub mcnt: u8,
    /// Total length of standard header + extended header + payload
    pub len: u16,
    /// Present iff `WEID` is set in `htyp`
    pub ecu_id: Option<u32>,
    /// Present iff `WSID` is set in `htyp`
    pub session_id: Option<u32>,
    /// Present iff `WTMS` is set in `htyp`
    pub timestamp: Option<u32>,
}

impl DltStandardHeader {
    /// Use extended header
    pub const UEH: u8 = 1 << 0;
    /// Most significant byte first (payload byte order)
    pub const MSBF: u8 = 1 << 1;
    /// With ECU id
    pub const WEID: u8 = 1 << 2;
    /// With session id
    pub const WSID: u8 = 1 << 3;
    /// With timestamp
    pub const WTMS: u8 = 1 << 4;

    pub fn read(reader: &mut impl BinaryReader) -> Result<Self> {
        // standard and extended headers are big endian (MSB first)
        reader.set_order(Endian::Big);
        let htyp = reader.read_u8()?;
        let mcnt = reader.read_u8()?;
        let len = reader.read_u16()?;
        let ecu_id = if htyp & Self::WEID != 0 {
            Some(reader.read_u32()?)
        } else {
            None
        };
        let session_id = if htyp & Self::WSID != 0 {
            Some(reader.read_u32()?)
        } else {
            None
        };
        let timestamp = if htyp & Self::WTMS != 0 {
            Some(reader.read_u32()?)
        } else {
            None
        };
        Ok(Self {
            htyp,
            mcnt,
            len,
            ecu_id,
            session_id,
            timestamp,
        })
    }

    pub fn write(&self, writer: &mut impl BinaryWriter) {
        writer.set_order(Endian::Big);
        writer.write_u8(self.htyp);
        writer.write_u8(self.mcnt);
        writer.write_u16(self.len);
        if let Some(ecu_id) = self.ecu_id {
            writer.write_u32(ecu_id);
        }
        if let Some(session_id) = self.session_id {
            writer.write_u32(session_id);
        }
        if let Some(timestamp) = self.timestamp {
            writer.write_u32(timestamp);
        }
    }

    pub fn use_extended_header(&self) -> bool {
        self.htyp & Self::UEH != 0
    }

    pub fn msb_first(&self) -> bool {
        self.htyp & Self::MSBF != 0
    }

    /// Protocol version from bits 5-7 of `htyp`
    pub fn version(&self) -> u8 {
        self.htyp >> 5
    }

    /// Serialized length: 4 fixed bytes plus 4 per present optional field
    pub fn total_length(&self) -> usize {
        let mut length = 4;
        if self.ecu_id.is_some() {
            length += 4;
        }
        if self.session_id.is_some() {
            length += 4;
        }
        if self.timestamp.is_some() {
            length += 4;
        }
        length
    }
}

/// Optional header carrying message classification and argument count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DltExtendedHeader {
    /// Message info bitfield: bit 0 verbose, bits 1-3 type, bits 4-7 sub-code
    pub msin: u8,
    /// Number of payload arguments (verbose mode only)
    pub noar: u8,
    /// Application id, packed ASCII
    pub apid: u32,
    /// Context id, packed ASCII
    pub ctid: u32,
}

impl DltExtendedHeader {
    pub const VERBOSE: u8 = 0b0001;
    pub const MSTP: u8 = 0b1110;
    pub const MTIN: u8 = 0xf0;

    /// Fixed serialized length
    pub const LENGTH: usize = 10;

    pub fn read(reader: &mut impl BinaryReader) -> Result<Self> {
        reader.set_order(Endian::Big);
        let msin = reader.read_u8()?;
        let noar = reader.read_u8()?;
        let apid = reader.read_u32()?;
        let ctid = reader.read_u32()?;
        Ok(Self {
            msin,
            noar,
            apid,
            ctid,
        })
    }

    pub fn write(&self, writer: &mut impl BinaryWriter) {
        writer.set_order(Endian::Big);
        writer.write_u8(self.msin);
        writer.write_u8(self.noar);
        writer.write_u32(self.apid);
        writer.write_u32(self.ctid);
    }

    pub fn is_verbose(&self) -> bool {
        self.msin & Self::VERBOSE != 0
    }

    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_value((self.msin & Self::MSTP) >> 1)
    }

    pub fn message_type_info(&self) -> MessageTypeInfo {
        MessageTypeInfo::from_message_type((self.msin & Self::MSTP) >> 1, (self.msin & Self::MTIN) >> 4)
    }
}

/// One complete DLT V1 frame, immutable once constructed
#[derive(Debug, Clone, PartialEq)]
pub struct DltMessageV1 {
    pub storage_header: DltStorageHeader,
    pub standard_header: DltStandardHeader,
    pub extended_header: Option<DltExtendedHeader>,
    pub payload: DltPayload,
}

impl DltMessageV1 {
    /// Decode one frame from the reader
    ///
    /// The caller must already have consumed the 4-byte storage magic and
    /// verified it announces V1. The payload length is derived from the
    /// standard header's `len`; a value shorter than the headers it covers is
    /// a [`DltError::MalformedHeader`], fatal to this frame only.
    pub fn read(reader: &mut impl BinaryReader, config: &DecoderConfig) -> Result<Self> {
        let storage_header = DltStorageHeader::read(reader)?;
        let standard_header = DltStandardHeader::read(reader)?;
        let extended_header = if standard_header.use_extended_header() {
            Some(DltExtendedHeader::read(reader)?)
        } else {
            None
        };
        let header_len = standard_header.total_length()
            + extended_header.map_or(0, |_| DltExtendedHeader::LENGTH);
        let payload_len = (standard_header.len as usize)
            .checked_sub(header_len)
            .ok_or_else(|| {
                DltError::MalformedHeader(format!(
                    "standard header len {} is shorter than the {} header bytes it covers",
                    standard_header.len, header_len
                ))
            })?;
        let payload = DltPayload::read(
            reader,
            payload_len,
            standard_header.msb_first(),
            extended_header,
            config,
        )?;
        Ok(Self {
            storage_header,
            standard_header,
            extended_header,
            payload,
        })
    }

    /// Encode the frame, including the storage magic
    pub fn write(&self, writer: &mut impl BinaryWriter) {
        self.storage_header.write(writer);
        self.standard_header.write(writer);
        if let Some(extended_header) = &self.extended_header {
            extended_header.write(writer);
        }
        self.payload.write(writer);
    }

    pub fn version(&self) -> DltStorageVersion {
        DltStorageVersion::V1
    }

    /// Message classification, when an extended header is present
    pub fn message_type_info(&self) -> Option<MessageTypeInfo> {
        self.extended_header.map(|h| h.message_type_info())
    }
}
