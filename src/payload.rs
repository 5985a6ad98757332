//! Payload decoding: non-verbose messages and verbose typed arguments
//!
//! A verbose payload is a sequence of self-describing arguments, each led by
//! a 4-byte type-info word. The type-info word is always read little endian,
//! independent of the byte order the standard header declares for the
//! payload data. That asymmetry is an observed protocol quirk and is
//! preserved verbatim here.
//!
//! A non-verbose payload is a 4-byte message id followed by opaque text. The
//! format does not specify or validate a charset for that text; it is
//! rendered as lossy UTF-8, an intentionally under-specified legacy behavior.

use std::cell::OnceCell;
use std::fmt;

use crate::config::DecoderConfig;
use crate::headers::DltExtendedHeader;
use crate::io::{BinaryReader, BinaryWriter, BufferReader, Endian};
use crate::types::{DltError, Result};

pub const TYPEINFO_BOOL: u32 = 0x10;
pub const TYPEINFO_SINT: u32 = 0x20;
pub const TYPEINFO_UINT: u32 = 0x40;
pub const TYPEINFO_FLOA: u32 = 0x80;
pub const TYPEINFO_ARAY: u32 = 0x100;
pub const TYPEINFO_STRG: u32 = 0x200;
pub const TYPEINFO_RAWD: u32 = 0x400;
pub const TYPEINFO_VARI: u32 = 0x800;
pub const TYPEINFO_FIXP: u32 = 0x1000;
pub const TYPEINFO_TRAI: u32 = 0x2000;
pub const TYPEINFO_STRU: u32 = 0x4000;

/// Length-class bits: 1 -> 1 byte, 2 -> 2, 3 -> 4, 4 -> 8, 5 -> 16
pub const TYPEINFO_MASK_TYLE: u32 = 0x7;
/// String encoding selector: 0 ASCII, 1 UTF-8
pub const TYPEINFO_MASK_SCOD: u32 = 0x38000;

/// Raw payload bytes of one frame plus everything needed to decode them
///
/// The decoded display text is computed on first access and cached. The
/// cache is deliberately single-threaded (`OnceCell`), matching the
/// one-consumer ownership model of the parser.
#[derive(Debug, Clone)]
pub struct DltPayload {
    data: Vec<u8>,
    order: Endian,
    extended_header: Option<DltExtendedHeader>,
    strict_arguments: bool,
    text: OnceCell<String>,
}

impl PartialEq for DltPayload {
    fn eq(&self, other: &Self) -> bool {
        // the memoized text is derived state and excluded from equality
        self.data == other.data
            && self.order == other.order
            && self.extended_header == other.extended_header
    }
}

impl DltPayload {
    pub fn new(
        data: Vec<u8>,
        msb_first: bool,
        extended_header: Option<DltExtendedHeader>,
        config: &DecoderConfig,
    ) -> Self {
        Self {
            data,
            order: if msb_first { Endian::Big } else { Endian::Little },
            extended_header,
            strict_arguments: config.strict_arguments,
            text: OnceCell::new(),
        }
    }

    /// Consume `len` payload bytes from the reader
    pub fn read(
        reader: &mut impl BinaryReader,
        len: usize,
        msb_first: bool,
        extended_header: Option<DltExtendedHeader>,
        config: &DecoderConfig,
    ) -> Result<Self> {
        let data = reader.read_bytes(len)?;
        Ok(Self::new(data, msb_first, extended_header, config))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Byte order used for payload data, from the standard header's MSBF bit
    pub fn order(&self) -> Endian {
        self.order
    }

    pub fn is_verbose(&self) -> bool {
        self.extended_header.map_or(false, |h| h.is_verbose())
    }

    pub fn write(&self, writer: &mut impl BinaryWriter) {
        writer.set_order(self.order);
        writer.write_bytes(&self.data);
    }

    /// Decoded display text, computed on first access and memoized
    ///
    /// For verbose payloads this is the arguments rendered as
    /// `"name = value"` segments joined by spaces (the name part omitted for
    /// unnamed arguments); for non-verbose payloads the opaque message text.
    pub fn message(&self) -> Result<&str> {
        if let Some(text) = self.text.get() {
            return Ok(text);
        }
        let decoded = self.decode_text()?;
        Ok(self.text.get_or_init(|| decoded))
    }

    /// Decode the verbose argument sequence
    ///
    /// Returns an empty vector for non-verbose payloads. Unlike
    /// [`Self::message`], the result is not cached.
    pub fn arguments(&self) -> Result<Vec<PayloadArgument>> {
        let Some(extended_header) = self.verbose_header() else {
            return Ok(Vec::new());
        };
        let mut reader = BufferReader::wrap(&self.data);
        reader.set_order(self.order);
        let mut arguments = Vec::with_capacity(extended_header.noar as usize);
        for _ in 0..extended_header.noar {
            arguments.push(PayloadArgument::read(
                &mut reader,
                self.order,
                self.strict_arguments,
            )?);
        }
        Ok(arguments)
    }

    fn verbose_header(&self) -> Option<DltExtendedHeader> {
        self.extended_header.filter(|h| h.is_verbose())
    }

    fn decode_text(&self) -> Result<String> {
        match self.verbose_header() {
            None => {
                let mut reader = BufferReader::wrap(&self.data);
                reader.set_order(self.order);
                reader.read_u32()?; // message id
                let rest = reader.read_bytes(self.data.len() - 4)?;
                Ok(String::from_utf8_lossy(&rest).into_owned())
            }
            Some(_) => {
                let arguments = self.arguments()?;
                let segments: Vec<String> =
                    arguments.iter().map(PayloadArgument::to_string).collect();
                Ok(segments.join(" "))
            }
        }
    }
}

/// Value of one decoded verbose argument
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentValue {
    Bool(bool),
    Signed(i64),
    Unsigned(u64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Raw(Vec<u8>),
}

impl fmt::Display for ArgumentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentValue::Bool(v) => write!(f, "{}", v),
            ArgumentValue::Signed(v) => write!(f, "{}", v),
            ArgumentValue::Unsigned(v) => write!(f, "{}", v),
            ArgumentValue::Float32(v) => write!(f, "{}", v),
            ArgumentValue::Float64(v) => write!(f, "{}", v),
            ArgumentValue::Text(s) => f.write_str(s),
            ArgumentValue::Raw(bytes) => {
                for (i, byte) in bytes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

/// One self-describing verbose argument
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadArgument {
    pub value: ArgumentValue,
    /// Variable name, present when the VARI bit is set in the type info
    pub name: Option<String>,
    total_length: usize,
}

enum ArgumentKind {
    Bool,
    Signed,
    Unsigned,
    Float,
    Text,
    Raw,
}

impl PayloadArgument {
    /// Serialized length in bytes, including the type-info word and the
    /// optional name, so a sequence of arguments can be consumed without
    /// external bookkeeping
    pub fn total_length(&self) -> usize {
        self.total_length
    }

    /// Decode one argument
    ///
    /// `order` is the payload byte order used for the argument data; the
    /// type-info word itself is always little endian.
    pub fn read(reader: &mut impl BinaryReader, order: Endian, strict: bool) -> Result<Self> {
        let start = reader.position();

        reader.set_order(Endian::Little);
        let type_info = reader.read_u32()?;
        reader.set_order(order);

        if type_info & TYPEINFO_FIXP != 0 {
            return Err(DltError::UnsupportedArgumentEncoding(
                "fixed-point arguments are not supported".into(),
            ));
        }

        let kind = primary_type(type_info)?;
        let name = read_variable_name(reader, type_info)?;
        let value = match kind {
            ArgumentKind::Bool => decode_bool(reader, type_info, strict)?,
            ArgumentKind::Signed => decode_signed(reader, type_info)?,
            ArgumentKind::Unsigned => decode_unsigned(reader, type_info)?,
            ArgumentKind::Float => decode_float(reader, type_info)?,
            ArgumentKind::Text => decode_string(reader, type_info)?,
            ArgumentKind::Raw => decode_raw(reader)?,
        };

        let total_length = (reader.position() - start) as usize;
        Ok(Self {
            value,
            name,
            total_length,
        })
    }
}

impl fmt::Display for PayloadArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{} = ", name)?;
        }
        write!(f, "{}", self.value)
    }
}

fn primary_type(type_info: u32) -> Result<ArgumentKind> {
    if type_info & TYPEINFO_BOOL != 0 {
        Ok(ArgumentKind::Bool)
    } else if type_info & TYPEINFO_SINT != 0 {
        Ok(ArgumentKind::Signed)
    } else if type_info & TYPEINFO_UINT != 0 {
        Ok(ArgumentKind::Unsigned)
    } else if type_info & TYPEINFO_FLOA != 0 {
        Ok(ArgumentKind::Float)
    } else if type_info & TYPEINFO_ARAY != 0 {
        Err(DltError::UnsupportedArgumentEncoding(
            "array arguments are not supported".into(),
        ))
    } else if type_info & TYPEINFO_STRG != 0 {
        Ok(ArgumentKind::Text)
    } else if type_info & TYPEINFO_RAWD != 0 {
        Ok(ArgumentKind::Raw)
    } else if type_info & TYPEINFO_TRAI != 0 {
        Err(DltError::UnsupportedArgumentEncoding(
            "trace info arguments are not supported".into(),
        ))
    } else if type_info & TYPEINFO_STRU != 0 {
        Err(DltError::UnsupportedArgumentEncoding(
            "struct arguments are not supported".into(),
        ))
    } else {
        Err(DltError::UnsupportedArgumentEncoding(format!(
            "no decodable argument type in type info 0x{:08x}",
            type_info
        )))
    }
}

fn read_variable_name(reader: &mut impl BinaryReader, type_info: u32) -> Result<Option<String>> {
    if type_info & TYPEINFO_VARI == 0 {
        return Ok(None);
    }
    // the stored length includes a trailing null; zero means an empty name
    let len = reader.read_u16()? as usize;
    if len == 0 {
        return Ok(Some(String::new()));
    }
    let bytes = reader.read_bytes(len)?;
    Ok(Some(String::from_utf8_lossy(&bytes[..len - 1]).into_owned()))
}

fn length_class_bytes(type_info: u32) -> Result<usize> {
    match type_info & TYPEINFO_MASK_TYLE {
        1 => Ok(1),
        2 => Ok(2),
        3 => Ok(4),
        4 => Ok(8),
        5 => Ok(16),
        other => Err(DltError::UnsupportedArgumentEncoding(format!(
            "invalid length class {}",
            other
        ))),
    }
}

fn decode_bool(reader: &mut impl BinaryReader, type_info: u32, strict: bool) -> Result<ArgumentValue> {
    let length_class = type_info & TYPEINFO_MASK_TYLE;
    if length_class != 1 {
        if strict {
            return Err(DltError::UnsupportedArgumentEncoding(format!(
                "unexpected length class {} for bool argument",
                length_class
            )));
        }
        log::warn!(
            "bool argument with length class {}, reading a single byte",
            length_class
        );
    }
    Ok(ArgumentValue::Bool(reader.read_u8()? != 0))
}

fn decode_signed(reader: &mut impl BinaryReader, type_info: u32) -> Result<ArgumentValue> {
    let value = match length_class_bytes(type_info)? {
        2 => i64::from(reader.read_i16()?),
        4 => i64::from(reader.read_i32()?),
        8 => reader.read_i64()?,
        width => {
            return Err(DltError::UnsupportedArgumentEncoding(format!(
                "unsupported signed integer width {}",
                width
            )))
        }
    };
    Ok(ArgumentValue::Signed(value))
}

fn decode_unsigned(reader: &mut impl BinaryReader, type_info: u32) -> Result<ArgumentValue> {
    let value = match length_class_bytes(type_info)? {
        2 => u64::from(reader.read_u16()?),
        4 => u64::from(reader.read_u32()?),
        8 => reader.read_u64()?,
        width => {
            return Err(DltError::UnsupportedArgumentEncoding(format!(
                "unsupported unsigned integer width {}",
                width
            )))
        }
    };
    Ok(ArgumentValue::Unsigned(value))
}

fn decode_float(reader: &mut impl BinaryReader, type_info: u32) -> Result<ArgumentValue> {
    match length_class_bytes(type_info)? {
        2 => Err(DltError::UnsupportedArgumentEncoding(
            "half precision floats are not supported".into(),
        )),
        4 => Ok(ArgumentValue::Float32(reader.read_f32()?)),
        8 => Ok(ArgumentValue::Float64(reader.read_f64()?)),
        width => Err(DltError::UnsupportedArgumentEncoding(format!(
            "unsupported float width {}",
            width
        ))),
    }
}

fn decode_string(reader: &mut impl BinaryReader, type_info: u32) -> Result<ArgumentValue> {
    let encoding = (type_info & TYPEINFO_MASK_SCOD) >> 15;
    if encoding > 1 {
        return Err(DltError::UnsupportedArgumentEncoding(format!(
            "unknown string encoding {}",
            encoding
        )));
    }
    // the length prefix counts the trailing null terminator
    let len = reader.read_u16()? as usize;
    let bytes = reader.read_bytes(len)?;
    let text = if len == 0 {
        String::new()
    } else {
        // both ASCII and UTF-8 decode as (lossy) UTF-8
        String::from_utf8_lossy(&bytes[..len - 1]).into_owned()
    };
    Ok(ArgumentValue::Text(text))
}

fn decode_raw(reader: &mut impl BinaryReader) -> Result<ArgumentValue> {
    let len = reader.read_u16()? as usize;
    Ok(ArgumentValue::Raw(reader.read_bytes(len)?))
}
