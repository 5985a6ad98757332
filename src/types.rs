//! Core types for the DLT log decoder library
//!
//! This module defines the error taxonomy shared by all decoding layers, the
//! storage-version enumeration derived from the file magic, and the closed
//! message-classification enumerations carried by the extended header.

use thiserror::Error;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DltError>;

/// Errors that can occur while decoding DLT data
///
/// Within one frame's decode any of these is fatal to *that frame* only; the
/// streaming parser catches it, wraps it with the file offset via
/// [`DltError::at_position`] and resumes scanning for the next frame.
#[derive(Debug, Error)]
pub enum DltError {
    #[error("unknown storage header magic 0x{0:08x}")]
    UnknownMagic(u32),

    #[error("DLT storage version {0:?} is not supported")]
    UnsupportedVersion(DltStorageVersion),

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("unsupported argument encoding: {0}")]
    UnsupportedArgumentEncoding(String),

    #[error("unexpected end of data at position {position}")]
    UnexpectedEndOfData { position: u64 },

    #[error("error while parsing message at file position {position}: {source}")]
    Parse {
        position: u64,
        #[source]
        source: Box<DltError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DltError {
    /// Wrap this error with the absolute file offset at which it occurred
    pub fn at_position(self, position: u64) -> DltError {
        DltError::Parse {
            position,
            source: Box::new(self),
        }
    }
}

/// DLT storage format version, identified by the 4-byte magic preceding every
/// storage header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DltStorageVersion {
    /// "DLT\x01" - the only version this crate decodes
    V1,
    /// "DLT\x02" - recognized but deliberately not decoded
    V2,
}

impl DltStorageVersion {
    /// The big-endian magic constant that announces this version
    pub const fn magic(self) -> u32 {
        match self {
            DltStorageVersion::V1 => 0x444c_5401,
            DltStorageVersion::V2 => 0x444c_5402,
        }
    }

    /// Match a 4-byte value against the known magic constants
    pub fn try_from_magic(value: u32) -> Option<Self> {
        match value {
            v if v == DltStorageVersion::V1.magic() => Some(DltStorageVersion::V1),
            v if v == DltStorageVersion::V2.magic() => Some(DltStorageVersion::V2),
            _ => None,
        }
    }

    /// Like [`Self::try_from_magic`], but failing with [`DltError::UnknownMagic`]
    pub fn from_magic(value: u32) -> Result<Self> {
        Self::try_from_magic(value).ok_or(DltError::UnknownMagic(value))
    }
}

/// Message type carried in bits 1-3 of the extended header's `msin` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Log,
    AppTrace,
    NwTrace,
    Control,
}

impl MessageType {
    /// Decode the 3-bit `mstp` value; values outside the known range yield `None`
    pub fn from_value(mstp: u8) -> Option<Self> {
        match mstp {
            0x0 => Some(MessageType::Log),
            0x1 => Some(MessageType::AppTrace),
            0x2 => Some(MessageType::NwTrace),
            0x3 => Some(MessageType::Control),
            _ => None,
        }
    }
}

/// Full message classification: the (type, sub-code) pair from the extended
/// header mapped onto a closed enumeration
///
/// Combinations that do not correspond to a known category decode as
/// [`MessageTypeInfo::Unknown`] rather than failing the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTypeInfo {
    LogFatal,
    LogError,
    LogWarn,
    LogInfo,
    LogDebug,
    LogVerbose,

    TraceVariable,
    TraceFunctionIn,
    TraceFunctionOut,
    TraceState,
    TraceVfb,

    NwTraceIpc,
    NwTraceCan,
    NwTraceFlexray,
    NwTraceMost,
    NwTraceEthernet,
    NwTraceSomeIp,

    ControlRequest,
    ControlResponse,

    Unknown,
}

impl MessageTypeInfo {
    /// Map the 3-bit message type and 4-bit sub-code onto a category
    pub fn from_message_type(mstp: u8, mtin: u8) -> MessageTypeInfo {
        use MessageTypeInfo::*;
        match (MessageType::from_value(mstp), mtin) {
            (Some(MessageType::Log), 0x1) => LogFatal,
            (Some(MessageType::Log), 0x2) => LogError,
            (Some(MessageType::Log), 0x3) => LogWarn,
            (Some(MessageType::Log), 0x4) => LogInfo,
            (Some(MessageType::Log), 0x5) => LogDebug,
            (Some(MessageType::Log), 0x6) => LogVerbose,

            (Some(MessageType::AppTrace), 0x1) => TraceVariable,
            (Some(MessageType::AppTrace), 0x2) => TraceFunctionIn,
            (Some(MessageType::AppTrace), 0x3) => TraceFunctionOut,
            (Some(MessageType::AppTrace), 0x4) => TraceState,
            (Some(MessageType::AppTrace), 0x5) => TraceVfb,

            (Some(MessageType::NwTrace), 0x1) => NwTraceIpc,
            (Some(MessageType::NwTrace), 0x2) => NwTraceCan,
            (Some(MessageType::NwTrace), 0x3) => NwTraceFlexray,
            (Some(MessageType::NwTrace), 0x4) => NwTraceMost,
            (Some(MessageType::NwTrace), 0x5) => NwTraceEthernet,
            (Some(MessageType::NwTrace), 0x6) => NwTraceSomeIp,

            (Some(MessageType::Control), 0x1) => ControlRequest,
            (Some(MessageType::Control), 0x2) => ControlResponse,

            _ => Unknown,
        }
    }

    /// The message type this category belongs to
    pub fn message_type(self) -> MessageType {
        use MessageTypeInfo::*;
        match self {
            LogFatal | LogError | LogWarn | LogInfo | LogDebug | LogVerbose | Unknown => {
                MessageType::Log
            }
            TraceVariable | TraceFunctionIn | TraceFunctionOut | TraceState | TraceVfb => {
                MessageType::AppTrace
            }
            NwTraceIpc | NwTraceCan | NwTraceFlexray | NwTraceMost | NwTraceEthernet
            | NwTraceSomeIp => MessageType::NwTrace,
            ControlRequest | ControlResponse => MessageType::Control,
        }
    }

    /// Short human-readable name for display purposes
    pub fn short_text(self) -> &'static str {
        use MessageTypeInfo::*;
        match self {
            LogFatal => "FATAL",
            LogError => "ERROR",
            LogWarn => "WARN",
            LogInfo => "INFO",
            LogDebug => "DEBUG",
            LogVerbose => "VERBOSE",
            TraceVariable => "TRACE_VARIABLE",
            TraceFunctionIn => "TRACE_FUNCTION_IN",
            TraceFunctionOut => "TRACE_FUNCTION_OUT",
            TraceState => "TRACE_STATE",
            TraceVfb => "TRACE_VFB",
            NwTraceIpc => "NW_TRACE_IPC",
            NwTraceCan => "NW_TRACE_CAN",
            NwTraceFlexray => "NW_TRACE_FLEXRAY",
            NwTraceMost => "NW_TRACE_MOST",
            NwTraceEthernet => "NW_TRACE_ETHERNET",
            NwTraceSomeIp => "NW_TRACE_SOMEIP",
            ControlRequest => "CONTROL_REQUEST",
            ControlResponse => "CONTROL_RESPONSE",
            Unknown => "UNKNOWN",
        }
    }
}
