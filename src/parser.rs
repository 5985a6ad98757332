//! Streaming DLT frame parser
//!
//! A pull-based, stateful sequence over a [`BinaryReader`], yielding one
//! [`DltReadStatus`] per frame until the reader is exhausted. Every step
//! first resynchronizes: the reader is scanned byte-by-byte with a 4-byte
//! sliding big-endian accumulator until a recognized storage magic appears,
//! so stray bytes between frames are always tolerated, not only after an
//! error. A decode failure is converted into an error-bearing status record
//! and the reader rewinds to just past the matched magic, ready for the next
//! scan - a single corrupt frame never terminates iteration.

use std::path::Path;

use crate::config::DecoderConfig;
use crate::headers::DltMessageV1;
use crate::io::{BinaryReader, Endian, WindowedFileReader};
use crate::types::{DltError, DltStorageVersion, Result};

/// Per-frame result of the streaming parser
///
/// Carries either the decoded frame or the error that failed it, together
/// with the running position and counters. Emitted once per step, never
/// persisted by the parser.
#[derive(Debug)]
pub struct DltReadStatus {
    /// Monotonic frame index, counting both successes and errors
    pub index: u64,
    /// Absolute byte position of the reader after this step
    pub position: u64,
    /// Total input size, when known
    pub total_size: Option<u64>,
    /// `position / total_size` in [0, 1], when the total size is known
    pub progress: Option<f32>,
    /// Frames decoded successfully so far, including this one on success
    pub success_count: u64,
    /// Frames failed so far, including this one on error
    pub error_count: u64,
    /// The decoded frame, or the failure wrapped with its file offset
    pub message: Result<DltMessageV1>,
}

/// Entry point for parsing DLT streams (the configuration holder)
#[derive(Debug, Clone, Default)]
pub struct DltParser {
    config: DecoderConfig,
}

impl DltParser {
    /// Create a parser with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser with an explicit configuration
    pub fn with_config(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Parse a DLT file through the windowed reader
    ///
    /// The file size is known, so emitted records carry a progress fraction.
    pub fn parse_file(&self, path: &Path) -> Result<DltMessageIterator<WindowedFileReader>> {
        log::info!("Parsing DLT file: {:?}", path);
        let reader =
            WindowedFileReader::with_window(path, self.config.window_size, self.config.overlap)?;
        let total_size = reader.file_size();
        Ok(DltMessageIterator::new(
            reader,
            Some(total_size),
            self.config.clone(),
        ))
    }

    /// Parse frames from an arbitrary [`BinaryReader`]
    pub fn parse_reader<R: BinaryReader>(
        &self,
        reader: R,
        total_size: Option<u64>,
    ) -> DltMessageIterator<R> {
        DltMessageIterator::new(reader, total_size, self.config.clone())
    }
}

/// Lazy, finite, non-restartable sequence of [`DltReadStatus`] records
///
/// The iterator exclusively owns the reader's cursor; frames are
/// self-contained values once emitted. Calling `next` again after the
/// iterator has reported end-of-stream is a programming error and panics.
pub struct DltMessageIterator<R: BinaryReader> {
    reader: R,
    total_size: Option<u64>,
    config: DecoderConfig,
    index: u64,
    success_count: u64,
    error_count: u64,
    finished: bool,
}

impl<R: BinaryReader> DltMessageIterator<R> {
    pub fn new(reader: R, total_size: Option<u64>, config: DecoderConfig) -> Self {
        Self {
            reader,
            total_size,
            config,
            index: 0,
            success_count: 0,
            error_count: 0,
            finished: false,
        }
    }

    /// Scan forward byte-by-byte until a recognized storage magic
    ///
    /// Leaves the reader positioned directly after the matched magic. `None`
    /// means the input ran out first: end of stream.
    fn scan_magic(&mut self) -> Option<DltStorageVersion> {
        let mut accumulator: u32 = 0;
        let mut consumed: usize = 0;
        while self.reader.has_remaining() {
            let byte = match self.reader.read_u8() {
                Ok(byte) => byte,
                Err(_) => return None,
            };
            accumulator = (accumulator << 8) | u32::from(byte);
            consumed += 1;
            if consumed >= 4 {
                if let Some(version) = DltStorageVersion::try_from_magic(accumulator) {
                    return Some(version);
                }
            }
        }
        None
    }

    fn decode_message(&mut self, version: DltStorageVersion) -> Result<DltMessageV1> {
        match version {
            DltStorageVersion::V1 => {
                let message = DltMessageV1::read(&mut self.reader, &self.config)?;
                // materialize the payload text now so argument decoding
                // errors are caught as part of this frame, not at display time
                message.payload.message()?;
                Ok(message)
            }
            other => Err(DltError::UnsupportedVersion(other)),
        }
    }

    fn emit(&mut self, message: Result<DltMessageV1>) -> DltReadStatus {
        let position = self.reader.position();
        let progress = self.total_size.map(|total| {
            if total == 0 {
                1.0
            } else {
                (position as f64 / total as f64).clamp(0.0, 1.0) as f32
            }
        });
        let status = DltReadStatus {
            index: self.index,
            position,
            total_size: self.total_size,
            progress,
            success_count: self.success_count,
            error_count: self.error_count,
            message,
        };
        self.index += 1;
        status
    }
}

impl<R: BinaryReader> Iterator for DltMessageIterator<R> {
    type Item = DltReadStatus;

    fn next(&mut self) -> Option<Self::Item> {
        assert!(
            !self.finished,
            "next() called on an exhausted DLT message iterator"
        );
        self.reader.set_order(Endian::Big);
        match self.scan_magic() {
            Some(version) => {
                // remember the post-magic offset so a failed frame can be
                // rewound and rescanned from here
                self.reader.mark();
                match self.decode_message(version) {
                    Ok(message) => {
                        self.success_count += 1;
                        Some(self.emit(Ok(message)))
                    }
                    Err(cause) => {
                        self.error_count += 1;
                        let position = self.reader.position();
                        if let Err(reset_error) = self.reader.reset() {
                            log::warn!("failed to rewind after a parse error: {}", reset_error);
                        }
                        Some(self.emit(Err(cause.at_position(position))))
                    }
                }
            }
            None => {
                self.finished = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::{DltExtendedHeader, DltStandardHeader, DltStorageHeader};
    use crate::io::{BufferReader, BufferWriter};
    use crate::payload::DltPayload;
    use std::io::Write;

    /// Build a complete frame; `htyp` controls the optional fields and
    /// whether an extended header is attached.
    fn sample_message(htyp: u8, mcnt: u8, payload_data: Vec<u8>) -> DltMessageV1 {
        let extended_header = (htyp & DltStandardHeader::UEH != 0).then_some(DltExtendedHeader {
            msin: 0, // non-verbose
            noar: 0,
            apid: 0x41505031,
            ctid: 0x43545831,
        });
        let mut standard_header = DltStandardHeader {
            htyp,
            mcnt,
            len: 0,
            ecu_id: (htyp & DltStandardHeader::WEID != 0).then_some(0x45435531),
            session_id: (htyp & DltStandardHeader::WSID != 0).then_some(99),
            timestamp: (htyp & DltStandardHeader::WTMS != 0).then_some(555),
        };
        standard_header.len = (standard_header.total_length()
            + extended_header.map_or(0, |_| DltExtendedHeader::LENGTH)
            + payload_data.len()) as u16;
        DltMessageV1 {
            storage_header: DltStorageHeader {
                seconds: 1_700_000_000,
                microseconds: 1234,
                ecu_id: 0x45435531,
            },
            standard_header,
            extended_header,
            payload: DltPayload::new(
                payload_data,
                htyp & DltStandardHeader::MSBF != 0,
                extended_header,
                &DecoderConfig::default(),
            ),
        }
    }

    fn non_verbose_payload(text: &[u8]) -> Vec<u8> {
        let mut data = 0x0000_1234u32.to_le_bytes().to_vec();
        data.extend_from_slice(text);
        data
    }

    fn encode(messages: &[DltMessageV1]) -> Vec<u8> {
        let mut writer = BufferWriter::new();
        for message in messages {
            message.write(&mut writer);
        }
        writer.into_bytes()
    }

    fn parse_all(bytes: Vec<u8>) -> Vec<DltReadStatus> {
        let total = bytes.len() as u64;
        DltParser::new()
            .parse_reader(BufferReader::new(bytes), Some(total))
            .collect()
    }

    #[test]
    fn test_round_trip_all_header_flag_combinations() {
        // every combination of UEH/WEID/WSID/WTMS, with MSBF mixed in
        for bits in 0u8..16 {
            let htyp = ((bits & 0b0001) != 0) as u8 * DltStandardHeader::UEH
                | ((bits & 0b0010) != 0) as u8 * DltStandardHeader::WEID
                | ((bits & 0b0100) != 0) as u8 * DltStandardHeader::WSID
                | ((bits & 0b1000) != 0) as u8 * DltStandardHeader::WTMS
                | (bits % 2) * DltStandardHeader::MSBF;
            let message = sample_message(htyp, bits, non_verbose_payload(b"round trip"));
            let statuses = parse_all(encode(std::slice::from_ref(&message)));

            assert_eq!(statuses.len(), 1, "htyp {:#04x}", htyp);
            let decoded = statuses[0].message.as_ref().unwrap();
            assert_eq!(*decoded, message, "htyp {:#04x}", htyp);
        }
    }

    #[test]
    fn test_resynchronization_over_garbage_prefix() {
        let message = sample_message(DltStandardHeader::WEID, 1, non_verbose_payload(b"sync"));
        let mut bytes = vec![0u8; 21]; // garbage that can never match a magic
        bytes.extend_from_slice(&[0xaa, 0x55, 0xaa, 0x55]);
        bytes.extend_from_slice(&encode(std::slice::from_ref(&message)));

        let statuses = parse_all(bytes);
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].error_count, 0);
        assert_eq!(statuses[0].success_count, 1);
        assert_eq!(*statuses[0].message.as_ref().unwrap(), message);
    }

    #[test]
    fn test_corrupt_middle_frame_is_isolated() {
        let first = sample_message(0, 1, non_verbose_payload(b"first"));
        let second = sample_message(0, 2, non_verbose_payload(b"second"));
        let third = sample_message(0, 3, non_verbose_payload(b"third"));

        let mut bytes = encode(&[first.clone(), second, third.clone()]);
        // corrupt the second frame's len field (offset 18 within the frame:
        // 4 magic + 12 storage header + htyp + mcnt)
        let first_len = encode(std::slice::from_ref(&first)).len();
        bytes[first_len + 18] = 0xff;
        bytes[first_len + 19] = 0xff;

        let statuses = parse_all(bytes);
        assert_eq!(statuses.len(), 3);
        assert!(statuses[0].message.is_ok());
        assert!(statuses[1].message.is_err());
        assert!(statuses[2].message.is_ok());
        assert_eq!(*statuses[0].message.as_ref().unwrap(), first);
        assert_eq!(*statuses[2].message.as_ref().unwrap(), third);

        let last = &statuses[2];
        assert_eq!(last.success_count, 2);
        assert_eq!(last.error_count, 1);

        // the failure is wrapped with the offset it occurred at
        match statuses[1].message.as_ref().unwrap_err() {
            DltError::Parse { source, .. } => {
                assert!(matches!(**source, DltError::UnexpectedEndOfData { .. }))
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_v2_frame() {
        let mut bytes = DltStorageVersion::V2.magic().to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 16]);

        let statuses = parse_all(bytes);
        assert_eq!(statuses.len(), 1);
        match statuses[0].message.as_ref().unwrap_err() {
            DltError::Parse { source, .. } => assert!(matches!(
                **source,
                DltError::UnsupportedVersion(DltStorageVersion::V2)
            )),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(statuses[0].error_count, 1);
    }

    #[test]
    fn test_progress_is_monotonic_and_bounded() {
        let messages: Vec<DltMessageV1> = (0..5)
            .map(|i| sample_message(DltStandardHeader::WTMS, i, non_verbose_payload(b"progress")))
            .collect();
        let statuses = parse_all(encode(&messages));

        assert_eq!(statuses.len(), 5);
        let mut previous = 0.0f32;
        for status in &statuses {
            let progress = status.progress.unwrap();
            assert!((0.0..=1.0).contains(&progress));
            assert!(progress >= previous);
            previous = progress;
        }
        assert_eq!(statuses.last().unwrap().progress, Some(1.0));
    }

    #[test]
    fn test_index_is_monotonic() {
        let messages: Vec<DltMessageV1> = (0..3)
            .map(|i| sample_message(0, i, non_verbose_payload(b"idx")))
            .collect();
        let statuses = parse_all(encode(&messages));
        let indices: Vec<u64> = statuses.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_trailing_garbage_ends_stream() {
        let message = sample_message(0, 0, non_verbose_payload(b"tail"));
        let mut bytes = encode(std::slice::from_ref(&message));
        bytes.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44]);

        let statuses = parse_all(bytes);
        assert_eq!(statuses.len(), 1);
        assert!(statuses[0].message.is_ok());
    }

    #[test]
    #[should_panic(expected = "exhausted")]
    fn test_next_after_termination_panics() {
        let mut iterator = DltParser::new().parse_reader(BufferReader::new(Vec::new()), None);
        assert!(iterator.next().is_none());
        let _ = iterator.next();
    }

    #[test]
    fn test_verbose_frame_through_parser() {
        let mut payload_data = vec![0x11, 0x08, 0x00, 0x00, 0x00, 0x05, b'f', b'l', b'a', b'g',
            0x00, 0x01];
        payload_data.extend_from_slice(&[0x43, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00]);

        let extended_header = DltExtendedHeader {
            msin: DltExtendedHeader::VERBOSE | (0x2 << 4), // verbose LOG_ERROR
            noar: 2,
            apid: 0x41505031,
            ctid: 0x43545831,
        };
        let standard_len = 4 + DltExtendedHeader::LENGTH + payload_data.len();
        let message = DltMessageV1 {
            storage_header: DltStorageHeader {
                seconds: 1,
                microseconds: 2,
                ecu_id: 3,
            },
            standard_header: DltStandardHeader {
                htyp: DltStandardHeader::UEH | DltStandardHeader::MSBF,
                mcnt: 0,
                len: standard_len as u16,
                ecu_id: None,
                session_id: None,
                timestamp: None,
            },
            extended_header: Some(extended_header),
            payload: DltPayload::new(
                payload_data,
                true,
                Some(extended_header),
                &DecoderConfig::default(),
            ),
        };

        let statuses = parse_all(encode(std::slice::from_ref(&message)));
        assert_eq!(statuses.len(), 1);
        let decoded = statuses[0].message.as_ref().unwrap();
        assert_eq!(decoded.payload.message().unwrap(), "flag = true 256");
        assert_eq!(
            decoded.message_type_info(),
            Some(crate::types::MessageTypeInfo::LogError)
        );
    }

    #[test]
    fn test_strict_config_fails_sloppy_bool() {
        // bool argument with length class 2
        let payload_data = vec![0x12, 0x00, 0x00, 0x00, 0x01];
        let extended_header = DltExtendedHeader {
            msin: DltExtendedHeader::VERBOSE,
            noar: 1,
            apid: 0,
            ctid: 0,
        };
        let config = DecoderConfig::new().with_strict_arguments(true);
        let standard_len = 4 + DltExtendedHeader::LENGTH + payload_data.len();
        let message = DltMessageV1 {
            storage_header: DltStorageHeader {
                seconds: 0,
                microseconds: 0,
                ecu_id: 0,
            },
            standard_header: DltStandardHeader {
                htyp: DltStandardHeader::UEH,
                mcnt: 0,
                len: standard_len as u16,
                ecu_id: None,
                session_id: None,
                timestamp: None,
            },
            extended_header: Some(extended_header),
            payload: DltPayload::new(payload_data, false, Some(extended_header), &config),
        };
        let bytes = encode(std::slice::from_ref(&message));
        let total = bytes.len() as u64;

        // tolerant by default: the frame decodes
        let statuses = parse_all(bytes.clone());
        assert!(statuses[0].message.is_ok());

        // strict: the same frame fails, but the stream still terminates cleanly
        let statuses: Vec<DltReadStatus> = DltParser::with_config(config)
            .parse_reader(BufferReader::new(bytes), Some(total))
            .collect();
        assert_eq!(statuses.len(), 1);
        assert!(statuses[0].message.is_err());
    }

    #[test]
    fn test_parse_file_across_window_boundaries() {
        let messages: Vec<DltMessageV1> = (0..20)
            .map(|i| {
                sample_message(
                    DltStandardHeader::WEID | DltStandardHeader::WSID,
                    i,
                    non_verbose_payload(format!("file message {}", i).as_bytes()),
                )
            })
            .collect();
        let bytes = encode(&messages);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        // windows far smaller than the file force several remaps mid-stream
        let config = DecoderConfig::new().with_window(96, 64);
        let parser = DltParser::with_config(config);
        let statuses: Vec<DltReadStatus> =
            parser.parse_file(file.path()).unwrap().collect();

        assert_eq!(statuses.len(), 20);
        for (i, status) in statuses.iter().enumerate() {
            assert_eq!(*status.message.as_ref().unwrap(), messages[i]);
        }
        assert_eq!(statuses.last().unwrap().success_count, 20);
        assert_eq!(statuses.last().unwrap().error_count, 0);
    }
}
