//! Windowed reader for files larger than a single in-memory buffer
//!
//! Presents the [`BinaryReader`] interface over a file of arbitrary size by
//! loading fixed-size windows and remapping transparently as the cursor
//! advances. An overlap margin near the end of each window guarantees that a
//! frame starting before the margin can be read without crossing the window
//! end; once the cursor enters the margin (or a read would overrun the
//! window while file bytes remain) the next window is loaded starting at the
//! current absolute position.
//!
//! `reset` to a mark that has fallen behind the current window start loads a
//! fresh window at the marked offset instead of rewinding in place. This is
//! the expected path after a resynchronization event in the streaming parser.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::io::{BinaryReader, Endian};
use crate::types::{DltError, Result};

/// Default window size in bytes (100 MB)
pub const DEFAULT_WINDOW_SIZE: usize = 100_000_000;

/// Default overlap margin reserved near the window end (10 MB)
pub const DEFAULT_OVERLAP: usize = 10_000_000;

/// [`BinaryReader`] over a file, windowed so only a bounded slice is resident
///
/// The underlying file handle is released exactly once: either when
/// [`BinaryReader::has_remaining`] observes exhaustion, on an explicit
/// [`Self::close`], or on drop.
pub struct WindowedFileReader {
    file: Option<File>,
    file_size: u64,
    window: Vec<u8>,
    window_start: u64,
    local_pos: usize,
    window_size: usize,
    overlap: usize,
    order: Endian,
    marked: Option<u64>,
}

impl WindowedFileReader {
    /// Open `path` with the default window geometry
    pub fn open(path: &Path) -> Result<Self> {
        Self::with_window(path, DEFAULT_WINDOW_SIZE, DEFAULT_OVERLAP)
    }

    /// Open `path` with an explicit window size and overlap margin
    ///
    /// The overlap must be smaller than the window, and no single read may be
    /// longer than the window size.
    pub fn with_window(path: &Path, window_size: usize, overlap: usize) -> Result<Self> {
        assert!(
            overlap < window_size,
            "overlap ({}) must be smaller than the window size ({})",
            overlap,
            window_size
        );
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let mut reader = Self {
            file: Some(file),
            file_size,
            window: Vec::new(),
            window_start: 0,
            local_pos: 0,
            window_size,
            overlap,
            order: Endian::Big,
            marked: None,
        };
        reader.load_window(0)?;
        Ok(reader)
    }

    /// Total size of the underlying file in bytes
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Release the file handle and the current window
    pub fn close(&mut self) {
        self.marked = None;
        self.window = Vec::new();
        self.file = None;
    }

    fn load_window(&mut self, start: u64) -> Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or(DltError::UnexpectedEndOfData { position: start })?;
        let len = (self.file_size - start).min(self.window_size as u64) as usize;
        log::debug!("loading {} byte window at offset {}", len, start);
        file.seek(SeekFrom::Start(start))?;
        let mut window = vec![0u8; len];
        file.read_exact(&mut window)?;
        self.window = window;
        self.window_start = start;
        self.local_pos = 0;
        Ok(())
    }

    fn remap_if_needed(&mut self, need: usize) -> Result<()> {
        let window_end = self.window_start + self.window.len() as u64;
        if window_end >= self.file_size {
            // final window, nothing further to load
            return Ok(());
        }
        let in_margin = self.local_pos >= self.window_size - self.overlap;
        let overruns = self.local_pos + need > self.window.len();
        if in_margin || overruns {
            self.load_window(self.window_start + self.local_pos as u64)?;
        }
        Ok(())
    }
}

impl BinaryReader for WindowedFileReader {
    fn set_order(&mut self, order: Endian) {
        self.order = order;
    }

    fn order(&self) -> Endian {
        self.order
    }

    fn has_remaining(&mut self) -> bool {
        let remaining = self.position() < self.file_size;
        if !remaining {
            // final window exhausted, release the handle
            self.file = None;
        }
        remaining
    }

    fn position(&self) -> u64 {
        self.window_start + self.local_pos as u64
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if !buf.is_empty() {
            self.remap_if_needed(buf.len())?;
        }
        let end = self.local_pos + buf.len();
        if end > self.window.len() {
            return Err(DltError::UnexpectedEndOfData {
                position: self.position(),
            });
        }
        buf.copy_from_slice(&self.window[self.local_pos..end]);
        self.local_pos = end;
        Ok(())
    }

    fn mark(&mut self) {
        self.marked = Some(self.position());
    }

    fn reset(&mut self) -> Result<()> {
        let Some(marked) = self.marked.take() else {
            return Ok(());
        };
        if marked >= self.window_start {
            self.local_pos = (marked - self.window_start) as usize;
        } else {
            // the window has advanced past the mark, load a fresh one there
            self.load_window(marked)?;
        }
        Ok(())
    }
}
