//! Decoder configuration
//!
//! The configuration is an explicit value threaded into the parser and the
//! payload decoder. There is no ambient global state: strictness and window
//! geometry travel with the [`DecoderConfig`] instance handed to
//! [`crate::DltParser`].

use serde::{Deserialize, Serialize};

use crate::io::windowed::{DEFAULT_OVERLAP, DEFAULT_WINDOW_SIZE};

/// Configuration for the decoder library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Escalate recoverable argument shape mismatches (e.g. an unexpected
    /// length class on a Bool) to fatal decode errors instead of logging a
    /// warning and tolerating them. Mismatches that would misalign subsequent
    /// byte consumption are always fatal, regardless of this switch.
    #[serde(default)]
    pub strict_arguments: bool,

    /// Window size in bytes used by the windowed file reader
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Overlap margin in bytes reserved near the end of each window
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            strict_arguments: false,
            window_size: DEFAULT_WINDOW_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl DecoderConfig {
    /// Create a configuration with default settings: tolerant argument
    /// decoding, 100 MB windows with a 10 MB overlap margin
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: enable or disable strict argument decoding
    pub fn with_strict_arguments(mut self, enabled: bool) -> Self {
        self.strict_arguments = enabled;
        self
    }

    /// Builder method: set the window geometry of the file reader
    pub fn with_window(mut self, window_size: usize, overlap: usize) -> Self {
        self.window_size = window_size;
        self.overlap = overlap;
        self
    }
}
