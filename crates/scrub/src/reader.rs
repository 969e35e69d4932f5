//! The container/stream reader seam.
//!
//! The core never parses a file envelope itself; a [`ContainerOpener`]
//! turns a path plus open mode into a [`StreamReader`], and everything the
//! decode machinery needs from the container goes through that trait.

use std::path::Path;

use scrub_core::prelude::{FourCc, FrameRate, SourceFormat};

/// How to interpret the file envelope when opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Sniff the envelope and pick a container kind.
    #[default]
    Detect,
    /// Force the legacy stream-handler container path.
    AviFile,
    /// Force the large-file container path.
    OpenDml,
}

/// Stream-level facts the reader derives from container metadata.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// Stream frame rate.
    pub frame_rate: FrameRate,
    /// Total number of coded frames.
    pub frame_count: u32,
    /// Container's suggested coded-frame buffer size.
    pub size_hint: usize,
    /// Native format descriptor; `None` for type-1 DV streams, which carry
    /// no format header and get a synthesized one.
    pub source_format: Option<SourceFormat>,
    /// Handler tag declared in the stream header, when present.
    pub handler: Option<FourCc>,
}

/// Result of reading one coded unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `len` bytes were written into the caller's buffer; 0 means the
    /// frame was dropped at mux time.
    Read(usize),
    /// The caller's buffer cannot hold the unit; `required` bytes needed.
    BufferTooSmall(usize),
}

/// Error reading a coded unit.
#[derive(Debug, thiserror::Error)]
#[error("coded unit {index} unreadable: {detail}")]
pub struct ReadError {
    /// Frame index the read targeted.
    pub index: u32,
    /// Reader-specific failure detail.
    pub detail: String,
}

/// A positioned view over one video elementary stream.
pub trait StreamReader: Send {
    /// Stream facts, stable for the lifetime of the reader.
    fn stream_info(&self) -> StreamInfo;

    /// Read the coded bytes of frame `index` into `buf`.
    fn read_coded_unit(&mut self, index: u32, buf: &mut [u8]) -> Result<ReadOutcome, ReadError>;

    /// Whether frame `index` is decodable without prior frames.
    fn is_keyframe(&self, index: u32) -> bool;

    /// Index of the keyframe at or before `index`.
    fn nearest_keyframe_at_or_before(&self, index: u32) -> u32;

    /// Index of the keyframe at or after `index`.
    fn next_keyframe_at_or_after(&self, index: u32) -> u32;
}

/// Errors surfaced by a container opener.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// The file could not be opened or its envelope parsed.
    #[error("couldn't open file '{path}': {detail}")]
    Open {
        /// Path as given.
        path: String,
        /// Opener-specific failure detail.
        detail: String,
    },
    /// The container holds no video stream.
    #[error("could not locate video stream")]
    NoVideoStream,
}

/// Maps a path and open mode to a stream reader.
pub trait ContainerOpener {
    /// Open `path` and return a reader over its video stream.
    fn open(&self, path: &Path, mode: OpenMode) -> Result<Box<dyn StreamReader>, ContainerError>;
}
