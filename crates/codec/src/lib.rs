#![doc = include_str!("../README.md")]

use scrub_core::prelude::{CompressionTag, FourCc, SourceFormat, TargetFormat};

pub mod negotiate;
pub mod unpack;

/// Per-call decompression flags.
///
/// Mirrors what forward-prediction decoders need to know about a coded
/// unit: whether the frame is decoded only to rebuild predictor state,
/// whether it carries no payload, and whether it depends on prior frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecompressFlags {
    /// Decode required for prediction state, frame not meant for display.
    pub preroll: bool,
    /// Zero-payload frame.
    pub null_frame: bool,
    /// The coded unit is not a keyframe.
    pub not_keyframe: bool,
}

/// Errors emitted by a decompressor.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The decompressor refused to start a session for a pairing it
    /// previously accepted in a capability query.
    #[error("decompressor rejected session {source} -> {target}")]
    SessionRejected {
        /// Source compression tag.
        source: CompressionTag,
        /// Target compression tag.
        target: CompressionTag,
    },
    /// Non-success status from a decompress call.
    #[error("decompress error: {0}")]
    Decompress(String),
}

/// Capability-negotiating decompressor.
///
/// An implementation substitutes a platform codec service, a software
/// decoder library, or a test double; the negotiation and decode machinery
/// only ever talks through this trait.
///
/// # Example
/// ```rust,ignore
/// use scrub_codec::{CodecError, DecompressFlags, DecompressSession, Decompressor};
/// use scrub_core::prelude::{SourceFormat, TargetFormat};
///
/// struct Copying;
///
/// impl Decompressor for Copying {
///     fn accepts(&self, _source: &SourceFormat) -> bool { true }
///     fn can_produce(&self, _source: &SourceFormat, _target: &TargetFormat) -> bool { true }
///     fn begin(
///         &self,
///         _source: &SourceFormat,
///         _target: &TargetFormat,
///     ) -> Result<Box<dyn DecompressSession>, CodecError> {
///         Ok(Box::new(CopySession))
///     }
/// }
/// ```
pub trait Decompressor: Send {
    /// Whether this decompressor can decode the source stream at all.
    fn accepts(&self, source: &SourceFormat) -> bool;

    /// Pure capability query: can this source be materialized as `target`?
    ///
    /// Must not change decompressor state.
    fn can_produce(&self, source: &SourceFormat, target: &TargetFormat) -> bool;

    /// Start a decode session for an accepted pairing.
    fn begin(
        &self,
        source: &SourceFormat,
        target: &TargetFormat,
    ) -> Result<Box<dyn DecompressSession>, CodecError>;
}

/// A running decode session; dropping it ends the session.
pub trait DecompressSession: Send {
    /// Decompress one coded unit into `output`.
    ///
    /// `output` is the caller-owned decoded-image buffer sized by the
    /// negotiated target's exact image size; implementations fill it in the
    /// target's wire layout.
    fn decompress(
        &mut self,
        flags: DecompressFlags,
        coded: &[u8],
        output: &mut [u8],
    ) -> Result<(), CodecError>;
}

/// Instantiates decompressors by handler tag.
///
/// `open` resolves a specific four-character handler; `locate` is the
/// last-resort catalog scan for a decompressor willing to take the source
/// as-is.
pub trait DecompressorProvider {
    /// Open the decompressor registered under `handler`, if any.
    fn open(&self, handler: FourCc) -> Option<Box<dyn Decompressor>>;

    /// Scan for any decompressor accepting `source`.
    fn locate(&self, source: &SourceFormat) -> Option<Box<dyn Decompressor>>;
}

/// Errors from output-format negotiation.
#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    /// The caller requested a format name outside the canonical set.
    #[error(
        "requested format '{name}' must be one of YV24, YV16, YV12, YV411, YUY2, Y8, RGB24, RGB32, RGB48, RGB64, P010, P016, P210, P216, Y416, v210"
    )]
    UnknownFormat {
        /// The rejected name.
        name: String,
    },
    /// A forced format was rejected by the decompressor.
    #[error("the video decompressor couldn't produce {name} output")]
    Unsupported {
        /// Canonical name of the rejected format.
        name: &'static str,
    },
    /// Auto mode exhausted the whole priority list.
    #[error("could not open video stream in any supported format")]
    Exhausted,
    /// No decompressor could be instantiated for the stream.
    #[error("couldn't locate a decompressor for fourcc {tag}")]
    NoDecompressor {
        /// Handler tag the search started from.
        tag: FourCc,
    },
}

pub mod prelude {
    pub use crate::{
        CodecError, DecompressFlags, DecompressSession, Decompressor, DecompressorProvider,
        NegotiationError,
        negotiate::{Negotiated, Passthrough, locate_decompressor, negotiate, passthrough},
        unpack::Unpacker,
    };
    pub use scrub_core::prelude::*;
}
