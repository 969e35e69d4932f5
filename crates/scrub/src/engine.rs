//! Frame decode engine: drives the decompressor (or the pass-through path)
//! for a single coded frame index.

use log::{debug, trace};
use scrub_codec::prelude::{DecompressFlags, DecompressSession, Unpacker};
use scrub_core::prelude::{Counters, Frame, PictureType, SourceFormat, TargetFormat};
use std::sync::Arc;

use crate::reader::{ReadOutcome, StreamReader};
use crate::source::FrameError;

/// Guard region appended past the coded payload. Some decoders read past
/// the declared end of the buffer; the sentinel keeps that overread inside
/// owned memory.
const GUARD_BYTES: usize = 16;
const GUARD_FILL: u8 = 0xA5;

/// Result of one decode attempt.
pub(crate) struct DecodeOutcome {
    /// The reader had zero bytes for this index; nothing was produced.
    pub dropped: bool,
}

pub(crate) struct DecodeEngine {
    session: Option<Box<dyn DecompressSession>>,
    unpacker: Unpacker,
    /// Growable staging buffer for coded bytes, guard region included.
    staging: Vec<u8>,
    /// Decompressor output, sized to the target's exact image size.
    decoded: Vec<u8>,
    counters: Arc<Counters>,
}

impl DecodeEngine {
    pub fn new(
        source: &SourceFormat,
        target: &TargetFormat,
        session: Option<Box<dyn DecompressSession>>,
        unpacker: Unpacker,
        counters: Arc<Counters>,
    ) -> Self {
        let decoded = if session.is_some() {
            vec![0; target.image_size]
        } else {
            Vec::new()
        };
        Self {
            session,
            unpacker,
            staging: vec![0; source.size_hint],
            decoded,
            counters,
        }
    }

    /// Read the coded unit for `index`, growing the staging buffer once if
    /// the reader asks for more room.
    fn read_unit(&mut self, reader: &mut dyn StreamReader, index: u32) -> Result<usize, FrameError> {
        let outcome = reader.read_coded_unit(index, &mut self.staging)?;
        let required = match outcome {
            ReadOutcome::Read(len) => return Ok(len),
            ReadOutcome::BufferTooSmall(required) => required,
        };
        self.staging.resize(required + GUARD_BYTES, 0);
        match reader.read_coded_unit(index, &mut self.staging)? {
            ReadOutcome::Read(len) => Ok(len),
            ReadOutcome::BufferTooSmall(required) => Err(FrameError::Read(crate::reader::ReadError {
                index,
                detail: format!("reader still wants {required} bytes after regrow"),
            })),
        }
    }

    /// Decode frame `index` into `frame` (and `alpha`, when the stream has
    /// a synthetic alpha output).
    pub fn decode(
        &mut self,
        reader: &mut dyn StreamReader,
        index: u32,
        preroll: bool,
        frame: &mut Frame,
        mut alpha: Option<&mut Frame>,
    ) -> Result<DecodeOutcome, FrameError> {
        self.counters.decode();
        trace!(
            "decompressing frame {index}{}",
            if preroll { " (preroll)" } else { "" }
        );

        let bytes_read = self.read_unit(reader, index)?;
        if bytes_read == 0 {
            self.counters.dropped();
            debug!("frame {index} dropped (zero-byte coded unit)");
            return Ok(DecodeOutcome { dropped: true });
        }
        let keyframe = reader.is_keyframe(index);

        match self.session.as_mut() {
            // Pass-through: the container already stores the negotiated
            // wire layout, feed the raw bytes straight to the unpacker.
            None => {
                self.unpacker.unpack(
                    &self.staging[..bytes_read],
                    bytes_read,
                    frame,
                    alpha.as_deref_mut(),
                );
            }
            Some(session) => {
                if self.staging.len() < bytes_read + GUARD_BYTES {
                    self.staging.resize(bytes_read + GUARD_BYTES, 0);
                }
                self.staging[bytes_read..bytes_read + GUARD_BYTES].fill(GUARD_FILL);
                self.staging[bytes_read + GUARD_BYTES - 1] = 0;

                let flags = DecompressFlags {
                    preroll,
                    null_frame: false,
                    not_keyframe: !keyframe,
                };
                session
                    .decompress(flags, &self.staging[..bytes_read], &mut self.decoded)
                    .map_err(|source| FrameError::Decode { index, source })?;
                self.unpacker
                    .unpack(&self.decoded, 0, frame, alpha.as_deref_mut());
            }
        }

        let picture_type = if keyframe {
            PictureType::Intra
        } else {
            PictureType::Predicted
        };
        frame.set_picture_type(picture_type);
        if let Some(alpha) = alpha {
            alpha.set_picture_type(picture_type);
        }
        Ok(DecodeOutcome { dropped: false })
    }
}
