//! The stream instance: construction, the random-access cache, and the
//! keyframe seek controller.

use log::{debug, warn};
use scrub_codec::prelude::{
    CodecError, DecompressorProvider, NegotiationError, Unpacker, locate_decompressor, negotiate,
    passthrough,
};
use scrub_core::prelude::{
    BufferPool, CompressionTag, Counters, FourCc, Frame, FramePair, PixelFormat, SourceFormat,
    StreamDescriptor,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::engine::DecodeEngine;
use crate::reader::{ContainerError, ContainerOpener, OpenMode, ReadError, StreamReader};

/// Construction-time failures; the stream is unusable.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    /// The container could not be opened or held no video stream.
    #[error(transparent)]
    Container(#[from] ContainerError),
    /// No mutually acceptable output format exists.
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),
    /// The decompressor refused to start its session.
    #[error(transparent)]
    Session(#[from] CodecError),
    /// The eager first decode failed outright.
    #[error("could not decompress frame {index}")]
    FirstFrame {
        /// Keyframe index the decode targeted.
        index: u32,
    },
    /// The fallback keyframe after a dropped frame 0 also failed.
    #[error("could not decompress first keyframe {index}")]
    FirstKeyframe {
        /// Fallback keyframe index.
        index: u32,
    },
}

impl OpenError {
    /// Stable string code for error classification.
    pub fn code(&self) -> &'static str {
        match self {
            OpenError::Container(_) => "container",
            OpenError::Negotiation(_) => "negotiation",
            OpenError::Session(_) => "session",
            OpenError::FirstFrame { .. } => "first_frame",
            OpenError::FirstKeyframe { .. } => "first_keyframe",
        }
    }
}

/// Per-request failures; the stream instance stays usable for other
/// indices.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Backtracking regressed to frame 0 without finding a decodable
    /// keyframe for the request.
    #[error("could not find valid keyframe for frame {index}")]
    NoValidKeyframe {
        /// Requested frame index.
        index: u32,
    },
    /// The request failed and no previously decoded frame exists to fall
    /// back on.
    #[error("failed to decode frame {index}")]
    DecodeFailed {
        /// Requested frame index.
        index: u32,
    },
    /// The decompressor reported a non-success status.
    #[error("decode failed at frame {index}: {source}")]
    Decode {
        /// Frame index handed to the decompressor.
        index: u32,
        /// Underlying codec error.
        #[source]
        source: CodecError,
    },
    /// The reader could not produce the coded unit.
    #[error(transparent)]
    Read(#[from] ReadError),
}

impl FrameError {
    /// Stable string code for error classification.
    pub fn code(&self) -> &'static str {
        match self {
            FrameError::NoValidKeyframe { .. } => "no_valid_keyframe",
            FrameError::DecodeFailed { .. } => "decode_failed",
            FrameError::Decode { .. } => "decode",
            FrameError::Read(_) => "read",
        }
    }
}

/// Builder for opening a stream with format and container overrides.
///
/// # Example
/// ```rust,ignore
/// use scrub::prelude::*;
///
/// let source = SourceRequest::new("clip.avi")
///     .pixel_format("YV12")
///     .open(&opener, &provider)?;
/// let pair = source.get_frame(42)?;
/// # Ok::<(), scrub::source::OpenError>(())
/// ```
pub struct SourceRequest {
    path: PathBuf,
    pixel_format: Option<String>,
    fourcc: Option<FourCc>,
    mode: OpenMode,
}

impl SourceRequest {
    /// Create a request for `path` with auto-detected container kind and
    /// auto-negotiated output format.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pixel_format: None,
            fourcc: None,
            mode: OpenMode::Detect,
        }
    }

    /// Force a canonical output format by name; negotiation failure is
    /// then fatal. An empty name means auto.
    pub fn pixel_format(mut self, name: impl Into<String>) -> Self {
        self.pixel_format = Some(name.into());
        self
    }

    /// Override the stream-declared codec handler tag.
    pub fn fourcc(mut self, tag: FourCc) -> Self {
        self.fourcc = Some(tag);
        self
    }

    /// Pin the container kind instead of sniffing.
    pub fn mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    /// Open the stream: locate the video stream, negotiate an output
    /// format, and eagerly decode the first keyframe.
    pub fn open(
        self,
        opener: &dyn ContainerOpener,
        provider: &dyn DecompressorProvider,
    ) -> Result<VideoSource, OpenError> {
        VideoSource::open(self, opener, provider)
    }
}

struct SourceInner {
    reader: Box<dyn StreamReader>,
    engine: DecodeEngine,
    pool: BufferPool,
    frame_count: u32,
    last_frame_no: Option<u32>,
    last_pair: Option<FramePair>,
}

/// An opened stream exposing random access over its frames.
///
/// One logical primary output, plus a synthetic alpha output when the
/// negotiated format carries an interleaved alpha channel. All decode and
/// cache state sits behind one lock; `get_frame` calls from multiple
/// threads serialize against each other.
pub struct VideoSource {
    primary: StreamDescriptor,
    alpha: Option<StreamDescriptor>,
    counters: Arc<Counters>,
    inner: Mutex<SourceInner>,
}

impl VideoSource {
    fn open(
        request: SourceRequest,
        opener: &dyn ContainerOpener,
        provider: &dyn DecompressorProvider,
    ) -> Result<Self, OpenError> {
        let reader = opener.open(&request.path, request.mode)?;
        let info = reader.stream_info();

        // Type-1 DV containers carry no format header at all.
        let mut source = info
            .source_format
            .unwrap_or_else(|| SourceFormat::synthetic_dv(info.frame_rate, info.size_hint));
        let mut handler = info.handler;
        if let Some(tag) = request.fourcc {
            source.compression = CompressionTag::Tag(tag);
            handler = Some(tag);
        }

        let requested = request.pixel_format.as_deref();
        let (session, target, has_alpha, flip) = match passthrough(&source) {
            Some(direct) => (None, direct.target, direct.alpha, direct.flip),
            None => {
                let (decomp, opened_source) = locate_decompressor(provider, handler, &source)?;
                let chosen = negotiate(decomp.as_ref(), &opened_source, requested)?;
                let session = decomp.begin(&opened_source, &chosen.target)?;
                source = opened_source;
                (Some(session), chosen.target, chosen.alpha, false)
            }
        };

        let counters = Arc::new(Counters::default());
        let unpacker = Unpacker::new(&target, flip);
        let engine = DecodeEngine::new(&source, &target, session, unpacker, counters.clone());

        let primary = StreamDescriptor {
            format: target.format,
            resolution: target.resolution,
            frame_rate: info.frame_rate,
            frame_count: info.frame_count,
        };
        let alpha = has_alpha.then_some(StreamDescriptor {
            format: PixelFormat::Gray8,
            ..primary
        });

        let luma_bytes = target.resolution.width.get() as usize
            * target.resolution.height.get() as usize
            * target.format.bytes_per_sample();
        let pool = BufferPool::with_limits(4, luma_bytes, 8);

        let mut inner = SourceInner {
            reader,
            engine,
            pool,
            frame_count: info.frame_count,
            last_frame_no: None,
            last_pair: None,
        };

        // Eager decode of the first keyframe; a stream whose start cannot
        // be decoded at all is unusable.
        let mut frame = Frame::alloc(primary.format, primary.resolution, &inner.pool);
        let mut alpha_frame =
            alpha.map(|desc| Frame::alloc(desc.format, desc.resolution, &inner.pool));
        let keyframe = inner.reader.nearest_keyframe_at_or_before(0);
        let outcome = inner
            .engine
            .decode(
                inner.reader.as_mut(),
                keyframe,
                false,
                &mut frame,
                alpha_frame.as_mut(),
            )
            .map_err(|_| OpenError::FirstFrame { index: keyframe })?;
        if outcome.dropped {
            // Cope with files that start on drop frames: take the next
            // keyframe instead, failing only when that also drops.
            let fallback = inner.reader.next_keyframe_at_or_after(0);
            let outcome = inner
                .engine
                .decode(
                    inner.reader.as_mut(),
                    fallback,
                    false,
                    &mut frame,
                    alpha_frame.as_mut(),
                )
                .map_err(|_| OpenError::FirstKeyframe { index: fallback })?;
            if outcome.dropped {
                return Err(OpenError::FirstKeyframe { index: fallback });
            }
        }
        inner.last_frame_no = Some(0);
        inner.last_pair = Some(FramePair::new(frame, alpha_frame));

        Ok(Self {
            primary,
            alpha,
            counters,
            inner: Mutex::new(inner),
        })
    }

    /// Number of logical outputs (1, or 2 with a synthetic alpha stream).
    pub fn outputs(&self) -> usize {
        1 + usize::from(self.alpha.is_some())
    }

    /// Descriptor for output 0 (primary) or 1 (alpha).
    pub fn descriptor(&self, output: usize) -> Option<&StreamDescriptor> {
        match output {
            0 => Some(&self.primary),
            1 => self.alpha.as_ref(),
            _ => None,
        }
    }

    /// Snapshot of this stream's decode/cache counters.
    pub fn counters(&self) -> Counters {
        (*self.counters).clone()
    }

    /// Fetch frame `n`, decoding as little as possible.
    ///
    /// Repeated access to the cached index performs no decode work;
    /// advancing by one frame decodes exactly one frame; everything else
    /// seeks to the nearest keyframe and replays forward, backtracking to
    /// earlier keyframes across decode failures.
    pub fn get_frame(&self, n: u32) -> Result<FramePair, FrameError> {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        let n = n.min(inner.frame_count.saturating_sub(1));

        if inner.last_frame_no == Some(n)
            && let Some(pair) = &inner.last_pair
        {
            self.counters.cache_hit();
            return Ok(pair.clone());
        }

        let mut keyframe = inner.reader.nearest_keyframe_at_or_before(n);
        // Sequential access dominates; when the cached frame sits between
        // the keyframe and the request, continue from it instead of
        // replaying the whole group.
        if let Some(last) = inner.last_frame_no
            && inner.last_pair.is_some()
            && last < n
            && last >= keyframe
        {
            keyframe = last + 1;
        }

        let mut frame = Frame::alloc(self.primary.format, self.primary.resolution, &inner.pool);
        let mut alpha_frame = self
            .alpha
            .map(|desc| Frame::alloc(desc.format, desc.resolution, &inner.pool));

        let mut frame_ok = false;
        loop {
            for index in keyframe..=n {
                let last_index = index == n;
                match inner.engine.decode(
                    inner.reader.as_mut(),
                    index,
                    !last_index,
                    &mut frame,
                    alpha_frame.as_mut(),
                ) {
                    Ok(outcome) => {
                        if last_index {
                            frame_ok = !outcome.dropped;
                        }
                    }
                    Err(err) => {
                        debug!("decode failed at frame {index} while seeking {n}: {err}");
                        if last_index {
                            frame_ok = false;
                        }
                    }
                }
            }
            if frame_ok || inner.last_pair.is_some() {
                break;
            }

            // The chosen keyframe is bad and there is nothing cached to
            // fall back on; regress to the previous keyframe. Bounded:
            // cannot step before frame 0.
            if keyframe == 0 {
                return Err(FrameError::NoValidKeyframe { index: n });
            }
            let earlier = inner.reader.nearest_keyframe_at_or_before(keyframe - 1);
            if earlier >= keyframe {
                return Err(FrameError::NoValidKeyframe { index: n });
            }
            warn!("keyframe {keyframe} not decodable for frame {n}, retrying from {earlier}");
            self.counters.reseek();
            keyframe = earlier;
        }

        if frame_ok {
            // Only now release the previous pair; the cache never holds a
            // frame that does not match `last_frame_no`.
            inner.last_pair = Some(FramePair::new(frame, alpha_frame));
            inner.last_frame_no = Some(n);
        }
        match &inner.last_pair {
            Some(pair) => Ok(pair.clone()),
            None => Err(FrameError::DecodeFailed { index: n }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{ReadOutcome, StreamInfo};
    use scrub_codec::prelude::{DecompressFlags, DecompressSession, TargetFormat, WireLayout};
    use scrub_core::prelude::{FrameRate, Resolution};
    use std::num::NonZeroU32;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Reader double over a synthetic stream: fixed keyframe set, 8-byte
    /// payloads carrying the frame index, configurable zero-byte drops.
    struct ScriptedReader {
        frame_count: u32,
        keyframes: Vec<u32>,
        drops: Vec<u32>,
        fails: Vec<u32>,
    }

    impl ScriptedReader {
        fn new(frame_count: u32, keyframes: &[u32], drops: &[u32]) -> Self {
            Self {
                frame_count,
                keyframes: keyframes.to_vec(),
                drops: drops.to_vec(),
                fails: Vec::new(),
            }
        }

        fn failing(mut self, fails: &[u32]) -> Self {
            self.fails = fails.to_vec();
            self
        }
    }

    impl StreamReader for ScriptedReader {
        fn stream_info(&self) -> StreamInfo {
            StreamInfo {
                frame_rate: FrameRate {
                    numerator: NonZeroU32::new(25).unwrap(),
                    denominator: NonZeroU32::new(1).unwrap(),
                },
                frame_count: self.frame_count,
                size_hint: 16,
                source_format: None,
                handler: None,
            }
        }

        fn read_coded_unit(
            &mut self,
            index: u32,
            buf: &mut [u8],
        ) -> Result<ReadOutcome, ReadError> {
            if self.fails.contains(&index) {
                return Err(ReadError {
                    index,
                    detail: "bad chunk".into(),
                });
            }
            if self.drops.contains(&index) {
                return Ok(ReadOutcome::Read(0));
            }
            if buf.len() < 8 {
                return Ok(ReadOutcome::BufferTooSmall(8));
            }
            buf[..4].copy_from_slice(&index.to_le_bytes());
            buf[4..8].fill(0);
            Ok(ReadOutcome::Read(8))
        }

        fn is_keyframe(&self, index: u32) -> bool {
            self.keyframes.contains(&index)
        }

        fn nearest_keyframe_at_or_before(&self, index: u32) -> u32 {
            self.keyframes
                .iter()
                .copied()
                .filter(|&k| k <= index)
                .max()
                .unwrap_or(0)
        }

        fn next_keyframe_at_or_after(&self, index: u32) -> u32 {
            self.keyframes
                .iter()
                .copied()
                .filter(|&k| k >= index)
                .min()
                .unwrap_or(index)
        }
    }

    /// Session double with forward-prediction state: predicted frames fail
    /// until a keyframe has been fed.
    struct PredictingSession {
        primed: AtomicBool,
    }

    impl DecompressSession for PredictingSession {
        fn decompress(
            &mut self,
            flags: DecompressFlags,
            coded: &[u8],
            output: &mut [u8],
        ) -> Result<(), CodecError> {
            if !flags.not_keyframe {
                self.primed.store(true, Ordering::Relaxed);
            } else if !self.primed.load(Ordering::Relaxed) {
                return Err(CodecError::Decompress("no predictor state".into()));
            }
            let index = u32::from_le_bytes(coded[..4].try_into().unwrap());
            output.fill(index as u8);
            Ok(())
        }
    }

    fn test_source(reader: ScriptedReader) -> VideoSource {
        let resolution = Resolution::new(4, 2).unwrap();
        let source_format = SourceFormat {
            compression: CompressionTag::Tag(FourCc::new(*b"FAKE")),
            bit_count: 24,
            resolution,
            size_hint: 16,
            bottom_up: false,
        };
        let target = TargetFormat::new(
            PixelFormat::Yuv420P8,
            WireLayout::Planar { swap_chroma: true },
            resolution,
            12,
            CompressionTag::Tag(FourCc::new(*b"YV12")),
        );
        let counters = Arc::new(Counters::default());
        let session = Box::new(PredictingSession {
            primed: AtomicBool::new(false),
        });
        let engine = DecodeEngine::new(
            &source_format,
            &target,
            Some(session),
            Unpacker::new(&target, false),
            counters.clone(),
        );
        let frame_count = reader.stream_info().frame_count;
        let primary = StreamDescriptor {
            format: target.format,
            resolution,
            frame_rate: reader.stream_info().frame_rate,
            frame_count,
        };
        VideoSource {
            primary,
            alpha: None,
            counters,
            inner: Mutex::new(SourceInner {
                reader: Box::new(reader),
                engine,
                pool: BufferPool::with_limits(4, 8, 8),
                frame_count,
                last_frame_no: None,
                last_pair: None,
            }),
        }
    }

    #[test]
    fn backtracks_to_earlier_keyframe_when_keyframe_drops() {
        // Keyframe 5 is a zero-byte drop, so frames 6..7 cannot decode
        // from it; the controller must retry from keyframe 3.
        let source = test_source(ScriptedReader::new(10, &[0, 3, 5], &[5]));
        let pair = source.get_frame(7).expect("frame 7 decodable via keyframe 3");
        assert_eq!(pair.primary.planes()[0].data()[0], 7);
        assert_eq!(source.counters().reseeks(), 1);
    }

    #[test]
    fn backtracking_terminates_at_frame_zero() {
        // Every keyframe drops; the search must stop once it has regressed
        // to frame 0 instead of looping.
        let source = test_source(ScriptedReader::new(6, &[0, 3], &[0, 3]));
        let err = source.get_frame(4).unwrap_err();
        assert!(matches!(err, FrameError::NoValidKeyframe { index: 4 }));
    }

    #[test]
    fn failed_request_leaves_stream_usable() {
        // Frames 5..=7 are unreadable outright, so requests for 7 fail no
        // matter which keyframe the search regresses to.
        let source = test_source(ScriptedReader::new(10, &[0, 5], &[]).failing(&[5, 6, 7]));
        let err = source.get_frame(7).unwrap_err();
        assert!(matches!(err, FrameError::NoValidKeyframe { index: 7 }));
        // The instance itself is still good for other indices.
        let pair = source.get_frame(2).expect("group at keyframe 0 decodes");
        assert_eq!(pair.primary.planes()[0].data()[0], 2);
    }
}
