//! One-shot output-format negotiation.
//!
//! Runs once per opened stream: either the container already declares a
//! canonical wire layout (pass-through, no decompressor at all), or a
//! decompressor is located and the canonical formats are offered to it in a
//! fixed priority order until one sticks.

use log::debug;
use scrub_core::prelude::{
    CompressionTag, FourCc, PixelFormat, SourceFormat, TargetFormat, WireLayout,
};

use crate::{Decompressor, DecompressorProvider, NegotiationError};

const fn tag(bytes: [u8; 4]) -> CompressionTag {
    CompressionTag::Tag(FourCc::new(bytes))
}

struct Candidate {
    name: &'static str,
    format: PixelFormat,
    bit_count: u32,
    /// Acceptable destination tags, in priority order.
    tags: &'static [CompressionTag],
}

/// The auto-mode priority list. Order is contractual: the first format the
/// decompressor accepts wins.
const CANDIDATES: &[Candidate] = &[
    Candidate {
        name: "YV24",
        format: PixelFormat::Yuv444P8,
        bit_count: 24,
        tags: &[tag(*b"YV24")],
    },
    Candidate {
        name: "YV16",
        format: PixelFormat::Yuv422P8,
        bit_count: 16,
        tags: &[tag(*b"YV16")],
    },
    Candidate {
        name: "YV12",
        format: PixelFormat::Yuv420P8,
        bit_count: 12,
        tags: &[tag(*b"YV12"), tag(*b"I420")],
    },
    Candidate {
        name: "YV411",
        format: PixelFormat::Yuv411P8,
        bit_count: 16,
        tags: &[tag(*b"Y41B")],
    },
    Candidate {
        name: "YUY2",
        format: PixelFormat::Yuv422P8,
        bit_count: 16,
        tags: &[tag(*b"YUY2")],
    },
    // 32-bit packed RGB decodes into planar RGB24 plus a synthetic alpha
    // output carved out of the interleaved fourth byte.
    Candidate {
        name: "RGB32",
        format: PixelFormat::Rgb24,
        bit_count: 32,
        tags: &[CompressionTag::Rgb],
    },
    Candidate {
        name: "RGB24",
        format: PixelFormat::Rgb24,
        bit_count: 24,
        tags: &[CompressionTag::Rgb],
    },
    Candidate {
        name: "RGB48",
        format: PixelFormat::Rgb48,
        bit_count: 48,
        tags: &[tag(*b"b48r")],
    },
    Candidate {
        name: "RGB64",
        format: PixelFormat::Rgb48,
        bit_count: 64,
        tags: &[tag(*b"b64a")],
    },
    Candidate {
        name: "Y8",
        format: PixelFormat::Gray8,
        bit_count: 8,
        tags: &[tag(*b"Y800"), tag(*b"Y8  "), tag(*b"GREY")],
    },
    Candidate {
        name: "P010",
        format: PixelFormat::Yuv420P10,
        bit_count: 24,
        tags: &[tag(*b"P010")],
    },
    Candidate {
        name: "P016",
        format: PixelFormat::Yuv420P16,
        bit_count: 24,
        tags: &[tag(*b"P016")],
    },
    Candidate {
        name: "P210",
        format: PixelFormat::Yuv422P10,
        bit_count: 24,
        tags: &[tag(*b"P210")],
    },
    Candidate {
        name: "P216",
        format: PixelFormat::Yuv422P16,
        bit_count: 24,
        tags: &[tag(*b"P216")],
    },
    Candidate {
        name: "Y416",
        format: PixelFormat::Yuv444P16,
        bit_count: 32,
        tags: &[tag(*b"Y416")],
    },
    Candidate {
        name: "v210",
        format: PixelFormat::Yuv422P10,
        bit_count: 20,
        tags: &[tag(*b"v210")],
    },
];

/// Wire layout a destination tag decodes into, if the tag is canonical.
pub(crate) fn wire_layout_for(compression: CompressionTag) -> Option<WireLayout> {
    let fcc = match compression {
        CompressionTag::Rgb => return Some(WireLayout::PackedRgb),
        CompressionTag::Tag(fcc) => fcc,
    };
    match &fcc.bytes() {
        b"YUY2" => Some(WireLayout::Yuy2),
        b"b48r" => Some(WireLayout::Rgb48Be),
        b"b64a" => Some(WireLayout::Argb64Be),
        b"GREY" | b"Y800" | b"Y8  " => Some(WireLayout::Grey),
        b"v210" => Some(WireLayout::V210),
        b"P010" => Some(WireLayout::P010),
        b"P210" => Some(WireLayout::P210),
        b"P016" => Some(WireLayout::P016),
        b"P216" => Some(WireLayout::P216),
        b"Y416" => Some(WireLayout::Y416),
        // Planar tags keep source plane order only when chroma is already
        // stored U-before-V.
        b"I420" | b"Y41B" => Some(WireLayout::Planar { swap_chroma: false }),
        b"YV12" | b"YV16" | b"YV24" => Some(WireLayout::Planar { swap_chroma: true }),
        _ => None,
    }
}

/// Result of a successful negotiation.
#[derive(Debug, Clone, Copy)]
pub struct Negotiated {
    /// The destination descriptor the decompressor accepted.
    pub target: TargetFormat,
    /// Whether a synthetic alpha output accompanies the primary stream.
    pub alpha: bool,
    /// Canonical name of the chosen format.
    pub name: &'static str,
}

/// Result of a pass-through open: the container already stores a canonical
/// wire layout, so no decompressor is involved.
#[derive(Debug, Clone, Copy)]
pub struct Passthrough {
    /// Target descriptor matching the container's own layout.
    pub target: TargetFormat,
    /// Whether a synthetic alpha output accompanies the primary stream.
    pub alpha: bool,
    /// Rows must be flipped while unpacking (bottom-up packed RGB).
    pub flip: bool,
}

/// Check whether the source can be handled without any decompressor.
pub fn passthrough(source: &SourceFormat) -> Option<Passthrough> {
    let (format, alpha) = match source.compression {
        CompressionTag::Rgb if source.bit_count == 32 => (PixelFormat::Rgb24, true),
        CompressionTag::Rgb if source.bit_count == 24 => (PixelFormat::Rgb24, false),
        CompressionTag::Rgb => return None,
        CompressionTag::Tag(fcc) => {
            let format = match &fcc.bytes() {
                b"YUY2" | b"YV16" => PixelFormat::Yuv422P8,
                b"YV12" | b"I420" => PixelFormat::Yuv420P8,
                b"YV24" => PixelFormat::Yuv444P8,
                b"Y41B" => PixelFormat::Yuv411P8,
                b"b48r" | b"b64a" => PixelFormat::Rgb48,
                b"GREY" | b"Y800" | b"Y8  " => PixelFormat::Gray8,
                b"P010" => PixelFormat::Yuv420P10,
                b"P016" => PixelFormat::Yuv420P16,
                b"P210" | b"v210" => PixelFormat::Yuv422P10,
                b"P216" => PixelFormat::Yuv422P16,
                b"Y416" => PixelFormat::Yuv444P16,
                _ => return None,
            };
            (format, false)
        }
    };
    let layout = wire_layout_for(source.compression)?;
    let flip = source.compression == CompressionTag::Rgb && source.bottom_up;
    Some(Passthrough {
        target: TargetFormat::new(
            format,
            layout,
            source.resolution,
            source.bit_count,
            source.compression,
        ),
        alpha,
        flip,
    })
}

/// Interchangeable legacy MPEG-4 handler tags; a stream declaring any of
/// them may really need one of the others installed.
const MPEG4_FAMILY: [FourCc; 4] = [
    FourCc::new(*b"MP43"),
    FourCc::new(*b"DIV3"),
    FourCc::new(*b"DIV4"),
    FourCc::new(*b"AP41"),
];

fn attempt(
    provider: &dyn DecompressorProvider,
    handler: Option<FourCc>,
    source: &SourceFormat,
) -> Option<Box<dyn Decompressor>> {
    // The handler declared in the stream header comes first; in some files
    // it is wrong or missing, so fall back to the format's own compression
    // tag and finally to a catalog scan.
    if let Some(handler) = handler
        && let Some(decomp) = provider.open(handler)
        && decomp.accepts(source)
    {
        return Some(decomp);
    }
    if let CompressionTag::Tag(fcc) = source.compression
        && let Some(decomp) = provider.open(fcc)
        && decomp.accepts(source)
    {
        return Some(decomp);
    }
    provider.locate(source)
}

/// Instantiate a decompressor for a non-canonical source.
///
/// Returns the decompressor together with the source descriptor it was
/// opened for; the compression tag may differ from the input when the
/// MPEG-4 family fallback had to rewrite it.
pub fn locate_decompressor(
    provider: &dyn DecompressorProvider,
    handler: Option<FourCc>,
    source: &SourceFormat,
) -> Result<(Box<dyn Decompressor>, SourceFormat), NegotiationError> {
    if let Some(decomp) = attempt(provider, handler, source) {
        return Ok((decomp, *source));
    }
    if let CompressionTag::Tag(fcc) = source.compression
        && MPEG4_FAMILY.contains(&fcc)
    {
        for family in MPEG4_FAMILY {
            let mut retagged = *source;
            retagged.compression = CompressionTag::Tag(family);
            if let Some(decomp) = attempt(provider, handler, &retagged) {
                debug!("opened {fcc} stream with family handler {family}");
                return Ok((decomp, retagged));
            }
        }
    }
    let tag = handler.unwrap_or(match source.compression {
        CompressionTag::Tag(fcc) => fcc,
        CompressionTag::Rgb => FourCc::new(*b"DIB "),
    });
    Err(NegotiationError::NoDecompressor { tag })
}

/// Negotiate a canonical output format with `decomp`.
///
/// With a non-empty `requested` name only that format is attempted and a
/// refusal is fatal; otherwise every candidate is offered in the fixed
/// priority order and the first acceptance wins.
pub fn negotiate(
    decomp: &dyn Decompressor,
    source: &SourceFormat,
    requested: Option<&str>,
) -> Result<Negotiated, NegotiationError> {
    let forced = requested.is_some_and(|name| !name.is_empty());
    if forced {
        let name = requested.unwrap_or_default();
        if !CANDIDATES
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(name))
        {
            return Err(NegotiationError::UnknownFormat { name: name.into() });
        }
    }

    for candidate in CANDIDATES {
        if forced
            && !candidate
                .name
                .eq_ignore_ascii_case(requested.unwrap_or_default())
        {
            continue;
        }
        for &compression in candidate.tags {
            let layout =
                wire_layout_for(compression).expect("candidate tags map to wire layouts");
            let target = TargetFormat::new(
                candidate.format,
                layout,
                source.resolution,
                candidate.bit_count,
                compression,
            );
            if decomp.can_produce(source, &target) {
                debug!("opening as {compression}");
                return Ok(Negotiated {
                    target,
                    alpha: candidate.name == "RGB32",
                    name: candidate.name,
                });
            }
        }
        if forced {
            return Err(NegotiationError::Unsupported {
                name: candidate.name,
            });
        }
    }
    Err(NegotiationError::Exhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CodecError, DecompressFlags, DecompressSession};
    use scrub_core::prelude::Resolution;
    use std::cell::Cell;

    struct NullSession;

    impl DecompressSession for NullSession {
        fn decompress(
            &mut self,
            _flags: DecompressFlags,
            _coded: &[u8],
            _output: &mut [u8],
        ) -> Result<(), CodecError> {
            Ok(())
        }
    }

    /// Accepts any target whose compression tag is in the allow list.
    struct Accepting(&'static [[u8; 4]]);

    impl Decompressor for Accepting {
        fn accepts(&self, _source: &SourceFormat) -> bool {
            true
        }

        fn can_produce(&self, _source: &SourceFormat, target: &TargetFormat) -> bool {
            match target.compression {
                CompressionTag::Tag(fcc) => self.0.iter().any(|t| FourCc::new(*t) == fcc),
                CompressionTag::Rgb => self.0.iter().any(|t| t == b"\0\0\0\0"),
            }
        }

        fn begin(
            &self,
            source: &SourceFormat,
            target: &TargetFormat,
        ) -> Result<Box<dyn DecompressSession>, CodecError> {
            if self.can_produce(source, target) {
                Ok(Box::new(NullSession))
            } else {
                Err(CodecError::SessionRejected {
                    source: source.compression,
                    target: target.compression,
                })
            }
        }
    }

    fn coded_source() -> SourceFormat {
        SourceFormat {
            compression: tag(*b"XVID"),
            bit_count: 24,
            resolution: Resolution::new(64, 48).unwrap(),
            size_hint: 4096,
            bottom_up: false,
        }
    }

    #[test]
    fn auto_mode_honors_priority_order() {
        // YUY2 outranks v210 in the priority list no matter which order the
        // decompressor happens to accept them in.
        let decomp = Accepting(&[*b"v210", *b"YUY2"]);
        let chosen = negotiate(&decomp, &coded_source(), None).unwrap();
        assert_eq!(chosen.name, "YUY2");
        assert_eq!(chosen.target.format, PixelFormat::Yuv422P8);
        assert_eq!(chosen.target.layout, WireLayout::Yuy2);
        assert!(!chosen.alpha);
    }

    #[test]
    fn secondary_tags_are_offered() {
        let decomp = Accepting(&[*b"I420"]);
        let chosen = negotiate(&decomp, &coded_source(), None).unwrap();
        assert_eq!(chosen.name, "YV12");
        assert_eq!(
            chosen.target.layout,
            WireLayout::Planar { swap_chroma: false }
        );
    }

    #[test]
    fn rgb32_acceptance_exposes_alpha() {
        let decomp = Accepting(&[*b"\0\0\0\0"]);
        let chosen = negotiate(&decomp, &coded_source(), None).unwrap();
        assert_eq!(chosen.name, "RGB32");
        assert_eq!(chosen.target.format, PixelFormat::Rgb24);
        assert_eq!(chosen.target.bit_count, 32);
        assert!(chosen.alpha);
    }

    #[test]
    fn forced_format_failure_names_the_format() {
        let decomp = Accepting(&[*b"YV12"]);
        let err = negotiate(&decomp, &coded_source(), Some("Y8")).unwrap_err();
        match err {
            NegotiationError::Unsupported { name } => assert_eq!(name, "Y8"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn forced_format_is_case_insensitive() {
        let decomp = Accepting(&[*b"YV12"]);
        let chosen = negotiate(&decomp, &coded_source(), Some("yv12")).unwrap();
        assert_eq!(chosen.name, "YV12");
    }

    #[test]
    fn unknown_requested_name_is_rejected() {
        let decomp = Accepting(&[*b"YV12"]);
        let err = negotiate(&decomp, &coded_source(), Some("NV12")).unwrap_err();
        assert!(matches!(err, NegotiationError::UnknownFormat { .. }));
    }

    #[test]
    fn empty_requested_name_means_auto() {
        let decomp = Accepting(&[*b"YV24"]);
        let chosen = negotiate(&decomp, &coded_source(), Some("")).unwrap();
        assert_eq!(chosen.name, "YV24");
    }

    #[test]
    fn passthrough_recognizes_canonical_tags() {
        let mut source = coded_source();
        source.compression = tag(*b"YV12");
        let direct = passthrough(&source).unwrap();
        assert_eq!(direct.target.format, PixelFormat::Yuv420P8);
        assert!(!direct.alpha);
        assert!(!direct.flip);

        source.compression = CompressionTag::Rgb;
        source.bit_count = 32;
        source.bottom_up = true;
        let direct = passthrough(&source).unwrap();
        assert_eq!(direct.target.format, PixelFormat::Rgb24);
        assert!(direct.alpha);
        assert!(direct.flip);

        source.compression = tag(*b"XVID");
        assert!(passthrough(&source).is_none());
    }

    /// Provider that records which handlers were asked for and answers only
    /// for one of them.
    struct FamilyProvider {
        answers: FourCc,
        asked: Cell<usize>,
    }

    impl DecompressorProvider for FamilyProvider {
        fn open(&self, handler: FourCc) -> Option<Box<dyn Decompressor>> {
            self.asked.set(self.asked.get() + 1);
            (handler == self.answers)
                .then(|| Box::new(Accepting(&[*b"YV12"])) as Box<dyn Decompressor>)
        }

        fn locate(&self, _source: &SourceFormat) -> Option<Box<dyn Decompressor>> {
            None
        }
    }

    #[test]
    fn mpeg4_family_fallback_rewrites_the_tag() {
        let provider = FamilyProvider {
            answers: FourCc::new(*b"DIV4"),
            asked: Cell::new(0),
        };
        let mut source = coded_source();
        source.compression = tag(*b"MP43");
        let (_decomp, opened) = locate_decompressor(&provider, None, &source).unwrap();
        assert_eq!(opened.compression, tag(*b"DIV4"));
        assert!(provider.asked.get() > 1);
    }

    #[test]
    fn unrelated_tag_does_not_get_family_retries() {
        let provider = FamilyProvider {
            answers: FourCc::new(*b"DIV4"),
            asked: Cell::new(0),
        };
        let err = locate_decompressor(&provider, None, &coded_source()).unwrap_err();
        match err {
            NegotiationError::NoDecompressor { tag } => {
                assert_eq!(tag, FourCc::new(*b"XVID"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
