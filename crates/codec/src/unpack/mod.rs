//! Pixel unpacking: decoder wire layouts into destination planes.
//!
//! The destination planes and strides are owned by the caller; nothing here
//! allocates. Source row strides are always computed from the wire layout's
//! own rules, never assumed equal to the destination stride. A mismatch
//! between the source byte count and the negotiated layout is a caller
//! logic error, not a recoverable condition.

mod packed;
mod planar;
mod split;
mod v210;

use scrub_core::prelude::{Frame, TargetFormat, WireLayout};

pub(crate) fn align4(n: usize) -> usize {
    (n + 3) & !3
}

pub(crate) fn get_u16_le(row: &[u8], index: usize) -> u16 {
    u16::from_le_bytes([row[index * 2], row[index * 2 + 1]])
}

pub(crate) fn get_u16_be(row: &[u8], index: usize) -> u16 {
    u16::from_be_bytes([row[index * 2], row[index * 2 + 1]])
}

pub(crate) fn put_u16(row: &mut [u8], index: usize, value: u16) {
    row[index * 2..index * 2 + 2].copy_from_slice(&value.to_ne_bytes());
}

/// Converts decoded bytes into destination planes.
///
/// Built once at negotiation time so the per-frame path dispatches on a
/// cached layout tag instead of re-deriving it from the compression tag.
///
/// # Example
/// ```rust
/// use scrub_codec::prelude::*;
///
/// let res = Resolution::new(4, 2).unwrap();
/// let target = TargetFormat::new(
///     PixelFormat::Yuv422P8,
///     WireLayout::Yuy2,
///     res,
///     16,
///     CompressionTag::Tag(FourCc::new(*b"YUY2")),
/// );
/// let unpacker = Unpacker::new(&target, false);
///
/// let pool = BufferPool::with_capacity(3, 16);
/// let mut frame = Frame::alloc(target.format, res, &pool);
/// let src = vec![0u8; target.image_size];
/// unpacker.unpack(&src, src.len(), &mut frame, None);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Unpacker {
    layout: WireLayout,
    bit_count: u32,
    flip: bool,
}

impl Unpacker {
    /// Capture the negotiated layout and flip behavior.
    pub fn new(target: &TargetFormat, flip: bool) -> Self {
        Self {
            layout: target.layout,
            bit_count: target.bit_count,
            flip,
        }
    }

    /// The wire layout this unpacker was built for.
    pub fn layout(&self) -> WireLayout {
        self.layout
    }

    /// Unpack `src` into `frame` (and the alpha companion, for layouts that
    /// carry an interleaved alpha byte).
    ///
    /// `src_size` is the byte count the producer reported for this image;
    /// pass 0 when the producer is a decompressor emitting exactly the
    /// negotiated size. Planar layouts use it to detect row padding.
    pub fn unpack(&self, src: &[u8], src_size: usize, frame: &mut Frame, alpha: Option<&mut Frame>) {
        match self.layout {
            WireLayout::PackedRgb => {
                packed::unpack_packed_rgb(src, self.bit_count, self.flip, frame, alpha)
            }
            WireLayout::Rgb48Be => packed::unpack_rgb48_be(src, self.flip, frame),
            WireLayout::Argb64Be => packed::unpack_argb64_be(src, self.flip, frame),
            WireLayout::Yuy2 => packed::unpack_yuy2(src, frame),
            WireLayout::Grey => planar::unpack_planar(src, src_size, false, true, frame),
            WireLayout::V210 => v210::unpack_v210(src, frame),
            WireLayout::P010 => split::unpack_split(src, 6, frame),
            WireLayout::P210 => split::unpack_split(src, 6, frame),
            WireLayout::P016 => split::unpack_split(src, 0, frame),
            WireLayout::P216 => split::unpack_split(src, 0, frame),
            WireLayout::Y416 => split::unpack_y416(src, frame),
            WireLayout::Planar { swap_chroma } => {
                planar::unpack_planar(src, src_size, swap_chroma, false, frame)
            }
        }
    }
}
