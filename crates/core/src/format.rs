use std::{fmt, num::NonZeroU32, str::FromStr};

/// Four-character code describing a codec or pixel layout.
///
/// # Example
/// ```rust
/// use scrub_core::prelude::FourCc;
///
/// let fcc = FourCc::new(*b"YV12");
/// assert_eq!(fcc.to_string(), "YV12");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc([u8; 4]);

impl FourCc {
    /// Construct from raw bytes.
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Little-endian u32 encoding, as stored in stream headers.
    pub fn to_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// The four raw bytes.
    pub const fn bytes(self) -> [u8; 4] {
        self.0
    }

    /// Try to convert to a printable string.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
}

impl From<u32> for FourCc {
    fn from(value: u32) -> Self {
        Self(value.to_le_bytes())
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.as_str() {
            write!(f, "{s}")
        } else {
            write!(f, "0x{:08x}", self.to_u32())
        }
    }
}

impl FromStr for FourCc {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 {
            return Err("fourcc must be four ASCII bytes".into());
        }
        let mut arr = [0u8; 4];
        arr.copy_from_slice(bytes);
        Ok(FourCc(arr))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for FourCc {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str().unwrap_or("????"))
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for FourCc {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        FourCc::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Compression identifier from a stream header.
///
/// Uncompressed packed RGB is declared with a reserved zero tag rather than
/// a printable code, so it gets its own variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CompressionTag {
    /// Device-independent packed RGB (`BI_RGB`).
    Rgb,
    /// Any four-character coded tag.
    Tag(FourCc),
}

impl fmt::Display for CompressionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionTag::Rgb => write!(f, "BI_RGB"),
            CompressionTag::Tag(fcc) => write!(f, "{fcc}"),
        }
    }
}

/// Resolution of a frame.
///
/// # Example
/// ```rust
/// use scrub_core::prelude::Resolution;
///
/// let res = Resolution::new(640, 480).unwrap();
/// assert_eq!(res.width.get(), 640);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Resolution {
    /// Width in pixels (non-zero).
    pub width: NonZeroU32,
    /// Height in pixels (non-zero).
    pub height: NonZeroU32,
}

impl Resolution {
    /// Create a resolution, returning `None` if width or height are zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        Some(Self {
            width: NonZeroU32::new(width)?,
            height: NonZeroU32::new(height)?,
        })
    }
}

/// Frame rate expressed as a rational (frames per second = numerator / denominator).
///
/// # Example
/// ```rust
/// use std::num::NonZeroU32;
/// use scrub_core::prelude::FrameRate;
///
/// let rate = FrameRate {
///     numerator: NonZeroU32::new(30000).unwrap(),
///     denominator: NonZeroU32::new(1001).unwrap(),
/// };
/// assert!(rate.fps() > 29.0 && rate.fps() < 30.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameRate {
    /// Numerator of the fps rational.
    pub numerator: NonZeroU32,
    /// Denominator of the fps rational.
    pub denominator: NonZeroU32,
}

impl FrameRate {
    /// Frames per second as floating point.
    pub fn fps(&self) -> f64 {
        self.numerator.get() as f64 / self.denominator.get() as f64
    }

    /// Whether the rate exceeds `fps` when compared exactly as a rational.
    pub fn faster_than(&self, fps: u32) -> bool {
        self.numerator.get() as u64 > self.denominator.get() as u64 * fps as u64
    }
}

/// Canonical planar pixel formats the downstream pipeline consumes.
///
/// Every decode ends in one of these, regardless of the byte layout the
/// decompressor emitted. Plane geometry is described by the sub-sampling
/// exponents: a chroma plane is the luma plane with width shifted right by
/// `sub_w()` and height shifted right by `sub_h()`.
///
/// # Example
/// ```rust
/// use scrub_core::prelude::PixelFormat;
///
/// let fmt = PixelFormat::Yuv420P8;
/// assert_eq!(fmt.plane_count(), 3);
/// assert_eq!((fmt.sub_w(), fmt.sub_h()), (1, 1));
/// assert_eq!(fmt.plane_width(1920, 1), 960);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PixelFormat {
    Yuv444P8,
    Yuv422P8,
    Yuv420P8,
    Yuv411P8,
    /// Planar RGB, one 8-bit plane per channel.
    Rgb24,
    /// Planar RGB, one 16-bit plane per channel.
    Rgb48,
    Gray8,
    Yuv420P10,
    Yuv420P16,
    Yuv422P10,
    Yuv422P16,
    Yuv444P16,
}

impl PixelFormat {
    /// Number of planes in the canonical layout.
    pub fn plane_count(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            _ => 3,
        }
    }

    /// Horizontal sub-sampling exponent for chroma planes.
    pub fn sub_w(self) -> u32 {
        match self {
            PixelFormat::Yuv422P8
            | PixelFormat::Yuv420P8
            | PixelFormat::Yuv422P10
            | PixelFormat::Yuv422P16
            | PixelFormat::Yuv420P10
            | PixelFormat::Yuv420P16 => 1,
            PixelFormat::Yuv411P8 => 2,
            _ => 0,
        }
    }

    /// Vertical sub-sampling exponent for chroma planes.
    pub fn sub_h(self) -> u32 {
        match self {
            PixelFormat::Yuv420P8 | PixelFormat::Yuv420P10 | PixelFormat::Yuv420P16 => 1,
            _ => 0,
        }
    }

    /// Bytes per sample in every plane.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            PixelFormat::Rgb48
            | PixelFormat::Yuv420P10
            | PixelFormat::Yuv420P16
            | PixelFormat::Yuv422P10
            | PixelFormat::Yuv422P16
            | PixelFormat::Yuv444P16 => 2,
            _ => 1,
        }
    }

    /// Significant bits per sample.
    pub fn bits_per_sample(self) -> u32 {
        match self {
            PixelFormat::Yuv420P10 | PixelFormat::Yuv422P10 => 10,
            PixelFormat::Rgb48
            | PixelFormat::Yuv420P16
            | PixelFormat::Yuv422P16
            | PixelFormat::Yuv444P16 => 16,
            _ => 8,
        }
    }

    /// Width in samples of plane `plane` for a frame `width` pixels wide.
    pub fn plane_width(self, width: u32, plane: usize) -> u32 {
        if plane == 0 { width } else { width >> self.sub_w() }
    }

    /// Height in rows of plane `plane` for a frame `height` pixels tall.
    pub fn plane_height(self, height: u32, plane: usize) -> u32 {
        if plane == 0 {
            height
        } else {
            height >> self.sub_h()
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelFormat::Yuv444P8 => "YUV444P8",
            PixelFormat::Yuv422P8 => "YUV422P8",
            PixelFormat::Yuv420P8 => "YUV420P8",
            PixelFormat::Yuv411P8 => "YUV411P8",
            PixelFormat::Rgb24 => "RGB24",
            PixelFormat::Rgb48 => "RGB48",
            PixelFormat::Gray8 => "Gray8",
            PixelFormat::Yuv420P10 => "YUV420P10",
            PixelFormat::Yuv420P16 => "YUV420P16",
            PixelFormat::Yuv422P10 => "YUV422P10",
            PixelFormat::Yuv422P16 => "YUV422P16",
            PixelFormat::Yuv444P16 => "YUV444P16",
        };
        f.write_str(name)
    }
}

/// Byte layout a decoder emits, selected once at negotiation time.
///
/// This is the unpacker's source tag; the canonical [`PixelFormat`] is its
/// destination. The two are deliberately distinct: several wire layouts
/// unpack into the same canonical format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WireLayout {
    /// Row-padded packed RGB (`BI_RGB`), 24 or 32 bits per pixel, stored
    /// bottom-up in legacy streams.
    PackedRgb,
    /// Packed big-endian RGB, one u16 per channel (`b48r`).
    Rgb48Be,
    /// Packed big-endian ARGB, one u16 per channel (`b64a`); alpha dropped.
    Argb64Be,
    /// Packed 4:2:2, Y0 U Y1 V byte quads.
    Yuy2,
    /// Single luma plane (`GREY`/`Y800`/`Y8  `), rows always aligned.
    Grey,
    /// Packed 4:2:2 10-bit, 16 bytes per 6 pixels, rows padded to 128 bytes.
    V210,
    /// 4:2:0, u16 luma plane + interleaved UV plane, samples msb-aligned.
    P010,
    /// 4:2:2 variant of [`WireLayout::P010`].
    P210,
    /// 4:2:0, u16 luma plane + interleaved UV plane, full 16-bit samples.
    P016,
    /// 4:2:2 variant of [`WireLayout::P016`].
    P216,
    /// Packed 4:4:4:4, U Y V A u16 quads; alpha dropped.
    Y416,
    /// Consecutive whole planes in source order.
    Planar {
        /// Chroma planes stored V-before-U relative to the canonical order.
        swap_chroma: bool,
    },
}

fn align4(n: usize) -> usize {
    (n + 3) & !3
}

fn padded_row_times_height(row: usize, height: u32) -> usize {
    align4(row) * height as usize
}

/// Exact byte size of a decoded image in `layout` at the given geometry.
///
/// `bit_count` only participates for [`WireLayout::PackedRgb`]. Any rounding
/// error here either under-sizes the staging buffer or over-reads the
/// source, so the formulas are kept bit-exact against the layouts' own
/// alignment rules.
///
/// # Example
/// ```rust
/// use scrub_core::prelude::{PixelFormat, WireLayout, image_byte_size};
///
/// // 4:2:0 8-bit: luma + two quarter chroma planes, rounded to 4 bytes.
/// let size = image_byte_size(
///     WireLayout::Planar { swap_chroma: true },
///     PixelFormat::Yuv420P8,
///     640,
///     480,
///     12,
/// );
/// assert_eq!(size, 640 * 480 * 3 / 2);
/// ```
pub fn image_byte_size(
    layout: WireLayout,
    format: PixelFormat,
    width: u32,
    height: u32,
    bit_count: u32,
) -> usize {
    let w = width as usize;
    let bps = format.bytes_per_sample();
    match layout {
        WireLayout::V210 => {
            let row = (16 * ((w + 5) / 6) + 127) & !127;
            row * height as usize
        }
        WireLayout::PackedRgb => padded_row_times_height(w * bit_count as usize / 8, height),
        WireLayout::Rgb48Be => padded_row_times_height(w * bps * 3, height),
        WireLayout::Argb64Be => padded_row_times_height(w * bps * 4, height),
        WireLayout::Yuy2 => padded_row_times_height(w * 2, height),
        WireLayout::Grey => padded_row_times_height(w * bps, height),
        // Four packed u16 components per pixel; sizing this by the planar
        // formula would under-allocate by a quarter.
        WireLayout::Y416 => padded_row_times_height(w * bps * 4, height),
        // Split-plane and planar layouts all carry the same total payload as
        // the canonical planar format they unpack into.
        _ => {
            let mut size = (w * bps) >> format.sub_w();
            if size != 0 {
                size *= height as usize;
                size >>= format.sub_h();
                size *= 2;
            }
            size += w * bps * height as usize;
            align4(size)
        }
    }
}

/// Native on-disk layout of the coded stream, fixed at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceFormat {
    /// Compression tag declared by the container.
    pub compression: CompressionTag,
    /// Declared bits per pixel.
    pub bit_count: u32,
    /// Coded frame geometry.
    pub resolution: Resolution,
    /// Container's suggested coded-frame buffer size, in bytes.
    pub size_hint: usize,
    /// Rows stored bottom-up (legacy packed-RGB convention).
    pub bottom_up: bool,
}

impl SourceFormat {
    /// Synthesize the descriptor for a type-1 DV stream, which carries no
    /// native format header. Height follows the rate: above 26 fps is NTSC.
    pub fn synthetic_dv(rate: FrameRate, size_hint: usize) -> Self {
        let height = if rate.faster_than(26) { 480 } else { 576 };
        Self {
            compression: CompressionTag::Tag(FourCc::new(*b"dvsd")),
            bit_count: 24,
            resolution: Resolution::new(720, height).expect("dv geometry is non-zero"),
            size_hint,
            bottom_up: false,
        }
    }
}

/// Destination descriptor handed to the decompressor during negotiation.
///
/// Chosen once per stream and immutable afterwards; the cached
/// [`WireLayout`] is what keeps per-frame unpacking free of tag dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TargetFormat {
    /// Canonical format the unpacked frame ends up in.
    pub format: PixelFormat,
    /// Byte layout the decompressor will emit.
    pub layout: WireLayout,
    /// Output geometry (same as the source geometry).
    pub resolution: Resolution,
    /// Bit count advertised to the decompressor.
    pub bit_count: u32,
    /// Compression tag advertised to the decompressor.
    pub compression: CompressionTag,
    /// Exact decoded image size in bytes.
    pub image_size: usize,
}

impl TargetFormat {
    /// Build a target descriptor, computing its exact image size.
    pub fn new(
        format: PixelFormat,
        layout: WireLayout,
        resolution: Resolution,
        bit_count: u32,
        compression: CompressionTag,
    ) -> Self {
        let image_size = image_byte_size(
            layout,
            format,
            resolution.width.get(),
            resolution.height.get(),
            bit_count,
        );
        Self {
            format,
            layout,
            resolution,
            bit_count,
            compression,
            image_size,
        }
    }
}

/// Descriptor for one logical output of an opened stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamDescriptor {
    /// Canonical format of delivered frames.
    pub format: PixelFormat,
    /// Frame geometry.
    pub resolution: Resolution,
    /// Stream frame rate.
    pub frame_rate: FrameRate,
    /// Total number of coded frames.
    pub frame_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn res(w: u32, h: u32) -> Resolution {
        Resolution::new(w, h).unwrap()
    }

    #[test]
    fn fourcc_display_roundtrip() {
        let fcc: FourCc = "YV12".parse().unwrap();
        assert_eq!(fcc, FourCc::new(*b"YV12"));
        assert_eq!(fcc.to_string(), "YV12");
    }

    #[test]
    fn packed_rgb_rows_are_dword_aligned() {
        // 3 bytes/px at width 2 gives a 6-byte row, padded to 8.
        assert_eq!(
            image_byte_size(WireLayout::PackedRgb, PixelFormat::Rgb24, 2, 4, 24),
            8 * 4
        );
        assert_eq!(
            image_byte_size(WireLayout::PackedRgb, PixelFormat::Rgb24, 2, 4, 32),
            8 * 4
        );
    }

    #[test]
    fn v210_rows_pad_to_128() {
        // 6 pixels fit one 16-byte group; any width up to 6 still pads the
        // row to the 128-byte boundary.
        assert_eq!(
            image_byte_size(WireLayout::V210, PixelFormat::Yuv422P10, 6, 2, 20),
            128 * 2
        );
        // 720 wide: 120 groups of 16 bytes land exactly on the boundary.
        assert_eq!(
            image_byte_size(WireLayout::V210, PixelFormat::Yuv422P10, 720, 486, 20),
            1920 * 486
        );
    }

    #[test]
    fn planar_golden_values() {
        let planar = WireLayout::Planar { swap_chroma: true };
        assert_eq!(
            image_byte_size(planar, PixelFormat::Yuv420P8, 640, 480, 12),
            640 * 480 + 2 * (320 * 240)
        );
        assert_eq!(
            image_byte_size(planar, PixelFormat::Yuv422P8, 640, 480, 16),
            640 * 480 * 2
        );
        assert_eq!(
            image_byte_size(planar, PixelFormat::Yuv444P16, 16, 16, 48),
            16 * 16 * 2 * 3
        );
        assert_eq!(
            image_byte_size(WireLayout::Y416, PixelFormat::Yuv444P16, 16, 2, 32),
            16 * 8 * 2
        );
        // 4:1:1 chroma is a quarter wide, full height.
        assert_eq!(
            image_byte_size(planar, PixelFormat::Yuv411P8, 640, 480, 16),
            640 * 480 + 2 * (160 * 480)
        );
    }

    #[test]
    fn image_size_monotone_in_geometry() {
        let layouts = [
            (WireLayout::PackedRgb, PixelFormat::Rgb24, 24),
            (WireLayout::Yuy2, PixelFormat::Yuv422P8, 16),
            (WireLayout::V210, PixelFormat::Yuv422P10, 20),
            (
                WireLayout::Planar { swap_chroma: true },
                PixelFormat::Yuv420P8,
                12,
            ),
            (WireLayout::P010, PixelFormat::Yuv420P10, 24),
        ];
        for (layout, format, bits) in layouts {
            let mut last = 0;
            for w in [2, 6, 16, 64, 640] {
                let size = image_byte_size(layout, format, w, 32, bits);
                assert!(size >= last, "{layout:?} shrank when width grew");
                last = size;
            }
            let mut last = 0;
            for h in [2, 4, 32, 480] {
                let size = image_byte_size(layout, format, 64, h, bits);
                assert!(size >= last, "{layout:?} shrank when height grew");
                last = size;
            }
        }
    }

    #[test]
    fn dv_synthesis_picks_height_from_rate() {
        let ntsc = FrameRate {
            numerator: NonZeroU32::new(30000).unwrap(),
            denominator: NonZeroU32::new(1001).unwrap(),
        };
        let pal = FrameRate {
            numerator: NonZeroU32::new(25).unwrap(),
            denominator: NonZeroU32::new(1).unwrap(),
        };
        assert_eq!(SourceFormat::synthetic_dv(ntsc, 0).resolution, res(720, 480));
        assert_eq!(SourceFormat::synthetic_dv(pal, 0).resolution, res(720, 576));
    }
}
