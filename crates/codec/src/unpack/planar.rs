//! Consecutive-plane layouts, including padded-row detection and chroma
//! re-ordering.

use scrub_core::prelude::Frame;

use super::align4;

/// Copy consecutive source planes into the destination frame.
///
/// `src_size` is the producer-reported byte count; when it differs from the
/// exact packed size for the frame's geometry (both rounded to 4 bytes),
/// every source row is assumed padded to a 4-byte boundary. `force_pad`
/// short-circuits the detection for layouts whose rows are always padded
/// (the grey family). With `swap_chroma`, source planes arrive in Y V U
/// order and land in canonical Y U V order.
pub(super) fn unpack_planar(
    src: &[u8],
    src_size: usize,
    swap_chroma: bool,
    force_pad: bool,
    frame: &mut Frame,
) {
    let format = frame.meta().format;
    let width = frame.meta().resolution.width.get();
    let height = frame.meta().resolution.height.get();
    let (w, h) = (width as usize, height as usize);
    let bps = format.bytes_per_sample();
    let plane_count = format.plane_count();

    let mut pad_rows = force_pad;
    if !pad_rows && src_size != 0 {
        let mut packed_size = h * w * bps;
        if plane_count == 3 {
            packed_size += 2 * (packed_size >> (format.sub_h() + format.sub_w()));
        }
        if align4(src_size) != align4(packed_size) {
            pad_rows = true;
        }
    }

    let mut planes = frame.planes_mut();
    let mut offset = 0usize;
    for source_index in 0..plane_count {
        let dst_index = if swap_chroma {
            match source_index {
                1 => 2,
                2 => 1,
                other => other,
            }
        } else {
            source_index
        };

        let row_bytes = format.plane_width(width, dst_index) as usize * bps;
        let src_row = if pad_rows { align4(row_bytes) } else { row_bytes };
        let rows = format.plane_height(height, dst_index) as usize;

        let plane = &mut planes[dst_index];
        let stride = plane.stride();
        let data = plane.data();
        for r in 0..rows {
            data[r * stride..][..row_bytes]
                .copy_from_slice(&src[offset + r * src_row..][..row_bytes]);
        }
        offset += rows * src_row;
    }
}
