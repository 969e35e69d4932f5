//! Split-plane 10/16-bit layouts: a u16 luma plane followed by an
//! interleaved UV plane, plus the packed 4:4:4:4 quad layout.

use scrub_core::prelude::Frame;

use super::{get_u16_le, put_u16};

/// P010/P210/P016/P216: u16 LE luma rows, then interleaved u16 LE UV rows.
///
/// The secondary plane starts at `primary_stride * height` from the primary
/// plane start. 10-bit variants store samples msb-aligned and pass
/// `shift = 6`; 16-bit variants pass 0. Chroma geometry (half or full
/// height) comes from the frame's own format.
pub(super) fn unpack_split(src: &[u8], shift: u32, frame: &mut Frame) {
    let format = frame.meta().format;
    let width = frame.meta().resolution.width.get();
    let height = frame.meta().resolution.height.get();
    let (w, h) = (width as usize, height as usize);
    let chroma_w = format.plane_width(width, 1) as usize;
    let chroma_h = format.plane_height(height, 1) as usize;

    let luma_stride = w * 2;
    let uv_offset = luma_stride * h;
    let uv_stride = chroma_w * 4;

    let mut planes = frame.planes_mut();
    let [yp, up, vp] = &mut planes[..] else {
        unreachable!("split-plane frame has three planes");
    };
    let (ys, us, vs) = (yp.stride(), up.stride(), vp.stride());
    let (yd, ud, vd) = (yp.data(), up.data(), vp.data());

    for y in 0..h {
        let row = &src[y * luma_stride..][..w * 2];
        let y_row = &mut yd[y * ys..][..w * 2];
        for x in 0..w {
            put_u16(y_row, x, get_u16_le(row, x) >> shift);
        }
    }
    for cy in 0..chroma_h {
        let row = &src[uv_offset + cy * uv_stride..][..chroma_w * 4];
        let u_row = &mut ud[cy * us..][..chroma_w * 2];
        let v_row = &mut vd[cy * vs..][..chroma_w * 2];
        for cx in 0..chroma_w {
            put_u16(u_row, cx, get_u16_le(row, cx * 2) >> shift);
            put_u16(v_row, cx, get_u16_le(row, cx * 2 + 1) >> shift);
        }
    }
}

/// Y416: packed U Y V A u16 LE quads into 4:4:4 16-bit planes; the alpha
/// samples are dropped.
pub(super) fn unpack_y416(src: &[u8], frame: &mut Frame) {
    let w = frame.meta().resolution.width.get() as usize;
    let h = frame.meta().resolution.height.get() as usize;
    let src_stride = w * 8;

    let mut planes = frame.planes_mut();
    let [yp, up, vp] = &mut planes[..] else {
        unreachable!("4:4:4 frame has three planes");
    };
    let (ys, us, vs) = (yp.stride(), up.stride(), vp.stride());
    let (yd, ud, vd) = (yp.data(), up.data(), vp.data());

    for y in 0..h {
        let row = &src[y * src_stride..][..w * 8];
        let y_row = &mut yd[y * ys..][..w * 2];
        let u_row = &mut ud[y * us..][..w * 2];
        let v_row = &mut vd[y * vs..][..w * 2];
        for x in 0..w {
            put_u16(u_row, x, get_u16_le(row, x * 4));
            put_u16(y_row, x, get_u16_le(row, x * 4 + 1));
            put_u16(v_row, x, get_u16_le(row, x * 4 + 2));
        }
    }
}
