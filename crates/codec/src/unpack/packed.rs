//! Packed single-buffer layouts: row-padded RGB, big-endian 16-bit RGB, and
//! byte-interleaved 4:2:2.

use scrub_core::prelude::Frame;

use super::{align4, get_u16_be, put_u16};

/// Row-padded packed RGB (`BI_RGB`), 24 or 32 bits per pixel, B G R (A)
/// byte order. With `flip`, rows are read bottom-up. The 32-bit variant
/// feeds the interleaved fourth byte to the alpha frame when one is given.
pub(super) fn unpack_packed_rgb(
    src: &[u8],
    bit_count: u32,
    flip: bool,
    frame: &mut Frame,
    alpha: Option<&mut Frame>,
) {
    let meta = frame.meta();
    let w = meta.resolution.width.get() as usize;
    let h = meta.resolution.height.get() as usize;
    let px = bit_count as usize / 8;
    debug_assert!(px == 3 || px == 4, "packed RGB is 24- or 32-bit");
    let src_stride = align4(w * px);

    let mut alpha_view = alpha.map(|a| a.planes_mut());
    let mut alpha_plane: Option<(usize, &mut [u8])> = match alpha_view.as_mut() {
        Some(planes) => {
            let plane = &mut planes[0];
            let stride = plane.stride();
            Some((stride, plane.data()))
        }
        None => None,
    };

    let mut planes = frame.planes_mut();
    let [rp, gp, bp] = &mut planes[..] else {
        unreachable!("planar RGB frame has three planes");
    };
    let (rs, gs, bs) = (rp.stride(), gp.stride(), bp.stride());
    let (rd, gd, bd) = (rp.data(), gp.data(), bp.data());

    for y in 0..h {
        let sy = if flip { h - 1 - y } else { y };
        let row = &src[sy * src_stride..][..w * px];
        let r_row = &mut rd[y * rs..][..w];
        let g_row = &mut gd[y * gs..][..w];
        let b_row = &mut bd[y * bs..][..w];
        for x in 0..w {
            let p = &row[x * px..];
            b_row[x] = p[0];
            g_row[x] = p[1];
            r_row[x] = p[2];
        }
        if px == 4
            && let Some((a_stride, a_data)) = alpha_plane.as_mut()
        {
            let a_row = &mut a_data[y * *a_stride..][..w];
            for x in 0..w {
                a_row[x] = row[x * 4 + 3];
            }
        }
    }
}

/// Packed big-endian RGB, one u16 per channel (`b48r`).
pub(super) fn unpack_rgb48_be(src: &[u8], flip: bool, frame: &mut Frame) {
    unpack_wide_rgb(src, flip, frame, 3, 0)
}

/// Packed big-endian ARGB, one u16 per channel (`b64a`); the alpha samples
/// are dropped.
pub(super) fn unpack_argb64_be(src: &[u8], flip: bool, frame: &mut Frame) {
    unpack_wide_rgb(src, flip, frame, 4, 1)
}

fn unpack_wide_rgb(src: &[u8], flip: bool, frame: &mut Frame, channels: usize, first: usize) {
    let meta = frame.meta();
    let w = meta.resolution.width.get() as usize;
    let h = meta.resolution.height.get() as usize;
    let src_stride = align4(w * channels * 2);

    let mut planes = frame.planes_mut();
    let [rp, gp, bp] = &mut planes[..] else {
        unreachable!("planar RGB frame has three planes");
    };
    let (rs, gs, bs) = (rp.stride(), gp.stride(), bp.stride());
    let (rd, gd, bd) = (rp.data(), gp.data(), bp.data());

    for y in 0..h {
        let sy = if flip { h - 1 - y } else { y };
        let row = &src[sy * src_stride..][..w * channels * 2];
        let r_row = &mut rd[y * rs..][..w * 2];
        let g_row = &mut gd[y * gs..][..w * 2];
        let b_row = &mut bd[y * bs..][..w * 2];
        for x in 0..w {
            let base = x * channels + first;
            put_u16(r_row, x, get_u16_be(row, base));
            put_u16(g_row, x, get_u16_be(row, base + 1));
            put_u16(b_row, x, get_u16_be(row, base + 2));
        }
    }
}

/// Byte-interleaved 4:2:2 (`YUY2`): Y0 U Y1 V quads, rows padded to a
/// 4-byte boundary.
pub(super) fn unpack_yuy2(src: &[u8], frame: &mut Frame) {
    let meta = frame.meta();
    let w = meta.resolution.width.get() as usize;
    let h = meta.resolution.height.get() as usize;
    let src_stride = align4(w * 2);

    let mut planes = frame.planes_mut();
    let [yp, up, vp] = &mut planes[..] else {
        unreachable!("4:2:2 frame has three planes");
    };
    let (ys, us, vs) = (yp.stride(), up.stride(), vp.stride());
    let (yd, ud, vd) = (yp.data(), up.data(), vp.data());

    let pairs = w / 2;
    for y in 0..h {
        let row = &src[y * src_stride..][..w * 2];
        let y_row = &mut yd[y * ys..][..w];
        let u_row = &mut ud[y * us..][..pairs];
        let v_row = &mut vd[y * vs..][..pairs];
        for i in 0..pairs {
            let quad = &row[i * 4..i * 4 + 4];
            y_row[i * 2] = quad[0];
            u_row[i] = quad[1];
            y_row[i * 2 + 1] = quad[2];
            v_row[i] = quad[3];
        }
        if w % 2 == 1 {
            y_row[w - 1] = row[pairs * 4];
        }
    }
}
