//! v210: packed 4:2:2 10-bit, three samples per 32-bit word, 16 bytes per
//! six pixels, rows padded to a 128-byte boundary.

use scrub_core::prelude::Frame;

use super::put_u16;

fn sample(word: u32, position: u32) -> u16 {
    ((word >> (10 * position)) & 0x3ff) as u16
}

pub(super) fn unpack_v210(src: &[u8], frame: &mut Frame) {
    let format = frame.meta().format;
    let width = frame.meta().resolution.width.get();
    let w = width as usize;
    let h = frame.meta().resolution.height.get() as usize;
    let chroma_w = format.plane_width(width, 1) as usize;
    let src_stride = (16 * ((w + 5) / 6) + 127) & !127;

    let mut planes = frame.planes_mut();
    let [yp, up, vp] = &mut planes[..] else {
        unreachable!("4:2:2 frame has three planes");
    };
    let (ys, us, vs) = (yp.stride(), up.stride(), vp.stride());
    let (yd, ud, vd) = (yp.data(), up.data(), vp.data());

    let groups = (w + 5) / 6;
    for y in 0..h {
        let row = &src[y * src_stride..][..groups * 16];
        let y_row = &mut yd[y * ys..][..w * 2];
        let u_row = &mut ud[y * us..][..chroma_w * 2];
        let v_row = &mut vd[y * vs..][..chroma_w * 2];
        for g in 0..groups {
            let bytes = &row[g * 16..g * 16 + 16];
            let mut words = [0u32; 4];
            for (i, word) in words.iter_mut().enumerate() {
                *word = u32::from_le_bytes([
                    bytes[i * 4],
                    bytes[i * 4 + 1],
                    bytes[i * 4 + 2],
                    bytes[i * 4 + 3],
                ]);
            }
            // Word layout: (Cb Y Cr) (Y Cb Y) (Cr Y Cb) (Y Cr Y).
            let lumas = [
                sample(words[0], 1),
                sample(words[1], 0),
                sample(words[1], 2),
                sample(words[2], 1),
                sample(words[3], 0),
                sample(words[3], 2),
            ];
            let cbs = [sample(words[0], 0), sample(words[1], 1), sample(words[2], 2)];
            let crs = [sample(words[0], 2), sample(words[2], 0), sample(words[3], 1)];
            for (k, &value) in lumas.iter().enumerate() {
                let x = g * 6 + k;
                if x < w {
                    put_u16(y_row, x, value);
                }
            }
            for k in 0..3 {
                let cx = g * 3 + k;
                if cx < chroma_w {
                    put_u16(u_row, cx, cbs[k]);
                    put_u16(v_row, cx, crs[k]);
                }
            }
        }
    }
}
