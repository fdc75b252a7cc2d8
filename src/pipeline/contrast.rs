//! Per-channel auto-contrast.
//!
//! Each of R, G and B is stretched independently so its darkest value maps
//! to 0 and its brightest to 255. A channel with a single value is left
//! unchanged. Alpha is dropped: crops are saved as RGB.

use image::{DynamicImage, RgbImage};

pub fn autocontrast(img: &DynamicImage) -> DynamicImage {
    let mut rgb: RgbImage = img.to_rgb8();

    let mut lo = [u8::MAX; 3];
    let mut hi = [u8::MIN; 3];
    for px in rgb.pixels() {
        for c in 0..3 {
            lo[c] = lo[c].min(px[c]);
            hi[c] = hi[c].max(px[c]);
        }
    }

    let luts: [[u8; 256]; 3] = std::array::from_fn(|c| channel_lut(lo[c], hi[c]));
    for px in rgb.pixels_mut() {
        for c in 0..3 {
            px[c] = luts[c][px[c] as usize];
        }
    }

    DynamicImage::ImageRgb8(rgb)
}

fn channel_lut(lo: u8, hi: u8) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (v, out) in lut.iter_mut().enumerate() {
        *out = if hi <= lo {
            v as u8
        } else {
            let v = (v as i32).clamp(lo as i32, hi as i32);
            let scaled = (v - lo as i32) as f32 * 255.0 / (hi - lo) as f32;
            scaled.round() as u8
        };
    }
    lut
}
