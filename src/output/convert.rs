//! Pixel conversion into the byte layout a transport expects.
//!
//! Both transports take 4 bytes per pixel with tightly packed rows
//! (`stride = width * 4`). They differ in channel order and row order:
//! - NDI wants BGRA, rows top to bottom.
//! - Syphon textures are RGBA; clients usually sample them bottom-up, so rows may be
//!   reversed first.
//!
//! Every conversion returns a fresh buffer: the native side may still be reading it
//! after `send_image` returns, so it must never alias the caller's raster.

use framecast_engine::{PixelMode, RasterImage};

pub const BYTES_PER_PIXEL: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgba,
    Bgra,
}

/// What a transport needs from the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelPolicy {
    pub order: ChannelOrder,
    pub flip_vertical: bool,
}

impl PixelPolicy {
    pub const fn ndi(flip_vertical: bool) -> Self {
        Self { order: ChannelOrder::Bgra, flip_vertical }
    }

    pub const fn syphon(flip_vertical: bool) -> Self {
        Self { order: ChannelOrder::Rgba, flip_vertical }
    }
}

/// Tightly packed row length in bytes for a 4-channel frame.
pub fn packed_stride(width: u32) -> usize {
    width as usize * BYTES_PER_PIXEL
}

/// Normalize any raster mode to RGBA, filling an opaque alpha when the source has none.
pub fn to_rgba(image: &RasterImage) -> Vec<u8> {
    let src = image.data();
    let mut out = Vec::with_capacity(image.pixel_count() * BYTES_PER_PIXEL);

    match image.mode() {
        PixelMode::Rgba => out.extend_from_slice(src),
        PixelMode::Rgb => {
            for px in src.chunks_exact(3) {
                out.extend_from_slice(&[px[0], px[1], px[2], 255]);
            }
        }
        PixelMode::La => {
            for px in src.chunks_exact(2) {
                out.extend_from_slice(&[px[0], px[0], px[0], px[1]]);
            }
        }
        PixelMode::L => {
            for &l in src {
                out.extend_from_slice(&[l, l, l, 255]);
            }
        }
    }

    out
}

/// Convert a raster into a transport-ready buffer.
pub fn convert(image: &RasterImage, policy: PixelPolicy) -> Vec<u8> {
    let mut out = to_rgba(image);

    if policy.order == ChannelOrder::Bgra {
        swap_red_blue(&mut out);
    }
    if policy.flip_vertical {
        vflip_in_place(&mut out, packed_stride(image.width()), image.height() as usize);
    }

    out
}

/// RGBA <-> BGRA. Green and alpha stay put, so the swap is its own inverse.
pub fn swap_red_blue(buf: &mut [u8]) {
    for px in buf.chunks_exact_mut(BYTES_PER_PIXEL) {
        px.swap(0, 2);
    }
}

/// Reverse row order of a packed buffer.
pub fn vflip_in_place(buf: &mut [u8], row: usize, rows: usize) {
    if row == 0 || rows < 2 {
        return;
    }
    for y in 0..rows / 2 {
        let (top, bottom) = buf.split_at_mut((rows - 1 - y) * row);
        top[y * row..(y + 1) * row].swap_with_slice(&mut bottom[..row]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 4x2 RGBA raster, pixel i (row-major) = (3i+1, 3i+2, 3i+3, 255).
    fn sample_4x2() -> RasterImage {
        let mut data = Vec::new();
        for i in 0..8u8 {
            data.extend_from_slice(&[3 * i + 1, 3 * i + 2, 3 * i + 3, 255]);
        }
        RasterImage::from_rgba(4, 2, data).unwrap()
    }

    #[test]
    fn ndi_swaps_red_and_blue_per_pixel() {
        let img = sample_4x2();
        let out = convert(&img, PixelPolicy::ndi(false));

        assert_eq!(out.len(), 4 * 2 * 4);
        assert_eq!(&out[0..4], &[3, 2, 1, 255]);
        assert_eq!(&out[4..8], &[6, 5, 4, 255]);
        // first pixel of the second row: (13,14,15,255)
        assert_eq!(&out[16..20], &[15, 14, 13, 255]);
    }

    #[test]
    fn bgra_swap_recovers_the_source() {
        let img = sample_4x2();
        let mut out = convert(&img, PixelPolicy::ndi(false));
        swap_red_blue(&mut out);
        assert_eq!(out, img.data());
    }

    #[test]
    fn syphon_passes_rgba_through_unflipped() {
        let img = sample_4x2();
        assert_eq!(convert(&img, PixelPolicy::syphon(false)), img.data());
    }

    #[test]
    fn syphon_flip_reverses_rows() {
        let img = sample_4x2();
        let out = convert(&img, PixelPolicy::syphon(true));
        let row = packed_stride(4);
        assert_eq!(&out[..row], &img.data()[row..]);
        assert_eq!(&out[row..], &img.data()[..row]);
    }

    #[test]
    fn flip_handles_odd_row_counts() {
        let mut buf: Vec<u8> = (0..12).collect(); // 3 rows of 4 bytes
        vflip_in_place(&mut buf, 4, 3);
        assert_eq!(buf, vec![8, 9, 10, 11, 4, 5, 6, 7, 0, 1, 2, 3]);
    }

    #[test]
    fn rgb_gains_opaque_alpha() {
        let img = RasterImage::new(2, 1, PixelMode::Rgb, vec![10, 20, 30, 40, 50, 60]).unwrap();
        assert_eq!(to_rgba(&img), vec![10, 20, 30, 255, 40, 50, 60, 255]);
        assert_eq!(
            convert(&img, PixelPolicy::ndi(false)),
            vec![30, 20, 10, 255, 60, 50, 40, 255]
        );
    }

    #[test]
    fn luminance_modes_expand_to_grey() {
        let l = RasterImage::new(2, 1, PixelMode::L, vec![7, 9]).unwrap();
        assert_eq!(to_rgba(&l), vec![7, 7, 7, 255, 9, 9, 9, 255]);

        let la = RasterImage::new(1, 1, PixelMode::La, vec![5, 128]).unwrap();
        assert_eq!(to_rgba(&la), vec![5, 5, 5, 128]);
    }

    #[test]
    fn output_is_packed_for_every_mode() {
        for mode in [PixelMode::L, PixelMode::La, PixelMode::Rgb, PixelMode::Rgba] {
            let img = RasterImage::new(5, 3, mode, vec![1; 15 * mode.channels()]).unwrap();
            for policy in [PixelPolicy::ndi(false), PixelPolicy::syphon(true)] {
                assert_eq!(convert(&img, policy).len(), packed_stride(5) * 3);
            }
        }
    }

    #[test]
    fn conversion_is_deterministic() {
        let img = sample_4x2();
        let p = PixelPolicy::ndi(true);
        assert_eq!(convert(&img, p), convert(&img, p));
    }

    #[test]
    fn output_does_not_alias_input() {
        let img = sample_4x2();
        let out = convert(&img, PixelPolicy::syphon(false));
        assert_ne!(out.as_ptr(), img.data().as_ptr());
    }
}
