//! Binary fingerprints of the category marker in an equipment icon.
//!
//! Each icon carries a small category glyph in its top-left corner. The
//! extractor crops that region, resamples it to a fixed square, and keeps
//! only its edges as a packed bit grid. Two icons with the same glyph end up
//! a small Hamming distance apart regardless of the artwork around it.
//!
//! # Pipeline
//!
//! 1. Crop the per-rarity rectangle (fractions of width and height).
//! 2. Resize to `side × side` with a Lanczos3 filter.
//! 3. Stretch each RGB channel to the full 0..=255 range.
//! 4. Convert to luma and apply a 3×3 edge kernel.
//! 5. Threshold to bits, clear the border margin.
//! 6. Clear rows and columns that are mostly set (frame lines, not glyph).
//! 7. Pack row-major, most significant bit first, into `u64` words.

use std::fmt;

use armory_core::{FingerprintConfig, Rarity};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, RgbImage};

use crate::error::VisionError;

/// Packed `side × side` bit grid.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    side: u32,
    words: Vec<u64>,
}

impl Fingerprint {
    /// Pack a row-major bit grid, most significant bit first.
    pub fn pack(side: u32, bits: &[bool]) -> Self {
        let mut words = vec![0u64; bits.len().div_ceil(64)];
        for (i, _) in bits.iter().enumerate().filter(|(_, set)| **set) {
            words[i / 64] |= 1u64 << (63 - i % 64);
        }
        Self { side, words }
    }

    pub fn side(&self) -> u32 {
        self.side
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn bit(&self, x: u32, y: u32) -> bool {
        let i = (y * self.side + x) as usize;
        self.words
            .get(i / 64)
            .is_some_and(|w| w & (1u64 << (63 - i % 64)) != 0)
    }

    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Hamming distance over packed words.
    pub fn distance(&self, other: &Fingerprint) -> u32 {
        hamming(&self.words, &other.words)
    }

    pub fn to_hex(&self) -> String {
        self.words.iter().map(|w| format!("{w:016x}")).collect()
    }
}

impl fmt::Display for Fingerprint {
    /// One line per row, `#` for set bits.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..self.side {
            for x in 0..self.side {
                f.write_str(if self.bit(x, y) { "#" } else { "." })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// XOR + popcount. Slices are compared up to the shorter length.
pub fn hamming(a: &[u64], b: &[u64]) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Extract the marker fingerprint of `image` for an item of `rarity`.
pub fn extract(
    image: &DynamicImage,
    rarity: Rarity,
    config: &FingerprintConfig,
) -> Result<Fingerprint, VisionError> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Err(VisionError::EmptyImage { width, height });
    }

    let crop = config.crop_for(rarity);
    let (x0, x1) = span(crop.x0, crop.x1, width);
    let (y0, y1) = span(crop.y0, crop.y1, height);
    let region = imageops::crop_imm(&rgb, x0, y0, x1 - x0, y1 - y0).to_image();

    let side = config.side;
    let resized = imageops::resize(&region, side, side, FilterType::Lanczos3);
    let edges = find_edges(&luma(&autocontrast(resized)));

    let mut bits: Vec<bool> = edges.pixels().map(|p| p[0] > config.edge_threshold).collect();
    clear_border(&mut bits, side, config.margin_for(rarity));
    suppress_lines(&mut bits, side, config.line_ratio);

    Ok(Fingerprint::pack(side, &bits))
}

/// Pixel span for a ratio pair, at least one pixel wide and inside the image.
fn span(r0: f64, r1: f64, extent: u32) -> (u32, u32) {
    let start = ((r0 * extent as f64).floor() as u32).min(extent - 1);
    let end = ((r1 * extent as f64).floor() as u32)
        .max(start + 1)
        .min(extent);
    (start, end)
}

/// Per-channel linear stretch so the darkest value maps to 0 and the
/// brightest to 255. Flat channels are left unchanged.
fn autocontrast(mut img: RgbImage) -> RgbImage {
    let mut luts = [[0u8; 256]; 3];
    for (c, lut) in luts.iter_mut().enumerate() {
        let mut lo = u8::MAX;
        let mut hi = u8::MIN;
        for p in img.pixels() {
            lo = lo.min(p[c]);
            hi = hi.max(p[c]);
        }
        for (ix, slot) in lut.iter_mut().enumerate() {
            *slot = if hi <= lo {
                ix as u8
            } else {
                let scale = 255.0 / f64::from(hi - lo);
                let offset = -f64::from(lo) * scale;
                (ix as f64 * scale + offset).clamp(0.0, 255.0) as u8
            };
        }
    }
    for p in img.pixels_mut() {
        for c in 0..3 {
            p[c] = luts[c][p[c] as usize];
        }
    }
    img
}

/// ITU-R 601 luma in 16.16 fixed point, rounded.
fn luma(img: &RgbImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b] = img.get_pixel(x, y).0;
        let l = (u32::from(r) * 19595 + u32::from(g) * 38470 + u32::from(b) * 7471 + 0x8000) >> 16;
        Luma([l as u8])
    })
}

/// 3×3 Laplacian-style edge kernel (8 at the centre, −1 around), clamped to
/// 0..=255. Border pixels are copied from the input.
fn find_edges(src: &GrayImage) -> GrayImage {
    let (w, h) = src.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        if x == 0 || y == 0 || x + 1 >= w || y + 1 >= h {
            return *src.get_pixel(x, y);
        }
        let mut acc = 0i32;
        for dy in 0..3 {
            for dx in 0..3 {
                let v = i32::from(src.get_pixel(x + dx - 1, y + dy - 1)[0]);
                acc += if dx == 1 && dy == 1 { 8 * v } else { -v };
            }
        }
        Luma([acc.clamp(0, 255) as u8])
    })
}

fn clear_border(bits: &mut [bool], side: u32, margin: u32) {
    let side = side as usize;
    let margin = margin as usize;
    for y in 0..side {
        for x in 0..side {
            if x < margin || y < margin || x >= side - margin.min(side) || y >= side - margin.min(side)
            {
                bits[y * side + x] = false;
            }
        }
    }
}

/// Clear every row and column with more than `side * ratio` set bits.
/// Sums are taken before anything is cleared.
fn suppress_lines(bits: &mut [bool], side: u32, ratio: f64) {
    let side = side as usize;
    let limit = (ratio * side as f64) as usize;
    let mut rows = vec![0usize; side];
    let mut cols = vec![0usize; side];
    for y in 0..side {
        for x in 0..side {
            if bits[y * side + x] {
                rows[y] += 1;
                cols[x] += 1;
            }
        }
    }
    for y in 0..side {
        for x in 0..side {
            if rows[y] > limit || cols[x] > limit {
                bits[y * side + x] = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Black 100×100 icon with a white square inside the marker region.
    fn marker_icon(x0: u32, x1: u32) -> DynamicImage {
        let img = RgbImage::from_fn(100, 100, |x, y| {
            if (x0..x1).contains(&x) && (15..25).contains(&y) {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn deterministic() {
        let config = FingerprintConfig::default();
        let icon = marker_icon(15, 25);
        let a = extract(&icon, Rarity::Ur, &config).unwrap();
        let b = extract(&icon, Rarity::Ur, &config).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.words().len(), 64);
    }

    #[test]
    fn flat_icon_has_no_bits() {
        let icon = DynamicImage::ImageRgb8(RgbImage::new(80, 80));
        let fp = extract(&icon, Rarity::Ksr, &FingerprintConfig::default()).unwrap();
        assert_eq!(fp.count_ones(), 0);
    }

    #[test]
    fn marker_edges_are_set_inside_margin() {
        let config = FingerprintConfig::default();
        let fp = extract(&marker_icon(15, 25), Rarity::Ur, &config).unwrap();
        assert!(fp.count_ones() > 0);
        for i in 0..config.side {
            for m in 0..5 {
                assert!(!fp.bit(i, m));
                assert!(!fp.bit(m, i));
                assert!(!fp.bit(i, config.side - 1 - m));
                assert!(!fp.bit(config.side - 1 - m, i));
            }
        }
    }

    #[test]
    fn different_markers_differ() {
        let config = FingerprintConfig::default();
        let a = extract(&marker_icon(15, 25), Rarity::Ur, &config).unwrap();
        let b = extract(&marker_icon(5, 12), Rarity::Ur, &config).unwrap();
        assert!(a.distance(&b) > 0);
        assert_eq!(a.distance(&a), 0);
    }

    #[test]
    fn tiny_icon_still_fingerprints() {
        let icon = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([9, 9, 9])));
        let fp = extract(&icon, Rarity::Ssr, &FingerprintConfig::default()).unwrap();
        assert_eq!(fp.side(), 64);
        assert_eq!(fp.words().len(), 64);
    }

    #[test]
    fn empty_icon_is_an_error() {
        let icon = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        let err = extract(&icon, Rarity::Ur, &FingerprintConfig::default()).unwrap_err();
        assert!(matches!(err, VisionError::EmptyImage { .. }));
    }

    #[test]
    fn span_clamps_to_image() {
        assert_eq!(span(0.0, 0.38, 100), (0, 38));
        assert_eq!(span(0.0, 0.38, 1), (0, 1));
        assert_eq!(span(0.99, 1.0, 10), (9, 10));
    }

    #[test]
    fn packs_msb_first() {
        let mut bits = vec![false; 128];
        bits[0] = true;
        bits[127] = true;
        let fp = Fingerprint::pack(8, &bits[..64]);
        assert_eq!(fp.words(), &[1u64 << 63]);
        let fp = Fingerprint::pack(0, &bits);
        assert_eq!(fp.words(), &[1u64 << 63, 1]);
        assert_eq!(fp.count_ones(), 2);
    }

    #[test]
    fn hamming_counts_differing_bits() {
        assert_eq!(hamming(&[0b1010, u64::MAX], &[0b0110, 0]), 2 + 64);
    }

    #[test]
    fn border_cleared() {
        let side = 8;
        let mut bits = vec![true; 64];
        clear_border(&mut bits, side, 2);
        let set: Vec<usize> = (0..64).filter(|&i| bits[i]).collect();
        assert_eq!(set.len(), 16);
        assert!(bits[2 * 8 + 2]);
        assert!(!bits[8 + 3]);
    }

    #[test]
    fn dense_lines_suppressed() {
        let side = 10;
        let mut bits = vec![false; 100];
        // Row 4 fully set: a frame line.
        for x in 0..10 {
            bits[4 * 10 + x] = true;
        }
        // A short glyph stroke in column 2.
        for y in 6..9 {
            bits[y * 10 + 2] = true;
        }
        suppress_lines(&mut bits, side, 0.70);
        assert!((0..10).all(|x| !bits[4 * 10 + x]));
        assert!((6..9).all(|y| bits[y * 10 + 2]));
    }

    #[test]
    fn suppression_limit_is_strict() {
        let mut bits = vec![false; 100];
        // Exactly 7 of 10: not above the 0.70 limit.
        for x in 0..7 {
            bits[x] = true;
        }
        suppress_lines(&mut bits, 10, 0.70);
        assert_eq!(bits.iter().filter(|b| **b).count(), 7);
    }

    #[test]
    fn autocontrast_stretches_each_channel() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([0, 10, 7]));
        img.put_pixel(1, 0, Rgb([85, 20, 7]));
        let out = autocontrast(img);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 7]);
        assert_eq!(out.get_pixel(1, 0).0, [255, 255, 7]);
    }

    #[test]
    fn edges_of_flat_interior_are_zero() {
        let src = GrayImage::from_pixel(4, 4, Luma([100]));
        let out = find_edges(&src);
        assert_eq!(out.get_pixel(1, 1)[0], 0);
        assert_eq!(out.get_pixel(0, 0)[0], 100);
    }

    #[test]
    fn display_renders_grid() {
        let mut bits = vec![false; 4];
        bits[1] = true;
        let fp = Fingerprint::pack(2, &bits);
        assert_eq!(fp.to_string(), ".#\n..\n");
        assert_eq!(fp.to_hex(), "4000000000000000");
    }
}
