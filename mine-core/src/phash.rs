//! Perceptual hashing of a world's tile layout into a 64-bit fingerprint.
//!
//! Downsamples a grayscale projection, takes a low-frequency 2-D DCT-II, and
//! thresholds the coefficients against their median (excluding the DC term)
//! to produce a compact layout signature suitable for Hamming-distance
//! comparisons.

use crate::world::{Overlay, Terrain, Tile, World};

/// Parameters controlling the perceptual hash pipeline.
#[derive(Clone, Copy, Debug)]
pub struct PHashOptions {
    /// Downsampled width.
    pub down_w: usize,
    /// Downsampled height.
    pub down_h: usize,
    /// Side length of the square low-frequency DCT block; clamped into
    /// `[1, min(down_w, down_h)]`.
    pub dct_size: usize,
}

impl Default for PHashOptions {
    fn default() -> Self {
        Self {
            down_w: 32,
            down_h: 32,
            dct_size: 8,
        }
    }
}

/// Population count of the XOR of two hashes: the standard Hamming distance
/// between two 64-bit perceptual hashes.
#[must_use]
pub const fn hamming_distance_64(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Bilinearly samples `sample` at `(x, y)` given an implicit grid of size
/// `src_w`×`src_h`, clamping to the edge outside `[0, src_w) x [0, src_h)`.
fn sample_bilinear(
    src_w: usize,
    src_h: usize,
    sample: &dyn Fn(usize, usize) -> f32,
    x: f64,
    y: f64,
) -> f32 {
    let x = x.clamp(0.0, (src_w.saturating_sub(1)) as f64);
    let y = y.clamp(0.0, (src_h.saturating_sub(1)) as f64);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(src_w.saturating_sub(1));
    let y1 = (y0 + 1).min(src_h.saturating_sub(1));

    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let v00 = f64::from(sample(x0, y0));
    let v10 = f64::from(sample(x1, y0));
    let v01 = f64::from(sample(x0, y1));
    let v11 = f64::from(sample(x1, y1));

    let top = v00 * (1.0 - fx) + v10 * fx;
    let bottom = v01 * (1.0 - fx) + v11 * fx;
    (top * (1.0 - fy) + bottom * fy) as f32
}

fn downsample(
    src_w: usize,
    src_h: usize,
    sample: &dyn Fn(usize, usize) -> f32,
    down_w: usize,
    down_h: usize,
) -> Vec<f32> {
    let mut out = vec![0.0f32; down_w * down_h];
    for dy in 0..down_h {
        for dx in 0..down_w {
            let sx = (dx as f64 + 0.5) * (src_w as f64 / down_w as f64) - 0.5;
            let sy = (dy as f64 + 0.5) * (src_h as f64 / down_h as f64) - 0.5;
            out[dy * down_w + dx] = sample_bilinear(src_w, src_h, sample, sx, sy);
        }
    }
    out
}

fn alpha(k: usize, n: usize) -> f64 {
    if k == 0 {
        (1.0 / n as f64).sqrt()
    } else {
        (2.0 / n as f64).sqrt()
    }
}

fn cosine_table(n: usize, freqs: usize) -> Vec<f64> {
    // table[u * n + x] = cos(pi * (2x+1) * u / (2n))
    let mut table = vec![0.0f64; freqs * n];
    for u in 0..freqs {
        for x in 0..n {
            let angle = std::f64::consts::PI * (2.0 * x as f64 + 1.0) * u as f64 / (2.0 * n as f64);
            table[u * n + x] = angle.cos();
        }
    }
    table
}

/// Computes the perceptual hash of a `src_w`×`src_h` grayscale projection
/// accessed through `sample`.
#[must_use]
pub fn compute_phash_sample(
    src_w: usize,
    src_h: usize,
    sample: &dyn Fn(usize, usize) -> f32,
    opt: PHashOptions,
) -> u64 {
    let down_w = opt.down_w.max(1);
    let down_h = opt.down_h.max(1);
    let n = opt.dct_size.clamp(1, down_w.min(down_h));

    let downsampled = downsample(src_w, src_h, sample, down_w, down_h);

    let cos_x = cosine_table(down_w, n);
    let cos_y = cosine_table(down_h, n);

    let mut coeffs = vec![0.0f64; n * n];
    for v in 0..n {
        for u in 0..n {
            let mut sum = 0.0f64;
            for y in 0..down_h {
                let cy = cos_y[v * down_h + y];
                for x in 0..down_w {
                    let cx = cos_x[u * down_w + x];
                    sum += f64::from(downsampled[y * down_w + x]) * cx * cy;
                }
            }
            coeffs[v * n + u] = alpha(u, down_w) * alpha(v, down_h) * sum;
        }
    }

    let mut for_median: Vec<f64> = coeffs
        .iter()
        .copied()
        .enumerate()
        .filter(|&(i, _)| i != 0)
        .map(|(_, v)| v)
        .collect();
    let median = median_of(&mut for_median);

    let mut hash: u64 = 0;
    for (i, &c) in coeffs.iter().enumerate() {
        if i >= 64 {
            break;
        }
        if c > median {
            hash |= 1u64 << i;
        }
    }
    hash
}

fn median_of(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mid = values.len() / 2;
    let (_, median_val, _) =
        values.select_nth_unstable_by(mid, |a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median_val = *median_val;
    if values.len() % 2 == 0 {
        let (_, lower_val, _) = values[..=mid].select_nth_unstable_by(mid - 1, |a, b| {
            a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
        });
        (median_val + *lower_val) / 2.0
    } else {
        median_val
    }
}

/// Maps a tile's terrain, overlay, level, and height to the grayscale
/// intensity used by the world layout hash.
#[must_use]
pub fn tile_phash_intensity(tile: Tile) -> f32 {
    let base = match tile.terrain {
        Terrain::Water => 0.0,
        Terrain::Sand => 30.0,
        Terrain::Grass => 60.0,
    };

    let level = f32::from(i16::try_from(tile.level.clamp(1, 3)).unwrap_or(1));
    let overlay = match tile.overlay {
        Overlay::None => base,
        Overlay::Park => 95.0,
        Overlay::Road => 130.0 + 8.0 * level,
        Overlay::Residential => 175.0 + 12.0 * level,
        Overlay::Commercial => 195.0 + 12.0 * level,
        Overlay::Industrial => 215.0 + 12.0 * level,
        Overlay::School | Overlay::Hospital | Overlay::PoliceStation | Overlay::FireStation => 245.0,
    };

    overlay + tile.height.clamp(0.0, 1.0) * 10.0
}

/// Computes the overlay layout perceptual hash of a finished world.
#[must_use]
pub fn compute_world_overlay_phash<W: World>(world: &W) -> u64 {
    let w = world.width().max(0) as usize;
    let h = world.height().max(0) as usize;
    if w == 0 || h == 0 {
        return 0;
    }
    let sample = |x: usize, y: usize| -> f32 {
        tile_phash_intensity(world.at(x as i32, y as i32))
    };
    compute_phash_sample(w, h, &sample, PHashOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hamming_distance_of_equal_hashes_is_zero() {
        assert_eq!(hamming_distance_64(0xABCD, 0xABCD), 0);
    }

    #[test]
    fn hamming_distance_counts_differing_bits() {
        assert_eq!(hamming_distance_64(0b0000, 0b1111), 4);
    }

    #[test]
    fn phash_is_pure() {
        let sample = |x: usize, y: usize| -> f32 { (x + y) as f32 };
        let a = compute_phash_sample(16, 16, &sample, PHashOptions::default());
        let b = compute_phash_sample(16, 16, &sample, PHashOptions::default());
        assert_eq!(a, b);
    }

    #[test]
    fn uniform_image_has_no_ac_energy() {
        let sample = |_x: usize, _y: usize| -> f32 { 42.0 };
        let hash = compute_phash_sample(16, 16, &sample, PHashOptions::default());
        // All AC coefficients equal zero, none exceed the (zero) median, so no
        // bit should be set.
        assert_eq!(hash, 0);
    }

    #[test]
    fn median_of_handles_even_and_odd_lengths() {
        let mut odd = vec![3.0, 1.0, 2.0];
        assert!((median_of(&mut odd) - 2.0).abs() < 1e-9);

        let mut even = vec![4.0, 1.0, 3.0, 2.0];
        assert!((median_of(&mut even) - 2.5).abs() < 1e-9);
    }
}
