//! Contrast Limited Adaptive Histogram Equalization (CLAHE).
//!
//! The image is split into a `grid x grid` arrangement of tiles. Each tile
//! gets its own equalization lookup table built from a clipped histogram;
//! the clipped excess is spread back over all bins so no intensity is
//! amplified by more than `clip_limit` times a flat histogram. Output
//! pixels bilinearly blend the tables of the four nearest tile centers,
//! which hides tile boundaries.
//!
//! When the image side is not a multiple of the grid, tiles are sized by
//! rounding up and the missing rows/columns are read by 101-reflection
//! (`dcb|abcd|cba`), so every tile sees the same pixel count.

use image::{GrayImage, Luma};

const BINS: usize = 256;

/// Equalize `image` tile by tile.
///
/// `grid` is the number of tiles per side and `clip_limit` the histogram
/// clip factor relative to a flat histogram (typical values 2.0 to 4.0).
/// A zero grid returns the image unchanged.
#[must_use = "returns the equalized image"]
pub fn clahe(image: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (w, h) = image.dimensions();
    if grid == 0 || w == 0 || h == 0 {
        return image.clone();
    }

    let tile_w = w.div_ceil(grid);
    let tile_h = h.div_ceil(grid);
    let luts = tile_luts(image, clip_limit, grid, tile_w, tile_h);

    #[allow(clippy::cast_precision_loss)]
    let (inv_tw, inv_th) = (1.0 / tile_w as f32, 1.0 / tile_h as f32);
    let last = i64::from(grid) - 1;

    GrayImage::from_fn(w, h, |x, y| {
        let value = usize::from(image.get_pixel(x, y).0[0]);

        #[allow(clippy::cast_precision_loss)]
        let tyf = (y as f32).mul_add(inv_th, -0.5);
        #[allow(clippy::cast_possible_truncation)]
        let ty1 = tyf.floor() as i64;
        #[allow(clippy::cast_precision_loss)]
        let ya = tyf - ty1 as f32;

        #[allow(clippy::cast_precision_loss)]
        let txf = (x as f32).mul_add(inv_tw, -0.5);
        #[allow(clippy::cast_possible_truncation)]
        let tx1 = txf.floor() as i64;
        #[allow(clippy::cast_precision_loss)]
        let xa = txf - tx1 as f32;

        let (ty2, ty1) = ((ty1 + 1).min(last), ty1.max(0));
        let (tx2, tx1) = ((tx1 + 1).min(last), tx1.max(0));

        let at = |tx: i64, ty: i64| {
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            let tile = (ty * (last + 1) + tx) as usize;
            f32::from(luts[tile][value])
        };

        let top = at(tx1, ty1).mul_add(1.0 - xa, at(tx2, ty1) * xa);
        let bottom = at(tx1, ty2).mul_add(1.0 - xa, at(tx2, ty2) * xa);
        let blended = top.mul_add(1.0 - ya, bottom * ya);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let out = blended.round().clamp(0.0, 255.0) as u8;
        Luma([out])
    })
}

/// Build one lookup table per tile, row-major.
fn tile_luts(
    image: &GrayImage,
    clip_limit: f32,
    grid: u32,
    tile_w: u32,
    tile_h: u32,
) -> Vec<[u8; BINS]> {
    let (w, h) = image.dimensions();
    let area = tile_w * tile_h;

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let clip = if clip_limit > 0.0 {
        ((clip_limit * area as f32 / BINS as f32) as u32).max(1)
    } else {
        u32::MAX
    };
    #[allow(clippy::cast_precision_loss)]
    let lut_scale = 255.0 / area as f32;

    let mut luts = Vec::with_capacity((grid * grid) as usize);
    for ty in 0..grid {
        for tx in 0..grid {
            let mut hist = [0u32; BINS];
            for row in ty * tile_h..(ty + 1) * tile_h {
                let sy = reflect_101(row, h);
                for col in tx * tile_w..(tx + 1) * tile_w {
                    let sx = reflect_101(col, w);
                    hist[usize::from(image.get_pixel(sx, sy).0[0])] += 1;
                }
            }

            clip_histogram(&mut hist, clip);

            let mut lut = [0u8; BINS];
            let mut sum = 0u32;
            for (bin, count) in lut.iter_mut().zip(hist.iter()) {
                sum += count;
                #[allow(
                    clippy::cast_precision_loss,
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss
                )]
                {
                    *bin = (sum as f32 * lut_scale).round().clamp(0.0, 255.0) as u8;
                }
            }
            luts.push(lut);
        }
    }
    luts
}

/// Clip every bin at `clip` and redistribute the excess uniformly, with the
/// remainder spread at a fixed stride from bin 0.
fn clip_histogram(hist: &mut [u32; BINS], clip: u32) {
    let mut clipped = 0u32;
    for bin in hist.iter_mut() {
        if *bin > clip {
            clipped += *bin - clip;
            *bin = clip;
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    let bins = BINS as u32;
    let batch = clipped / bins;
    let mut residual = clipped - batch * bins;
    for bin in hist.iter_mut() {
        *bin += batch;
    }

    if residual > 0 {
        let step = (BINS / residual as usize).max(1);
        for bin in hist.iter_mut().step_by(step) {
            if residual == 0 {
                break;
            }
            *bin += 1;
            residual -= 1;
        }
    }
}

/// Map an index past the image edge back inside by reflecting about the
/// edge pixel (`n - 2`, `n - 3`, ...). `n` must be non-zero.
const fn reflect_101(i: u32, n: u32) -> u32 {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let i = i % period;
    if i < n { i } else { period - i }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_white_stays_white() {
        let img = GrayImage::from_pixel(40, 40, Luma([255]));
        let out = clahe(&img, 2.0, 8);
        assert!(out.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn output_dimensions_preserved_for_uneven_tiles() {
        let img = GrayImage::from_fn(37, 13, |x, y| {
            Luma([u8::try_from((x * 7 + y) % 256).unwrap_or(0)])
        });
        let out = clahe(&img, 2.0, 8);
        assert_eq!(out.dimensions(), (37, 13));
    }

    #[test]
    fn low_contrast_gradient_is_stretched() {
        // Values only span 100..=119; equalization should widen the range.
        let img = GrayImage::from_fn(64, 64, |x, _| {
            Luma([100 + u8::try_from(x / 4 + 4).unwrap_or(0) % 20])
        });
        let out = clahe(&img, 40.0, 1);
        let (min_in, max_in) = min_max(&img);
        let (min_out, max_out) = min_max(&out);
        assert!(
            max_out - min_out > max_in - min_in,
            "expected wider range, in {min_in}..{max_in} out {min_out}..{max_out}",
        );
    }

    #[test]
    fn equalization_preserves_order() {
        let img = GrayImage::from_fn(32, 32, |x, _| Luma([u8::try_from(x * 8).unwrap_or(255)]));
        let out = clahe(&img, 2.0, 1);
        for x in 1..32 {
            assert!(out.get_pixel(x, 0).0[0] >= out.get_pixel(x - 1, 0).0[0]);
        }
    }

    #[test]
    fn zero_grid_is_identity() {
        let img = GrayImage::from_fn(8, 8, |x, y| Luma([u8::try_from(x * y).unwrap_or(0)]));
        assert_eq!(clahe(&img, 2.0, 0), img);
    }

    #[test]
    fn clip_histogram_preserves_total() {
        let mut hist = [0u32; BINS];
        hist[10] = 1000;
        hist[20] = 37;
        clip_histogram(&mut hist, 40);
        assert_eq!(hist.iter().sum::<u32>(), 1037);
        assert!(hist.iter().all(|&b| b <= 40 + 1000 / 256 + 1));
    }

    #[test]
    fn reflect_101_mirrors_about_edges() {
        assert_eq!(reflect_101(0, 5), 0);
        assert_eq!(reflect_101(4, 5), 4);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(3, 1), 0);
    }

    fn min_max(img: &GrayImage) -> (u8, u8) {
        img.pixels().fold((u8::MAX, u8::MIN), |(lo, hi), p| {
            (lo.min(p.0[0]), hi.max(p.0[0]))
        })
    }
}
