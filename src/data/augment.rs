// ============================================================
// Layer 4 — Random Geometric Augmentation
// ============================================================
// Every sample pulled from a pipeline gets a fresh random
// affine transform followed by an optional horizontal flip:
//
//   rotation   θ  ~ U(-30°, 30°)
//   shift      tx ~ U(-0.2, 0.2) · width,   ty ~ U(-0.2, 0.2) · height
//   shear      s  ~ U(-0.2, 0.2)            (radians)
//   zoom       zx, zy ~ U(0.8, 1.2)         (independent per axis)
//   flip       with probability 0.5
//
// The transform is applied as an inverse map: for every OUTPUT
// pixel we compute where it comes from in the INPUT image
//
//   src = R(θ) · ( Sh(s) · Z(zx, zy) · (dst - c) + t ) + c
//
// and copy the nearest input pixel. Source coordinates outside
// the image are clamped to the closest edge pixel ("nearest"
// fill), so no black borders appear.
//
// All randomness comes from the caller's ChaCha8Rng, which makes
// a given (seed, sample) pair reproducible.

use image::{imageops, Rgb, RgbImage};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Ranges of the random transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AugmentConfig {
    /// Maximum absolute rotation, in degrees
    pub rotation_range: f32,

    /// Maximum horizontal shift as a fraction of the width
    pub width_shift_range: f32,

    /// Maximum vertical shift as a fraction of the height
    pub height_shift_range: f32,

    /// Maximum absolute shear angle, in radians
    pub shear_range: f32,

    /// Zoom factors are drawn from [1 - zoom_range, 1 + zoom_range]
    pub zoom_range: f32,

    pub horizontal_flip: bool,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            rotation_range:     30.0,
            width_shift_range:  0.2,
            height_shift_range: 0.2,
            shear_range:        0.2,
            zoom_range:         0.2,
            horizontal_flip:    true,
        }
    }
}

impl AugmentConfig {
    /// Draw one concrete transform for an image of the given size.
    pub fn sample(&self, width: u32, height: u32, rng: &mut ChaCha8Rng) -> AffineParams {
        AffineParams {
            rotation_deg: symmetric(rng, self.rotation_range),
            shift_rows:   symmetric(rng, self.height_shift_range) * height as f32,
            shift_cols:   symmetric(rng, self.width_shift_range) * width as f32,
            shear:        symmetric(rng, self.shear_range),
            zoom_rows:    1.0 + symmetric(rng, self.zoom_range),
            zoom_cols:    1.0 + symmetric(rng, self.zoom_range),
            flip:         self.horizontal_flip && rng.gen_bool(0.5),
        }
    }
}

/// Uniform sample in [-range, range]; exactly 0 when range is 0.
fn symmetric(rng: &mut ChaCha8Rng, range: f32) -> f32 {
    if range <= 0.0 {
        0.0
    } else {
        rng.gen_range(-range..=range)
    }
}

/// One concrete draw of the random transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineParams {
    pub rotation_deg: f32,
    pub shift_rows:   f32,
    pub shift_cols:   f32,
    pub shear:        f32,
    pub zoom_rows:    f32,
    pub zoom_cols:    f32,
    pub flip:         bool,
}

impl AffineParams {
    fn is_identity_affine(&self) -> bool {
        self.rotation_deg == 0.0
            && self.shift_rows == 0.0
            && self.shift_cols == 0.0
            && self.shear == 0.0
            && self.zoom_rows == 1.0
            && self.zoom_cols == 1.0
    }

    /// Map an output (row, col) to its source (row, col) in the input.
    fn source_of(&self, row: f32, col: f32, centre: (f32, f32)) -> (f32, f32) {
        let (cr, cc) = centre;
        let (dr, dc) = (row - cr, col - cc);

        // Z · d
        let (zr, zc) = (dr * self.zoom_rows, dc * self.zoom_cols);

        // Sh · Z · d   with Sh = [[1, -sin s], [0, cos s]]
        let (sr, sc) = (zr - self.shear.sin() * zc, self.shear.cos() * zc);

        // + t
        let (tr, tc) = (sr + self.shift_rows, sc + self.shift_cols);

        // R · (...)    with R = [[cos θ, -sin θ], [sin θ, cos θ]]
        let theta = self.rotation_deg.to_radians();
        let (sin, cos) = theta.sin_cos();
        (cos * tr - sin * tc + cr, sin * tr + cos * tc + cc)
    }

    /// Apply the transform, returning a new image of the same size.
    pub fn apply(&self, img: &RgbImage) -> RgbImage {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return img.clone();
        }

        let mut out = if self.is_identity_affine() {
            img.clone()
        } else {
            let centre = ((height as f32 - 1.0) / 2.0, (width as f32 - 1.0) / 2.0);
            let max_r  = (height - 1) as f32;
            let max_c  = (width - 1) as f32;

            RgbImage::from_fn(width, height, |x, y| {
                let (sr, sc) = self.source_of(y as f32, x as f32, centre);
                // nearest neighbour + edge clamp
                let r = sr.round().clamp(0.0, max_r) as u32;
                let c = sc.round().clamp(0.0, max_c) as u32;
                let p: &Rgb<u8> = img.get_pixel(c, r);
                *p
            })
        };

        if self.flip {
            imageops::flip_horizontal_in_place(&mut out);
        }
        out
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([x as u8, y as u8, 7]))
    }

    fn identity() -> AffineParams {
        AffineParams {
            rotation_deg: 0.0,
            shift_rows:   0.0,
            shift_cols:   0.0,
            shear:        0.0,
            zoom_rows:    1.0,
            zoom_cols:    1.0,
            flip:         false,
        }
    }

    fn no_augmentation() -> AugmentConfig {
        AugmentConfig {
            rotation_range:     0.0,
            width_shift_range:  0.0,
            height_shift_range: 0.0,
            shear_range:        0.0,
            zoom_range:         0.0,
            horizontal_flip:    false,
        }
    }

    #[test]
    fn test_identity_keeps_image() {
        let img = gradient(8, 6);
        assert_eq!(identity().apply(&img), img);
    }

    #[test]
    fn test_flip_mirrors_columns() {
        let img = gradient(4, 2);
        let p = AffineParams { flip: true, ..identity() };
        let out = p.apply(&img);
        assert_eq!(out.get_pixel(0, 1), img.get_pixel(3, 1));
        assert_eq!(out.get_pixel(3, 0), img.get_pixel(0, 0));
    }

    #[test]
    fn test_shift_clamps_to_edge() {
        // Shifting the source by +2 columns makes the right edge repeat
        let img = gradient(5, 1);
        let p = AffineParams { shift_cols: 2.0, ..identity() };
        let out = p.apply(&img);
        let row: Vec<u8> = (0..5).map(|x| out.get_pixel(x, 0)[0]).collect();
        assert_eq!(row, vec![2, 3, 4, 4, 4]);
    }

    #[test]
    fn test_half_turn_rotation() {
        let img = gradient(3, 3);
        let p = AffineParams { rotation_deg: 180.0, ..identity() };
        let out = p.apply(&img);
        assert_eq!(out.get_pixel(0, 0), img.get_pixel(2, 2));
        assert_eq!(out.get_pixel(1, 1), img.get_pixel(1, 1));
    }

    #[test]
    fn test_sampled_params_stay_in_range() {
        let cfg = AugmentConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..200 {
            let p = cfg.sample(299, 299, &mut rng);
            assert!(p.rotation_deg.abs() <= 30.0);
            assert!(p.shift_rows.abs() <= 0.2 * 299.0 + 1e-3);
            assert!(p.shift_cols.abs() <= 0.2 * 299.0 + 1e-3);
            assert!(p.shear.abs() <= 0.2);
            assert!((0.8..=1.2).contains(&p.zoom_rows));
            assert!((0.8..=1.2).contains(&p.zoom_cols));
        }
    }

    #[test]
    fn test_same_seed_same_params() {
        let cfg = AugmentConfig::default();
        let a = cfg.sample(10, 10, &mut ChaCha8Rng::seed_from_u64(7));
        let b = cfg.sample(10, 10, &mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_ranges_sample_identity() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(no_augmentation().sample(10, 10, &mut rng), identity());
    }

    #[test]
    fn test_shift_ranges_scale_with_their_own_axis() {
        // wide image, only horizontal shifts enabled
        let cfg = AugmentConfig { width_shift_range: 0.2, ..no_augmentation() };
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let mut widest = 0.0f32;
        for _ in 0..200 {
            let p = cfg.sample(100, 10, &mut rng);
            assert_eq!(p.shift_rows, 0.0);
            assert!(p.shift_cols.abs() <= 20.0 + 1e-3);
            widest = widest.max(p.shift_cols.abs());
        }
        // beyond 0.2 · height, so the width is what scales it
        assert!(widest > 2.0);

        let cfg = AugmentConfig { height_shift_range: 0.2, ..no_augmentation() };
        let p = cfg.sample(100, 10, &mut rng);
        assert_eq!(p.shift_cols, 0.0);
        assert!(p.shift_rows.abs() <= 2.0 + 1e-3);
    }
}
