//! Coherent 2D noise used by height-field generation
//!
//! Samples are nominally in [-0.707, 0.707], the range of the SIMD simplex noise the
//! terrain parameters were tuned against.

use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};

/// Half the square root of two, the nominal amplitude of a noise sample.
pub const NOISE_AMPLITUDE: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Rectangular block region to sample, origin in block coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoiseRegion {
    pub origin_x: i32,
    pub origin_z: i32,
    pub width: usize,
    pub height: usize,
    pub scale_x: f32,
    pub scale_z: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FractalParams {
    pub frequency: f32,
    pub octaves: i32,
    pub lacunarity: f32,
    pub gain: f32,
}

impl FractalParams {
    pub const fn new(frequency: f32, octaves: i32, lacunarity: f32, gain: f32) -> Self {
        FractalParams {
            frequency,
            octaves,
            lacunarity,
            gain,
        }
    }
}

/// Deterministic 2D noise evaluated over a region.
///
/// `out` is filled row by row with `width * height` samples, index `x * height + z`.
pub trait NoiseSource {
    fn generate(&mut self, out: &mut [f32], region: NoiseRegion, params: FractalParams);
}

/// OpenSimplex2 FBm noise from FastNoiseLite, rescaled to the nominal sample range.
pub struct FastNoise {
    noise: FastNoiseLite,
    pub seed: i32,
}

impl FastNoise {
    pub fn new(seed: i32) -> Self {
        let mut noise = FastNoiseLite::with_seed(seed);
        noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        FastNoise { noise, seed }
    }

    fn configure(&mut self, params: FractalParams) {
        self.noise.set_frequency(Some(params.frequency));
        if params.octaves > 1 {
            self.noise.set_fractal_type(Some(FractalType::FBm));
            self.noise.set_fractal_octaves(Some(params.octaves));
            self.noise.set_fractal_lacunarity(Some(params.lacunarity));
            self.noise.set_fractal_gain(Some(params.gain));
        } else {
            self.noise.set_fractal_type(Some(FractalType::None));
        }
    }
}

impl NoiseSource for FastNoise {
    fn generate(&mut self, out: &mut [f32], region: NoiseRegion, params: FractalParams) {
        debug_assert!(out.len() >= region.width * region.height);
        self.configure(params);

        for x in 0..region.width {
            let fx = (region.origin_x + x as i32) as f32 * region.scale_x;
            for z in 0..region.height {
                let fz = (region.origin_z + z as i32) as f32 * region.scale_z;
                let sample = self.noise.get_noise_2d(fx, fz) * NOISE_AMPLITUDE;
                out[x * region.height + z] = sample.clamp(-NOISE_AMPLITUDE, NOISE_AMPLITUDE);
            }
        }
    }
}

/// Fills every sample with the same value.
#[cfg(test)]
pub(crate) struct ConstNoise(pub f32);

#[cfg(test)]
impl NoiseSource for ConstNoise {
    fn generate(&mut self, out: &mut [f32], region: NoiseRegion, _params: FractalParams) {
        out[..region.width * region.height].fill(self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(origin_x: i32, origin_z: i32) -> NoiseRegion {
        NoiseRegion {
            origin_x,
            origin_z,
            width: 8,
            height: 8,
            scale_x: 1.0,
            scale_z: 1.0,
        }
    }

    const PARAMS: FractalParams = FractalParams::new(0.02, 2, 3.0, 0.8);

    #[test]
    fn test_deterministic_for_seed() {
        let mut a = FastNoise::new(42);
        let mut b = FastNoise::new(42);
        let mut out_a = [0.0; 64];
        let mut out_b = [0.0; 64];
        a.generate(&mut out_a, region(-16, 96), PARAMS);
        b.generate(&mut out_b, region(-16, 96), PARAMS);
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn test_samples_stay_in_nominal_range() {
        let mut noise = FastNoise::new(7);
        let mut out = [0.0; 64];
        for origin in [0, 1000, -5000] {
            noise.generate(&mut out, region(origin, origin), PARAMS);
            assert!(out.iter().all(|v| v.abs() <= NOISE_AMPLITUDE));
        }
    }

    #[test]
    fn test_region_offset_matches_overlap() {
        let mut noise = FastNoise::new(3);
        let mut whole = [0.0; 64];
        let mut shifted = [0.0; 64];
        noise.generate(&mut whole, region(0, 0), PARAMS);
        noise.generate(&mut shifted, region(4, 0), PARAMS);
        // Column x = 4 of the first region is column x = 0 of the second
        assert_eq!(whole[4 * 8..5 * 8], shifted[0..8]);
    }
}
