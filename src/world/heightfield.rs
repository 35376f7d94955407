//! Per-column terrain heights
//!
//! A height field covers the (x, z) footprint of one chunk column and is shared by every
//! chunk stacked in that column. Heights are stored in blocks with bit 15 flagging
//! oceanic columns.

use glam::IVec3;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::constants::*;
use crate::core::coords::column_key;
use crate::utils::settings::TerrainSettings;
use crate::world::noise::{FastNoise, FractalParams, NOISE_AMPLITUDE, NoiseRegion, NoiseSource};

pub const OCEAN_FLAG: u16 = 0x8000;
pub const HEIGHT_MASK: u16 = 0x7fff;

// Fine detail and ocean floor roughness
const BASE_TERRAIN_NOISE: FractalParams = FractalParams::new(0.02, 2, 3.0, 0.8);
// Land and ocean placement
const CONTINENT_NOISE: FractalParams = FractalParams::new(0.0001, 4, 4.0, 0.2);
// Mountain ranges
const MOUNTAIN_NOISE: FractalParams = FractalParams::new(0.00001, 2, 2.0, 0.5);

#[derive(Clone, Debug)]
pub struct HeightField {
    pub cx: i32,
    pub cz: i32,
    values: Option<Box<[u16]>>,
    max_value: u16,
    min_value: u16,
    has_ocean: bool,
}

impl HeightField {
    pub fn new(cx: i32, cz: i32) -> Self {
        HeightField {
            cx,
            cz,
            values: None,
            max_value: 0,
            min_value: u16::MAX,
            has_ocean: false,
        }
    }

    /// Builds an already-populated field from `(height, ocean)` pairs indexed `x * CHUNK_SIZE + z`.
    pub fn from_columns(cx: i32, cz: i32, columns: &[(u16, bool); CHUNK_AREA]) -> Self {
        let mut field = HeightField::new(cx, cz);
        let mut values = vec![0u16; CHUNK_AREA].into_boxed_slice();
        for (i, &(height, ocean)) in columns.iter().enumerate() {
            values[i] = field.record(height, ocean);
        }
        field.values = Some(values);
        field
    }

    pub fn is_generated(&self) -> bool {
        self.values.is_some()
    }

    /// Packed values, `None` until generated.
    pub fn values(&self) -> Option<&[u16]> {
        self.values.as_deref()
    }

    /// Surface height in blocks. Zero before generation.
    pub fn height(&self, x: usize, z: usize) -> u16 {
        self.raw(x, z) & HEIGHT_MASK
    }

    pub fn is_ocean(&self, x: usize, z: usize) -> bool {
        self.raw(x, z) & OCEAN_FLAG != 0
    }

    fn raw(&self, x: usize, z: usize) -> u16 {
        self.values
            .as_ref()
            .map_or(0, |values| values[x * CHUNK_SIZE + z])
    }

    pub fn max_value(&self) -> u16 {
        self.max_value
    }

    pub fn min_value(&self) -> u16 {
        self.min_value
    }

    pub fn has_ocean(&self) -> bool {
        self.has_ocean
    }

    /// Chunk position of the layer at `cy` in this column.
    pub fn chunk_position(&self, cy: i32) -> IVec3 {
        IVec3::new(self.cx, cy, self.cz)
    }

    // Folds one column into the summary fields and returns its packed value
    fn record(&mut self, height: u16, ocean: bool) -> u16 {
        let height = height.min(HEIGHT_MASK);
        self.max_value = self.max_value.max(height);
        self.min_value = self.min_value.min(height);
        if ocean {
            self.has_ocean = true;
            height | OCEAN_FLAG
        } else {
            height
        }
    }
}

/// Maps a raw noise sample onto [0, 1].
pub fn remap_sample(sample: f32) -> f32 {
    ((sample + NOISE_AMPLITUDE) / (2.0 * NOISE_AMPLITUDE)).clamp(0.0, 1.0)
}

/// Land weight of a continent sample and whether the column counts as ocean.
///
/// Above the land threshold the column is pure land. A narrow band below it ramps
/// linearly from ocean to land; everything under the band is open ocean.
pub fn continent_factor(sample: f32, gradient: f32) -> (f32, bool) {
    let band_floor = CONTINENT_LAND_THRESHOLD - gradient;
    if sample > CONTINENT_LAND_THRESHOLD {
        (1.0, false)
    } else if sample > band_floor {
        ((sample - band_floor) / gradient, true)
    } else {
        (0.0, true)
    }
}

/// Reshapes a mountain sample into isolated peaks.
///
/// Only samples inside a thin band produce elevation. The band is stretched to [0, 1],
/// passed through a sine and folded back down past 0.5 so ridges rise and fall sharply.
pub fn mountain_factor(sample: f32) -> f32 {
    let sample = if (MOUNTAIN_BAND_LOW..=MOUNTAIN_BAND_HIGH).contains(&sample) {
        sample
    } else {
        MOUNTAIN_BAND_LOW
    };
    let ridge = ((sample - MOUNTAIN_BAND_LOW) / (MOUNTAIN_BAND_HIGH - MOUNTAIN_BAND_LOW)).sin();
    let ridge = if ridge > 0.5 { 1.0 - ridge } else { ridge };
    ridge.min(MOUNTAIN_PEAK_CAP)
}

/// Samples the three terrain noise fields and folds them into column heights.
///
/// Owns its scratch buffers, so one generator must not be shared between threads.
pub struct HeightFieldGenerator<N: NoiseSource = FastNoise> {
    terrain: TerrainSettings,
    base_noise: N,
    continent_noise: N,
    mountain_noise: N,
    base_data: Vec<f32>,
    continent_data: Vec<f32>,
    mountain_data: Vec<f32>,
}

impl HeightFieldGenerator<FastNoise> {
    pub fn new(terrain: &TerrainSettings) -> Self {
        let seed = terrain.seed;
        Self::with_noise(
            terrain,
            FastNoise::new(seed),
            FastNoise::new(seed.wrapping_add(1)),
            FastNoise::new(seed.wrapping_add(2)),
        )
    }
}

impl<N: NoiseSource> HeightFieldGenerator<N> {
    pub fn with_noise(terrain: &TerrainSettings, base: N, continent: N, mountain: N) -> Self {
        HeightFieldGenerator {
            terrain: terrain.clone(),
            base_noise: base,
            continent_noise: continent,
            mountain_noise: mountain,
            base_data: vec![0.0; CHUNK_AREA],
            continent_data: vec![0.0; CHUNK_AREA],
            mountain_data: vec![0.0; CHUNK_AREA],
        }
    }

    pub fn terrain(&self) -> &TerrainSettings {
        &self.terrain
    }

    pub fn generate_column(&mut self, cx: i32, cz: i32) -> HeightField {
        let mut field = HeightField::new(cx, cz);
        self.generate(&mut field);
        field
    }

    /// Fills `field` from noise. A field that is already populated is left untouched.
    pub fn generate(&mut self, field: &mut HeightField) {
        if field.is_generated() {
            return;
        }

        let bsz = self.terrain.block_size;
        let region = NoiseRegion {
            origin_x: field.cx * CHUNK_SIZE as i32,
            origin_z: field.cz * CHUNK_SIZE as i32,
            width: CHUNK_SIZE,
            height: CHUNK_SIZE,
            scale_x: bsz,
            scale_z: bsz,
        };
        self.base_noise
            .generate(&mut self.base_data, region, BASE_TERRAIN_NOISE);
        self.continent_noise
            .generate(&mut self.continent_data, region, CONTINENT_NOISE);
        self.mountain_noise
            .generate(&mut self.mountain_data, region, MOUNTAIN_NOISE);

        let mut values = vec![0u16; CHUNK_AREA].into_boxed_slice();
        for i in 0..CHUNK_AREA {
            let (height, ocean) = self.column_height(
                self.base_data[i],
                self.continent_data[i],
                self.mountain_data[i],
            );
            values[i] = field.record(height, ocean);
        }
        field.values = Some(values);
    }

    /// Height in blocks and ocean flag for one column from its three raw samples.
    pub fn column_height(&self, base: f32, continent: f32, mountain: f32) -> (u16, bool) {
        let t = &self.terrain;
        let base = remap_sample(base);
        let (continent, ocean) = continent_factor(remap_sample(continent), t.land_ocean_gradient);
        let mountain = mountain_factor(remap_sample(mountain));

        let mut h = t.ocean_floor_height;
        // Ocean floor roughness
        h += (1.0 - continent) * base * 6.0;
        // Land surface
        h += continent * ((t.terrain_height - t.ocean_floor_height) + base * 1.5);
        h += mountain * (t.mountain_height - t.terrain_height - t.ocean_floor_height);
        let h = h.clamp(0.0, t.max_height());

        let blocks = (h / t.block_size).min(HEIGHT_MASK as f32) as u16;
        (blocks, ocean)
    }
}

/// Process-lifetime cache of generated height fields, keyed by column.
///
/// Entries are never evicted; a session only ever touches the columns within render
/// distance of where the observer has been.
#[derive(Default)]
pub struct HeightFieldRegistry {
    fields: RwLock<FxHashMap<u64, Arc<HeightField>>>,
}

impl HeightFieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, cx: i32, cz: i32) -> Option<Arc<HeightField>> {
        self.fields.read().get(&column_key(cx, cz)).cloned()
    }

    /// Returns the cached field for a column, generating it on first request.
    pub fn get_or_generate<N: NoiseSource>(
        &self,
        cx: i32,
        cz: i32,
        generator: &mut HeightFieldGenerator<N>,
    ) -> Arc<HeightField> {
        if let Some(field) = self.get(cx, cz) {
            return field;
        }
        // Generate outside the lock so readers are never held up by noise sampling
        let field = generator.generate_column(cx, cz);
        self.insert(field)
    }

    /// Stores a field unless its column is already cached, returning the cached entry.
    pub fn insert(&self, field: HeightField) -> Arc<HeightField> {
        let key = column_key(field.cx, field.cz);
        self.fields
            .write()
            .entry(key)
            .or_insert_with(|| Arc::new(field))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.fields.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::noise::ConstNoise;

    fn const_generator(base: f32, continent: f32, mountain: f32) -> HeightFieldGenerator<ConstNoise> {
        HeightFieldGenerator::with_noise(
            &TerrainSettings::default(),
            ConstNoise(base),
            ConstNoise(continent),
            ConstNoise(mountain),
        )
    }

    #[test]
    fn test_remap_sample() {
        assert_eq!(remap_sample(-1.0), 0.0);
        assert_eq!(remap_sample(1.0), 1.0);
        assert!((remap_sample(0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_continent_factor_bands() {
        assert_eq!(continent_factor(0.8, 0.02), (1.0, false));
        let (ramp, ocean) = continent_factor(0.74, 0.02);
        assert!(ocean);
        assert!((ramp - 0.5).abs() < 1e-3);
        assert_eq!(continent_factor(0.5, 0.02), (0.0, true));
    }

    #[test]
    fn test_mountain_factor_shape() {
        assert_eq!(mountain_factor(0.9), 0.0);
        assert_eq!(mountain_factor(0.7), 0.0);
        let mid = mountain_factor(0.775);
        assert!((mid - 0.5f32.sin()).abs() < 1e-3);
        let top = mountain_factor(0.8);
        assert!((top - (1.0 - 1.0f32.sin())).abs() < 1e-3);
        for i in 0..=100 {
            let v = mountain_factor(i as f32 / 100.0);
            assert!((0.0..=MOUNTAIN_PEAK_CAP).contains(&v));
        }
    }

    #[test]
    fn test_open_ocean_sits_on_ocean_floor() {
        let mut generator = const_generator(-NOISE_AMPLITUDE, -NOISE_AMPLITUDE, -NOISE_AMPLITUDE);
        let field = generator.generate_column(3, -4);
        assert!(field.has_ocean());
        assert_eq!(field.max_value(), 5);
        assert_eq!(field.min_value(), 5);
        let values = field.values().unwrap();
        assert!(values.iter().all(|&v| v == 5 | OCEAN_FLAG));
        assert!(field.is_ocean(0, 0));
        assert_eq!(field.height(31, 31), 5);
    }

    #[test]
    fn test_land_sits_on_terrain_height() {
        let mut generator = const_generator(NOISE_AMPLITUDE, NOISE_AMPLITUDE, NOISE_AMPLITUDE);
        let field = generator.generate_column(0, 0);
        assert!(!field.has_ocean());
        // 5 + (60 - 5) + 1.5 = 61.5 metres
        assert_eq!(field.max_value(), 61);
        assert_eq!(field.min_value(), 61);
        assert!(!field.is_ocean(10, 20));
    }

    #[test]
    fn test_generate_is_idempotent() {
        let terrain = TerrainSettings::default();
        let mut generator = HeightFieldGenerator::new(&terrain);
        let mut field = HeightField::new(12, -7);
        generator.generate(&mut field);
        let first = field.values().unwrap().to_vec();

        generator.generate(&mut field);
        assert_eq!(field.values().unwrap(), &first[..]);

        // A differently seeded generator must not touch a populated field either
        let mut other = HeightFieldGenerator::new(&TerrainSettings {
            seed: 1,
            ..terrain
        });
        other.generate(&mut field);
        assert_eq!(field.values().unwrap(), &first[..]);
    }

    #[test]
    fn test_summary_matches_values() {
        let mut generator = HeightFieldGenerator::new(&TerrainSettings::default());
        let field = generator.generate_column(-40, 17);
        let values = field.values().unwrap();
        let heights: Vec<u16> = values.iter().map(|v| v & HEIGHT_MASK).collect();
        assert_eq!(field.max_value(), *heights.iter().max().unwrap());
        assert_eq!(field.min_value(), *heights.iter().min().unwrap());
        assert_eq!(field.has_ocean(), values.iter().any(|v| v & OCEAN_FLAG != 0));
        assert!(field.max_value() as f32 <= TERRAIN_MAX_HEIGHT);
    }

    #[test]
    fn test_same_seed_same_heights() {
        let terrain = TerrainSettings::default();
        let a = HeightFieldGenerator::new(&terrain).generate_column(5, 5);
        let b = HeightFieldGenerator::new(&terrain).generate_column(5, 5);
        assert_eq!(a.values(), b.values());
    }

    #[test]
    fn test_registry_caches_columns() {
        let registry = HeightFieldRegistry::new();
        let mut generator = HeightFieldGenerator::new(&TerrainSettings::default());
        assert!(registry.get(1, 2).is_none());

        let first = registry.get_or_generate(1, 2, &mut generator);
        let second = registry.get_or_generate(1, 2, &mut generator);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_generated());
        assert_eq!(registry.len(), 1);

        registry.get_or_generate(2, 1, &mut generator);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_from_columns_summary() {
        let mut columns = [(10u16, false); CHUNK_AREA];
        columns[7] = (3, true);
        columns[100] = (40, false);
        let field = HeightField::from_columns(0, 0, &columns);
        assert_eq!(field.max_value(), 40);
        assert_eq!(field.min_value(), 3);
        assert!(field.has_ocean());
        assert!(field.is_ocean(0, 7));
        assert_eq!(field.height(3, 4), 40);
    }
}
