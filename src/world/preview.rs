//! ASCII rendering of cached height fields, for eyeballing terrain from a terminal.
//!
//! Reads the registry only, so it can run while the loader thread is filling it.

use crate::constants::CHUNK_SIZE;
use crate::utils::settings::TerrainSettings;
use crate::world::heightfield::HeightFieldRegistry;

const RAMP: &[u8] = b" .:-=+*#%@";
const WATER: char = '~';
const MISSING: char = '?';

pub struct HeightPreview {
    radius: i32,
    step: usize,
    max_height: f32,
    sea_level: i32,
}

impl HeightPreview {
    /// Covers `radius` chunk columns around the centre, one character per `step` blocks.
    pub fn new(terrain: &TerrainSettings, radius: i32, step: usize) -> Self {
        HeightPreview {
            radius: radius.max(0),
            step: step.clamp(1, CHUNK_SIZE),
            max_height: terrain.max_height() / terrain.block_size,
            sea_level: terrain.sea_level_blocks(),
        }
    }

    /// Character for one column, by height relative to the terrain maximum.
    pub fn glyph(&self, height: u16, ocean: bool) -> char {
        if ocean && (height as i32) < self.sea_level {
            return WATER;
        }
        let t = (height as f32 / self.max_height).clamp(0.0, 1.0);
        RAMP[(t * (RAMP.len() - 1) as f32).round() as usize] as char
    }

    /// Rows run along z, characters along x. Columns not in the registry print as `?`.
    pub fn render(&self, registry: &HeightFieldRegistry, center_cx: i32, center_cz: i32) -> String {
        let samples = CHUNK_SIZE.div_ceil(self.step);
        let span = (2 * self.radius + 1) as usize;
        let mut out = String::with_capacity(span * samples * (span * samples + 1));

        for cz in center_cz - self.radius..=center_cz + self.radius {
            let fields: Vec<_> = (center_cx - self.radius..=center_cx + self.radius)
                .map(|cx| registry.get(cx, cz))
                .collect();
            for z in (0..CHUNK_SIZE).step_by(self.step) {
                for field in &fields {
                    for x in (0..CHUNK_SIZE).step_by(self.step) {
                        let glyph = match field {
                            Some(field) => self.glyph(field.height(x, z), field.is_ocean(x, z)),
                            None => MISSING,
                        };
                        out.push(glyph);
                    }
                }
                out.push('\n');
            }
        }
        out
    }
}
