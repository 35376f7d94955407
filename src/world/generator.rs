//! Turns a column height field into the block grid of one chunk.
//!
//! Each column is filled from its surface downward through a table of coloured bands,
//! and oceanic columns get fluid from sea level down to the sea floor.

use glam::IVec3;

use crate::constants::*;
use crate::core::block::Block;
use crate::core::chunk::VoxelChunk;
use crate::error::ChunkError;
use crate::utils::settings::TerrainSettings;
use crate::world::heightfield::HeightField;

#[derive(Clone, Copy, Debug)]
struct LayerBand {
    depth: u32,
    color: u32,
}

const fn band(depth: u32, color: u32) -> LayerBand {
    LayerBand { depth, color }
}

// Surface first; the last band runs to the bottom of the world
const LAND_LAYERS: [LayerBand; 4] = [
    band(1, COLOR_GRASS),
    band(3, COLOR_SOIL),
    band(2, COLOR_DARK_SOIL),
    band(u32::MAX, COLOR_STONE),
];

const OCEAN_LAYERS: [LayerBand; 2] = [band(6, COLOR_DARK_SOIL), band(u32::MAX, COLOR_STONE)];

/// Chunk block generator. Cheap to construct; holds only the sea level.
#[derive(Clone, Debug)]
pub struct ChunkGenerator {
    sea_level: i32,
    fluid: Block,
}

impl ChunkGenerator {
    pub fn new(terrain: &TerrainSettings) -> Self {
        ChunkGenerator {
            sea_level: terrain.sea_level_blocks(),
            fluid: Block::fluid(COLOR_WATER),
        }
    }

    pub fn sea_level(&self) -> i32 {
        self.sea_level
    }

    /// Generates the chunk at `position` from its column's height field.
    pub fn generate_chunk(
        &self,
        position: IVec3,
        field: &HeightField,
    ) -> Result<VoxelChunk, ChunkError> {
        let mut chunk = VoxelChunk::new(position);
        self.generate(&mut chunk, field)?;
        Ok(chunk)
    }

    /// Fills an empty chunk. Fails if the height field was never generated.
    pub fn generate(&self, chunk: &mut VoxelChunk, field: &HeightField) -> Result<(), ChunkError> {
        if !field.is_generated() {
            return Err(ChunkError::HeightFieldNotGenerated {
                cx: field.cx,
                cz: field.cz,
            });
        }
        debug_assert_eq!((field.cx, field.cz), (chunk.position.x, chunk.position.z));

        let floor = chunk.position.y * CHUNK_SIZE as i32;
        let ceiling = floor + CHUNK_SIZE as i32;

        // Whole layer above the terrain and above any water
        if (field.max_value() as i32) < floor && (!field.has_ocean() || self.sea_level < floor) {
            return Ok(());
        }

        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                let height = field.height(x, z) as i32;
                let ocean = field.is_ocean(x, z);

                if ocean && height < self.sea_level {
                    let top = self.sea_level.min(ceiling - 1);
                    let bottom = (height + 1).max(floor);
                    for y in bottom..=top {
                        chunk.place(x, (y - floor) as usize, z, self.fluid);
                    }
                }

                if height < floor {
                    continue;
                }

                let bands: &[LayerBand] = if ocean { &OCEAN_LAYERS[..] } else { &LAND_LAYERS[..] };
                let mut band = 0;
                let mut remaining = bands[0].depth;
                for y in (floor..=height).rev() {
                    if y < ceiling {
                        chunk.place(x, (y - floor) as usize, z, Block::solid(bands[band].color));
                    }
                    remaining -= 1;
                    if remaining == 0 && band + 1 < bands.len() {
                        band += 1;
                        remaining = bands[band].depth;
                    }
                }
            }
        }

        chunk.release_if_air();
        Ok(())
    }
}
