use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::constants::*;
use crate::error::SettingsError;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct WorldSettings {
    #[serde(default)]
    pub terrain: TerrainSettings,
    #[serde(default)]
    pub streaming: StreamingSettings,
}

/// Terrain shape. Heights are in metres and converted to blocks via `block_size`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TerrainSettings {
    pub seed: i32,
    pub block_size: f32,
    pub terrain_height: f32,
    pub ocean_floor_height: f32,
    pub mountain_height: f32,
    pub sea_level: f32,
    pub land_ocean_gradient: f32,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            seed: WORLD_SEED,
            block_size: BLOCK_SIZE,
            terrain_height: TERRAIN_HEIGHT,
            ocean_floor_height: OCEAN_FLOOR_HEIGHT,
            mountain_height: MOUNTAIN_HEIGHT,
            sea_level: SEA_LEVEL,
            land_ocean_gradient: LAND_OCEAN_GRADIENT,
        }
    }
}

impl TerrainSettings {
    pub fn max_height(&self) -> f32 {
        self.terrain_height + self.mountain_height + 5.0
    }

    /// Height of the topmost fluid block, in blocks.
    pub fn sea_level_blocks(&self) -> i32 {
        (self.sea_level / self.block_size) as i32
    }

    /// Highest chunk layer the tallest possible column reaches.
    pub fn max_chunk_y(&self) -> i32 {
        (self.max_height() / self.block_size) as i32 / CHUNK_SIZE as i32
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StreamingSettings {
    /// Chunks further than this from the observer are never requested.
    pub render_distance: i32,
    /// Extra distance past the render distance before a loaded chunk is dropped.
    pub unload_margin: i32,
    pub min_chunk_y: i32,
    /// Defaults to the highest layer the terrain can reach.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_chunk_y: Option<i32>,
    pub mesh_pool_size: usize,
    pub batch_size: usize,
    pub retry_delay_ms: u64,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            render_distance: RENDER_DISTANCE,
            unload_margin: CHUNK_UNLOAD_MARGIN,
            min_chunk_y: MIN_CHUNK_Y,
            max_chunk_y: None,
            mesh_pool_size: MESH_POOL_SIZE,
            batch_size: LOADER_BATCH_SIZE,
            retry_delay_ms: BUFFER_RETRY_DELAY_MS,
        }
    }
}

impl StreamingSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn unload_distance(&self) -> i32 {
        self.render_distance + self.unload_margin
    }
}

impl WorldSettings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, SettingsError> {
        let settings: WorldSettings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Vertical chunk range that is streamed, inclusive.
    pub fn chunk_y_bounds(&self) -> (i32, i32) {
        let max = self
            .streaming
            .max_chunk_y
            .unwrap_or_else(|| self.terrain.max_chunk_y());
        (self.streaming.min_chunk_y, max)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let t = &self.terrain;
        let s = &self.streaming;
        if t.block_size <= 0.0 {
            return Err(SettingsError::Invalid(format!(
                "block_size must be positive, got {}",
                t.block_size
            )));
        }
        if t.land_ocean_gradient <= 0.0 || t.land_ocean_gradient >= CONTINENT_LAND_THRESHOLD {
            return Err(SettingsError::Invalid(format!(
                "land_ocean_gradient must be in (0, {}), got {}",
                CONTINENT_LAND_THRESHOLD, t.land_ocean_gradient
            )));
        }
        // A chunk with both solid and fluid blocks holds two buffers at once
        if s.mesh_pool_size < 2 {
            return Err(SettingsError::Invalid(format!(
                "mesh_pool_size must be at least 2, got {}",
                s.mesh_pool_size
            )));
        }
        if s.batch_size == 0 {
            return Err(SettingsError::Invalid("batch_size must be at least 1".into()));
        }
        if s.render_distance < 0 || s.unload_margin < 0 {
            return Err(SettingsError::Invalid(
                "render_distance and unload_margin must not be negative".into(),
            ));
        }
        let (min_y, max_y) = self.chunk_y_bounds();
        if min_y > max_y {
            return Err(SettingsError::Invalid(format!(
                "min_chunk_y {} is above max_chunk_y {}",
                min_y, max_y
            )));
        }
        Ok(())
    }
}
