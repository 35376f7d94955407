// World constants
pub const WORLD_SEED: i32 = 353464;
pub const CHUNK_SIZE: usize = 32;
pub const CHUNK_AREA: usize = CHUNK_SIZE * CHUNK_SIZE;
pub const CHUNK_VOLUME: usize = CHUNK_AREA * CHUNK_SIZE;

// Terrain shape, all heights in metres
pub const BLOCK_SIZE: f32 = 1.0;
pub const TERRAIN_HEIGHT: f32 = 60.0;
pub const OCEAN_FLOOR_HEIGHT: f32 = 5.0;
pub const MOUNTAIN_HEIGHT: f32 = 140.0;
pub const TERRAIN_MAX_HEIGHT: f32 = TERRAIN_HEIGHT + MOUNTAIN_HEIGHT + 5.0;
pub const SEA_LEVEL: f32 = 58.0;
pub const LAND_OCEAN_GRADIENT: f32 = 0.02;

// Noise shaping, applied to samples remapped into [0, 1]
pub const CONTINENT_LAND_THRESHOLD: f32 = 0.75;
pub const MOUNTAIN_BAND_LOW: f32 = 0.75;
pub const MOUNTAIN_BAND_HIGH: f32 = 0.8;
pub const MOUNTAIN_PEAK_CAP: f32 = 0.48;

// Streaming
pub const RENDER_DISTANCE: i32 = 8;
pub const CHUNK_UNLOAD_MARGIN: i32 = 2;
pub const MIN_CHUNK_Y: i32 = 0;

// Optimization constants
pub const MESH_POOL_SIZE: usize = 6;
pub const LOADER_BATCH_SIZE: usize = 3;
pub const BUFFER_RETRY_DELAY_MS: u64 = 32;

// Block colours, 0xBBGGRR
pub const COLOR_GRASS: u32 = 0x77e08e;
pub const COLOR_SOIL: u32 = 0x4d679e;
pub const COLOR_DARK_SOIL: u32 = 0x27395e;
pub const COLOR_STONE: u32 = 0xd0d0d0;
pub const COLOR_WATER: u32 = 0xd66b3c;
