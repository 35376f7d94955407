// Core module with fundamental types
pub mod core;

// Render module with meshing and buffer pooling
pub mod render;

// World module with generation and streaming
pub mod world;

// Other modules
pub mod constants;
pub mod error;
pub mod utils;

// Re-exports
pub use constants::*;
pub use self::core::{Block, Vertex, VoxelChunk, chunk_distance, chunk_key, column_key, key_to_position};
pub use error::{BufferUnavailable, ChunkError, LoaderError, SettingsError};
pub use render::{ChunkMesh, MeshBufferPool, MeshBuffers, MeshHandle, Mesher};
pub use utils::{StreamingSettings, TerrainSettings, WorldSettings};
pub use world::{
    ChunkGenerator, ChunkLoaded, ChunkLoader, ChunkRequest, HeightField, HeightFieldGenerator,
    HeightFieldRegistry, HeightPreview, MeshKind, MeshUploader, StreamedChunk, World,
};
