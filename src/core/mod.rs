//! Core data structures for the voxel world
//! Contains packed blocks, chunk coordinates, block grids, and vertices.

pub mod block;
pub mod chunk;
pub mod coords;
pub mod vertex;

// Re-export commonly used types
pub use block::Block;
pub use chunk::VoxelChunk;
pub use coords::{chunk_distance, chunk_key, column_key, key_to_position};
pub use vertex::Vertex;
