//! Rendering-related modules
//! Contains the greedy mesher and the pool of reusable mesh buffers.

pub mod mesh;
pub mod pool;

// Re-export commonly used types
pub use mesh::{ChunkMesh, Mesher};
pub use pool::{MeshBufferPool, MeshBuffers, MeshHandle};
