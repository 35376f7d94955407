//! World generation and management modules
//! Contains terrain noise, height fields, chunk generation, streaming, and world state.

pub mod generator;
pub mod heightfield;
pub mod loader;
pub mod noise;
pub mod preview;
pub mod terrain;

// Re-export commonly used types
pub use generator::ChunkGenerator;
pub use heightfield::{HeightField, HeightFieldGenerator, HeightFieldRegistry};
pub use loader::{ChunkLoaded, ChunkLoader, ChunkRequest};
pub use noise::{FastNoise, NoiseSource};
pub use preview::HeightPreview;
pub use terrain::{MeshKind, MeshUploader, StreamedChunk, World};
