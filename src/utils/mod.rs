pub mod settings;

pub use settings::{StreamingSettings, TerrainSettings, WorldSettings};
