//! Consumer-side view of the streamed world
//!
//! `World` decides which chunks should exist around the observer, asks the loader for the
//! missing ones and turns finished meshes into whatever the caller renders with. It runs
//! entirely on the consumer thread.

use std::sync::Arc;

use glam::IVec3;
use rustc_hash::FxHashMap;

use crate::core::chunk::VoxelChunk;
use crate::core::coords::{chunk_distance, chunk_key, in_key_range};
use crate::error::{LoaderError, SettingsError};
use crate::render::pool::MeshBuffers;
use crate::utils::settings::WorldSettings;
use crate::world::heightfield::HeightFieldRegistry;
use crate::world::loader::{ChunkLoaded, ChunkLoader};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshKind {
    Solid,
    Fluid,
}

/// Turns pooled mesh buffers into a renderable resource.
///
/// The buffers go back to the pool right after `upload` returns, so implementations
/// must copy what they need.
pub trait MeshUploader {
    type Mesh;

    fn upload(&mut self, position: IVec3, kind: MeshKind, buffers: &MeshBuffers) -> Self::Mesh;

    /// Called when a chunk is unloaded or its mesh replaced.
    fn release(&mut self, _position: IVec3, _mesh: Self::Mesh) {}
}

/// One chunk coordinate the world has asked for at some point.
#[derive(Debug)]
pub struct StreamedChunk<M> {
    pub position: IVec3,
    pub data: Option<VoxelChunk>,
    pub solid: Option<M>,
    pub fluid: Option<M>,
    /// Unloaded after leaving range; requested again if it comes back
    pub destroyed: bool,
    requested: bool,
    loaded: bool,
}

impl<M> StreamedChunk<M> {
    fn new(position: IVec3) -> Self {
        StreamedChunk {
            position,
            data: None,
            solid: None,
            fluid: None,
            destroyed: false,
            requested: false,
            loaded: false,
        }
    }

    pub fn is_requested(&self) -> bool {
        self.requested
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded && !self.destroyed
    }

    fn needs_request(&self) -> bool {
        !self.requested && (self.destroyed || !self.loaded)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    pub loaded: usize,
    pub discarded: usize,
    pub ignored: usize,
}

pub struct World<U: MeshUploader> {
    settings: WorldSettings,
    loader: ChunkLoader,
    uploader: U,
    chunks: FxHashMap<u64, StreamedChunk<U::Mesh>>,
    observer: Option<(IVec3, IVec3)>,
    // Set when requests came back ignored and may need to be re-issued
    dirty: bool,
}

impl<U: MeshUploader> World<U> {
    pub fn new(settings: &WorldSettings, uploader: U) -> Result<Self, SettingsError> {
        Self::with_registry(settings, Arc::new(HeightFieldRegistry::new()), uploader)
    }

    /// Fails if the settings do not validate.
    pub fn with_registry(
        settings: &WorldSettings,
        registry: Arc<HeightFieldRegistry>,
        uploader: U,
    ) -> Result<Self, SettingsError> {
        Ok(World {
            settings: settings.clone(),
            loader: ChunkLoader::new(settings, registry)?,
            uploader,
            chunks: FxHashMap::default(),
            observer: None,
            dirty: false,
        })
    }

    pub fn start(&mut self) -> Result<(), LoaderError> {
        self.loader.start()
    }

    pub fn stop(&mut self) {
        self.loader.stop();
    }

    pub fn loader(&self) -> &ChunkLoader {
        &self.loader
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    pub fn chunk(&self, position: IVec3) -> Option<&StreamedChunk<U::Mesh>> {
        self.chunks.get(&chunk_key(position))
    }

    pub fn chunks(&self) -> impl Iterator<Item = &StreamedChunk<U::Mesh>> {
        self.chunks.values()
    }

    pub fn loaded_count(&self) -> usize {
        self.chunks.values().filter(|c| c.is_loaded()).count()
    }

    pub fn pending_count(&self) -> usize {
        self.chunks.values().filter(|c| c.requested).count()
    }

    /// Chunk positions within render distance of `observer`, inside the vertical bounds.
    pub fn desired_positions(&self, observer: IVec3) -> Vec<IVec3> {
        let r = self.settings.streaming.render_distance;
        let (min_y, max_y) = self.settings.chunk_y_bounds();
        let y_min = (observer.y - r).max(min_y);
        let y_max = (observer.y + r).min(max_y);

        let mut positions = Vec::new();
        for x in observer.x - r..=observer.x + r {
            for y in y_min..=y_max {
                for z in observer.z - r..=observer.z + r {
                    let position = IVec3::new(x, y, z);
                    if chunk_distance(position, observer) <= r && in_key_range(position) {
                        positions.push(position);
                    }
                }
            }
        }
        positions
    }

    /// Re-plans streaming around a new observer position and facing.
    ///
    /// Unloads chunks past the unload distance, then requests every desired chunk that is
    /// neither loaded nor already requested. Returns the number of new requests.
    pub fn update_observer(&mut self, observer: IVec3, facing: IVec3) -> usize {
        if self.observer == Some((observer, facing)) && !self.dirty {
            return 0;
        }
        self.observer = Some((observer, facing));
        self.dirty = false;

        self.unload_far(observer);

        let mut wanted = Vec::new();
        for position in self.desired_positions(observer) {
            let chunk = self
                .chunks
                .entry(chunk_key(position))
                .or_insert_with(|| StreamedChunk::new(position));
            if chunk.needs_request() {
                if chunk.destroyed {
                    tracing::debug!("Reloading chunk {}", position);
                }
                chunk.requested = true;
                chunk.destroyed = false;
                wanted.push(position);
            }
        }
        self.loader.enqueue_requests(wanted, observer, facing)
    }

    fn unload_far(&mut self, observer: IVec3) {
        let unload_distance = self.settings.streaming.unload_distance();
        let mut unloaded = 0;
        for chunk in self.chunks.values_mut() {
            if chunk.destroyed || chunk_distance(chunk.position, observer) <= unload_distance {
                continue;
            }
            if chunk.requested {
                self.loader.cancel(chunk.position);
            }
            if let Some(mesh) = chunk.solid.take() {
                self.uploader.release(chunk.position, mesh);
            }
            if let Some(mesh) = chunk.fluid.take() {
                self.uploader.release(chunk.position, mesh);
            }
            chunk.data = None;
            chunk.destroyed = true;
            chunk.requested = false;
            chunk.loaded = false;
            unloaded += 1;
        }
        if unloaded > 0 {
            tracing::debug!("Unloaded {} chunks", unloaded);
        }
    }

    /// Takes everything the loader finished since the last tick.
    pub fn tick(&mut self) -> TickStats {
        let mut stats = TickStats::default();

        for loaded in self.loader.drain_completions() {
            if self.accept(loaded) {
                stats.loaded += 1;
            } else {
                stats.discarded += 1;
            }
        }

        for position in self.loader.drain_ignored() {
            if let Some(chunk) = self.chunks.get_mut(&chunk_key(position)) {
                chunk.requested = false;
            }
            stats.ignored += 1;
        }
        if stats.ignored > 0 {
            self.dirty = true;
        }
        stats
    }

    // Uploads a completion into its chunk and returns the buffers to the pool
    fn accept(&mut self, loaded: ChunkLoaded) -> bool {
        let ChunkLoaded {
            position,
            chunk: data,
            mesh,
        } = loaded;

        let accepted = match self.chunks.get_mut(&chunk_key(position)) {
            Some(chunk) if chunk.requested && !chunk.destroyed => {
                let solid = mesh
                    .solid
                    .as_ref()
                    .map(|buffers| self.uploader.upload(position, MeshKind::Solid, buffers));
                let fluid = mesh
                    .fluid
                    .as_ref()
                    .map(|buffers| self.uploader.upload(position, MeshKind::Fluid, buffers));
                for old in [
                    std::mem::replace(&mut chunk.solid, solid),
                    std::mem::replace(&mut chunk.fluid, fluid),
                ]
                .into_iter()
                .flatten()
                {
                    self.uploader.release(position, old);
                }
                chunk.data = Some(data);
                chunk.requested = false;
                chunk.loaded = true;
                true
            }
            _ => {
                tracing::debug!("Discarding chunk {} that is no longer wanted", position);
                false
            }
        };

        self.loader.return_mesh(mesh);
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingUploader {
        uploads: usize,
        releases: usize,
    }

    impl MeshUploader for CountingUploader {
        type Mesh = usize;

        fn upload(&mut self, _: IVec3, _: MeshKind, buffers: &MeshBuffers) -> usize {
            self.uploads += 1;
            buffers.quad_count()
        }

        fn release(&mut self, _: IVec3, _: usize) {
            self.releases += 1;
        }
    }

    fn world(render_distance: i32) -> World<CountingUploader> {
        let mut settings = WorldSettings::default();
        settings.streaming.render_distance = render_distance;
        World::new(&settings, CountingUploader::default()).unwrap()
    }

    #[test]
    fn test_desired_positions_respect_bounds() {
        let world = world(2);
        let positions = world.desired_positions(IVec3::new(5, 0, -5));
        assert!(positions.contains(&IVec3::new(5, 0, -5)));
        assert!(positions.iter().all(|p| p.y >= 0));
        assert!(
            positions
                .iter()
                .all(|p| chunk_distance(*p, IVec3::new(5, 0, -5)) <= 2)
        );
        // Corners of the cube are outside the sphere
        assert!(!positions.contains(&IVec3::new(7, 2, -3)));
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let mut settings = WorldSettings::default();
        settings.streaming.mesh_pool_size = 1;
        assert!(World::new(&settings, CountingUploader::default()).is_err());
    }

    #[test]
    fn test_desired_positions_reach_terrain_top() {
        let mut settings = WorldSettings::default();
        settings.terrain.block_size = 0.5;
        settings.streaming.render_distance = 8;
        let world = World::new(&settings, CountingUploader::default()).unwrap();
        let top = world
            .desired_positions(IVec3::new(0, 8, 0))
            .iter()
            .map(|p| p.y)
            .max();
        assert_eq!(top, Some(12));
    }

    #[test]
    fn test_update_requests_each_chunk_once() {
        let mut world = world(1);
        let requested = world.update_observer(IVec3::ZERO, IVec3::X);
        // Every offset in a 3x3x3 cube truncates to distance 1; the y = -1 layer is below the world
        assert_eq!(requested, 18);
        assert_eq!(world.loader().queued(), 18);
        assert_eq!(world.pending_count(), 18);

        assert_eq!(world.update_observer(IVec3::ZERO, IVec3::X), 0);
        // New facing re-plans but every chunk is already requested
        assert_eq!(world.update_observer(IVec3::ZERO, IVec3::Z), 0);
        assert_eq!(world.loader().queued(), 18);
    }

    #[test]
    fn test_stale_requests_return_to_not_loaded() {
        let mut world = world(1);
        world.update_observer(IVec3::ZERO, IVec3::X);
        let ahead = IVec3::new(1, 0, 0);
        assert!(world.chunk(ahead).unwrap().is_requested());

        // Two chunks away: out of render range but inside the unload margin
        world.update_observer(IVec3::new(-1, 0, 0), IVec3::X);
        let stats = world.tick();
        assert!(stats.ignored >= 1);
        let chunk = world.chunk(ahead).unwrap();
        assert!(!chunk.is_requested());
        assert!(!chunk.destroyed);
        assert!(!chunk.is_loaded());
    }

    #[test]
    fn test_far_chunks_are_destroyed() {
        let mut world = world(1);
        world.update_observer(IVec3::ZERO, IVec3::X);
        world.update_observer(IVec3::new(10, 0, 0), IVec3::X);
        let old = world.chunk(IVec3::ZERO).unwrap();
        assert!(old.destroyed);
        assert!(!old.is_requested());
        assert!(old.data.is_none());
        // Cancelled rather than reported back
        assert_eq!(world.tick().ignored, 0);

        // Coming back requests it again
        world.update_observer(IVec3::ZERO, IVec3::X);
        let chunk = world.chunk(IVec3::ZERO).unwrap();
        assert!(!chunk.destroyed);
        assert!(chunk.is_requested());
    }
}
