//! Background chunk streaming
//!
//! The consumer thread queues chunk requests sorted by priority. A single worker thread
//! takes them a few at a time, builds the chunk and its mesh, and sends the results back
//! over a channel. Mesh buffers come from a fixed pool that only the consumer refills, so
//! the worker publishes partial batches while it waits for a free buffer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use glam::IVec3;
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashSet;

use crate::core::chunk::VoxelChunk;
use crate::core::coords::{chunk_distance, chunk_key, in_key_range};
use crate::error::{LoaderError, SettingsError};
use crate::render::mesh::{ChunkMesh, Mesher};
use crate::render::pool::{MeshBufferPool, MeshHandle};
use crate::utils::settings::WorldSettings;
use crate::world::generator::ChunkGenerator;
use crate::world::heightfield::{HeightFieldGenerator, HeightFieldRegistry};

/// Request for one chunk. Lower priority values load sooner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkRequest {
    pub position: IVec3,
    pub priority: i32,
}

impl ChunkRequest {
    pub fn new(position: IVec3, observer: IVec3, facing: IVec3) -> Self {
        ChunkRequest {
            position,
            priority: Self::priority_for(position, observer, facing),
        }
    }

    /// Distance from the observer, +5 beyond the adjacent ring, +2 per axis pointing
    /// away from the observer's facing. The observer's chunk and the one under it go first.
    pub fn priority_for(position: IVec3, observer: IVec3, facing: IVec3) -> i32 {
        if position == observer || position == observer - IVec3::Y {
            return 0;
        }
        let distance = chunk_distance(position, observer);
        let mut priority = distance;
        if distance > 1 {
            priority += 5;
        }
        let direction = (position - observer).clamp(IVec3::NEG_ONE, IVec3::ONE);
        let mismatched = direction.cmpne(facing);
        priority += 2 * mismatched.bitmask().count_ones() as i32;
        priority
    }
}

/// A finished chunk. The mesh handles must go back to the pool once uploaded.
#[derive(Debug)]
pub struct ChunkLoaded {
    pub position: IVec3,
    pub chunk: VoxelChunk,
    pub mesh: ChunkMesh,
}

#[derive(Default)]
struct RequestQueue {
    requests: Vec<ChunkRequest>,
    queued: FxHashSet<u64>,
}

struct Shared {
    queue: Mutex<RequestQueue>,
    wake: Condvar,
    stop: AtomicBool,
}

impl Shared {
    fn stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn signal_stop(&self) {
        self.stop.store(true, Ordering::Release);
        // Taking the lock orders the store before any waiter's re-check
        let _queue = self.queue.lock();
        self.wake.notify_all();
    }
}

/// Owns the request queue, the worker thread and the mesh buffer pool.
///
/// Height fields and meshes are generated with per-thread scratch state, so there is
/// only ever one worker; `start` refuses to spawn a second one.
pub struct ChunkLoader {
    shared: Arc<Shared>,
    settings: WorldSettings,
    registry: Arc<HeightFieldRegistry>,
    pool: MeshBufferPool,
    completion_tx: Sender<ChunkLoaded>,
    completion_rx: Receiver<ChunkLoaded>,
    ignored_tx: Sender<IVec3>,
    ignored_rx: Receiver<IVec3>,
    worker: Option<JoinHandle<()>>,
}

impl ChunkLoader {
    /// Fails if the settings do not validate. A pool too small for one chunk's solid and
    /// fluid meshes would leave the worker retrying forever.
    pub fn new(
        settings: &WorldSettings,
        registry: Arc<HeightFieldRegistry>,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;
        let (completion_tx, completion_rx) = unbounded();
        let (ignored_tx, ignored_rx) = unbounded();
        Ok(ChunkLoader {
            shared: Arc::new(Shared {
                queue: Mutex::new(RequestQueue::default()),
                wake: Condvar::new(),
                stop: AtomicBool::new(false),
            }),
            settings: settings.clone(),
            registry,
            pool: MeshBufferPool::new(settings.streaming.mesh_pool_size),
            completion_tx,
            completion_rx,
            ignored_tx,
            ignored_rx,
            worker: None,
        })
    }

    pub fn pool(&self) -> &MeshBufferPool {
        &self.pool
    }

    pub fn registry(&self) -> &Arc<HeightFieldRegistry> {
        &self.registry
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Number of requests not yet claimed by the worker.
    pub fn queued(&self) -> usize {
        self.shared.queue.lock().requests.len()
    }

    /// Spawns the worker thread.
    pub fn start(&mut self) -> Result<(), LoaderError> {
        if self.worker.is_some() {
            return Err(LoaderError::AlreadyRunning);
        }
        self.shared.stop.store(false, Ordering::Release);

        let worker = Worker {
            shared: Arc::clone(&self.shared),
            registry: Arc::clone(&self.registry),
            heights: HeightFieldGenerator::new(&self.settings.terrain),
            chunks: ChunkGenerator::new(&self.settings.terrain),
            mesher: Mesher::new(self.settings.terrain.block_size),
            pool: self.pool.clone(),
            completions: self.completion_tx.clone(),
            ignored: self.ignored_tx.clone(),
            batch_size: self.settings.streaming.batch_size.max(1),
            retry_delay: self.settings.streaming.retry_delay(),
        };
        let handle = thread::Builder::new()
            .name("chunk-loader".into())
            .spawn(move || worker.run())?;
        self.worker = Some(handle);
        Ok(())
    }

    /// Signals the worker and waits for it to exit. Queued requests are kept, including
    /// any the worker had claimed but not finished.
    pub fn stop(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        self.shared.signal_stop();
        if handle.join().is_err() {
            tracing::error!("Chunk loader thread panicked");
        }
    }

    /// Merges new requests into the queue and re-sorts it for the observer.
    ///
    /// Queued requests now beyond render distance are dropped and reported as ignored,
    /// as are new ones that are out of range. Positions already queued are skipped.
    /// Returns how many requests were added.
    pub fn enqueue_requests<I>(&self, positions: I, observer: IVec3, facing: IVec3) -> usize
    where
        I: IntoIterator<Item = IVec3>,
    {
        let render_distance = self.settings.streaming.render_distance;
        let in_range = |position: IVec3| chunk_distance(position, observer) <= render_distance;

        let mut queue = self.shared.queue.lock();
        let RequestQueue { requests, queued } = &mut *queue;

        let before = requests.len();
        requests.retain(|request| {
            if in_range(request.position) {
                return true;
            }
            queued.remove(&chunk_key(request.position));
            let _ = self.ignored_tx.send(request.position);
            false
        });
        let dropped = before - requests.len();
        if dropped > 0 {
            tracing::debug!("Dropped {} stale chunk requests", dropped);
        }

        let mut added = 0;
        for position in positions {
            if !in_key_range(position) || !in_range(position) {
                let _ = self.ignored_tx.send(position);
                continue;
            }
            if !queued.insert(chunk_key(position)) {
                continue;
            }
            requests.push(ChunkRequest::new(position, observer, facing));
            added += 1;
        }

        for request in requests.iter_mut() {
            request.priority = ChunkRequest::priority_for(request.position, observer, facing);
        }
        requests.sort_by_key(|request| request.priority);

        if !requests.is_empty() {
            self.shared.wake.notify_one();
        }
        added
    }

    /// Removes a queued request the worker has not claimed yet.
    pub fn cancel(&self, position: IVec3) -> bool {
        let mut queue = self.shared.queue.lock();
        let RequestQueue { requests, queued } = &mut *queue;
        if !queued.remove(&chunk_key(position)) {
            return false;
        }
        requests.retain(|request| request.position != position);
        true
    }

    /// Everything the worker has published since the last call.
    pub fn drain_completions(&self) -> Vec<ChunkLoaded> {
        self.completion_rx.try_iter().collect()
    }

    /// Positions that were requested but will not be loaded.
    pub fn drain_ignored(&self) -> Vec<IVec3> {
        self.ignored_rx.try_iter().collect()
    }

    pub fn return_buffer(&self, handle: MeshHandle) {
        self.pool.return_buffer(handle);
    }

    /// Returns both buffers of a mesh, if present.
    pub fn return_mesh(&self, mesh: ChunkMesh) {
        for handle in [mesh.solid, mesh.fluid].into_iter().flatten() {
            self.pool.return_buffer(handle);
        }
    }
}

impl Drop for ChunkLoader {
    fn drop(&mut self) {
        self.stop();
    }
}

enum Outcome {
    Loaded(ChunkLoaded),
    Ignored,
    Stopped,
}

struct Worker {
    shared: Arc<Shared>,
    registry: Arc<HeightFieldRegistry>,
    heights: HeightFieldGenerator,
    chunks: ChunkGenerator,
    mesher: Mesher,
    pool: MeshBufferPool,
    completions: Sender<ChunkLoaded>,
    ignored: Sender<IVec3>,
    batch_size: usize,
    retry_delay: Duration,
}

impl Worker {
    fn run(mut self) {
        tracing::info!("Chunk loader started");
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut done = Vec::with_capacity(self.batch_size);

        'outer: while self.next_batch(&mut batch) {
            for index in 0..batch.len() {
                match self.process(batch[index].position, &mut done) {
                    Outcome::Loaded(loaded) => done.push(loaded),
                    Outcome::Ignored => {}
                    Outcome::Stopped => {
                        self.requeue(&batch[index..]);
                        break 'outer;
                    }
                }
            }
            batch.clear();
            if !done.is_empty() {
                tracing::debug!("Publishing {} chunks", done.len());
                self.publish(&mut done);
            }
        }
        if !done.is_empty() {
            self.publish(&mut done);
        }
        tracing::info!("Chunk loader stopped");
    }

    // Claimed requests cut off by a stop go back on the queue for the next start
    fn requeue(&self, unfinished: &[ChunkRequest]) {
        let mut queue = self.shared.queue.lock();
        let RequestQueue { requests, queued } = &mut *queue;
        for request in unfinished {
            if queued.insert(chunk_key(request.position)) {
                requests.push(*request);
            }
        }
        requests.sort_by_key(|request| request.priority);
        tracing::debug!("Returned {} unfinished requests to the queue", unfinished.len());
    }

    // Blocks until there is work; false once a stop is requested
    fn next_batch(&self, batch: &mut Vec<ChunkRequest>) -> bool {
        let mut queue = self.shared.queue.lock();
        while queue.requests.is_empty() && !self.shared.stopping() {
            self.shared.wake.wait(&mut queue);
        }
        if self.shared.stopping() {
            return false;
        }
        let RequestQueue { requests, queued } = &mut *queue;
        let count = self.batch_size.min(requests.len());
        for request in requests.drain(..count) {
            queued.remove(&chunk_key(request.position));
            batch.push(request);
        }
        true
    }

    fn process(&mut self, position: IVec3, done: &mut Vec<ChunkLoaded>) -> Outcome {
        let field = self
            .registry
            .get_or_generate(position.x, position.z, &mut self.heights);
        let chunk = match self.chunks.generate_chunk(position, &field) {
            Ok(chunk) => chunk,
            Err(err) => {
                tracing::error!("Chunk {} failed to generate: {}", position, err);
                let _ = self.ignored.send(position);
                return Outcome::Ignored;
            }
        };

        let mesh = loop {
            match self.mesher.build(&chunk, &self.pool) {
                Ok(mesh) => break mesh,
                Err(_) => {
                    // Let the consumer return buffers from what is already finished
                    if !done.is_empty() {
                        self.publish(done);
                    }
                    if !self.wait_for_buffer(position) {
                        return Outcome::Stopped;
                    }
                }
            }
        };

        tracing::debug!(
            "Chunk {} loaded: {} solid, {} fluid, {} quads",
            position,
            chunk.solid_blocks(),
            chunk.fluid_blocks(),
            mesh.quad_count()
        );
        Outcome::Loaded(ChunkLoaded {
            position,
            chunk,
            mesh,
        })
    }

    // Sleeps for the retry delay unless stopped first; false if stopping
    fn wait_for_buffer(&self, position: IVec3) -> bool {
        tracing::trace!("No free mesh buffer for chunk {}, retrying", position);
        let mut queue = self.shared.queue.lock();
        if self.shared.stopping() {
            return false;
        }
        self.shared.wake.wait_for(&mut queue, self.retry_delay);
        !self.shared.stopping()
    }

    fn publish(&self, done: &mut Vec<ChunkLoaded>) {
        for loaded in done.drain(..) {
            // The receiver lives as long as the loader, which joins this thread on drop
            let _ = self.completions.send(loaded);
        }
    }
}
