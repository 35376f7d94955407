//! Terrain streaming driver
//!
//! Walks an observer across the world without a window, streaming chunks around it and
//! reporting what the loader produced.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use glam::{IVec3, Vec3};
use terrastream::core::coords::{chunk_containing, facing_from_direction};
use terrastream::render::MeshBuffers;
use terrastream::{HeightPreview, MeshKind, MeshUploader, World, WorldSettings};

/// Stream procedural voxel terrain around a moving observer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML settings file; built-in defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the world seed
    #[arg(long)]
    seed: Option<i32>,

    /// Override the render distance, in chunks
    #[arg(long)]
    render_radius: Option<i32>,

    /// Number of consumer ticks to run
    #[arg(long, default_value_t = 600)]
    ticks: u32,

    /// Milliseconds per tick
    #[arg(long, default_value_t = 16)]
    tick_ms: u64,

    /// Observer speed in metres per second
    #[arg(long, default_value_t = 40.0)]
    speed: f32,

    /// Print an ASCII height map of the visited columns at the end
    #[arg(long, default_value_t = false)]
    preview: bool,
}

#[derive(Debug)]
struct MeshStats {
    vertices: usize,
    indices: usize,
}

/// Stands in for a GPU upload: copies nothing, only counts.
#[derive(Default)]
struct StatsUploader {
    uploads: usize,
    releases: usize,
    resident_vertices: usize,
    resident_indices: usize,
}

impl MeshUploader for StatsUploader {
    type Mesh = MeshStats;

    fn upload(&mut self, _position: IVec3, _kind: MeshKind, buffers: &MeshBuffers) -> MeshStats {
        self.uploads += 1;
        self.resident_vertices += buffers.vertices.len();
        self.resident_indices += buffers.indices.len();
        MeshStats {
            vertices: buffers.vertices.len(),
            indices: buffers.indices.len(),
        }
    }

    fn release(&mut self, _position: IVec3, mesh: MeshStats) {
        self.releases += 1;
        self.resident_vertices -= mesh.vertices;
        self.resident_indices -= mesh.indices;
    }
}

fn load_settings(args: &Args) -> Result<WorldSettings, terrastream::SettingsError> {
    let mut settings = match &args.config {
        Some(path) => {
            tracing::info!("Loading settings from {}", path.display());
            WorldSettings::load(path)?
        }
        None => WorldSettings::default(),
    };
    if let Some(seed) = args.seed {
        settings.terrain.seed = seed;
    }
    if let Some(radius) = args.render_radius {
        settings.streaming.render_distance = radius;
    }
    settings.validate()?;
    Ok(settings)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let settings = load_settings(&args)?;
    tracing::info!(
        "Seed {}, render distance {}, {} mesh buffers",
        settings.terrain.seed,
        settings.streaming.render_distance,
        settings.streaming.mesh_pool_size
    );

    let mut world = World::new(&settings, StatsUploader::default())?;
    world.start()?;

    let block_size = settings.terrain.block_size;
    let velocity = Vec3::new(1.0, 0.0, 0.35).normalize() * args.speed;
    let facing = facing_from_direction(velocity);
    let mut position = Vec3::new(0.0, settings.terrain.sea_level, 0.0);
    let dt = Duration::from_millis(args.tick_ms);

    let started = Instant::now();
    let mut loaded = 0;
    let mut discarded = 0;
    let mut ignored = 0;
    for _ in 0..args.ticks {
        let observer = chunk_containing(position, block_size);
        world.update_observer(observer, facing);

        let stats = world.tick();
        loaded += stats.loaded;
        discarded += stats.discarded;
        ignored += stats.ignored;

        position += velocity * dt.as_secs_f32();
        thread::sleep(dt);
    }
    world.stop();

    let uploader = world.uploader();
    tracing::info!(
        "{} ticks in {:.2?}: {} chunks loaded, {} discarded, {} ignored",
        args.ticks,
        started.elapsed(),
        loaded,
        discarded,
        ignored
    );
    tracing::info!(
        "{} resident, {} pending, {} uploads, {} releases, {} vertices, {} indices",
        world.loaded_count(),
        world.pending_count(),
        uploader.uploads,
        uploader.releases,
        uploader.resident_vertices,
        uploader.resident_indices
    );
    tracing::info!(
        "{} height fields cached, {} mesh buffers in use",
        world.loader().registry().len(),
        world.loader().pool().in_use()
    );

    if args.preview {
        let observer = chunk_containing(position, block_size);
        let preview = HeightPreview::new(&settings.terrain, settings.streaming.render_distance, 4);
        print!(
            "{}",
            preview.render(world.loader().registry(), observer.x, observer.z)
        );
    }
    Ok(())
}
