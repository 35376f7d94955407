//! Greedy surface mesher
//!
//! For each of the six face directions the chunk is swept layer by layer along the face
//! normal. Every layer produces a mask of visible faces, and equal neighbouring faces in
//! the mask are merged into the largest rectangles that fit before being emitted as quads.
//! Solid and fluid geometry come out of the same sweep into separate buffers.

use glam::IVec3;

use crate::constants::*;
use crate::core::block::Block;
use crate::core::chunk::VoxelChunk;
use crate::error::BufferUnavailable;
use crate::render::pool::{MeshBufferPool, MeshHandle};

struct FaceBasis {
    normal: [i32; 3],
    /// Axis the layers step along
    axis: usize,
    /// Mask row and column axes
    u: usize,
    v: usize,
    /// Unit-cube corners, BL BR TR TL, counter-clockwise seen from outside
    corners: [[f32; 3]; 4],
}

const FACES: [FaceBasis; 6] = [
    // -X
    FaceBasis {
        normal: [-1, 0, 0],
        axis: 0,
        u: 2,
        v: 1,
        corners: [[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 1.0, 0.0]],
    },
    // +X
    FaceBasis {
        normal: [1, 0, 0],
        axis: 0,
        u: 2,
        v: 1,
        corners: [[1.0, 0.0, 1.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 1.0]],
    },
    // -Y
    FaceBasis {
        normal: [0, -1, 0],
        axis: 1,
        u: 0,
        v: 2,
        corners: [[0.0, 0.0, 1.0], [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0]],
    },
    // +Y
    FaceBasis {
        normal: [0, 1, 0],
        axis: 1,
        u: 0,
        v: 2,
        corners: [[0.0, 1.0, 0.0], [0.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, 0.0]],
    },
    // -Z
    FaceBasis {
        normal: [0, 0, -1],
        axis: 2,
        u: 0,
        v: 1,
        corners: [[1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]],
    },
    // +Z
    FaceBasis {
        normal: [0, 0, 1],
        axis: 2,
        u: 0,
        v: 1,
        corners: [[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0]],
    },
];

/// Whether `block` shows a face toward `neighbor`.
///
/// Solid blocks are hidden only by other solid blocks; fluid only by anything non-air.
pub fn face_visible(block: Block, neighbor: Block) -> bool {
    if block.is_solid() {
        !neighbor.is_solid()
    } else if block.is_fluid() {
        neighbor.is_air()
    } else {
        false
    }
}

/// Finished geometry for one chunk, one pooled buffer per block class present.
#[derive(Debug, Default)]
pub struct ChunkMesh {
    pub solid: Option<MeshHandle>,
    pub fluid: Option<MeshHandle>,
}

impl ChunkMesh {
    pub fn is_empty(&self) -> bool {
        self.solid.is_none() && self.fluid.is_none()
    }

    pub fn quad_count(&self) -> usize {
        self.solid.as_ref().map_or(0, |m| m.quad_count())
            + self.fluid.as_ref().map_or(0, |m| m.quad_count())
    }
}

/// Reusable mesher state. Keep one per thread.
pub struct Mesher {
    block_size: f32,
    // Raw block value per (u, v) cell, 0 where no face is visible
    mask: Vec<u32>,
}

impl Mesher {
    pub fn new(block_size: f32) -> Self {
        Mesher {
            block_size,
            mask: vec![0; CHUNK_AREA],
        }
    }

    /// Meshes a chunk into pooled buffers.
    ///
    /// An all-air chunk returns an empty mesh without touching the pool. Otherwise every
    /// buffer the chunk needs is checked out together, or none is and the caller retries.
    pub fn build(
        &mut self,
        chunk: &VoxelChunk,
        pool: &MeshBufferPool,
    ) -> Result<ChunkMesh, BufferUnavailable> {
        let has_solid = chunk.solid_blocks() > 0;
        let has_fluid = chunk.fluid_blocks() > 0;
        if !has_solid && !has_fluid {
            return Ok(ChunkMesh::default());
        }

        let mut handles = pool
            .checkout_many(has_solid as usize + has_fluid as usize)?
            .into_iter();
        let mut mesh = ChunkMesh {
            solid: if has_solid { handles.next() } else { None },
            fluid: if has_fluid { handles.next() } else { None },
        };

        let origin = chunk.position * CHUNK_SIZE as i32;
        for face in &FACES {
            for layer in 0..CHUNK_SIZE {
                if self.fill_mask(chunk, face, layer) {
                    self.merge_layer(face, layer, origin, &mut mesh);
                }
            }
        }
        Ok(mesh)
    }

    // Returns false when the layer has no visible face at all
    fn fill_mask(&mut self, chunk: &VoxelChunk, face: &FaceBasis, layer: usize) -> bool {
        let mut any = false;
        let mut p = [0i32; 3];
        p[face.axis] = layer as i32;
        for v in 0..CHUNK_SIZE {
            p[face.v] = v as i32;
            for u in 0..CHUNK_SIZE {
                p[face.u] = u as i32;
                let block = chunk.get_block(p[0], p[1], p[2]);
                let neighbor = chunk.get_block(
                    p[0] + face.normal[0],
                    p[1] + face.normal[1],
                    p[2] + face.normal[2],
                );
                let cell = if face_visible(block, neighbor) {
                    any = true;
                    block.raw()
                } else {
                    0
                };
                self.mask[v * CHUNK_SIZE + u] = cell;
            }
        }
        any
    }

    fn merge_layer(&mut self, face: &FaceBasis, layer: usize, origin: IVec3, mesh: &mut ChunkMesh) {
        for v in 0..CHUNK_SIZE {
            let mut u = 0;
            while u < CHUNK_SIZE {
                let value = self.mask[v * CHUNK_SIZE + u];
                if value == 0 {
                    u += 1;
                    continue;
                }

                // Run along the row, then grow the run across following rows
                let mut width = 1;
                while u + width < CHUNK_SIZE && self.mask[v * CHUNK_SIZE + u + width] == value {
                    width += 1;
                }
                let mut height = 1;
                'grow: while v + height < CHUNK_SIZE {
                    let row = (v + height) * CHUNK_SIZE;
                    for k in u..u + width {
                        if self.mask[row + k] != value {
                            break 'grow;
                        }
                    }
                    height += 1;
                }

                for dv in 0..height {
                    let row = (v + dv) * CHUNK_SIZE;
                    self.mask[row + u..row + u + width].fill(0);
                }

                let block = Block::from_raw(value);
                let target = if block.is_solid() {
                    mesh.solid.as_mut()
                } else {
                    mesh.fluid.as_mut()
                };
                if let Some(buffers) = target {
                    let corners = self.quad_corners(face, layer, u, v, width, height, origin);
                    buffers.push_quad(corners, face.normal.map(|n| n as f32), block.rgba());
                }

                u += width;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn quad_corners(
        &self,
        face: &FaceBasis,
        layer: usize,
        u: usize,
        v: usize,
        width: usize,
        height: usize,
        origin: IVec3,
    ) -> [[f32; 3]; 4] {
        let origin = origin.to_array();
        face.corners.map(|corner| {
            let mut local = [0.0f32; 3];
            local[face.axis] = layer as f32 + corner[face.axis];
            local[face.u] = u as f32 + corner[face.u] * width as f32;
            local[face.v] = v as f32 + corner[face.v] * height as f32;
            [0, 1, 2].map(|i| (origin[i] as f32 + local[i]) * self.block_size)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::pool::MeshBuffers;
    use glam::Vec3;

    fn quads(buffers: &MeshBuffers) -> Vec<[Vec3; 4]> {
        buffers
            .vertices
            .chunks(4)
            .map(|q| [0, 1, 2, 3].map(|i| Vec3::from_array(q[i].position)))
            .collect()
    }

    fn quad_normals(buffers: &MeshBuffers) -> Vec<Vec3> {
        buffers
            .vertices
            .chunks(4)
            .map(|q| Vec3::from_array(q[0].normal))
            .collect()
    }

    fn build(chunk: &VoxelChunk) -> ChunkMesh {
        let pool = MeshBufferPool::new(2);
        Mesher::new(1.0).build(chunk, &pool).unwrap()
    }

    #[test]
    fn test_air_chunk_has_no_geometry() {
        let pool = MeshBufferPool::new(2);
        let chunk = VoxelChunk::new(IVec3::ZERO);
        let mesh = Mesher::new(1.0).build(&chunk, &pool).unwrap();
        assert!(mesh.is_empty());
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_uniform_cube_is_six_quads() {
        let mut chunk = VoxelChunk::new(IVec3::ZERO);
        for x in 0..32 {
            for y in 0..32 {
                for z in 0..32 {
                    chunk.set_block(x, y, z, Block::solid(COLOR_STONE)).unwrap();
                }
            }
        }
        let mesh = build(&chunk);
        assert!(mesh.fluid.is_none());
        let solid = mesh.solid.as_ref().unwrap();
        assert_eq!(solid.quad_count(), 6);
        assert_eq!(solid.vertices.len(), 24);
        assert_eq!(solid.indices.len(), 36);

        for quad in quads(solid) {
            let area = (quad[1] - quad[0]).cross(quad[3] - quad[0]).length();
            assert_eq!(area, 32.0 * 32.0);
        }
        let mut normals = quad_normals(solid);
        normals.sort_by(|a, b| a.to_array().partial_cmp(&b.to_array()).unwrap());
        normals.dedup();
        assert_eq!(normals.len(), 6);
    }

    #[test]
    fn test_winding_faces_outward() {
        let mut chunk = VoxelChunk::new(IVec3::new(1, 0, -1));
        chunk.set_block(4, 5, 6, Block::solid(1)).unwrap();
        chunk.set_block(4, 6, 6, Block::solid(2)).unwrap();
        chunk.set_block(10, 10, 10, Block::fluid(COLOR_WATER)).unwrap();
        let mesh = build(&chunk);

        for buffers in [mesh.solid.as_ref().unwrap(), mesh.fluid.as_ref().unwrap()] {
            for tri in buffers.indices.chunks(3) {
                let [a, b, c] = [0, 1, 2].map(|i| {
                    Vec3::from_array(buffers.vertices[tri[i] as usize].position)
                });
                let normal = Vec3::from_array(buffers.vertices[tri[0] as usize].normal);
                assert!((b - a).cross(c - a).dot(normal) > 0.0);
            }
        }
    }

    #[test]
    fn test_no_interior_faces_between_same_class() {
        let mut chunk = VoxelChunk::new(IVec3::ZERO);
        chunk.set_block(3, 3, 3, Block::solid(1)).unwrap();
        chunk.set_block(4, 3, 3, Block::solid(2)).unwrap();
        let mesh = build(&chunk);
        let solid = mesh.solid.as_ref().unwrap();
        // Different colours, so no merging: five exposed faces each
        assert_eq!(solid.quad_count(), 10);
        for (quad, normal) in quads(solid).iter().zip(quad_normals(solid)) {
            let on_shared_plane = quad.iter().all(|p| p.x == 4.0);
            assert!(!(normal.x != 0.0 && on_shared_plane));
        }
    }

    #[test]
    fn test_same_colour_neighbours_merge() {
        let mut chunk = VoxelChunk::new(IVec3::ZERO);
        chunk.set_block(3, 3, 3, Block::solid(1)).unwrap();
        chunk.set_block(4, 3, 3, Block::solid(1)).unwrap();
        let mesh = build(&chunk);
        assert_eq!(mesh.solid.as_ref().unwrap().quad_count(), 6);
    }

    #[test]
    fn test_fluid_faces_only_against_air() {
        let mut chunk = VoxelChunk::new(IVec3::ZERO);
        chunk.set_block(3, 3, 3, Block::fluid(COLOR_WATER)).unwrap();
        chunk.set_block(4, 3, 3, Block::solid(COLOR_STONE)).unwrap();
        chunk.set_block(3, 4, 3, Block::fluid(0x123456)).unwrap();
        let mesh = build(&chunk);
        // The stone shows all six faces, including the one against the water
        assert_eq!(mesh.solid.as_ref().unwrap().quad_count(), 6);
        // Each fluid block hides the face toward the stone or the other fluid block
        let fluid = mesh.fluid.as_ref().unwrap();
        assert_eq!(fluid.quad_count(), 4 + 5);
        assert!(fluid.vertices.iter().all(|v| v.color[3] == 255));
    }

    #[test]
    fn test_boundary_faces_are_emitted() {
        let mut chunk = VoxelChunk::new(IVec3::ZERO);
        chunk.set_block(0, 0, 0, Block::solid(1)).unwrap();
        let mesh = build(&chunk);
        assert_eq!(mesh.solid.as_ref().unwrap().quad_count(), 6);
    }

    #[test]
    fn test_positions_are_in_world_space() {
        let mut chunk = VoxelChunk::new(IVec3::new(2, -1, 0));
        chunk.set_block(0, 0, 0, Block::solid(1)).unwrap();
        let pool = MeshBufferPool::new(2);
        let mesh = Mesher::new(0.5).build(&chunk, &pool).unwrap();
        let solid = mesh.solid.as_ref().unwrap();
        let min = solid
            .vertices
            .iter()
            .fold(Vec3::splat(f32::MAX), |m, v| m.min(Vec3::from_array(v.position)));
        assert_eq!(min, Vec3::new(32.0, -16.0, 0.0));
    }

    #[test]
    fn test_unavailable_when_pool_exhausted() {
        let pool = MeshBufferPool::new(2);
        let mut chunk = VoxelChunk::new(IVec3::ZERO);
        chunk.set_block(0, 0, 0, Block::solid(1)).unwrap();
        chunk.set_block(1, 0, 0, Block::fluid(COLOR_WATER)).unwrap();
        let mut mesher = Mesher::new(1.0);

        let held = pool.checkout().unwrap();
        // Needs two buffers, only one free: nothing is taken
        assert_eq!(mesher.build(&chunk, &pool).unwrap_err(), BufferUnavailable);
        assert_eq!(pool.in_use(), 1);

        pool.return_buffer(held);
        let mesh = mesher.build(&chunk, &pool).unwrap();
        assert_eq!(pool.in_use(), 2);
        drop(mesh);
        assert_eq!(pool.in_use(), 0);
    }
}
