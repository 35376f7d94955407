use glam::IVec3;

use crate::constants::*;
use crate::core::block::Block;
use crate::error::ChunkError;

/// Block grid for one chunk.
///
/// Blocks are stored x-major, then z, then y, so a column of y values is contiguous.
/// The array only exists while the chunk holds at least one solid or fluid block.
#[derive(Clone, Debug)]
pub struct VoxelChunk {
    pub position: IVec3,
    blocks: Option<Box<[Block]>>,
    solid_blocks: u32,
    fluid_blocks: u32,
}

#[inline]
pub const fn block_index(x: usize, y: usize, z: usize) -> usize {
    x * CHUNK_AREA + z * CHUNK_SIZE + y
}

impl VoxelChunk {
    pub fn new(position: IVec3) -> Self {
        VoxelChunk {
            position,
            blocks: None,
            solid_blocks: 0,
            fluid_blocks: 0,
        }
    }

    pub fn solid_blocks(&self) -> u32 {
        self.solid_blocks
    }

    pub fn fluid_blocks(&self) -> u32 {
        self.fluid_blocks
    }

    pub fn is_air(&self) -> bool {
        self.solid_blocks == 0 && self.fluid_blocks == 0
    }

    pub fn has_block_array(&self) -> bool {
        self.blocks.is_some()
    }

    /// Raw block slice, `None` for an all-air chunk.
    pub fn blocks(&self) -> Option<&[Block]> {
        self.blocks.as_deref()
    }

    /// Block at a local coordinate. Anything outside the chunk reads as air.
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> Block {
        if !Self::in_bounds(x, y, z) {
            return Block::AIR;
        }
        match &self.blocks {
            Some(blocks) => blocks[block_index(x as usize, y as usize, z as usize)],
            None => Block::AIR,
        }
    }

    pub fn set_block(&mut self, x: i32, y: i32, z: i32, block: Block) -> Result<(), ChunkError> {
        if !Self::in_bounds(x, y, z) {
            return Err(ChunkError::BlockOutOfBounds { x, y, z });
        }
        let index = block_index(x as usize, y as usize, z as usize);

        let old = match &self.blocks {
            Some(blocks) => blocks[index],
            None if block.is_air() => return Ok(()),
            None => Block::AIR,
        };
        if old == block {
            return Ok(());
        }

        self.uncount(old);
        self.count(block);
        self.blocks_mut()[index] = block;

        if self.is_air() {
            self.blocks = None;
        }
        Ok(())
    }

    /// Writes a block during terrain generation. The caller guarantees the cell is air.
    pub(crate) fn place(&mut self, x: usize, y: usize, z: usize, block: Block) {
        debug_assert!(x < CHUNK_SIZE && y < CHUNK_SIZE && z < CHUNK_SIZE);
        self.count(block);
        self.blocks_mut()[block_index(x, y, z)] = block;
    }

    /// Drops the block array if nothing but air was written.
    pub(crate) fn release_if_air(&mut self) {
        if self.is_air() {
            self.blocks = None;
        }
    }

    fn blocks_mut(&mut self) -> &mut [Block] {
        self.blocks
            .get_or_insert_with(|| vec![Block::AIR; CHUNK_VOLUME].into_boxed_slice())
    }

    fn count(&mut self, block: Block) {
        if block.is_solid() {
            self.solid_blocks += 1;
        } else if block.is_fluid() {
            self.fluid_blocks += 1;
        }
    }

    fn uncount(&mut self, block: Block) {
        if block.is_solid() {
            self.solid_blocks -= 1;
        } else if block.is_fluid() {
            self.fluid_blocks -= 1;
        }
    }

    fn in_bounds(x: i32, y: i32, z: i32) -> bool {
        let size = CHUNK_SIZE as i32;
        (0..size).contains(&x) && (0..size).contains(&y) && (0..size).contains(&z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recount(chunk: &VoxelChunk) -> (u32, u32) {
        let Some(blocks) = chunk.blocks() else {
            return (0, 0);
        };
        let solid = blocks.iter().filter(|b| b.is_solid()).count() as u32;
        let fluid = blocks.iter().filter(|b| b.is_fluid()).count() as u32;
        (solid, fluid)
    }

    #[test]
    fn test_set_and_clear_single_block() {
        let mut chunk = VoxelChunk::new(IVec3::ZERO);
        assert!(!chunk.has_block_array());

        chunk.set_block(0, 0, 0, Block::solid(COLOR_STONE)).unwrap();
        assert_eq!(chunk.solid_blocks(), 1);
        assert!(chunk.has_block_array());
        assert_eq!(chunk.get_block(0, 0, 0), Block::solid(COLOR_STONE));

        chunk.set_block(0, 0, 0, Block::AIR).unwrap();
        assert_eq!(chunk.solid_blocks(), 0);
        assert!(chunk.is_air());
        assert!(!chunk.has_block_array());
    }

    #[test]
    fn test_counters_match_contents() {
        let mut chunk = VoxelChunk::new(IVec3::new(1, -2, 3));
        let writes = [
            (0, 0, 0, Block::solid(1)),
            (1, 0, 0, Block::fluid(COLOR_WATER)),
            (1, 0, 0, Block::solid(2)),
            (31, 31, 31, Block::fluid(3)),
            (5, 6, 7, Block::solid(4)),
            (5, 6, 7, Block::solid(5)),
            (0, 0, 0, Block::AIR),
            (2, 2, 2, Block::AIR),
            (31, 31, 31, Block::fluid(9)),
            (4, 4, 4, Block::fluid(COLOR_WATER)),
        ];
        for (x, y, z, block) in writes {
            chunk.set_block(x, y, z, block).unwrap();
            assert_eq!((chunk.solid_blocks(), chunk.fluid_blocks()), recount(&chunk));
        }
        assert_eq!(chunk.solid_blocks(), 2);
        assert_eq!(chunk.fluid_blocks(), 2);
    }

    #[test]
    fn test_out_of_range_write_is_rejected() {
        let mut chunk = VoxelChunk::new(IVec3::ZERO);
        let err = chunk.set_block(32, 0, 0, Block::solid(1)).unwrap_err();
        assert_eq!(err, ChunkError::BlockOutOfBounds { x: 32, y: 0, z: 0 });
        assert!(chunk.set_block(0, -1, 0, Block::solid(1)).is_err());
        assert!(chunk.is_air());
    }

    #[test]
    fn test_out_of_range_read_is_air() {
        let mut chunk = VoxelChunk::new(IVec3::ZERO);
        chunk.set_block(0, 0, 0, Block::solid(1)).unwrap();
        assert!(chunk.get_block(-1, 0, 0).is_air());
        assert!(chunk.get_block(0, 0, 32).is_air());
    }

    #[test]
    fn test_index_is_y_major_within_column() {
        assert_eq!(block_index(0, 1, 0), 1);
        assert_eq!(block_index(0, 0, 1), CHUNK_SIZE);
        assert_eq!(block_index(1, 0, 0), CHUNK_AREA);
    }
}
