//! Chunk coordinate helpers
//! Chunk positions are `IVec3` in chunk units; each axis must fit a 21-bit signed field.

use glam::{IVec3, Vec3};

const KEY_BITS: u32 = 21;
const KEY_MASK: u64 = (1 << KEY_BITS) - 1;

pub const MAX_CHUNK_COORD: i32 = (1 << (KEY_BITS - 1)) - 1;
pub const MIN_CHUNK_COORD: i32 = -MAX_CHUNK_COORD;

pub fn in_key_range(pos: IVec3) -> bool {
    let ok = |v: i32| (MIN_CHUNK_COORD..=MAX_CHUNK_COORD).contains(&v);
    ok(pos.x) && ok(pos.y) && ok(pos.z)
}

/// Packs a chunk position into a 63-bit key, x in the high field.
pub fn chunk_key(pos: IVec3) -> u64 {
    ((pos.x as u32 as u64 & KEY_MASK) << (2 * KEY_BITS))
        | ((pos.y as u32 as u64 & KEY_MASK) << KEY_BITS)
        | (pos.z as u32 as u64 & KEY_MASK)
}

pub fn key_to_position(key: u64) -> IVec3 {
    // Shift each field to the top of an i32 and back down to sign-extend it
    let unpack = |field: u64| {
        let bits = ((field & KEY_MASK) as u32) << (32 - KEY_BITS);
        (bits as i32) >> (32 - KEY_BITS)
    };
    IVec3::new(
        unpack(key >> (2 * KEY_BITS)),
        unpack(key >> KEY_BITS),
        unpack(key),
    )
}

/// Key for a column of chunks sharing the same (cx, cz).
pub fn column_key(cx: i32, cz: i32) -> u64 {
    ((cx as u32 as u64) << 32) | cz as u32 as u64
}

/// Euclidean distance in chunks, truncated toward zero.
pub fn chunk_distance(a: IVec3, b: IVec3) -> i32 {
    (a - b).as_vec3().length() as i32
}

/// Per-axis facing sign of a view direction.
///
/// An axis counts as faced when it carries at least a third of the direction's length,
/// so a camera looking mostly down +x with a slight tilt still reports (1, 0, 0).
pub fn facing_from_direction(dir: Vec3) -> IVec3 {
    let len = dir.length();
    if len <= f32::EPSILON {
        return IVec3::ZERO;
    }
    let n = dir / len;
    let axis = |v: f32| {
        if v > 1.0 / 3.0 {
            1
        } else if v < -1.0 / 3.0 {
            -1
        } else {
            0
        }
    };
    IVec3::new(axis(n.x), axis(n.y), axis(n.z))
}

/// Chunk that contains a world-space point, given the block edge length in metres.
pub fn chunk_containing(point: Vec3, block_size: f32) -> IVec3 {
    let chunk_len = block_size * crate::constants::CHUNK_SIZE as f32;
    (point / chunk_len).floor().as_ivec3()
}
