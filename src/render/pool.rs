//! Fixed set of reusable mesh output buffers
//!
//! The worker checks buffers out, fills them and sends the handles across with its
//! completions. The consumer copies the geometry into its own resource and returns the
//! handle; dropping a handle returns it as well, so a buffer can't leak on an error path.

use parking_lot::Mutex;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::core::vertex::Vertex;
use crate::error::BufferUnavailable;

/// Geometry for one block class of one chunk.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshBuffers {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshBuffers {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn quad_count(&self) -> usize {
        self.indices.len() / 6
    }

    /// Clears contents but keeps the allocations.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    /// Appends a quad given its corners in counter-clockwise order seen from outside.
    pub fn push_quad(&mut self, corners: [[f32; 3]; 4], normal: [f32; 3], color: [u8; 4]) {
        let base = self.vertices.len() as u32;
        self.vertices.extend(corners.map(|position| Vertex {
            position,
            normal,
            color,
        }));
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

struct PoolSlots {
    // `None` while the slot's buffers are checked out
    storage: Box<[Option<MeshBuffers>]>,
    free_list: Vec<usize>,
}

/// Cloneable handle to a shared pool.
#[derive(Clone)]
pub struct MeshBufferPool {
    slots: Arc<Mutex<PoolSlots>>,
    capacity: usize,
}

impl MeshBufferPool {
    pub fn new(capacity: usize) -> Self {
        let storage: Vec<Option<MeshBuffers>> =
            (0..capacity).map(|_| Some(MeshBuffers::default())).collect();
        // Reversed so slot 0 is handed out first
        let free_list: Vec<usize> = (0..capacity).rev().collect();

        MeshBufferPool {
            slots: Arc::new(Mutex::new(PoolSlots {
                storage: storage.into_boxed_slice(),
                free_list,
            })),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.slots.lock().free_list.len()
    }

    pub fn in_use(&self) -> usize {
        self.capacity - self.available()
    }

    /// Takes one free buffer set, or `None` if all are checked out.
    pub fn checkout(&self) -> Option<MeshHandle> {
        let mut slots = self.slots.lock();
        self.take(&mut slots)
    }

    pub fn checkout_or_err(&self) -> Result<MeshHandle, BufferUnavailable> {
        self.checkout().ok_or(BufferUnavailable)
    }

    /// Takes `count` buffer sets at once, or none of them.
    pub fn checkout_many(&self, count: usize) -> Result<Vec<MeshHandle>, BufferUnavailable> {
        let mut slots = self.slots.lock();
        if slots.free_list.len() < count {
            return Err(BufferUnavailable);
        }
        Ok((0..count).filter_map(|_| self.take(&mut slots)).collect())
    }

    /// Gives a buffer set back. Same as dropping the handle.
    pub fn return_buffer(&self, handle: MeshHandle) {
        debug_assert!(Arc::ptr_eq(&self.slots, &handle.pool));
        drop(handle);
    }

    fn take(&self, slots: &mut PoolSlots) -> Option<MeshHandle> {
        let slot = slots.free_list.pop()?;
        let buffers = slots.storage[slot].take().unwrap_or_default();
        Some(MeshHandle {
            slot,
            buffers,
            pool: Arc::clone(&self.slots),
        })
    }
}

impl fmt::Debug for MeshBufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshBufferPool")
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .finish()
    }
}

/// Exclusive access to one pooled buffer set until dropped.
pub struct MeshHandle {
    slot: usize,
    buffers: MeshBuffers,
    pool: Arc<Mutex<PoolSlots>>,
}

impl MeshHandle {
    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl Deref for MeshHandle {
    type Target = MeshBuffers;

    fn deref(&self) -> &MeshBuffers {
        &self.buffers
    }
}

impl DerefMut for MeshHandle {
    fn deref_mut(&mut self) -> &mut MeshBuffers {
        &mut self.buffers
    }
}

impl Drop for MeshHandle {
    fn drop(&mut self) {
        let mut buffers = std::mem::take(&mut self.buffers);
        buffers.clear();
        let mut slots = self.pool.lock();
        slots.storage[self.slot] = Some(buffers);
        slots.free_list.push(self.slot);
    }
}

impl fmt::Debug for MeshHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshHandle")
            .field("slot", &self.slot)
            .field("quads", &self.quad_count())
            .finish()
    }
}
