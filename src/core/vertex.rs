use bytemuck::{Pod, Zeroable};

/// Flat-shaded terrain vertex, laid out for direct upload.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [u8; 4],
}
