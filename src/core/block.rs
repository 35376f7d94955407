/// Packed voxel state.
///
/// Bit 31 marks solid terrain, bits 0-23 hold the colour as 0xBBGGRR.
/// Zero is air; anything else with bit 31 clear is fluid tinted by its low 24 bits.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Block(u32);

const SOLID_BIT: u32 = 1 << 31;
const COLOR_MASK: u32 = 0x00ff_ffff;

impl Block {
    pub const AIR: Block = Block(0);

    pub const fn solid(color: u32) -> Self {
        Block(SOLID_BIT | (color & COLOR_MASK))
    }

    /// A fluid with a black tint packs to zero and reads back as air.
    pub const fn fluid(color: u32) -> Self {
        Block(color & COLOR_MASK)
    }

    pub const fn from_raw(raw: u32) -> Self {
        Block(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_air(self) -> bool {
        self.0 == 0
    }

    pub const fn is_solid(self) -> bool {
        self.0 & SOLID_BIT != 0
    }

    pub const fn is_fluid(self) -> bool {
        self.0 != 0 && self.0 & SOLID_BIT == 0
    }

    pub const fn color(self) -> u32 {
        self.0 & COLOR_MASK
    }

    /// Colour as RGBA bytes with opaque alpha.
    pub fn rgba(self) -> [u8; 4] {
        let c = self.color();
        [c as u8, (c >> 8) as u8, (c >> 16) as u8, 255]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_classes() {
        assert!(Block::AIR.is_air());
        assert!(!Block::AIR.is_solid());
        assert!(!Block::AIR.is_fluid());

        let stone = Block::solid(0xd0d0d0);
        assert!(stone.is_solid());
        assert!(!stone.is_fluid());
        assert_eq!(stone.color(), 0xd0d0d0);
        assert_eq!(stone.raw(), 0x80d0_d0d0);

        let water = Block::fluid(0xd66b3c);
        assert!(water.is_fluid());
        assert!(!water.is_solid());
        assert_eq!(water.color(), 0xd66b3c);
    }

    #[test]
    fn test_color_is_masked() {
        let block = Block::solid(0xff12_3456);
        assert_eq!(block.color(), 0x12_3456);
        assert!(block.is_solid());
        assert!(Block::fluid(0).is_air());
    }

    #[test]
    fn test_rgba_byte_order() {
        assert_eq!(Block::solid(0x77e08e).rgba(), [0x8e, 0xe0, 0x77, 255]);
    }
}
