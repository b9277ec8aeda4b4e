use image::Rgba;
use std::io::{Read, Seek};

use super::error::{DefError, Result};
use super::reader::DefReader;

pub const PALETTE_SIZE: usize = 256;
const PALETTE_OFFSET: u64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteHeader {
    pub type_tag: u32,
    pub nominal_width: u32,
    pub nominal_height: u32,
    pub block_count: u32,
}

impl SpriteHeader {
    pub fn read<R: Read + Seek>(reader: &mut DefReader<R>) -> Result<Self> {
        reader.seek_to(0)?;
        Self::read_fields(reader).map_err(|e| e.in_section(DefError::header))
    }

    fn read_fields<R: Read + Seek>(reader: &mut DefReader<R>) -> Result<Self> {
        Ok(Self {
            type_tag: reader.read_u32()?,
            nominal_width: reader.read_u32()?,
            nominal_height: reader.read_u32()?,
            block_count: reader.read_u32()?,
        })
    }
}

/// The 256-color table shared by every frame of one DEF file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: [[u8; 3]; PALETTE_SIZE],
}

impl Palette {
    pub fn new(colors: [[u8; 3]; PALETTE_SIZE]) -> Self {
        Self { colors }
    }

    pub fn read<R: Read + Seek>(reader: &mut DefReader<R>) -> Result<Self> {
        reader.seek_to(PALETTE_OFFSET)?;

        let mut raw = [0u8; PALETTE_SIZE * 3];
        reader
            .read_into(&mut raw)
            .map_err(|e| e.in_section(DefError::palette))?;

        let mut colors = [[0u8; 3]; PALETTE_SIZE];
        for (color, rgb) in colors.iter_mut().zip(raw.chunks_exact(3)) {
            color.copy_from_slice(rgb);
        }
        Ok(Self { colors })
    }

    pub fn rgb(&self, index: u8) -> [u8; 3] {
        self.colors[index as usize]
    }

    pub fn rgba(&self, index: u8) -> Rgba<u8> {
        let [r, g, b] = self.colors[index as usize];
        Rgba([r, g, b, 255])
    }
}
