use std::io::{Read, Seek};

use super::error::{DefError, Result};
use super::reader::DefReader;

/// Size of the per-frame header; scanline tables are addressed relative to its end.
pub const FRAME_HEADER_LEN: u64 = 32;

/// Largest canvas or crop side accepted from a frame header. Game sprites stay far
/// below it; anything larger is a corrupt header.
pub const MAX_FRAME_DIMENSION: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMeta {
    pub encoded_size: u32,
    pub codec_variant: u32,
    pub full_width: u32,
    pub full_height: u32,
    pub crop_width: u32,
    pub crop_height: u32,
    pub left_margin: i32,
    pub top_margin: i32,
}

impl FrameMeta {
    /// Reads the frame header at `data_offset`, leaving the reader at the start of the
    /// encoded pixel region.
    pub fn read_at<R: Read + Seek>(reader: &mut DefReader<R>, data_offset: u32) -> Result<Self> {
        reader.seek_to(data_offset as u64)?;
        Ok(Self {
            encoded_size: reader.read_u32()?,
            codec_variant: reader.read_u32()?,
            full_width: reader.read_u32()?,
            full_height: reader.read_u32()?,
            crop_width: reader.read_u32()?,
            crop_height: reader.read_u32()?,
            left_margin: reader.read_i32()?,
            top_margin: reader.read_i32()?,
        })
    }

    pub fn pixel_count(&self) -> usize {
        (self.crop_width as usize).saturating_mul(self.crop_height as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.crop_width == 0 || self.crop_height == 0
    }

    /// Rejects full and crop sizes no real frame has, before anything is allocated
    /// from them.
    pub fn check_dimensions(&self) -> Result<()> {
        for (width, height) in [
            (self.full_width, self.full_height),
            (self.crop_width, self.crop_height),
        ] {
            if width > MAX_FRAME_DIMENSION || height > MAX_FRAME_DIMENSION {
                return Err(DefError::FrameTooLarge {
                    width,
                    height,
                    max: MAX_FRAME_DIMENSION,
                });
            }
        }
        Ok(())
    }
}
