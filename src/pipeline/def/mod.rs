// DEF sprite container parsing and frame decoding

pub mod alpha;
pub mod codec;
pub mod compositor;
pub mod error;
pub mod frame;
pub mod header;
pub mod index;
pub mod reader;

#[cfg(test)]
pub(crate) mod testing;

use image::RgbaImage;
use std::io::{Read, Seek};

pub use codec::{PixelCodec, decode_pixels};
pub use compositor::{BlockCompositor, CanonicalBlockSize, CropRect};
pub use error::DefError;
pub use frame::FrameMeta;
pub use header::{Palette, SpriteHeader};
pub use index::{BlockEntry, FrameRef};
pub use reader::DefReader;

use alpha::apply_special_colors;
use compositor::crop_rect;
use error::Result;

/// Header, palette and frame directory of one DEF file. Frame data stays in the
/// source and is read lazily per frame.
#[derive(Debug, Clone)]
pub struct DefFile {
    pub header: SpriteHeader,
    pub palette: Palette,
    pub blocks: Vec<BlockEntry>,
}

impl DefFile {
    pub fn read<R: Read + Seek>(reader: &mut DefReader<R>) -> Result<Self> {
        let header = SpriteHeader::read(reader)?;
        let palette = Palette::read(reader)?;
        let blocks = index::read_block_index(reader, header.block_count)?;
        Ok(Self {
            header,
            palette,
            blocks,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.blocks.iter().map(|b| b.frames.len()).sum()
    }
}

#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Frame geometry after reconciliation with its block.
    pub meta: FrameMeta,
    pub image: RgbaImage,
}

/// Reads, validates, decodes and composites a single frame of a block.
///
/// Oversized headers and unknown codec variants are rejected before the block is
/// touched, empty frames included.
///
/// `block` must have seen the earlier frames of the same block, in order. If the frame
/// fails at any stage the block state is left as it was.
pub fn decode_frame<R: Read + Seek>(
    reader: &mut DefReader<R>,
    palette: &Palette,
    block: &mut BlockCompositor,
    frame: &FrameRef,
) -> Result<DecodedFrame> {
    let mut meta = FrameMeta::read_at(reader, frame.data_offset)?;
    meta.check_dimensions()?;
    let codec = PixelCodec::from_variant(meta.codec_variant)?;

    let mut staged = block.clone();
    staged.reconcile(&mut meta)?;

    let mut image = if meta.is_empty() {
        RgbaImage::new(meta.full_width, meta.full_height)
    } else {
        let indices = codec.decode(reader, &meta, frame.data_offset)?;
        staged.compose(palette, &meta, &indices)
    };
    apply_special_colors(&mut image, crop_rect(&meta));

    *block = staged;
    Ok(DecodedFrame { meta, image })
}
