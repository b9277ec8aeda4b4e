//! Decoders for the four DEF pixel encodings.
//!
//! Every decoder produces a flat, row-major buffer of exactly
//! `crop_width * crop_height` palette indices. Scanline and block tables hold
//! offsets relative to the end of the 32-byte frame header.

use std::io::{Read, Seek};

use super::error::{DefError, Result};
use super::frame::{FRAME_HEADER_LEN, FrameMeta};
use super::reader::DefReader;

const LITERAL_RUN: u8 = 0xFF;
const PACKED_LITERAL: u8 = 7;
const PACKED_CODE_SHIFT: u8 = 5;
const PACKED_LENGTH_MASK: u8 = 0x1F;
pub const BLOCK_WIDTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelCodec {
    /// Variant 0: uncompressed indices.
    Raw,
    /// Variant 1: per-row `(code, length)` runs addressed by a u32 scanline table.
    RowRle,
    /// Variant 2: per-row packed segments addressed by an i16 scanline table.
    PackedRowRle,
    /// Variant 3: packed segments in 32-pixel blocks addressed by a u16 block table.
    PackedBlockRle,
}

impl PixelCodec {
    pub fn from_variant(variant: u32) -> Result<Self> {
        match variant {
            0 => Ok(PixelCodec::Raw),
            1 => Ok(PixelCodec::RowRle),
            2 => Ok(PixelCodec::PackedRowRle),
            3 => Ok(PixelCodec::PackedBlockRle),
            _ => Err(DefError::UnsupportedCodec { variant }),
        }
    }

    pub fn variant(self) -> u32 {
        match self {
            PixelCodec::Raw => 0,
            PixelCodec::RowRle => 1,
            PixelCodec::PackedRowRle => 2,
            PixelCodec::PackedBlockRle => 3,
        }
    }

    /// Decodes the pixel region of the frame stored at `data_offset`. The reader must be
    /// positioned right after the frame header.
    pub fn decode<R: Read + Seek>(
        self,
        reader: &mut DefReader<R>,
        meta: &FrameMeta,
        data_offset: u32,
    ) -> Result<Vec<u8>> {
        let base = data_offset as u64 + FRAME_HEADER_LEN;
        let width = meta.crop_width as usize;
        let height = meta.crop_height as usize;

        let pixels = match self {
            PixelCodec::Raw => reader.read_bytes(meta.pixel_count()),
            PixelCodec::RowRle => decode_row_rle(reader, base, width, height),
            PixelCodec::PackedRowRle => decode_packed_rows(reader, base, width, height),
            PixelCodec::PackedBlockRle => decode_packed_blocks(reader, base, width, height),
        }
        .map_err(|e| e.in_section(DefError::pixels))?;

        debug_assert_eq!(pixels.len(), meta.pixel_count());
        Ok(pixels)
    }
}

/// Dispatches on the frame's codec variant.
pub fn decode_pixels<R: Read + Seek>(
    reader: &mut DefReader<R>,
    meta: &FrameMeta,
    data_offset: u32,
) -> Result<Vec<u8>> {
    PixelCodec::from_variant(meta.codec_variant)?.decode(reader, meta, data_offset)
}

fn decode_row_rle<R: Read + Seek>(
    reader: &mut DefReader<R>,
    base: u64,
    width: usize,
    height: usize,
) -> Result<Vec<u8>> {
    let mut row_offsets = Vec::new();
    for _ in 0..height {
        row_offsets.push(reader.read_u32()?);
    }

    let mut pixels = Vec::new();
    for row_offset in row_offsets {
        reader.seek_to(base + row_offset as u64)?;

        let row_end = pixels.len() + width;
        while pixels.len() < row_end {
            let code = reader.read_u8()?;
            let length = reader.read_u8()? as usize + 1;
            let take = length.min(row_end - pixels.len());

            if code == LITERAL_RUN {
                let literal = reader.read_bytes(length)?;
                pixels.extend_from_slice(&literal[..take]);
            } else {
                pixels.resize(pixels.len() + take, code);
            }
        }
    }
    Ok(pixels)
}

fn decode_packed_rows<R: Read + Seek>(
    reader: &mut DefReader<R>,
    base: u64,
    width: usize,
    height: usize,
) -> Result<Vec<u8>> {
    let mut row_offsets = Vec::new();
    for _ in 0..height {
        row_offsets.push(reader.read_i16()?);
    }

    let mut pixels = Vec::new();
    for row_offset in row_offsets {
        reader.seek_to(relative_offset(base, row_offset as i64)?)?;
        read_packed_segments(reader, &mut pixels, width)?;
    }
    Ok(pixels)
}

fn decode_packed_blocks<R: Read + Seek>(
    reader: &mut DefReader<R>,
    base: u64,
    width: usize,
    height: usize,
) -> Result<Vec<u8>> {
    let columns = width.div_ceil(BLOCK_WIDTH);

    let mut block_offsets = Vec::new();
    for _ in 0..columns.saturating_mul(height) {
        block_offsets.push(reader.read_u16()?);
    }

    let mut pixels = Vec::new();
    for row in block_offsets.chunks(columns.max(1)).take(height) {
        for (column, block_offset) in row.iter().enumerate() {
            let block_len = BLOCK_WIDTH.min(width - column * BLOCK_WIDTH);
            reader.seek_to(base + *block_offset as u64)?;
            read_packed_segments(reader, &mut pixels, block_len)?;
        }
    }
    Ok(pixels)
}

/// Appends exactly `count` pixels decoded from single-byte packed segments: the top
/// three bits are a code, the low five bits plus one are the run length. Code 7 is a
/// literal run; any other code is itself the fill value.
fn read_packed_segments<R: Read + Seek>(
    reader: &mut DefReader<R>,
    pixels: &mut Vec<u8>,
    count: usize,
) -> Result<()> {
    let end = pixels.len() + count;
    while pixels.len() < end {
        let segment = reader.read_u8()?;
        let code = segment >> PACKED_CODE_SHIFT;
        let length = (segment & PACKED_LENGTH_MASK) as usize + 1;
        let take = length.min(end - pixels.len());

        if code == PACKED_LITERAL {
            let literal = reader.read_bytes(length)?;
            pixels.extend_from_slice(&literal[..take]);
        } else {
            pixels.resize(pixels.len() + take, code);
        }
    }
    Ok(())
}

fn relative_offset(base: u64, offset: i64) -> Result<u64> {
    base.checked_add_signed(offset)
        .ok_or(DefError::TruncatedPixelData { offset: base })
}
