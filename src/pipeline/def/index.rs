use std::io::{Read, Seek};

use super::error::{DefError, Result};
use super::reader::DefReader;

/// Absolute offset of the block directory, right after the header and palette.
pub const BLOCK_INDEX_OFFSET: u64 = 784;
pub const FRAME_NAME_LEN: usize = 13;
const BLOCK_RESERVED_LEN: i64 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRef {
    pub name: String,
    pub data_offset: u32,
}

impl FrameRef {
    /// Output file stem: the frame name without its original extension.
    pub fn stem(&self) -> &str {
        match self.name.rfind('.') {
            Some(dot) if dot > 0 => &self.name[..dot],
            _ => &self.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEntry {
    pub block_id: u32,
    pub frames: Vec<FrameRef>,
}

pub fn read_block_index<R: Read + Seek>(
    reader: &mut DefReader<R>,
    block_count: u32,
) -> Result<Vec<BlockEntry>> {
    reader.seek_to(BLOCK_INDEX_OFFSET)?;

    let mut blocks = Vec::new();
    for _ in 0..block_count {
        let block = read_block(reader).map_err(|e| e.in_section(DefError::index))?;
        blocks.push(block);
    }
    Ok(blocks)
}

fn read_block<R: Read + Seek>(reader: &mut DefReader<R>) -> Result<BlockEntry> {
    let block_id = reader.read_u32()?;
    let frame_count = reader.read_u32()?;
    reader.skip(BLOCK_RESERVED_LEN)?;

    // Names and offsets are two separate arrays, not interleaved records.
    let mut names = Vec::new();
    for _ in 0..frame_count {
        names.push(reader.read_name(FRAME_NAME_LEN)?);
    }

    let mut frames = Vec::with_capacity(names.len());
    for name in names {
        let data_offset = reader.read_u32()?;
        frames.push(FrameRef { name, data_offset });
    }

    Ok(BlockEntry { block_id, frames })
}
