// Builders for synthetic DEF files used across the pipeline tests.

use byteorder::{LittleEndian, WriteBytesExt};

use super::codec::BLOCK_WIDTH;
use super::header::PALETTE_SIZE;
use super::index::{BLOCK_INDEX_OFFSET, FRAME_NAME_LEN};

#[derive(Debug, Clone)]
pub(crate) struct TestFrame {
    pub name: String,
    pub codec_variant: u32,
    pub full_width: u32,
    pub full_height: u32,
    pub crop_width: u32,
    pub crop_height: u32,
    pub left_margin: i32,
    pub top_margin: i32,
    pub pixels: Vec<u8>,
    /// Replaces the encoded pixel region when set.
    pub body: Option<Vec<u8>>,
}

impl TestFrame {
    pub fn new(name: &str, codec_variant: u32, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            codec_variant,
            full_width: width,
            full_height: height,
            crop_width: width,
            crop_height: height,
            left_margin: 0,
            top_margin: 0,
            pixels,
            body: None,
        }
    }

    pub fn with_canvas(mut self, full_width: u32, full_height: u32, left: i32, top: i32) -> Self {
        self.full_width = full_width;
        self.full_height = full_height;
        self.left_margin = left;
        self.top_margin = top;
        self
    }
}

/// Palette laid out like the game's: special colors in the first slots, plain
/// distinct opaque colors everywhere else.
pub(crate) fn test_palette() -> [[u8; 3]; PALETTE_SIZE] {
    let mut colors = [[0u8; 3]; PALETTE_SIZE];
    for (i, color) in colors.iter_mut().enumerate() {
        *color = [i as u8, 64, 32];
    }
    colors[0] = [0, 255, 255];
    colors[1] = [255, 150, 255];
    colors[4] = [255, 0, 255];
    colors[5] = [255, 255, 0];
    colors[6] = [180, 0, 255];
    colors[7] = [0, 255, 0];
    colors
}

/// Serializes a complete frame (32-byte header plus encoded pixels). All table
/// offsets are relative to the end of the header, so the result can be placed at
/// any absolute offset.
pub(crate) fn encode_frame(frame: &TestFrame) -> Vec<u8> {
    let body = match &frame.body {
        Some(body) => body.clone(),
        None => encode_body(frame),
    };

    let mut out = Vec::new();
    out.write_u32::<LittleEndian>(body.len() as u32).unwrap();
    out.write_u32::<LittleEndian>(frame.codec_variant).unwrap();
    out.write_u32::<LittleEndian>(frame.full_width).unwrap();
    out.write_u32::<LittleEndian>(frame.full_height).unwrap();
    out.write_u32::<LittleEndian>(frame.crop_width).unwrap();
    out.write_u32::<LittleEndian>(frame.crop_height).unwrap();
    out.write_i32::<LittleEndian>(frame.left_margin).unwrap();
    out.write_i32::<LittleEndian>(frame.top_margin).unwrap();
    out.extend(body);
    out
}

fn encode_body(frame: &TestFrame) -> Vec<u8> {
    let width = frame.crop_width as usize;
    let rows: Vec<&[u8]> = if width == 0 {
        Vec::new()
    } else {
        frame.pixels.chunks(width).collect()
    };

    match frame.codec_variant {
        1 => {
            let encoded: Vec<Vec<u8>> = rows.iter().map(|row| encode_row_rle(row)).collect();
            with_table(&encoded, 4, |out, offset| {
                out.write_u32::<LittleEndian>(offset as u32).unwrap()
            })
        }
        2 => {
            let encoded: Vec<Vec<u8>> = rows.iter().map(|row| encode_packed(row)).collect();
            with_table(&encoded, 2, |out, offset| {
                out.write_i16::<LittleEndian>(offset as i16).unwrap()
            })
        }
        3 => {
            let encoded: Vec<Vec<u8>> = rows
                .iter()
                .flat_map(|row| row.chunks(BLOCK_WIDTH).map(encode_packed))
                .collect();
            with_table(&encoded, 2, |out, offset| {
                out.write_u16::<LittleEndian>(offset as u16).unwrap()
            })
        }
        _ => frame.pixels.clone(),
    }
}

fn with_table(parts: &[Vec<u8>], entry_len: usize, write: impl Fn(&mut Vec<u8>, usize)) -> Vec<u8> {
    let mut table = Vec::new();
    let mut offset = parts.len() * entry_len;
    for part in parts {
        write(&mut table, offset);
        offset += part.len();
    }
    for part in parts {
        table.extend_from_slice(part);
    }
    table
}

fn run_length(data: &[u8], max: usize) -> usize {
    data.iter().take(max).take_while(|&&b| b == data[0]).count()
}

fn encode_row_rle(row: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < row.len() {
        let run = run_length(&row[i..], 256);
        if run >= 3 && row[i] != 0xFF {
            out.extend_from_slice(&[row[i], (run - 1) as u8]);
            i += run;
            continue;
        }
        let start = i;
        while i < row.len() && i - start < 256 {
            let ahead = run_length(&row[i..], 256);
            if ahead >= 3 && row[i] != 0xFF {
                break;
            }
            i += 1;
        }
        out.extend_from_slice(&[0xFF, (i - start - 1) as u8]);
        out.extend_from_slice(&row[start..i]);
    }
    out
}

fn encode_packed(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let run = run_length(&data[i..], 32);
        if run >= 2 && data[i] < 7 {
            out.push((data[i] << 5) | (run - 1) as u8);
            i += run;
            continue;
        }
        let start = i;
        while i < data.len() && i - start < 32 {
            if run_length(&data[i..], 32) >= 2 && data[i] < 7 {
                break;
            }
            i += 1;
        }
        out.push((7 << 5) | (i - start - 1) as u8);
        out.extend_from_slice(&data[start..i]);
    }
    out
}

/// Builds a whole DEF file: header, palette, block index, then the frames in order.
pub(crate) fn build_def(
    type_tag: u32,
    palette: &[[u8; 3]; PALETTE_SIZE],
    blocks: &[(u32, Vec<TestFrame>)],
) -> Vec<u8> {
    let frame_count: usize = blocks.iter().map(|(_, frames)| frames.len()).sum();

    let mut data = Vec::new();
    data.write_u32::<LittleEndian>(type_tag).unwrap();
    data.write_u32::<LittleEndian>(0).unwrap();
    data.write_u32::<LittleEndian>(0).unwrap();
    data.write_u32::<LittleEndian>(blocks.len() as u32).unwrap();
    for color in palette {
        data.extend_from_slice(color);
    }
    assert_eq!(data.len() as u64, BLOCK_INDEX_OFFSET);

    let index_len = blocks.len() * 16 + frame_count * (FRAME_NAME_LEN + 4);
    let mut frame_data = Vec::new();
    let mut next_offset = BLOCK_INDEX_OFFSET as usize + index_len;

    for (block_id, frames) in blocks {
        data.write_u32::<LittleEndian>(*block_id).unwrap();
        data.write_u32::<LittleEndian>(frames.len() as u32).unwrap();
        data.extend_from_slice(&[0u8; 8]);

        for frame in frames {
            let mut field = [0u8; FRAME_NAME_LEN];
            let len = frame.name.len().min(FRAME_NAME_LEN);
            field[..len].copy_from_slice(&frame.name.as_bytes()[..len]);
            data.extend_from_slice(&field);
        }
        for frame in frames {
            let encoded = encode_frame(frame);
            data.write_u32::<LittleEndian>(next_offset as u32).unwrap();
            next_offset += encoded.len();
            frame_data.extend(encoded);
        }
    }

    data.extend(frame_data);
    data
}
