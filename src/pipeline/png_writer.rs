use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::def::DefError;

pub const SIDECAR_NAME: &str = "meta.json";

/// Contents of the `meta.json` written next to the frames of one DEF file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefSidecar {
    pub def_type: u32,
    /// Codec variant of the first frame decoded in the file.
    pub format: Option<u32>,
    pub blocks_meta: Vec<BlockSidecar>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSidecar {
    pub block_id: u32,
    pub format: Option<u32>,
    pub images: Vec<ImageSidecar>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSidecar {
    pub name: String,
    pub offset: u32,
    /// PNG path relative to the DEF output directory; absent when the frame failed.
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn write_png(image: &RgbaImage, path: &Path) -> Result<(), DefError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| DefError::OutputIo {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(|source| DefError::Encode {
            path: path.to_path_buf(),
            source,
        })
}

pub fn write_sidecar(path: &Path, sidecar: &DefSidecar) -> Result<(), DefError> {
    let output_err = |source: std::io::Error| DefError::OutputIo {
        path: path.to_path_buf(),
        source,
    };

    let file = fs::File::create(path).map_err(output_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, sidecar).map_err(|e| output_err(e.into()))?;
    writeln!(writer).map_err(output_err)?;
    writer.flush().map_err(output_err)
}

pub fn read_sidecar(path: &Path) -> anyhow::Result<DefSidecar> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
