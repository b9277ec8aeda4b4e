use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use super::def::{self, BlockCompositor, DefError, DefFile, DefReader};
use super::fs_ops::{ensure_dir, is_plain_file_name, reset_dir};
use super::png_writer::{
    BlockSidecar, DefSidecar, ImageSidecar, SIDECAR_NAME, write_png, write_sidecar,
};

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub reset_output: bool,
    pub write_sidecar: bool,
    pub sidecar_name: String,
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self {
            reset_output: true,
            write_sidecar: true,
            sidecar_name: SIDECAR_NAME.to_string(),
        }
    }

    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset_output = reset;
        self
    }

    pub fn with_sidecar(mut self, write: bool) -> Self {
        self.write_sidecar = write;
        self
    }

    pub fn with_sidecar_name(mut self, name: impl Into<String>) -> Self {
        self.sidecar_name = name.into();
        self
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct FrameOutcome {
    pub block_id: u32,
    pub name: String,
    pub data_offset: u32,
    pub result: std::result::Result<PathBuf, DefError>,
}

/// What happened to every frame of one DEF file.
#[derive(Debug)]
pub struct DefReport {
    pub name: String,
    pub output_dir: PathBuf,
    pub frames: Vec<FrameOutcome>,
}

impl DefReport {
    pub fn extracted(&self) -> usize {
        self.frames.iter().filter(|f| f.result.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FrameOutcome> {
        self.frames.iter().filter(|f| f.result.is_err())
    }
}

/// Output directory name for a DEF file: its file name without extension.
pub fn def_stem(name: &str) -> &str {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match base.rfind('.') {
        Some(dot) if dot > 0 => &base[..dot],
        _ => base,
    }
}

/// Extracts every frame of the DEF data in `source` into `<output_root>/<stem of name>`.
///
/// Header and index errors abort the file, as do output errors. Frame-level decode
/// errors are recorded in the report and the sidecar, and extraction moves on to the
/// next frame of the block.
pub fn extract_def<R: Read + Seek>(
    source: R,
    name: &str,
    output_root: &Path,
    options: &ExtractOptions,
) -> std::result::Result<DefReport, DefError> {
    let mut reader = DefReader::new(source);
    let def = DefFile::read(&mut reader)?;

    let stem = def_stem(name);
    if !is_plain_file_name(stem) {
        return Err(DefError::UnsafeOutputName {
            name: stem.to_string(),
        });
    }
    let output_dir = output_root.join(stem);
    let prepare = if options.reset_output {
        reset_dir(&output_dir)
    } else {
        ensure_dir(&output_dir)
    };
    prepare.map_err(|source| DefError::OutputIo {
        path: output_dir.clone(),
        source,
    })?;

    debug!(
        "{}: type 0x{:x}, {} blocks, {} frames",
        name,
        def.header.type_tag,
        def.blocks.len(),
        def.frame_count()
    );

    let mut sidecar = DefSidecar {
        def_type: def.header.type_tag,
        format: None,
        blocks_meta: Vec::with_capacity(def.blocks.len()),
    };
    let mut frames = Vec::with_capacity(def.frame_count());

    for block in &def.blocks {
        let block_dir = output_dir.join(block.block_id.to_string());
        ensure_dir(&block_dir).map_err(|source| DefError::OutputIo {
            path: block_dir.clone(),
            source,
        })?;

        let mut compositor = BlockCompositor::new();
        let mut images = Vec::with_capacity(block.frames.len());

        for frame in &block.frames {
            let relative = format!("{}/{}.png", block.block_id, frame.stem());

            let decoded = if is_plain_file_name(frame.stem()) {
                def::decode_frame(&mut reader, &def.palette, &mut compositor, frame)
            } else {
                Err(DefError::UnsafeFrameName {
                    name: frame.name.clone(),
                })
            };

            let result = match decoded {
                Ok(decoded) => {
                    let path = block_dir.join(format!("{}.png", frame.stem()));
                    write_png(&decoded.image, &path)?;
                    Ok(path)
                }
                Err(e) if e.is_frame_local() => {
                    warn!(
                        "{}: skipping frame {} at offset {}: {}",
                        name, frame.name, frame.data_offset, e
                    );
                    Err(e)
                }
                Err(e) => return Err(e),
            };

            images.push(ImageSidecar {
                name: frame.name.clone(),
                offset: frame.data_offset,
                output: result.as_ref().ok().map(|_| relative),
                error: result.as_ref().err().map(|e| e.to_string()),
            });
            frames.push(FrameOutcome {
                block_id: block.block_id,
                name: frame.name.clone(),
                data_offset: frame.data_offset,
                result,
            });
        }

        if sidecar.format.is_none() {
            sidecar.format = compositor.codec_variant();
        }
        sidecar.blocks_meta.push(BlockSidecar {
            block_id: block.block_id,
            format: compositor.codec_variant(),
            images,
        });
    }

    if options.write_sidecar {
        write_sidecar(&output_dir.join(&options.sidecar_name), &sidecar)?;
    }

    let report = DefReport {
        name: name.to_string(),
        output_dir,
        frames,
    };
    info!(
        "{}: extracted {}/{} frames",
        name,
        report.extracted(),
        report.frames.len()
    );
    Ok(report)
}

pub fn extract_def_file(path: &Path, output_root: &Path, options: &ExtractOptions) -> Result<DefReport> {
    let file = File::open(path).with_context(|| format!("can't open {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("sprite.def");

    extract_def(BufReader::new(file), name, output_root, options)
        .with_context(|| format!("can't extract {}", path.display()))
}
