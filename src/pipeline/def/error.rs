use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DefError {
    #[error("unexpected end of input at offset {offset} (wanted {wanted} bytes)")]
    TruncatedInput { offset: u64, wanted: usize },

    #[error("DEF header truncated at offset {offset}")]
    HeaderTruncated { offset: u64 },

    #[error("DEF palette truncated at offset {offset}")]
    PaletteTruncated { offset: u64 },

    #[error("DEF block index truncated at offset {offset}")]
    IndexTruncated { offset: u64 },

    #[error("unsupported pixel codec variant {variant}")]
    UnsupportedCodec { variant: u32 },

    #[error("frame size {width}x{height} exceeds {max}x{max}")]
    FrameTooLarge { width: u32, height: u32, max: u32 },

    #[error("frame name {name:?} is not usable as a file name")]
    UnsafeFrameName { name: String },

    #[error("{name:?} is not usable as an output directory name")]
    UnsafeOutputName { name: String },

    #[error("pixel data truncated at offset {offset}")]
    TruncatedPixelData { offset: u64 },

    #[error("margins ({left}x{top}) are outside of dimensions ({full_width}x{full_height})")]
    MarginOutOfBounds {
        left: i32,
        top: i32,
        full_width: u32,
        full_height: u32,
    },

    #[error(
        "frame size {width}x{height} is larger than the block size {block_width}x{block_height}"
    )]
    InconsistentBlockSize {
        width: u32,
        height: u32,
        block_width: u32,
        block_height: u32,
    },

    #[error("frame uses codec variant {found}, block uses {expected}")]
    InconsistentCodecVariant { expected: u32, found: u32 },

    #[error("can't write {path}: {source}")]
    OutputIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("can't encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error reading DEF data: {0}")]
    Io(#[from] std::io::Error),
}

impl DefError {
    /// Re-labels a short read with the section of the file it happened in.
    pub(crate) fn in_section(self, section: fn(u64) -> DefError) -> DefError {
        match self {
            DefError::TruncatedInput { offset, .. } => section(offset),
            other => other,
        }
    }

    /// Whether the error only concerns a single frame, leaving the rest of the file usable.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            DefError::TruncatedInput { .. }
                | DefError::UnsupportedCodec { .. }
                | DefError::TruncatedPixelData { .. }
                | DefError::FrameTooLarge { .. }
                | DefError::UnsafeFrameName { .. }
                | DefError::MarginOutOfBounds { .. }
                | DefError::InconsistentBlockSize { .. }
                | DefError::InconsistentCodecVariant { .. }
        )
    }

    pub(crate) fn header(offset: u64) -> DefError {
        DefError::HeaderTruncated { offset }
    }

    pub(crate) fn palette(offset: u64) -> DefError {
        DefError::PaletteTruncated { offset }
    }

    pub(crate) fn index(offset: u64) -> DefError {
        DefError::IndexTruncated { offset }
    }

    pub(crate) fn pixels(offset: u64) -> DefError {
        DefError::TruncatedPixelData { offset }
    }
}

pub type Result<T> = std::result::Result<T, DefError>;
