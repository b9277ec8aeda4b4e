use image::{Rgba, RgbaImage};

use super::error::{DefError, Result};
use super::frame::FrameMeta;
use super::header::Palette;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalBlockSize {
    pub width: u32,
    pub height: u32,
}

/// Pixel rectangle of the cropped bitmap inside the frame canvas, already clipped
/// to the canvas bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// Reconciles the frames of one block and places them on block-sized canvases.
///
/// The first frame accepted fixes both the canonical canvas size and the codec
/// variant. Frames must therefore be fed in block order, one block per compositor.
#[derive(Debug, Default, Clone)]
pub struct BlockCompositor {
    canonical: Option<CanonicalBlockSize>,
    codec_variant: Option<u32>,
}

impl BlockCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn canonical_size(&self) -> Option<CanonicalBlockSize> {
        self.canonical
    }

    pub fn codec_variant(&self) -> Option<u32> {
        self.codec_variant
    }

    /// Validates `meta` against the block and enlarges its full size to the block's
    /// canonical size. A rejected frame leaves the block state unchanged.
    pub fn reconcile(&mut self, meta: &mut FrameMeta) -> Result<()> {
        check_margins(meta)?;

        let canonical = match self.canonical {
            None => CanonicalBlockSize {
                width: meta.full_width,
                height: meta.full_height,
            },
            Some(canonical) => {
                if meta.full_width > canonical.width || meta.full_height > canonical.height {
                    return Err(DefError::InconsistentBlockSize {
                        width: meta.full_width,
                        height: meta.full_height,
                        block_width: canonical.width,
                        block_height: canonical.height,
                    });
                }
                canonical
            }
        };

        if let Some(expected) = self.codec_variant {
            if expected != meta.codec_variant {
                return Err(DefError::InconsistentCodecVariant {
                    expected,
                    found: meta.codec_variant,
                });
            }
        }

        meta.full_width = canonical.width;
        meta.full_height = canonical.height;
        self.canonical = Some(canonical);
        self.codec_variant = Some(meta.codec_variant);
        Ok(())
    }

    /// Maps `indices` through the palette onto a transparent canvas of the frame's
    /// (reconciled) full size, at the frame's margins.
    pub fn compose(&self, palette: &Palette, meta: &FrameMeta, indices: &[u8]) -> RgbaImage {
        let mut canvas = RgbaImage::from_pixel(meta.full_width, meta.full_height, Rgba([0, 0, 0, 0]));
        let rect = crop_rect(meta);
        let stride = meta.crop_width as usize;

        for y in 0..rect.height {
            let row = &indices[y as usize * stride..][..rect.width as usize];
            for (x, &index) in row.iter().enumerate() {
                canvas.put_pixel(rect.left + x as u32, rect.top + y, palette.rgba(index));
            }
        }
        canvas
    }
}

fn check_margins(meta: &FrameMeta) -> Result<()> {
    let left_ok = meta.left_margin >= 0 && meta.left_margin as u32 <= meta.full_width;
    let top_ok = meta.top_margin >= 0 && meta.top_margin as u32 <= meta.full_height;
    if left_ok && top_ok {
        Ok(())
    } else {
        Err(DefError::MarginOutOfBounds {
            left: meta.left_margin,
            top: meta.top_margin,
            full_width: meta.full_width,
            full_height: meta.full_height,
        })
    }
}

/// The crop rectangle of a frame whose margins have been validated.
pub fn crop_rect(meta: &FrameMeta) -> CropRect {
    let left = meta.left_margin.max(0) as u32;
    let top = meta.top_margin.max(0) as u32;
    CropRect {
        left,
        top,
        width: meta.crop_width.min(meta.full_width.saturating_sub(left)),
        height: meta.crop_height.min(meta.full_height.saturating_sub(top)),
    }
}
