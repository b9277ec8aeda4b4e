use image::{Rgba, RgbaImage};

use super::compositor::CropRect;

/// Palette colors the game treats as transparency and shadow markers, with the alpha
/// each one maps to. The selection highlight (255, 255, 0) stays opaque.
pub const SPECIAL_COLORS: [([u8; 3], u8); 5] = [
    ([0, 255, 255], 0),     // background
    ([255, 150, 255], 64),  // shadow border
    ([255, 0, 255], 128),   // shadow body
    ([180, 0, 255], 128),   // selection shadow body
    ([0, 255, 0], 64),      // selection shadow border
];

/// Replaces special colors inside `rect` with translucent black.
pub fn apply_special_colors(canvas: &mut RgbaImage, rect: CropRect) {
    let right = (rect.left + rect.width).min(canvas.width());
    let bottom = (rect.top + rect.height).min(canvas.height());

    for y in rect.top..bottom {
        for x in rect.left..right {
            let pixel = canvas.get_pixel_mut(x, y);
            if let Some(alpha) = special_alpha(*pixel) {
                *pixel = Rgba([0, 0, 0, alpha]);
            }
        }
    }
}

fn special_alpha(pixel: Rgba<u8>) -> Option<u8> {
    let Rgba([r, g, b, a]) = pixel;
    if a != 255 {
        return None;
    }
    SPECIAL_COLORS
        .iter()
        .find(|(rgb, _)| *rgb == [r, g, b])
        .map(|(_, alpha)| *alpha)
}
