use std::path::Path;

use crate::foundation::error::{GeoError, GeoResult};
use crate::foundation::json::ensure_parent_dir;

/// A rendered frame as RGBA8 pixels.
///
/// Frames coming out of the renderer are premultiplied; `premultiplied` makes that explicit
/// wherever a frame crosses an API boundary.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Straight-alpha RGBA of the pixel at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 4) as usize;
        let px: [u8; 4] = self.data.get(i..i + 4)?.try_into().ok()?;
        Some(if self.premultiplied {
            unpremultiply(px)
        } else {
            px
        })
    }

    /// Convert into a straight-alpha `image` buffer.
    pub fn to_rgba_image(&self) -> GeoResult<image::RgbaImage> {
        let mut data = self.data.clone();
        if self.premultiplied {
            for px in data.chunks_exact_mut(4) {
                let straight = unpremultiply([px[0], px[1], px[2], px[3]]);
                px.copy_from_slice(&straight);
            }
        }
        image::RgbaImage::from_raw(self.width, self.height, data).ok_or_else(|| {
            GeoError::render(format!(
                "frame buffer does not match {}x{}",
                self.width, self.height
            ))
        })
    }

    /// Write the frame as a PNG (or whatever the extension of `path` names).
    pub fn save(&self, path: &Path) -> GeoResult<()> {
        ensure_parent_dir(path)?;
        self.to_rgba_image()?.save(path).map_err(|e| {
            GeoError::render(format!("failed to write frame '{}': {e}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), "wrote frame image");
        Ok(())
    }
}

fn unpremultiply([r, g, b, a]: [u8; 4]) -> [u8; 4] {
    match a {
        0 => [0, 0, 0, 0],
        255 => [r, g, b, a],
        _ => {
            let a16 = u16::from(a);
            let un = |c: u8| -> u8 { ((u16::from(c) * 255 + a16 / 2) / a16).min(255) as u8 };
            [un(r), un(g), un(b), a]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpremultiply_restores_straight_alpha() {
        assert_eq!(unpremultiply([0, 0, 0, 0]), [0, 0, 0, 0]);
        assert_eq!(unpremultiply([10, 20, 30, 255]), [10, 20, 30, 255]);
        assert_eq!(unpremultiply([64, 0, 128, 128]), [128, 0, 255, 128]);
    }

    #[test]
    fn pixel_lookup_is_bounds_checked() {
        let f = FrameRGBA {
            width: 2,
            height: 1,
            data: vec![1, 2, 3, 255, 4, 5, 6, 255],
            premultiplied: true,
        };
        assert_eq!(f.pixel(1, 0), Some([4, 5, 6, 255]));
        assert_eq!(f.pixel(2, 0), None);
        assert_eq!(f.pixel(0, 1), None);
    }

    #[test]
    fn short_buffer_is_a_render_error() {
        let f = FrameRGBA {
            width: 4,
            height: 4,
            data: vec![0; 8],
            premultiplied: false,
        };
        assert!(f.to_rgba_image().is_err());
    }
}
