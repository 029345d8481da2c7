//! Reference-grid overlay for problem images.
//!
//! The grid gives a vision model something to read coordinates off: 11 lines per axis
//! labelled `0.0` to `1.0`.

use std::path::Path;

use image::{Rgb, RgbImage, Rgba, RgbaImage};

use crate::assets::color::Color;
use crate::assets::fonts::{FontBytes, TextBrushRgba8, TextLayoutEngine, fill_layout};
use crate::foundation::error::{GeoError, GeoResult};
use crate::foundation::json::ensure_parent_dir;

/// Intervals per axis.
pub const GRID_DIVISIONS: u32 = 10;
/// Line color (straight alpha).
pub const GRID_LINE_COLOR: Color = Color::rgba(255, 0, 0, 128);
pub const GRID_LABEL_COLOR: Color = Color::rgba(255, 0, 0, 255);
pub const GRID_LINE_WIDTH: u32 = 2;
const LABEL_OFFSET: u32 = 2;
const LABEL_MARGIN: u32 = 5;
const JPEG_QUALITY: u8 = 95;

/// Pixel positions of the gridlines along an axis of length `dim`.
pub fn grid_positions(dim: u32) -> Vec<u32> {
    (0..=GRID_DIVISIONS)
        .map(|i| (u64::from(i) * u64::from(dim) / u64::from(GRID_DIVISIONS)) as u32)
        .map(|p| p.min(dim.saturating_sub(1)))
        .collect()
}

/// Label text for gridline `i`.
pub fn grid_label(i: u32) -> String {
    format!("{:.1}", f64::from(i) / f64::from(GRID_DIVISIONS))
}

/// Label size in pixels for an image `width` pixels wide.
pub fn label_font_size(width: u32) -> u32 {
    ((f64::from(width) * 0.02).floor() as u32).max(12)
}

/// Draw the grid over `src` and write the result to `dst`. Returns the source dimensions.
///
/// `font` is used for the labels; without one a built-in bitmap digit font is used.
#[tracing::instrument(skip_all, fields(src = %src.display(), dst = %dst.display()))]
pub fn annotate_grid(src: &Path, dst: &Path, font: Option<&FontBytes>) -> GeoResult<(u32, u32)> {
    if !src.is_file() {
        return Err(GeoError::input(format!(
            "source image '{}' not found",
            src.display()
        )));
    }
    let source = image::open(src)
        .map_err(|e| GeoError::input(format!("failed to decode '{}': {e}", src.display())))?
        .to_rgba8();
    let (width, height) = source.dimensions();

    let overlay = grid_overlay(width, height, font)?;
    let flat = composite_over(&source, &overlay);
    write_rgb(&flat, dst)?;

    tracing::info!(width, height, "grid image written");
    Ok((width, height))
}

/// The transparent grid layer for a `width`×`height` image.
pub fn grid_overlay(width: u32, height: u32, font: Option<&FontBytes>) -> GeoResult<RgbaImage> {
    if width == 0 || height == 0 {
        return Err(GeoError::validation("image dimensions must be non-zero"));
    }
    let mut overlay = RgbaImage::new(width, height);
    let line = rgba(GRID_LINE_COLOR);
    let xs = grid_positions(width);
    let ys = grid_positions(height);

    // Lines replace overlay pixels, so crossings keep the line alpha.
    for &x in &xs {
        for px in x..(x + GRID_LINE_WIDTH).min(width) {
            for py in 0..height {
                overlay.put_pixel(px, py, line);
            }
        }
    }
    for &y in &ys {
        for py in y..(y + GRID_LINE_WIDTH).min(height) {
            for px in 0..width {
                overlay.put_pixel(px, py, line);
            }
        }
    }

    let size = label_font_size(width);
    let mut labels = Vec::with_capacity(xs.len() + ys.len());
    for (i, &x) in xs.iter().enumerate() {
        labels.push((grid_label(i as u32), x + LABEL_OFFSET, LABEL_MARGIN));
    }
    for (i, &y) in ys.iter().enumerate() {
        labels.push((grid_label(i as u32), LABEL_MARGIN, y + LABEL_OFFSET));
    }

    let drawn = match font {
        Some(font) => match draw_labels_scalable(&mut overlay, &labels, size, font) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "scalable label font failed, using bitmap digits");
                false
            }
        },
        None => false,
    };
    if !drawn {
        draw_labels_bitmap(&mut overlay, &labels, size);
    }
    Ok(overlay)
}

fn rgba(c: Color) -> Rgba<u8> {
    Rgba([c.r, c.g, c.b, c.a])
}

fn draw_labels_scalable(
    overlay: &mut RgbaImage,
    labels: &[(String, u32, u32)],
    size: u32,
    font: &FontBytes,
) -> GeoResult<()> {
    let (width, height) = overlay.dimensions();
    let w16 = u16::try_from(width)
        .map_err(|_| GeoError::validation("image too wide for label rasterization"))?;
    let h16 = u16::try_from(height)
        .map_err(|_| GeoError::validation("image too tall for label rasterization"))?;

    let mut engine = TextLayoutEngine::new(font)?;
    let mut ctx = vello_cpu::RenderContext::new(w16, h16);
    for (text, x, y) in labels {
        let layout = engine.layout_plain(
            text,
            size as f32,
            TextBrushRgba8::from(GRID_LABEL_COLOR),
            None,
        )?;
        ctx.set_transform(vello_cpu::kurbo::Affine::translate((
            f64::from(*x),
            f64::from(*y),
        )));
        fill_layout(&mut ctx, &layout, engine.font_data(), None);
    }
    let mut pixmap = vello_cpu::Pixmap::new(w16, h16);
    ctx.flush();
    ctx.render_to_pixmap(&mut pixmap);

    for (dst, src) in overlay
        .pixels_mut()
        .zip(pixmap.data_as_u8_slice().chunks_exact(4))
    {
        let a = src[3];
        if a == 0 {
            continue;
        }
        // Premultiplied source over straight destination.
        let sa = f32::from(a) / 255.0;
        let da = f32::from(dst[3]) / 255.0;
        let out_a = sa + da * (1.0 - sa);
        for c in 0..3 {
            let s = f32::from(src[c]) / 255.0;
            let d = f32::from(dst[c]) / 255.0 * da;
            dst[c] = ((s + d * (1.0 - sa)) / out_a * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        dst[3] = (out_a * 255.0).round() as u8;
    }
    Ok(())
}

fn draw_labels_bitmap(overlay: &mut RgbaImage, labels: &[(String, u32, u32)], size: u32) {
    let scale = (size / bitmap::GLYPH_HEIGHT).max(1);
    let color = rgba(GRID_LABEL_COLOR);
    let (width, height) = overlay.dimensions();
    for (text, x0, y0) in labels {
        let mut pen_x = *x0;
        for ch in text.chars() {
            if let Some(rows) = bitmap::glyph(ch) {
                for (row, bits) in rows.iter().enumerate() {
                    for col in 0..bitmap::GLYPH_WIDTH {
                        if bits & (1 << (bitmap::GLYPH_WIDTH - 1 - col)) == 0 {
                            continue;
                        }
                        let gx = pen_x + col * scale;
                        let gy = y0 + row as u32 * scale;
                        for dy in 0..scale {
                            for dx in 0..scale {
                                let (px, py) = (gx + dx, gy + dy);
                                if px < width && py < height {
                                    overlay.put_pixel(px, py, color);
                                }
                            }
                        }
                    }
                }
            }
            pen_x += (bitmap::GLYPH_WIDTH + 1) * scale;
        }
    }
}

/// Straight-alpha `overlay` over `source`, flattened to RGB.
fn composite_over(source: &RgbaImage, overlay: &RgbaImage) -> RgbImage {
    let (width, height) = source.dimensions();
    let mut out = RgbImage::new(width, height);
    for ((dst, src), ov) in out.pixels_mut().zip(source.pixels()).zip(overlay.pixels()) {
        let a = u32::from(ov[3]);
        let mix = |s: u8, o: u8| -> u8 { ((u32::from(s) * (255 - a) + u32::from(o) * a + 127) / 255) as u8 };
        *dst = Rgb([mix(src[0], ov[0]), mix(src[1], ov[1]), mix(src[2], ov[2])]);
    }
    out
}

fn write_rgb(img: &RgbImage, dst: &Path) -> GeoResult<()> {
    ensure_parent_dir(dst)?;
    let is_jpeg = dst
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"));
    let fail = |e: &dyn std::fmt::Display| {
        GeoError::render(format!("failed to write '{}': {e}", dst.display()))
    };
    if is_jpeg {
        let file = std::fs::File::create(dst).map_err(|e| fail(&e))?;
        let mut enc = image::codecs::jpeg::JpegEncoder::new_with_quality(
            std::io::BufWriter::new(file),
            JPEG_QUALITY,
        );
        enc.encode_image(img).map_err(|e| fail(&e))
    } else {
        img.save(dst).map_err(|e| fail(&e))
    }
}

/// 5×7 digits for labelling without a scalable font.
mod bitmap {
    pub(super) const GLYPH_WIDTH: u32 = 5;
    pub(super) const GLYPH_HEIGHT: u32 = 7;

    pub(super) fn glyph(ch: char) -> Option<[u8; 7]> {
        Some(match ch {
            '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
            '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
            '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
            '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
            '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
            '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
            '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
            '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
            '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
            '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
            '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_are_floored_and_clamped() {
        assert_eq!(
            grid_positions(100),
            vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 99]
        );
        assert_eq!(grid_positions(15)[1], 1);
        assert_eq!(grid_positions(15)[10], 14);
    }

    #[test]
    fn labels_have_one_decimal() {
        assert_eq!(grid_label(0), "0.0");
        assert_eq!(grid_label(3), "0.3");
        assert_eq!(grid_label(10), "1.0");
    }

    #[test]
    fn font_size_has_a_floor() {
        assert_eq!(label_font_size(100), 12);
        assert_eq!(label_font_size(1920), 38);
    }

    #[test]
    fn overlay_lines_do_not_stack_alpha() {
        let ov = grid_overlay(200, 100, None).unwrap();
        // Crossing of the x=100 and y=50 lines.
        assert_eq!(ov.get_pixel(100, 50).0, [255, 0, 0, 128]);
        assert_eq!(ov.get_pixel(101, 51).0, [255, 0, 0, 128]);
        // Between lines, away from labels.
        assert_eq!(ov.get_pixel(115, 75).0[3], 0);
    }

    #[test]
    fn bitmap_labels_are_opaque_red() {
        let ov = grid_overlay(200, 100, None).unwrap();
        // "0.0" for the first vertical line starts at (2, 5); the top row of '0' is 0x0E.
        assert_eq!(ov.get_pixel(2 + 2 + 1, 5).0, [255, 0, 0, 255]);
    }

    #[test]
    fn compositing_blends_half_alpha() {
        let src = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 255, 255]));
        let ov = RgbaImage::from_pixel(1, 1, Rgba([255, 0, 0, 128]));
        let out = composite_over(&src, &ov);
        assert_eq!(out.get_pixel(0, 0).0, [128, 0, 127]);
    }

    #[test]
    fn missing_source_is_an_input_error() {
        let err = annotate_grid(
            Path::new("target/geolesson-tests/missing.png"),
            Path::new("target/geolesson-tests/out.jpg"),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("input error:"));
    }
}
