//! Label text for charts: a built-in 5x7 bitmap face, or a TTF via fontdue.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use fontdue::{Font, FontSettings};
use tiny_skia::Pixmap;

pub const GLYPH_WIDTH: u32 = 5;
pub const GLYPH_HEIGHT: u32 = 7;
const GLYPH_ADVANCE: u32 = GLYPH_WIDTH + 1;

/// Rows top to bottom; bit 4 is the leftmost column.
fn glyph_rows(character: char) -> [u8; 7] {
    match character.to_ascii_uppercase() {
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
        'A' => [0x0E, 0x11, 0x11, 0x11, 0x1F, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        ' ' => [0x00; 7],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ',' => [0x00, 0x00, 0x00, 0x00, 0x0C, 0x04, 0x08],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '+' => [0x00, 0x04, 0x04, 0x1F, 0x04, 0x04, 0x00],
        '=' => [0x00, 0x00, 0x1F, 0x00, 0x1F, 0x00, 0x00],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
        '/' => [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00],
        '%' => [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03],
        '(' => [0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02],
        ')' => [0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08],
        _ => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
    }
}

pub fn sample(character: char, x: u32, y: u32) -> bool {
    if x >= GLYPH_WIDTH || y >= GLYPH_HEIGHT {
        return false;
    }
    let row = glyph_rows(character)[y as usize];
    (row >> (GLYPH_WIDTH - 1 - x)) & 1 == 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    Middle,
    End,
}

struct GlyphBitmap {
    width: usize,
    height: usize,
    bitmap: Vec<u8>,
}

pub struct TtfFont {
    font: Font,
    glyph_cache: HashMap<fontdue::layout::GlyphRasterConfig, GlyphBitmap>,
}

impl TtfFont {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read chart font {}", path.display()))?;
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|error| anyhow!("failed to parse chart font {}: {error}", path.display()))?;
        Ok(Self {
            font,
            glyph_cache: HashMap::new(),
        })
    }
}

/// Whatever draws chart labels.
pub enum LabelFont {
    Bitmap,
    Ttf(TtfFont),
}

impl LabelFont {
    pub fn from_settings(font_path: Option<&Path>) -> Result<Self> {
        match font_path {
            Some(path) => Ok(Self::Ttf(TtfFont::load(path)?)),
            None => Ok(Self::Bitmap),
        }
    }

    /// Width in pixels of `text` at cap height `size`.
    pub fn measure(&self, text: &str, size: f32) -> f32 {
        match self {
            Self::Bitmap => {
                let scale = bitmap_scale(size);
                let count = text.chars().count() as u32;
                (count * GLYPH_ADVANCE * scale).saturating_sub(scale) as f32
            }
            Self::Ttf(ttf) => {
                let px = ttf_px(size);
                text.chars()
                    .map(|ch| ttf.font.metrics(ch, px).advance_width)
                    .sum()
            }
        }
    }

    /// Draws `text` with its top edge at `y` and horizontal alignment given by
    /// `anchor` relative to `x`.
    pub fn draw(
        &mut self,
        pixmap: &mut Pixmap,
        text: &str,
        x: f32,
        y: f32,
        size: f32,
        anchor: Anchor,
        color: [u8; 3],
    ) {
        let width = self.measure(text, size);
        let left = match anchor {
            Anchor::Start => x,
            Anchor::Middle => x - width / 2.0,
            Anchor::End => x - width,
        };

        match self {
            Self::Bitmap => draw_bitmap(pixmap, text, left, y, size, color),
            Self::Ttf(ttf) => draw_ttf(ttf, pixmap, text, left, y, size, color),
        }
    }
}

fn bitmap_scale(size: f32) -> u32 {
    (size / GLYPH_HEIGHT as f32).round().max(1.0) as u32
}

fn ttf_px(size: f32) -> f32 {
    size * 1.4
}

fn draw_bitmap(pixmap: &mut Pixmap, text: &str, left: f32, top: f32, size: f32, color: [u8; 3]) {
    let scale = bitmap_scale(size);
    let origin_x = left.round() as i32;
    let origin_y = top.round() as i32;

    for (index, character) in text.chars().enumerate() {
        let glyph_x = origin_x + (index as u32 * GLYPH_ADVANCE * scale) as i32;
        for gy in 0..GLYPH_HEIGHT {
            for gx in 0..GLYPH_WIDTH {
                if !sample(character, gx, gy) {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let px = glyph_x + (gx * scale + dx) as i32;
                        let py = origin_y + (gy * scale + dy) as i32;
                        blend_pixel(pixmap, px, py, color, 255);
                    }
                }
            }
        }
    }
}

fn draw_ttf(
    ttf: &mut TtfFont,
    pixmap: &mut Pixmap,
    text: &str,
    left: f32,
    top: f32,
    size: f32,
    color: [u8; 3],
) {
    let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
    layout.reset(&LayoutSettings {
        x: left,
        y: top,
        max_width: None,
        max_height: None,
        horizontal_align: fontdue::layout::HorizontalAlign::Left,
        vertical_align: fontdue::layout::VerticalAlign::Top,
        line_height: 1.0,
        wrap_style: fontdue::layout::WrapStyle::Letter,
        wrap_hard_breaks: true,
    });
    layout.append(&[&ttf.font], &TextStyle::new(text, ttf_px(size), 0));

    for glyph in layout.glyphs() {
        if glyph.width == 0 || glyph.height == 0 {
            continue;
        }
        let font = &ttf.font;
        let bitmap = ttf.glyph_cache.entry(glyph.key).or_insert_with(|| {
            let (_, bitmap) = font.rasterize_config(glyph.key);
            GlyphBitmap {
                width: glyph.width,
                height: glyph.height,
                bitmap,
            }
        });

        let x = glyph.x.round() as i32;
        let y = glyph.y.round() as i32;
        for row in 0..bitmap.height {
            for col in 0..bitmap.width {
                let coverage = bitmap.bitmap[row * bitmap.width + col];
                if coverage > 0 {
                    blend_pixel(pixmap, x + col as i32, y + row as i32, color, coverage);
                }
            }
        }
    }
}

/// Source-over onto an opaque pixmap.
fn blend_pixel(pixmap: &mut Pixmap, x: i32, y: i32, color: [u8; 3], alpha: u8) {
    let (width, height) = (pixmap.width() as i32, pixmap.height() as i32);
    if x < 0 || y < 0 || x >= width || y >= height {
        return;
    }
    let idx = ((y * width + x) * 4) as usize;
    let data = pixmap.data_mut();
    let alpha = u16::from(alpha);
    let inv_alpha = 255 - alpha;
    for channel in 0..3 {
        let dst = u16::from(data[idx + channel]);
        let src = u16::from(color[channel]);
        data[idx + channel] = ((src * alpha + dst * inv_alpha + 127) / 255) as u8;
    }
    data[idx + 3] = 255;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_and_letters_have_ink() {
        for character in "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ%".chars() {
            let lit = (0..GLYPH_HEIGHT)
                .flat_map(|y| (0..GLYPH_WIDTH).map(move |x| (x, y)))
                .filter(|&(x, y)| sample(character, x, y))
                .count();
            assert!(lit > 0, "{character} has no pixels");
        }
        assert!(!(0..GLYPH_HEIGHT).any(|y| (0..GLYPH_WIDTH).any(|x| sample(' ', x, y))));
    }

    #[test]
    fn lowercase_maps_to_uppercase() {
        for y in 0..GLYPH_HEIGHT {
            for x in 0..GLYPH_WIDTH {
                assert_eq!(sample('x', x, y), sample('X', x, y));
            }
        }
    }

    #[test]
    fn one_has_its_stem_in_the_middle_column() {
        assert!(sample('1', 2, 3));
        assert!(!sample('1', 0, 3));
        assert!(!sample('1', 5, 3));
    }

    #[test]
    fn bitmap_measure_scales_with_size() {
        let font = LabelFont::Bitmap;
        assert_eq!(font.measure("AB", 7.0), 11.0);
        assert_eq!(font.measure("AB", 14.0), 22.0);
        assert_eq!(font.measure("", 14.0), 0.0);
    }

    #[test]
    fn ttf_load_errors_name_the_path() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let missing = dir.path().join("missing.ttf");
        let garbage = dir.path().join("garbage.ttf");
        fs::write(&garbage, b"not a font").unwrap();

        for path in [&missing, &garbage] {
            let error = LabelFont::from_settings(Some(path)).err().expect("load should fail");
            assert!(
                format!("{error:#}").contains(&path.display().to_string()),
                "{error:#}"
            );
        }
    }

    #[test]
    fn ttf_labels_draw_when_a_system_font_exists() {
        let Some(path) = [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/Library/Fonts/Arial.ttf",
            "C:\\Windows\\Fonts\\arial.ttf",
        ]
        .iter()
        .map(Path::new)
        .find(|path| path.exists()) else {
            eprintln!("Skipping test: no TTF font found");
            return;
        };

        let mut font = LabelFont::from_settings(Some(path)).expect("font should load");
        assert!(matches!(font, LabelFont::Ttf(_)));
        assert!(font.measure("FPS 120", 14.0) > font.measure("F", 14.0));

        let mut pixmap = Pixmap::new(120, 40).expect("pixmap should allocate");
        pixmap.fill(tiny_skia::Color::WHITE);
        font.draw(&mut pixmap, "FPS 120", 60.0, 10.0, 14.0, Anchor::Middle, [0, 0, 0]);
        // Second pass draws from the glyph cache.
        font.draw(&mut pixmap, "FPS 120", 60.0, 10.0, 14.0, Anchor::Middle, [0, 0, 0]);
        assert!(pixmap.data().chunks_exact(4).any(|px| px[0] < 128));
    }

    #[test]
    fn bitmap_draw_paints_pixels_and_clips() {
        let mut pixmap = Pixmap::new(40, 20).expect("pixmap should allocate");
        pixmap.fill(tiny_skia::Color::WHITE);
        let mut font = LabelFont::Bitmap;
        font.draw(&mut pixmap, "1", 0.0, 0.0, 7.0, Anchor::Start, [0, 0, 0]);
        font.draw(&mut pixmap, "888", 35.0, 15.0, 7.0, Anchor::Start, [0, 0, 0]);

        // Stem of '1' at column 2, row 3.
        let idx = (3 * 40 + 2) * 4;
        assert_eq!(&pixmap.data()[idx..idx + 4], &[0, 0, 0, 255]);
        let background = (10 * 40 + 20) * 4;
        assert_eq!(&pixmap.data()[background..background + 4], &[255, 255, 255, 255]);
    }
}
