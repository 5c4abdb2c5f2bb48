use itertools::iproduct;
use log::{debug, error};

use crate::{
    geometry::Corners,
    text::font::{Bitmap, Font, Glyph, Rasterizer},
};

pub const ATLAS_SIZE: u32 = 512;

/// One RGBA bitmap shared by every font, filled shelf by shelf as glyphs are first requested.
#[derive(Debug)]
pub struct Atlas {
    pub width: u32,
    pub height: u32,
    /// Set whenever the pixels change, cleared once they are uploaded.
    pub changed: bool,
    pixels: Vec<u8>,
    cursor_x: u32,
    cursor_y: u32,
    shelf_height: u32,
    full: bool,
}

impl Atlas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            changed: false,
            pixels: vec![0; (width * height * 4) as usize],
            cursor_x: 0,
            cursor_y: 0,
            shelf_height: 0,
            full: false,
        }
    }

    /// Returns the glyph for `codepoint`, rasterizing and packing it on first use.
    pub fn glyph(
        &mut self,
        font: &mut Font,
        rasterizer: &mut impl Rasterizer,
        codepoint: u32,
    ) -> Glyph {
        if let Some(glyph) = font.find(codepoint) {
            return glyph;
        }

        let advance = font.rasterize(rasterizer, codepoint);
        let mut glyph = Glyph {
            codepoint,
            advance,
            ..Default::default()
        };

        if let Some(ink) = ink_bounds(&font.scratch) {
            match self.place(ink.w, ink.h) {
                Some(rect) => {
                    self.blit(rect, &font.scratch, ink.x, ink.y);
                    glyph.rect = rect;
                    glyph.dx = ink.x as i32 - font.metrics.default_x;
                    glyph.dy = ink.y as i32 - font.metrics.default_y;
                    debug!("packed U+{codepoint:04X} at {rect:?}");
                }
                None => {
                    self.full = true;
                    error!(
                        "glyph U+{codepoint:04X} ({}x{}) does not fit in the {}x{} atlas",
                        ink.w, ink.h, self.width, self.height
                    );
                }
            }
        }

        font.insert(glyph)
    }

    /// Reserves a `w`x`h` rectangle on the current shelf, opening a new shelf when the row is
    /// used up. Returns `None`, leaving the cursor untouched, when the rectangle cannot fit.
    pub fn place(&mut self, w: u32, h: u32) -> Option<Rect> {
        let (mut x, mut y, mut shelf_height) = (self.cursor_x, self.cursor_y, self.shelf_height);
        if x + w > self.width {
            x = 0;
            y += shelf_height;
            shelf_height = 0;
        }
        if w > self.width || y + h > self.height {
            return None;
        }

        self.cursor_x = x + w;
        self.cursor_y = y;
        self.shelf_height = shelf_height.max(h);
        Some(Rect { x, y, w, h })
    }

    /// Copies the `rect`-sized block of `src` starting at (`src_x`, `src_y`) into `rect`,
    /// spreading the intensity over all four channels.
    fn blit(&mut self, rect: Rect, src: &Bitmap, src_x: u32, src_y: u32) {
        for row in 0..rect.h {
            for col in 0..rect.w {
                let value = src.get(src_x + col, src_y + row);
                if value == 0 {
                    continue;
                }
                let offset = (((rect.y + row) * self.width + rect.x + col) * 4) as usize;
                self.pixels[offset..offset + 4].fill(value);
            }
        }
        self.changed = true;
    }

    /// `rect` normalized by the atlas dimensions, as `[u0, v0, u1, v1]`.
    pub fn texcoords(&self, rect: Rect) -> Corners {
        let (w, h) = (self.width as f32, self.height as f32);
        [
            rect.x as f32 / w,
            rect.y as f32 / h,
            rect.x1() as f32 / w,
            rect.y1() as f32 / h,
        ]
    }

    /// RGBA texels, row 0 first.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn texel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * self.width + x) * 4) as usize;
        let mut texel = [0; 4];
        texel.copy_from_slice(&self.pixels[offset..offset + 4]);
        texel
    }

    /// Packing cursor as `(x, y, shelf_height)`.
    pub fn cursor(&self) -> (u32, u32, u32) {
        (self.cursor_x, self.cursor_y, self.shelf_height)
    }

    /// Whether some glyph has already been turned away for lack of space.
    pub fn is_full(&self) -> bool {
        self.full
    }
}

impl Default for Atlas {
    fn default() -> Self {
        Self::new(ATLAS_SIZE, ATLAS_SIZE)
    }
}

/// Tightest rectangle around the non-zero texels of `bitmap`.
fn ink_bounds(bitmap: &Bitmap) -> Option<Rect> {
    let (x0, y0, x1, y1) = iproduct!(0..bitmap.height, 0..bitmap.width)
        .filter(|&(y, x)| bitmap.get(x, y) != 0)
        .fold(None, |bounds: Option<(u32, u32, u32, u32)>, (y, x)| {
            Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            })
        })?;

    Some(Rect {
        x: x0,
        y: y0,
        w: x1 - x0 + 1,
        h: y1 - y0 + 1,
    })
}

#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn x1(&self) -> u32 {
        self.x + self.w
    }

    pub fn y1(&self) -> u32 {
        self.y + self.h
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.x1()
            && other.x < self.x1()
            && self.y < other.y1()
            && other.y < self.y1()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_font, Block, BlockRasterizer};

    #[test]
    fn second_request_is_served_from_the_table() {
        let mut atlas = Atlas::default();
        let mut font = test_font();
        let mut rasterizer = BlockRasterizer::new().with('A', Block::new(5, 9, 7));

        let first = atlas.glyph(&mut font, &mut rasterizer, 'A' as u32);
        assert!(atlas.changed);
        atlas.changed = false;

        let second = atlas.glyph(&mut font, &mut rasterizer, 'A' as u32);
        assert_eq!(first, second);
        assert_eq!(rasterizer.calls, 1);
        assert!(!atlas.changed);
        assert_eq!(font.glyphs().len(), 1);
    }

    #[test]
    fn blank_glyph_only_advances() {
        let mut atlas = Atlas::default();
        let mut font = test_font();
        let mut rasterizer = BlockRasterizer::new();

        let space = atlas.glyph(&mut font, &mut rasterizer, ' ' as u32);
        assert_eq!(space.advance, BlockRasterizer::BLANK_ADVANCE);
        assert!(space.rect.is_empty());
        assert_eq!((space.dx, space.dy), (0, 0));
        assert_eq!(atlas.cursor(), (0, 0, 0));
        assert!(!atlas.changed);
    }

    #[test]
    fn cropped_glyph_keeps_its_offset_from_the_pen() {
        let mut atlas = Atlas::default();
        let mut font = test_font();
        let mut rasterizer =
            BlockRasterizer::new().with('g', Block::new(4, 6, 5).offset(1, -2));

        let glyph = atlas.glyph(&mut font, &mut rasterizer, 'g' as u32);
        assert_eq!((glyph.rect.w, glyph.rect.h), (4, 6));
        assert_eq!((glyph.dx, glyph.dy), (1, -2));
    }

    #[test]
    fn intensity_is_replicated_into_every_channel() {
        let mut atlas = Atlas::default();
        let mut font = test_font();
        let mut rasterizer = BlockRasterizer::new().with('x', Block::new(2, 2, 3).intensity(0x80));

        let glyph = atlas.glyph(&mut font, &mut rasterizer, 'x' as u32);
        assert_eq!(atlas.texel(glyph.rect.x, glyph.rect.y), [0x80; 4]);
        assert_eq!(atlas.texel(glyph.rect.x1(), glyph.rect.y), [0; 4]);
    }

    #[test]
    fn full_row_wraps_to_a_new_shelf() {
        let mut atlas = Atlas::new(32, 32);
        atlas.place(20, 5).unwrap();
        atlas.place(10, 8).unwrap();
        assert_eq!(atlas.cursor(), (30, 0, 8));

        let wrapped = atlas.place(5, 3).unwrap();
        assert_eq!(wrapped, Rect { x: 0, y: 8, w: 5, h: 3 });
        assert_eq!(atlas.cursor(), (5, 8, 3));
    }

    #[test]
    fn placements_never_overlap() {
        let mut atlas = Atlas::new(64, 256);
        let sizes = (0..60u32).map(|i| (1 + (i * 7) % 13, 1 + (i * 5) % 11));
        let rects = sizes
            .map(|(w, h)| atlas.place(w, h).unwrap())
            .collect::<Vec<_>>();

        for (i, a) in rects.iter().enumerate() {
            assert!(a.x1() <= atlas.width && a.y1() <= atlas.height);
            for b in &rects[i + 1..] {
                assert!(!a.intersects(b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn oversized_glyph_is_recorded_without_ink() {
        let mut atlas = Atlas::new(8, 8);
        let mut font = test_font();
        let mut rasterizer = BlockRasterizer::new().with('W', Block::new(12, 4, 13));

        let glyph = atlas.glyph(&mut font, &mut rasterizer, 'W' as u32);
        assert!(glyph.rect.is_empty());
        assert_eq!(glyph.advance, 13);
        assert!(atlas.is_full());
        assert!(!atlas.changed);

        atlas.glyph(&mut font, &mut rasterizer, 'W' as u32);
        assert_eq!(rasterizer.calls, 1);
    }

    #[test]
    fn overflowing_the_last_shelf_leaves_the_cursor_alone() {
        let mut atlas = Atlas::new(8, 8);
        atlas.place(8, 6).unwrap();
        assert_eq!(atlas.place(4, 4), None);
        assert_eq!(atlas.cursor(), (8, 0, 6));
    }
}
