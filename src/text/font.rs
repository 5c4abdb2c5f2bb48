use crate::{atlas::Rect, buffer::GrowableBuffer};

/// Identifies a rasterizer face owned by the host.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FaceId {
    pub index: usize,
    pub generation: u64,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FontMetrics {
    pub ascent: i32,
    pub descent: i32,
    pub height: i32,
    pub external_leading: i32,
    /// Pen origin inside the scratch bitmap.
    pub default_x: i32,
    pub default_y: i32,
}

/// What the host hands back from `create_font`: enough to build a [Font] on the module side.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FontInfo {
    pub face: FaceId,
    pub metrics: FontMetrics,
    pub scratch_width: u32,
    pub scratch_height: u32,
}

/// Single channel 8-bit bitmap. Row 0 is the bottom row.
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width * height) as usize],
        }
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Writes a texel, silently dropping anything outside the bitmap.
    pub fn put(&mut self, x: i32, y: i32, value: u8) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return;
        }
        self.pixels[(y as u32 * self.width + x as u32) as usize] = value;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Glyph {
    pub codepoint: u32,
    pub advance: i32,
    /// Location in the atlas. Zero-area for blank glyphs.
    pub rect: Rect,
    /// Offset of the bottom-left texel from the pen position.
    pub dx: i32,
    pub dy: i32,
}

/// Fills a font's scratch bitmap with one glyph drawn at the pen origin.
pub trait Rasterizer {
    /// Clears `scratch`, draws `codepoint` with its pen at `metrics.default_x/default_y` and
    /// returns the advance width.
    fn rasterize(
        &mut self,
        face: FaceId,
        metrics: &FontMetrics,
        codepoint: u32,
        scratch: &mut Bitmap,
    ) -> i32;
}

#[derive(Debug)]
pub struct Font {
    pub face: FaceId,
    pub metrics: FontMetrics,
    pub scratch: Bitmap,
    glyphs: GrowableBuffer<Glyph>,
}

impl Font {
    pub fn new(info: FontInfo) -> Self {
        Self {
            face: info.face,
            metrics: info.metrics,
            scratch: Bitmap::new(info.scratch_width, info.scratch_height),
            glyphs: GrowableBuffer::with_capacity(128),
        }
    }

    pub fn line_height(&self) -> f32 {
        (self.metrics.height + self.metrics.external_leading) as f32
    }

    pub fn find(&self, codepoint: u32) -> Option<Glyph> {
        self.glyphs
            .iter()
            .find(|glyph| glyph.codepoint == codepoint)
            .copied()
    }

    pub fn glyphs(&self) -> &[Glyph] {
        self.glyphs.as_slice()
    }

    pub(crate) fn insert(&mut self, glyph: Glyph) -> Glyph {
        debug_assert!(self.find(glyph.codepoint).is_none());
        *self.glyphs.push(glyph)
    }

    /// Draws `codepoint` into the scratch bitmap.
    pub(crate) fn rasterize(&mut self, rasterizer: &mut impl Rasterizer, codepoint: u32) -> i32 {
        rasterizer.rasterize(self.face, &self.metrics, codepoint, &mut self.scratch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_font, LINE_HEIGHT};

    #[test]
    fn writes_outside_the_bitmap_are_dropped() {
        let mut bitmap = Bitmap::new(4, 2);
        bitmap.put(-1, 0, 9);
        bitmap.put(4, 1, 9);
        bitmap.put(0, 2, 9);
        bitmap.put(3, 1, 9);

        assert_eq!(bitmap.pixels.iter().filter(|&&texel| texel != 0).count(), 1);
        assert_eq!(bitmap.get(3, 1), 9);
    }

    #[test]
    fn line_height_includes_the_leading() {
        assert_eq!(test_font().line_height(), LINE_HEIGHT);
    }

    #[test]
    fn glyph_table_grows_past_its_initial_capacity() {
        let mut font = test_font();
        for codepoint in 0..300 {
            font.insert(Glyph {
                codepoint,
                advance: codepoint as i32,
                ..Default::default()
            });
        }

        assert_eq!(font.glyphs().len(), 300);
        assert_eq!(font.find(299).map(|glyph| glyph.advance), Some(299));
        assert_eq!(font.find(300), None);
    }
}
