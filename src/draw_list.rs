use nalgebra::Point2;

use crate::{
    atlas::Atlas,
    backend::{Backend, Program},
    buffer::GrowableBuffer,
    geometry::{quad, Color, Corners, Vertex, QUAD_VERTICES},
    text::font::{Font, Rasterizer},
};

/// Turns one text or rectangle request into triangles and a single draw call.
///
/// The vertex buffer is scratch space: every request starts from an empty buffer, so nothing is
/// carried from one draw to the next.
pub struct DrawList<'a, B, R> {
    pub backend: &'a mut B,
    pub rasterizer: &'a mut R,
    pub atlas: &'a mut Atlas,
    pub vertices: &'a mut GrowableBuffer<Vertex>,
}

impl<'a, B: Backend, R: Rasterizer> DrawList<'a, B, R> {
    /// Draws `text` with its baseline starting at `cursor` and returns the pen position after the
    /// last character. `'\n'` returns to the starting column one line lower.
    pub fn print(
        &mut self,
        font: &mut Font,
        text: &str,
        cursor: Point2<f32>,
        z: f32,
        color: Color,
    ) -> Point2<f32> {
        self.vertices.clear();

        let left = snap(cursor.x);
        let (mut x, mut y) = (left, snap(cursor.y));
        for character in text.chars() {
            if character == '\n' {
                x = left;
                y -= font.line_height();
                continue;
            }

            let glyph = self
                .atlas
                .glyph(font, &mut *self.rasterizer, character as u32);
            let x0 = x + glyph.dx as f32;
            let y0 = y + glyph.dy as f32;
            let rect = [x0, y0, x0 + glyph.rect.w as f32, y0 + glyph.rect.h as f32];
            quad(
                self.vertices.allocate_n(QUAD_VERTICES),
                rect,
                z,
                self.atlas.texcoords(glyph.rect),
                color,
            );

            x += glyph.advance as f32;
        }

        if self.vertices.is_empty() {
            return cursor;
        }

        if self.atlas.changed {
            self.backend
                .upload_atlas(self.atlas.width, self.atlas.height, self.atlas.pixels());
            self.atlas.changed = false;
        }

        self.backend.upload_vertices(self.vertices.as_slice());
        self.backend.set_blend(true);
        self.backend.bind_atlas(true);
        self.backend.use_program(Some(Program::Textured));
        self.backend.draw_triangles(self.vertices.len() as u32);
        self.restore();

        Point2::new(x, y)
    }

    /// Prints `text` and returns the start of the following line.
    pub fn println(
        &mut self,
        font: &mut Font,
        text: &str,
        cursor: Point2<f32>,
        z: f32,
        color: Color,
    ) -> Point2<f32> {
        let end = self.print(font, text, cursor, z, color);
        Point2::new(cursor.x, end.y - font.line_height())
    }

    /// Fills `rect` (`[x0, y0, x1, y1]`) with a flat colour.
    pub fn draw_rect(&mut self, rect: Corners, z: f32, color: Color) {
        self.vertices.clear();
        quad(
            self.vertices.allocate_n(QUAD_VERTICES),
            rect,
            z,
            [0.0; 4],
            color,
        );

        self.backend.upload_vertices(self.vertices.as_slice());
        self.backend.use_program(Some(Program::Basic));
        self.backend.draw_triangles(self.vertices.len() as u32);
        self.restore();
    }

    fn restore(&mut self) {
        self.backend.use_program(None);
        self.backend.bind_atlas(false);
        self.backend.set_blend(false);
    }
}

/// Rounds to the nearest whole pixel so glyphs land on atlas texels exactly.
fn snap(value: f32) -> f32 {
    (value + 0.5).floor()
}
