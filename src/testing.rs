//! Test doubles for the rasterizer and the backend.

use std::collections::HashMap;

use crate::{
    backend::{Backend, Program},
    geometry::{Color, Vertex},
    text::font::{Bitmap, FaceId, Font, FontInfo, FontMetrics, Rasterizer},
};

pub(crate) const LINE_HEIGHT: f32 = 18.0;

/// A font with a 48x48 scratch bitmap, pen origin at (16, 16) and lines 18 pixels apart.
pub(crate) fn test_font() -> Font {
    Font::new(FontInfo {
        face: FaceId::default(),
        metrics: FontMetrics {
            ascent: 12,
            descent: 4,
            height: 16,
            external_leading: 2,
            default_x: 16,
            default_y: 16,
        },
        scratch_width: 48,
        scratch_height: 48,
    })
}

#[derive(Clone, Copy)]
pub(crate) struct Block {
    w: i32,
    h: i32,
    advance: i32,
    dx: i32,
    dy: i32,
    intensity: u8,
}

impl Block {
    pub(crate) fn new(w: i32, h: i32, advance: i32) -> Self {
        Self {
            w,
            h,
            advance,
            dx: 0,
            dy: 0,
            intensity: 0xFF,
        }
    }

    pub(crate) fn offset(mut self, dx: i32, dy: i32) -> Self {
        self.dx = dx;
        self.dy = dy;
        self
    }

    pub(crate) fn intensity(mut self, intensity: u8) -> Self {
        self.intensity = intensity;
        self
    }
}

/// Draws every known codepoint as a solid block; anything else is blank.
pub(crate) struct BlockRasterizer {
    blocks: HashMap<u32, Block>,
    pub(crate) calls: usize,
}

impl BlockRasterizer {
    pub(crate) const BLANK_ADVANCE: i32 = 5;

    pub(crate) fn new() -> Self {
        Self {
            blocks: HashMap::new(),
            calls: 0,
        }
    }

    pub(crate) fn with(mut self, character: char, block: Block) -> Self {
        self.blocks.insert(character as u32, block);
        self
    }
}

impl Rasterizer for BlockRasterizer {
    fn rasterize(
        &mut self,
        _face: FaceId,
        metrics: &FontMetrics,
        codepoint: u32,
        scratch: &mut Bitmap,
    ) -> i32 {
        self.calls += 1;
        scratch.clear();

        let Some(block) = self.blocks.get(&codepoint) else {
            return Self::BLANK_ADVANCE;
        };
        let (left, bottom) = (metrics.default_x + block.dx, metrics.default_y + block.dy);
        for y in 0..block.h {
            for x in 0..block.w {
                scratch.put(left + x, bottom + y, block.intensity);
            }
        }
        block.advance
    }
}

#[derive(Debug, PartialEq)]
pub(crate) enum Call {
    Viewport(i32, i32),
    Clear(Color),
    UploadAtlas { width: u32, height: u32 },
    UploadVertices(Vec<Vertex>),
    UseProgram(Option<Program>),
    BindAtlas(bool),
    SetBlend(bool),
    Draw(u32),
}

#[derive(Default)]
pub(crate) struct RecordingBackend {
    pub(crate) calls: Vec<Call>,
}

impl RecordingBackend {
    pub(crate) fn draws(&self) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Draw(count) => Some(*count),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn uploaded_vertices(&self) -> &[Vertex] {
        self.calls
            .iter()
            .rev()
            .find_map(|call| match call {
                Call::UploadVertices(vertices) => Some(vertices.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub(crate) fn atlas_uploads(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::UploadAtlas { .. }))
            .count()
    }
}

impl Backend for RecordingBackend {
    fn viewport(&mut self, width: i32, height: i32) {
        self.calls.push(Call::Viewport(width, height));
    }

    fn clear(&mut self, color: Color) {
        self.calls.push(Call::Clear(color));
    }

    fn upload_atlas(&mut self, width: u32, height: u32, pixels: &[u8]) {
        assert_eq!(pixels.len(), (width * height * 4) as usize);
        self.calls.push(Call::UploadAtlas { width, height });
    }

    fn upload_vertices(&mut self, vertices: &[Vertex]) {
        self.calls.push(Call::UploadVertices(vertices.to_vec()));
    }

    fn use_program(&mut self, program: Option<Program>) {
        self.calls.push(Call::UseProgram(program));
    }

    fn bind_atlas(&mut self, bound: bool) {
        self.calls.push(Call::BindAtlas(bound));
    }

    fn set_blend(&mut self, enabled: bool) {
        self.calls.push(Call::SetBlend(enabled));
    }

    fn draw_triangles(&mut self, count: u32) {
        self.calls.push(Call::Draw(count));
    }
}
