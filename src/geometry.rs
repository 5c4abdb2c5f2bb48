use crate::plain::Plain;

pub type Color = [f32; 4];

/// Interleaved vertex shared by the textured and untextured programs.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub uv: [f32; 2],
    pub color: Color,
}

unsafe impl Plain for Vertex {}

pub const QUAD_VERTICES: usize = 6;

/// Corners as `[x0, y0, x1, y1]`.
pub type Corners = [f32; 4];

/// Writes two triangles covering `rect` into `out`, which must hold [QUAD_VERTICES] slots.
pub fn quad(out: &mut [Vertex], rect: Corners, z: f32, uv: Corners, color: Color) {
    let [x0, y0, x1, y1] = rect;
    let [u0, v0, u1, v1] = uv;
    let vertex = |x, y, u, v| Vertex {
        pos: [x, y, z],
        uv: [u, v],
        color,
    };

    out[0] = vertex(x0, y0, u0, v0);
    out[1] = vertex(x1, y0, u1, v0);
    out[2] = vertex(x0, y1, u0, v1);

    out[3] = vertex(x1, y0, u1, v0);
    out[4] = vertex(x1, y1, u1, v1);
    out[5] = vertex(x0, y1, u0, v1);
}
