use std::{ffi::c_void, slice};

#[cfg(feature = "platform")]
use crate::reload::LoadError;
use crate::geometry::{Color, Vertex};

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Program {
    /// Flat vertex colour.
    Basic = 1,
    /// Atlas texel multiplied by vertex colour.
    Textured = 2,
}

impl Program {
    pub fn to_raw(program: Option<Program>) -> u32 {
        program.map_or(0, |program| program as u32)
    }

    pub fn from_raw(raw: u32) -> Option<Program> {
        match raw {
            1 => Some(Program::Basic),
            2 => Some(Program::Textured),
            _ => None,
        }
    }
}

/// The rendering operations a draw needs. Binding state is shared and sticky: callers bind what
/// they use and put it back to the default (no program, no atlas, no blending) when done.
pub trait Backend {
    fn viewport(&mut self, width: i32, height: i32);
    fn clear(&mut self, color: Color);
    /// Replaces the whole atlas texture with `pixels` (RGBA, row 0 first).
    fn upload_atlas(&mut self, width: u32, height: u32, pixels: &[u8]);
    fn upload_vertices(&mut self, vertices: &[Vertex]);
    fn use_program(&mut self, program: Option<Program>);
    fn bind_atlas(&mut self, bound: bool);
    fn set_blend(&mut self, enabled: bool);
    /// Draws the last uploaded vertices as a triangle list.
    fn draw_triangles(&mut self, count: u32);
}

pub type ViewportFn = extern "C" fn(ctx: *mut c_void, width: i32, height: i32);
pub type ClearFn = extern "C" fn(ctx: *mut c_void, r: f32, g: f32, b: f32, a: f32);
pub type UploadAtlasFn =
    extern "C" fn(ctx: *mut c_void, width: u32, height: u32, pixels: *const u8, len: usize);
pub type UploadVerticesFn = extern "C" fn(ctx: *mut c_void, vertices: *const Vertex, count: usize);
pub type UseProgramFn = extern "C" fn(ctx: *mut c_void, program: u32);
pub type BindAtlasFn = extern "C" fn(ctx: *mut c_void, bound: bool);
pub type SetBlendFn = extern "C" fn(ctx: *mut c_void, enabled: bool);
pub type DrawTrianglesFn = extern "C" fn(ctx: *mut c_void, count: u32);

/// Backend entry points offered by one source. Each entry receives the active context pointer.
#[derive(Clone, Copy, Default)]
pub struct BackendEntries {
    pub viewport: Option<ViewportFn>,
    pub clear: Option<ClearFn>,
    pub upload_atlas: Option<UploadAtlasFn>,
    pub upload_vertices: Option<UploadVerticesFn>,
    pub use_program: Option<UseProgramFn>,
    pub bind_atlas: Option<BindAtlasFn>,
    pub set_blend: Option<SetBlendFn>,
    pub draw_triangles: Option<DrawTrianglesFn>,
}

impl BackendEntries {
    /// Entries that accept every call and draw nothing. Serves as the static fallback when the
    /// active renderer leaves an entry out.
    pub fn inert() -> Self {
        extern "C" fn viewport(_: *mut c_void, _: i32, _: i32) {}
        extern "C" fn clear(_: *mut c_void, _: f32, _: f32, _: f32, _: f32) {}
        extern "C" fn upload_atlas(_: *mut c_void, _: u32, _: u32, _: *const u8, _: usize) {}
        extern "C" fn upload_vertices(_: *mut c_void, _: *const Vertex, _: usize) {}
        extern "C" fn use_program(_: *mut c_void, _: u32) {}
        extern "C" fn toggle(_: *mut c_void, _: bool) {}
        extern "C" fn draw_triangles(_: *mut c_void, count: u32) {
            log::trace!("dropped a draw of {count} vertices, no renderer is active");
        }

        Self {
            viewport: Some(viewport),
            clear: Some(clear),
            upload_atlas: Some(upload_atlas),
            upload_vertices: Some(upload_vertices),
            use_program: Some(use_program),
            bind_atlas: Some(toggle),
            set_blend: Some(toggle),
            draw_triangles: Some(draw_triangles),
        }
    }
}

/// The fully bound backend handed to the module.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct BackendTable {
    pub ctx: *mut c_void,
    pub viewport: ViewportFn,
    pub clear: ClearFn,
    pub upload_atlas: UploadAtlasFn,
    pub upload_vertices: UploadVerticesFn,
    pub use_program: UseProgramFn,
    pub bind_atlas: BindAtlasFn,
    pub set_blend: SetBlendFn,
    pub draw_triangles: DrawTrianglesFn,
}

impl BackendTable {
    /// Takes each entry from the active context's `primary` set, then from the static `fallback`
    /// set. Any entry neither provides is fatal.
    #[cfg(feature = "platform")]
    pub fn resolve(
        ctx: *mut c_void,
        primary: &BackendEntries,
        fallback: &BackendEntries,
    ) -> Result<Self, LoadError> {
        fn pick<F>(
            name: &'static str,
            primary: Option<F>,
            fallback: Option<F>,
        ) -> Result<F, LoadError> {
            primary.or(fallback).ok_or(LoadError::MissingBackend(name))
        }

        Ok(Self {
            ctx,
            viewport: pick("viewport", primary.viewport, fallback.viewport)?,
            clear: pick("clear", primary.clear, fallback.clear)?,
            upload_atlas: pick("upload_atlas", primary.upload_atlas, fallback.upload_atlas)?,
            upload_vertices: pick(
                "upload_vertices",
                primary.upload_vertices,
                fallback.upload_vertices,
            )?,
            use_program: pick("use_program", primary.use_program, fallback.use_program)?,
            bind_atlas: pick("bind_atlas", primary.bind_atlas, fallback.bind_atlas)?,
            set_blend: pick("set_blend", primary.set_blend, fallback.set_blend)?,
            draw_triangles: pick(
                "draw_triangles",
                primary.draw_triangles,
                fallback.draw_triangles,
            )?,
        })
    }
}

impl Backend for BackendTable {
    fn viewport(&mut self, width: i32, height: i32) {
        (self.viewport)(self.ctx, width, height);
    }

    fn clear(&mut self, [r, g, b, a]: Color) {
        (self.clear)(self.ctx, r, g, b, a);
    }

    fn upload_atlas(&mut self, width: u32, height: u32, pixels: &[u8]) {
        (self.upload_atlas)(self.ctx, width, height, pixels.as_ptr(), pixels.len());
    }

    fn upload_vertices(&mut self, vertices: &[Vertex]) {
        (self.upload_vertices)(self.ctx, vertices.as_ptr(), vertices.len());
    }

    fn use_program(&mut self, program: Option<Program>) {
        (self.use_program)(self.ctx, Program::to_raw(program));
    }

    fn bind_atlas(&mut self, bound: bool) {
        (self.bind_atlas)(self.ctx, bound);
    }

    fn set_blend(&mut self, enabled: bool) {
        (self.set_blend)(self.ctx, enabled);
    }

    fn draw_triangles(&mut self, count: u32) {
        (self.draw_triangles)(self.ctx, count);
    }
}

/// Rebuilds a slice from a pointer and length received through a backend entry.
///
/// # Safety
/// `ptr` must point to `len` initialised values that stay alive for `'a`, or `len` must be 0.
pub unsafe fn raw_slice<'a, T>(ptr: *const T, len: usize) -> &'a [T] {
    if len == 0 {
        return &[];
    }
    // SAFETY: upheld by the caller.
    unsafe { slice::from_raw_parts(ptr, len) }
}

#[cfg(all(test, feature = "platform"))]
mod tests {
    use super::*;

    extern "C" fn draw_a(ctx: *mut c_void, count: u32) {
        unsafe { *ctx.cast::<u32>() = count };
    }

    extern "C" fn draw_b(ctx: *mut c_void, count: u32) {
        unsafe { *ctx.cast::<u32>() = count + 1000 };
    }

    extern "C" fn noop_viewport(_: *mut c_void, _: i32, _: i32) {}
    extern "C" fn noop_clear(_: *mut c_void, _: f32, _: f32, _: f32, _: f32) {}
    extern "C" fn noop_atlas(_: *mut c_void, _: u32, _: u32, _: *const u8, _: usize) {}
    extern "C" fn noop_vertices(_: *mut c_void, _: *const Vertex, _: usize) {}
    extern "C" fn noop_program(_: *mut c_void, _: u32) {}
    extern "C" fn noop_flag(_: *mut c_void, _: bool) {}

    fn everything_but_draw() -> BackendEntries {
        BackendEntries {
            viewport: Some(noop_viewport),
            clear: Some(noop_clear),
            upload_atlas: Some(noop_atlas),
            upload_vertices: Some(noop_vertices),
            use_program: Some(noop_program),
            bind_atlas: Some(noop_flag),
            set_blend: Some(noop_flag),
            draw_triangles: None,
        }
    }

    #[test]
    fn primary_entries_win_over_fallback() {
        let mut seen = 0u32;
        let ctx = (&mut seen as *mut u32).cast::<c_void>();
        let primary = BackendEntries {
            draw_triangles: Some(draw_a),
            ..everything_but_draw()
        };
        let fallback = BackendEntries {
            draw_triangles: Some(draw_b),
            ..Default::default()
        };

        let mut table = BackendTable::resolve(ctx, &primary, &fallback).unwrap();
        table.draw_triangles(6);
        assert_eq!(seen, 6);
    }

    #[test]
    fn fallback_fills_gaps() {
        let mut seen = 0u32;
        let ctx = (&mut seen as *mut u32).cast::<c_void>();
        let fallback = BackendEntries {
            draw_triangles: Some(draw_b),
            ..Default::default()
        };

        let mut table = BackendTable::resolve(ctx, &everything_but_draw(), &fallback).unwrap();
        table.draw_triangles(6);
        assert_eq!(seen, 1006);
    }

    #[test]
    fn unresolved_entry_is_an_error() {
        let result = BackendTable::resolve(
            std::ptr::null_mut(),
            &everything_but_draw(),
            &BackendEntries::default(),
        );
        assert!(matches!(result, Err(LoadError::MissingBackend("draw_triangles"))));
    }

    #[test]
    fn inert_set_stands_in_for_a_missing_renderer() {
        let table = BackendTable::resolve(
            std::ptr::null_mut(),
            &BackendEntries::default(),
            &BackendEntries::inert(),
        );
        assert!(table.is_ok());
    }
}
