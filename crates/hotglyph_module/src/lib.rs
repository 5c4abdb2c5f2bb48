//! The render module: scene state and drawing, rebuilt and swapped in while the host runs.
//!
//! Build with `cargo build -p hotglyph_module`; the host picks up the new library on its next
//! frame. Put a `build.lock` file beside the host executable for the duration of a build if the
//! build writes the library in several steps.

use std::ffi::c_void;

use hotglyph::{
    abi::{Handoff, HostApi, ModuleTable, MouseInput, StateHandoff, ABI_VERSION},
    atlas::Atlas,
    backend::Backend,
    buffer::GrowableBuffer,
    draw_list::DrawList,
    geometry::{Color, Vertex},
    host::{HostLogger, HostRasterizer},
    text::font::Font,
};
use log::{info, warn, LevelFilter};
use nalgebra::{point, Point2};

/// Bump whenever [AppState] changes shape.
pub const STATE_VERSION: u32 = 1;

const PANGRAM: &str = "The quick brown fox jumps over the lazy dog.";

const BACKGROUND: Color = [0.02, 0.02, 0.02, 1.0];
const WHITE: Color = [1.0, 1.0, 1.0, 1.0];
const RED: Color = [1.0, 0.0, 0.0, 1.0];

const TITLE_BAR_HEIGHT: f32 = 32.0;
const READOUT_WIDTH: f32 = 250.0;
const TYPED_LIMIT: usize = 256;

pub struct AppState {
    atlas: Atlas,
    vertices: GrowableBuffer<Vertex>,
    console_font: Font,
    ui_font: Font,
    mouse: MouseInput,
    typed: String,
}

impl AppState {
    fn new(api: &HostApi) -> Self {
        let mut state = Self {
            atlas: Atlas::default(),
            vertices: GrowableBuffer::with_capacity(1024 * 64),
            console_font: api.host.create_font("Courier New", 13),
            ui_font: api.host.create_font("Verdana", 11),
            mouse: MouseInput::default(),
            typed: String::new(),
        };

        let mut rasterizer = HostRasterizer(&api.host);
        for codepoint in u32::from(' ')..127 {
            for font in [&mut state.console_font, &mut state.ui_font] {
                state.atlas.glyph(font, &mut rasterizer, codepoint);
            }
        }
        info!(
            "packed {} glyphs, atlas cursor at {:?}",
            state.console_font.glyphs().len() + state.ui_font.glyphs().len(),
            state.atlas.cursor()
        );

        state
    }

    fn render(&mut self, api: &HostApi, width: i32, height: i32) {
        let mut backend = api.backend;
        backend.viewport(width, height);
        backend.clear(BACKGROUND);

        let mut rasterizer = HostRasterizer(&api.host);
        let mut list = DrawList {
            backend: &mut backend,
            rasterizer: &mut rasterizer,
            atlas: &mut self.atlas,
            vertices: &mut self.vertices,
        };
        let (width, height) = (width as f32, height as f32);
        let z = 0.0;

        let mut cursor = point![100.0, 80.0];
        cursor = list.println(&mut self.console_font, PANGRAM, cursor, z, WHITE);
        cursor = list.println(&mut self.ui_font, PANGRAM, cursor, z, WHITE);
        if !self.typed.is_empty() {
            list.println(&mut self.console_font, &self.typed, cursor, z, WHITE);
        }

        list.draw_rect([0.0, height - TITLE_BAR_HEIGHT, width, height], z, RED);

        let mut cursor = Point2::new(
            width - READOUT_WIDTH,
            height - self.console_font.line_height(),
        );
        for line in [
            format!("mouse x: {}", self.mouse.x),
            format!("mouse y: {}", self.mouse.y),
            format!("buttons: {:#x}", self.mouse.buttons),
        ] {
            cursor = list.println(&mut self.console_font, &line, cursor, z, WHITE);
        }
    }
}

/// Applies one typed codepoint: backspace removes the last character, other control characters
/// except newline are ignored.
pub fn edit(text: &mut String, codepoint: u32) {
    let Some(character) = char::from_u32(codepoint) else {
        return;
    };
    match character {
        '\u{8}' => {
            text.pop();
        }
        '\r' | '\n' => text.push('\n'),
        c if c.is_control() => {}
        c => text.push(c),
    }

    if text.chars().count() > TYPED_LIMIT {
        let excess = text.chars().count() - TYPED_LIMIT;
        text.drain(..text.char_indices().nth(excess).map_or(0, |(i, _)| i));
    }
}

/// # Safety
/// `state` is null or the pointer this module's `reload` returned.
unsafe fn state<'a>(state: *mut c_void) -> Option<&'a mut AppState> {
    // SAFETY: upheld by the caller.
    unsafe { state.cast::<AppState>().as_mut() }
}

extern "C" fn reload(api: &HostApi, previous: StateHandoff) -> *mut c_void {
    HostLogger::install(api.host, LevelFilter::Debug);

    let state = match previous.claim::<AppState>(STATE_VERSION) {
        Handoff::Reuse(state) => {
            info!("picked up existing state");
            state
        }
        Handoff::Fresh => api.host.allocate_value(AppState::new(api)),
        Handoff::Migrate { version, .. } => {
            // The old layout is unknown here, so its memory is left alone.
            warn!(
                "state layout v{} can't be read by v{}, starting over",
                version, STATE_VERSION
            );
            api.host.allocate_value(AppState::new(api))
        }
    };
    state.as_ptr().cast()
}

extern "C" fn render(api: &HostApi, state_ptr: *mut c_void, width: i32, height: i32) {
    // SAFETY: the host passes back what `reload` returned.
    if let Some(state) = unsafe { state(state_ptr) } {
        state.render(api, width, height);
    }
}

extern "C" fn mouse(_api: &HostApi, state_ptr: *mut c_void, input: MouseInput) {
    // SAFETY: as in `render`.
    if let Some(state) = unsafe { state(state_ptr) } {
        state.mouse = input;
    }
}

extern "C" fn keyboard(_api: &HostApi, state_ptr: *mut c_void, codepoint: u32) {
    // SAFETY: as in `render`.
    if let Some(state) = unsafe { state(state_ptr) } {
        edit(&mut state.typed, codepoint);
    }
}

static MODULE: ModuleTable = ModuleTable {
    abi_version: ABI_VERSION,
    state_version: STATE_VERSION,
    reload: Some(reload),
    render: Some(render),
    mouse: Some(mouse),
    keyboard: Some(keyboard),
};

#[no_mangle]
pub extern "C" fn hotglyph_module() -> &'static ModuleTable {
    &MODULE
}

#[cfg(test)]
mod tests {
    use std::{
        alloc::{self, Layout},
        cell::Cell,
        ptr, slice,
    };

    use hotglyph::{
        abi::HostTable,
        backend::{BackendEntries, BackendTable},
        text::font::{FaceId, FontInfo, FontMetrics},
    };

    use super::*;

    const PRINTABLE_ASCII: usize = 127 - 32;

    thread_local! {
        static RASTERIZED: Cell<usize> = const { Cell::new(0) };
    }

    extern "C" fn allocate(_: *mut c_void, size: usize, align: usize) -> *mut u8 {
        let layout = Layout::from_size_align(size.max(1), align).unwrap();
        unsafe { alloc::alloc_zeroed(layout) }
    }

    extern "C" fn deallocate(_: *mut c_void, ptr: *mut u8, size: usize, align: usize) {
        let layout = Layout::from_size_align(size.max(1), align).unwrap();
        unsafe { alloc::dealloc(ptr, layout) }
    }

    extern "C" fn create_font(
        _: *mut c_void,
        _: *const u8,
        _: usize,
        pixel_height: i32,
    ) -> FontInfo {
        FontInfo {
            face: FaceId::default(),
            metrics: FontMetrics {
                ascent: pixel_height,
                height: pixel_height,
                external_leading: 2,
                default_x: 4,
                default_y: 4,
                ..Default::default()
            },
            scratch_width: 16,
            scratch_height: 16,
        }
    }

    /// Draws a 3x5 block for every codepoint except space.
    extern "C" fn rasterize_glyph(
        _: *mut c_void,
        _: FaceId,
        codepoint: u32,
        scratch: *mut u8,
        width: u32,
        height: u32,
    ) -> i32 {
        RASTERIZED.with(|count| count.set(count.get() + 1));
        let scratch = unsafe { slice::from_raw_parts_mut(scratch, (width * height) as usize) };
        scratch.fill(0);
        if codepoint != ' ' as u32 {
            for (x, y) in (4..7).flat_map(|x| (4..9).map(move |y| (x, y))) {
                scratch[(y * width + x) as usize] = 0xff;
            }
        }
        6
    }

    extern "C" fn log(_: *mut c_void, _: usize, _: *const u8, _: usize, _: *const u8, _: usize) {}

    fn test_api() -> HostApi {
        let inert = BackendEntries::inert();
        HostApi {
            abi_version: ABI_VERSION,
            host: HostTable {
                ctx: ptr::null_mut(),
                allocate,
                deallocate,
                create_font,
                rasterize_glyph,
                log,
            },
            backend: BackendTable {
                ctx: ptr::null_mut(),
                viewport: inert.viewport.unwrap(),
                clear: inert.clear.unwrap(),
                upload_atlas: inert.upload_atlas.unwrap(),
                upload_vertices: inert.upload_vertices.unwrap(),
                use_program: inert.use_program.unwrap(),
                bind_atlas: inert.bind_atlas.unwrap(),
                set_blend: inert.set_blend.unwrap(),
                draw_triangles: inert.draw_triangles.unwrap(),
            },
        }
    }

    fn rasterized() -> usize {
        RASTERIZED.with(Cell::get)
    }

    fn release(api: &HostApi, state: *mut c_void) {
        if let Some(state) = ptr::NonNull::new(state.cast::<AppState>()) {
            unsafe { api.host.release_value(state) };
        }
    }

    #[test]
    fn fresh_state_prewarms_printable_ascii_in_both_fonts() {
        let api = test_api();
        let before = rasterized();

        let state_ptr = reload(&api, StateHandoff::fresh());

        let state = unsafe { state(state_ptr) }.unwrap();
        assert_eq!(state.console_font.glyphs().len(), PRINTABLE_ASCII);
        assert_eq!(state.ui_font.glyphs().len(), PRINTABLE_ASCII);
        assert_eq!(rasterized() - before, 2 * PRINTABLE_ASCII);
        assert!(state.console_font.find('~' as u32).is_some());
        assert!(state.ui_font.find(' ' as u32).is_some());
        release(&api, state_ptr);
    }

    #[test]
    fn same_layout_keeps_the_state_pointer() {
        let api = test_api();
        let state_ptr = reload(&api, StateHandoff::fresh());
        keyboard(&api, state_ptr, 'q' as u32);
        render(&api, state_ptr, 640, 480);
        let before = rasterized();

        let reloaded = reload(
            &api,
            StateHandoff {
                state: state_ptr,
                version: STATE_VERSION,
            },
        );

        assert_eq!(reloaded, state_ptr);
        assert_eq!(rasterized(), before);
        let state = unsafe { state(reloaded) }.unwrap();
        assert_eq!(state.typed, "q");
        assert_eq!(state.console_font.glyphs().len(), PRINTABLE_ASCII);
        release(&api, reloaded);
    }

    #[test]
    fn other_layout_starts_over_in_a_new_allocation() {
        let api = test_api();
        let old = reload(&api, StateHandoff::fresh());
        keyboard(&api, old, 'q' as u32);

        let new = reload(
            &api,
            StateHandoff {
                state: old,
                version: STATE_VERSION + 1,
            },
        );

        assert_ne!(new, old);
        let state = unsafe { state(new) }.unwrap();
        assert!(state.typed.is_empty());
        assert_eq!(state.ui_font.glyphs().len(), PRINTABLE_ASCII);
        release(&api, old);
        release(&api, new);
    }

    fn typed(codepoints: &[u32]) -> String {
        let mut text = String::new();
        for &codepoint in codepoints {
            edit(&mut text, codepoint);
        }
        text
    }

    #[test]
    fn backspace_removes_the_last_character() {
        assert_eq!(typed(&['a' as u32, 'b' as u32, 0x08]), "a");
        assert_eq!(typed(&[0x08]), "");
    }

    #[test]
    fn return_starts_a_new_line_and_other_controls_are_dropped() {
        assert_eq!(typed(&['a' as u32, '\r' as u32, 0x1b, 'b' as u32]), "a\nb");
    }

    #[test]
    fn typed_text_keeps_only_the_tail() {
        let text = typed(&vec!['x' as u32; TYPED_LIMIT + 10]);
        assert_eq!(text.chars().count(), TYPED_LIMIT);
    }

    #[test]
    fn exported_table_is_complete() {
        let table = hotglyph_module();
        assert_eq!(table.abi_version, ABI_VERSION);
        assert_eq!(table.state_version, STATE_VERSION);
        assert!(table.reload.is_some() && table.render.is_some());
        assert!(table.mouse.is_some() && table.keyboard.is_some());
    }
}
