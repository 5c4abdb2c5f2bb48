//! The host half of the host-service table.

use std::{
    alloc::{self, Layout},
    ffi::c_void,
    process, slice, str,
};

use hotglyph::{
    abi::HostTable,
    host::level_from_raw,
    text::{
        face::FaceRegistry,
        font::{FaceId, FontInfo},
    },
};
use log::{error, Record};

/// Everything the module can ask the host for. Lives at a fixed address for as long as a module
/// may call into it.
pub struct HostServices {
    pub faces: FaceRegistry,
}

impl HostServices {
    pub fn new(faces: FaceRegistry) -> Self {
        Self { faces }
    }

    /// The service table for `services`.
    pub fn table(services: *mut HostServices) -> HostTable {
        HostTable {
            ctx: services.cast(),
            allocate,
            deallocate,
            create_font,
            rasterize_glyph,
            log,
        }
    }
}

/// # Safety
/// `ctx` must be the pointer given to [HostServices::table], with no other live reference to it.
unsafe fn services<'a>(ctx: *mut c_void) -> &'a mut HostServices {
    // SAFETY: upheld by the caller.
    unsafe { &mut *ctx.cast::<HostServices>() }
}

fn layout(size: usize, align: usize) -> Layout {
    match Layout::from_size_align(size.max(1), align) {
        Ok(layout) => layout,
        Err(err) => {
            error!("module asked for {} bytes aligned to {}: {}", size, align, err);
            process::abort();
        }
    }
}

extern "C" fn allocate(_ctx: *mut c_void, size: usize, align: usize) -> *mut u8 {
    let layout = layout(size, align);
    // SAFETY: `layout` has a non-zero size.
    let ptr = unsafe { alloc::alloc_zeroed(layout) };
    if ptr.is_null() {
        alloc::handle_alloc_error(layout);
    }
    ptr
}

extern "C" fn deallocate(_ctx: *mut c_void, ptr: *mut u8, size: usize, align: usize) {
    if ptr.is_null() {
        return;
    }
    // SAFETY: the module only returns pointers it got from `allocate` with the same layout.
    unsafe { alloc::dealloc(ptr, layout(size, align)) };
}

extern "C" fn create_font(
    ctx: *mut c_void,
    name: *const u8,
    name_len: usize,
    pixel_height: i32,
) -> FontInfo {
    // SAFETY: the module passes a `&str` split into pointer and length.
    let name = unsafe { str::from_utf8_unchecked(slice::from_raw_parts(name, name_len)) };
    // SAFETY: modules only call in on the event loop thread, while the host is inside a module call.
    match unsafe { services(ctx) }.faces.create_font(name, pixel_height) {
        Ok(info) => info,
        Err(err) => {
            error!("{:#}", err);
            process::exit(1);
        }
    }
}

extern "C" fn rasterize_glyph(
    ctx: *mut c_void,
    face: FaceId,
    codepoint: u32,
    scratch: *mut u8,
    width: u32,
    height: u32,
) -> i32 {
    // SAFETY: `scratch` is the module font's `width`x`height` scratch bitmap.
    let scratch = unsafe { slice::from_raw_parts_mut(scratch, (width * height) as usize) };
    // SAFETY: as in `create_font`.
    unsafe { services(ctx) }
        .faces
        .rasterize_into(face, codepoint, scratch, width, height)
}

extern "C" fn log(
    _ctx: *mut c_void,
    level: usize,
    target: *const u8,
    target_len: usize,
    message: *const u8,
    message_len: usize,
) {
    // SAFETY: both are `&str`s split into pointer and length by the module's logger.
    let (target, message) = unsafe {
        (
            str::from_utf8_unchecked(slice::from_raw_parts(target, target_len)),
            str::from_utf8_unchecked(slice::from_raw_parts(message, message_len)),
        )
    };
    log::logger().log(
        &Record::builder()
            .level(level_from_raw(level))
            .target(target)
            .args(format_args!("{}", message))
            .build(),
    );
}
