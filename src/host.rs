//! Module-side conveniences over the [HostTable].

use std::{
    alloc::Layout,
    ptr::{self, NonNull},
};

use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::{
    abi::HostTable,
    text::font::{Bitmap, FaceId, Font, FontMetrics, Rasterizer},
};

impl HostTable {
    /// Moves `value` into memory owned by the host. The memory is never handed back, which keeps
    /// it valid after the module that wrote it is unloaded.
    pub fn allocate_value<T>(&self, value: T) -> NonNull<T> {
        let layout = Layout::new::<T>();
        let raw = (self.allocate)(self.ctx, layout.size(), layout.align()).cast::<T>();
        let Some(slot) = NonNull::new(raw) else {
            log::error!("host allocation of {} bytes failed", layout.size());
            std::process::abort();
        };
        // SAFETY: the host returned a fresh allocation with the size and alignment of `T`.
        unsafe { ptr::write(slot.as_ptr(), value) };
        slot
    }

    /// Drops a value created by [HostTable::allocate_value] and gives its memory back.
    ///
    /// # Safety
    /// `value` must come from `allocate_value` on a table of the same host and must not be used
    /// afterwards.
    pub unsafe fn release_value<T>(&self, value: NonNull<T>) {
        let layout = Layout::new::<T>();
        // SAFETY: upheld by the caller.
        unsafe { ptr::drop_in_place(value.as_ptr()) };
        (self.deallocate)(self.ctx, value.as_ptr().cast(), layout.size(), layout.align());
    }

    pub fn create_font(&self, name: &str, pixel_height: i32) -> Font {
        let info = (self.create_font)(self.ctx, name.as_ptr(), name.len(), pixel_height);
        Font::new(info)
    }
}

/// Rasterizes through the host's `rasterize_glyph` service.
pub struct HostRasterizer<'a>(pub &'a HostTable);

impl Rasterizer for HostRasterizer<'_> {
    fn rasterize(
        &mut self,
        face: FaceId,
        _metrics: &FontMetrics,
        codepoint: u32,
        scratch: &mut Bitmap,
    ) -> i32 {
        (self.0.rasterize_glyph)(
            self.0.ctx,
            face,
            codepoint,
            scratch.pixels.as_mut_ptr(),
            scratch.width,
            scratch.height,
        )
    }
}

/// Sends the module's log records to the host's logger.
///
/// A module is its own dynamic library with its own `log` statics, so without this its records
/// would go nowhere.
pub struct HostLogger(HostTable);

// SAFETY: the host's log entry only formats and forwards the record; it never touches `ctx`.
unsafe impl Send for HostLogger {}
unsafe impl Sync for HostLogger {}

impl HostLogger {
    /// Installs the forwarder for this copy of the module. Later calls from the same copy keep
    /// the first logger.
    pub fn install(table: HostTable, level: LevelFilter) {
        if log::set_boxed_logger(Box::new(HostLogger(table))).is_ok() {
            log::set_max_level(level);
        }
    }
}

impl Log for HostLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        let message = record.args().to_string();
        let target = record.target();
        (self.0.log)(
            self.0.ctx,
            record.level() as usize,
            target.as_ptr(),
            target.len(),
            message.as_ptr(),
            message.len(),
        );
    }

    fn flush(&self) {}
}

/// Maps the raw level sent through the `log` entry back to a [Level].
pub fn level_from_raw(raw: usize) -> Level {
    match raw {
        1 => Level::Error,
        2 => Level::Warn,
        3 => Level::Info,
        4 => Level::Debug,
        _ => Level::Trace,
    }
}
