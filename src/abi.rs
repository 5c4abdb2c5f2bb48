//! Capability tables exchanged between the host and the render module when a module is loaded.
//!
//! The module exports one symbol, [ENTRY_SYMBOL], returning its [ModuleTable]. The host answers
//! with a [HostApi] built from its own services and the active backend, and passes it to every
//! module entry point. Both sides are compiled against this file, and [ABI_VERSION] guards
//! against mixing builds made from different revisions of it.

use std::{ffi::c_void, ptr::NonNull};

use crate::{
    backend::BackendTable,
    text::font::{FaceId, FontInfo},
};

pub const ABI_VERSION: u32 = 1;

pub const ENTRY_SYMBOL: &[u8] = b"hotglyph_module\0";

pub type EntryFn = extern "C" fn() -> &'static ModuleTable;

pub type ReloadFn = extern "C" fn(api: &HostApi, previous: StateHandoff) -> *mut c_void;
pub type RenderFn = extern "C" fn(api: &HostApi, state: *mut c_void, width: i32, height: i32);
pub type MouseFn = extern "C" fn(api: &HostApi, state: *mut c_void, input: MouseInput);
pub type KeyboardFn = extern "C" fn(api: &HostApi, state: *mut c_void, codepoint: u32);

/// Exported by the module.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ModuleTable {
    pub abi_version: u32,
    /// Layout version of the state this build creates and understands.
    pub state_version: u32,
    pub reload: Option<ReloadFn>,
    pub render: Option<RenderFn>,
    pub mouse: Option<MouseFn>,
    pub keyboard: Option<KeyboardFn>,
}

pub type AllocateFn = extern "C" fn(ctx: *mut c_void, size: usize, align: usize) -> *mut u8;
pub type DeallocateFn = extern "C" fn(ctx: *mut c_void, ptr: *mut u8, size: usize, align: usize);
pub type CreateFontFn =
    extern "C" fn(ctx: *mut c_void, name: *const u8, name_len: usize, pixel_height: i32) -> FontInfo;
pub type RasterizeGlyphFn = extern "C" fn(
    ctx: *mut c_void,
    face: FaceId,
    codepoint: u32,
    scratch: *mut u8,
    width: u32,
    height: u32,
) -> i32;
pub type LogFn = extern "C" fn(
    ctx: *mut c_void,
    level: usize,
    target: *const u8,
    target_len: usize,
    message: *const u8,
    message_len: usize,
);

/// Services the host implements for the module. Every call either succeeds or ends the process.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct HostTable {
    pub ctx: *mut c_void,
    pub allocate: AllocateFn,
    pub deallocate: DeallocateFn,
    pub create_font: CreateFontFn,
    pub rasterize_glyph: RasterizeGlyphFn,
    pub log: LogFn,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct HostApi {
    pub abi_version: u32,
    pub host: HostTable,
    pub backend: BackendTable,
}

/// The state pointer carried across a reload, tagged with the layout version that created it.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateHandoff {
    pub state: *mut c_void,
    pub version: u32,
}

/// What a freshly loaded module finds when it claims a [StateHandoff].
#[derive(Debug, PartialEq, Eq)]
pub enum Handoff<T> {
    /// First load, nothing to take over.
    Fresh,
    /// State created by a build with the same layout.
    Reuse(NonNull<T>),
    /// State created by a build with another layout; the module decides what to keep.
    Migrate {
        previous: NonNull<c_void>,
        version: u32,
    },
}

impl StateHandoff {
    pub fn fresh() -> Self {
        Self {
            state: std::ptr::null_mut(),
            version: 0,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.state.is_null()
    }

    pub fn claim<T>(self, current_version: u32) -> Handoff<T> {
        match NonNull::new(self.state) {
            None => Handoff::Fresh,
            Some(state) if self.version == current_version => Handoff::Reuse(state.cast()),
            Some(previous) => Handoff::Migrate {
                previous,
                version: self.version,
            },
        }
    }
}

pub mod buttons {
    pub const LEFT: u32 = 0x01;
    pub const RIGHT: u32 = 0x02;
}

/// Absolute mouse state. The origin is the bottom-left corner of the window.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MouseInput {
    pub x: i32,
    pub y: i32,
    /// Wheel movement, 120 per notch.
    pub wheel: i32,
    /// [buttons] bitmask.
    pub buttons: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handoff_is_fresh() {
        assert_eq!(StateHandoff::fresh().claim::<u64>(3), Handoff::Fresh);
    }

    #[test]
    fn matching_version_is_reused() {
        let mut state = 7u64;
        let handoff = StateHandoff {
            state: (&mut state as *mut u64).cast(),
            version: 3,
        };
        assert_eq!(
            handoff.claim::<u64>(3),
            Handoff::Reuse(NonNull::from(&mut state))
        );
    }

    #[test]
    fn other_version_asks_for_migration() {
        let mut state = 7u64;
        let handoff = StateHandoff {
            state: (&mut state as *mut u64).cast(),
            version: 2,
        };
        assert!(matches!(
            handoff.claim::<u64>(3),
            Handoff::Migrate { version: 2, .. }
        ));
    }
}
