//! Runtime for a hot-reloadable render module.
//!
//! The host process owns the window, the GPU and the font files; the module is a dynamic library
//! that owns the scene and can be rebuilt while the host runs. Both link this crate: the module
//! with default features off (glyph atlas, draw list, capability tables), the host with the
//! `platform` feature (wgpu backend, fontdue faces, winit input, reload loader).

pub mod abi;
pub mod atlas;
pub mod backend;
pub mod buffer;
pub mod draw_list;
pub mod geometry;
pub mod host;
pub mod plain;
pub mod text;

#[cfg(feature = "platform")]
pub mod bind;
#[cfg(feature = "platform")]
pub mod input;
#[cfg(feature = "platform")]
pub mod pipeline;
#[cfg(feature = "platform")]
pub mod reload;
#[cfg(feature = "platform")]
pub mod render;

#[cfg(test)]
mod testing;
