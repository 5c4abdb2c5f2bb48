// renderer needs text drawing capability
// keep it simple:
// - the host rasterizes font glyphs into a scratch bitmap
// - the module stitches those bitmaps into one atlas
// - text is drawn as textured rects, one per character

#[cfg(feature = "platform")]
pub mod face;
pub mod font;
