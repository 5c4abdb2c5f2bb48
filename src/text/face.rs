use std::{
    fs, mem,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use fontdue::{Font as FontdueFont, FontSettings};
use generational_arena::{Arena, Index};
use log::info;

use super::font::{Bitmap, FaceId, FontInfo, FontMetrics, Rasterizer};

struct Face {
    font: FontdueFont,
    px: f32,
    metrics: FontMetrics,
}

/// Loads font files by family name and rasterizes glyphs from them with fontdue.
pub struct FaceRegistry {
    faces: Arena<Face>,
    search_dirs: Vec<PathBuf>,
    scratch: Bitmap,
}

impl FaceRegistry {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self {
            faces: Arena::new(),
            search_dirs,
            scratch: Bitmap::new(0, 0),
        }
    }

    /// Finds a `.ttf`/`.otf` whose file stem matches `name`, ignoring case and spaces. Search
    /// directories are walked depth first, in order.
    fn locate(&self, name: &str) -> Result<PathBuf> {
        let wanted = normalize(name);
        for root in &self.search_dirs {
            let mut pending = vec![root.clone()];
            while let Some(dir) = pending.pop() {
                let Ok(entries) = fs::read_dir(&dir) else {
                    continue;
                };
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_dir() {
                        pending.push(path);
                    } else if is_font_file(&path)
                        && path
                            .file_stem()
                            .and_then(|stem| stem.to_str())
                            .is_some_and(|stem| normalize(stem) == wanted)
                    {
                        return Ok(path);
                    }
                }
            }
        }
        Err(anyhow!(
            "Couldn't find font '{}' in {:?}",
            name,
            self.search_dirs
        ))
    }

    pub fn create_font(&mut self, name: &str, pixel_height: i32) -> Result<FontInfo> {
        let path = self.locate(name)?;
        let bytes = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        let px = pixel_height as f32;
        let font = FontdueFont::from_bytes(
            bytes,
            FontSettings {
                scale: px,
                ..FontSettings::default()
            },
        )
        .map_err(|err| anyhow!(err))?;

        let lines = font
            .horizontal_line_metrics(px)
            .ok_or(anyhow!("'{}' has no horizontal metrics", name))?;
        let max_advance = (' '..='~')
            .map(|c| font.metrics(c, px).advance_width)
            .fold(0.0f32, f32::max)
            .ceil() as i32;

        let height = (lines.ascent - lines.descent).ceil() as i32;
        let metrics = FontMetrics {
            ascent: lines.ascent.round() as i32,
            descent: (-lines.descent).round() as i32,
            height,
            external_leading: lines.line_gap.round() as i32,
            default_x: max_advance,
            default_y: height,
        };

        let index = self.faces.insert(Face { font, px, metrics });
        let (index, generation) = index.into_raw_parts();
        info!("loaded font '{}' at {}px from {}", name, pixel_height, path.display());

        Ok(FontInfo {
            face: FaceId { index, generation },
            metrics,
            scratch_width: (max_advance * 3) as u32,
            scratch_height: (height * 3) as u32,
        })
    }

    /// Rasterizes into a caller-owned `width`x`height` scratch buffer, using the metrics the
    /// face was created with.
    pub fn rasterize_into(
        &mut self,
        face: FaceId,
        codepoint: u32,
        scratch: &mut [u8],
        width: u32,
        height: u32,
    ) -> i32 {
        let metrics = self
            .faces
            .get(Index::from_raw_parts(face.index, face.generation))
            .map(|face| face.metrics)
            .unwrap_or_default();

        let mut bitmap = mem::replace(&mut self.scratch, Bitmap::new(0, 0));
        if bitmap.width != width || bitmap.height != height {
            bitmap = Bitmap::new(width, height);
        }
        let advance = self.rasterize(face, &metrics, codepoint, &mut bitmap);
        scratch.copy_from_slice(&bitmap.pixels);
        self.scratch = bitmap;
        advance
    }
}

impl Rasterizer for FaceRegistry {
    fn rasterize(
        &mut self,
        face: FaceId,
        metrics: &FontMetrics,
        codepoint: u32,
        scratch: &mut Bitmap,
    ) -> i32 {
        scratch.clear();
        let Some(face) = self
            .faces
            .get(Index::from_raw_parts(face.index, face.generation))
        else {
            log::error!("rasterize called with unknown face {:?}", face);
            return 0;
        };
        let Some(character) = char::from_u32(codepoint) else {
            return 0;
        };

        let (glyph, coverage) = face.font.rasterize(character, face.px);
        // fontdue rows run top to bottom, the scratch bitmap bottom to top
        let left = metrics.default_x + glyph.xmin;
        let bottom = metrics.default_y + glyph.ymin;
        for (row, line) in coverage.chunks(glyph.width.max(1)).enumerate() {
            let y = bottom + (glyph.height - 1 - row) as i32;
            for (col, &value) in line.iter().enumerate() {
                scratch.put(left + col as i32, y, value);
            }
        }

        glyph.advance_width.round() as i32
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ttf") || ext.eq_ignore_ascii_case("otf"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_names_ignore_case_and_spaces() {
        assert_eq!(normalize("Courier New"), normalize("couriernew"));
        assert_ne!(normalize("Verdana"), normalize("Verdana Bold"));
    }

    #[test]
    fn missing_font_is_an_error() {
        let mut registry = FaceRegistry::new(vec![PathBuf::from("/nonexistent/fonts")]);
        assert!(registry.create_font("Courier New", 13).is_err());
    }

    #[test]
    fn nested_directories_are_searched() {
        let root = std::env::temp_dir().join(format!("hotglyph-fonts-{}", std::process::id()));
        let nested = root.join("truetype").join("msttcorefonts");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("Courier_New.txt"), b"").unwrap();
        fs::write(nested.join("CourierNew.TTF"), b"not a font").unwrap();

        let registry = FaceRegistry::new(vec![root.clone()]);
        let found = registry.locate("courier new");
        let unreadable = FaceRegistry::new(vec![root.clone()]).create_font("Courier New", 13);
        fs::remove_dir_all(&root).unwrap();

        assert_eq!(found.unwrap(), nested.join("CourierNew.TTF"));
        assert!(unreadable.is_err());
    }
}
