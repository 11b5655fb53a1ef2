//! Font resolution and caching.
//!
//! Families are looked up by file name in the configured search directories
//! and then the platform font directories. When nothing matches, a few common
//! sans-serif families are tried, and finally the built-in 8x8 bitmap font is
//! used, so resolution never fails.

use ab_glyph::{Font, FontArc, GlyphId, PxScale, ScaleFont};
use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{Rgba, RgbaImage};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};
use walkdir::WalkDir;

/// Vertical gap between lines of multi-line text, in pixels.
pub const LINE_SPACING: u32 = 4;

const FALLBACK_FAMILIES: &[&str] = &[
    "dejavusans",
    "liberationsans",
    "arial",
    "helvetica",
    "freesans",
    "notosans",
];

const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "ttc"];

#[derive(Clone)]
enum Face {
    Outline(FontArc),
    Bitmap,
}

/// A font face at a fixed pixel size.
#[derive(Clone)]
pub struct FontHandle {
    face: Face,
    size: f32,
}

impl fmt::Debug for FontHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontHandle")
            .field("bitmap", &self.is_bitmap())
            .field("size", &self.size)
            .finish()
    }
}

impl FontHandle {
    /// The built-in bitmap font at roughly `size` pixels.
    pub fn bitmap(size: u32) -> Self {
        Self {
            face: Face::Bitmap,
            size: size as f32,
        }
    }

    pub fn is_bitmap(&self) -> bool {
        matches!(self.face, Face::Bitmap)
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    fn bitmap_scale(&self) -> u32 {
        ((self.size / 8.0).round() as u32).max(1)
    }

    /// Height of one line of text.
    pub fn line_height(&self) -> u32 {
        match &self.face {
            Face::Outline(font) => {
                let scaled = font.as_scaled(PxScale::from(self.size));
                (scaled.ascent() - scaled.descent()).ceil().max(1.0) as u32
            }
            Face::Bitmap => 8 * self.bitmap_scale(),
        }
    }

    fn line_width(&self, line: &str) -> u32 {
        match &self.face {
            Face::Outline(font) => {
                let scaled = font.as_scaled(PxScale::from(self.size));
                let mut width = 0.0f32;
                let mut prev: Option<GlyphId> = None;
                for c in line.chars() {
                    let id = scaled.glyph_id(c);
                    if let Some(prev) = prev {
                        width += scaled.kern(prev, id);
                    }
                    width += scaled.h_advance(id);
                    prev = Some(id);
                }
                width.ceil().max(0.0) as u32
            }
            Face::Bitmap => line.chars().count() as u32 * 8 * self.bitmap_scale(),
        }
    }

    /// (width, height) of the laid-out text. Lines are split on `\n`.
    pub fn measure(&self, text: &str) -> (u32, u32) {
        let mut width = 0;
        let mut lines = 0u32;
        for line in text.split('\n') {
            width = width.max(self.line_width(line));
            lines += 1;
        }
        let height = lines * self.line_height() + lines.saturating_sub(1) * LINE_SPACING;
        (width, height)
    }

    /// Stamp `text` with its layout box's top-left at `(x, y)`.
    ///
    /// Glyph coverage interpolates each destination pixel toward `color`
    /// (alpha included), so repeated stamps never exceed `color`'s alpha.
    pub fn draw(&self, canvas: &mut RgbaImage, x: i32, y: i32, text: &str, color: Rgba<u8>) {
        let advance = (self.line_height() + LINE_SPACING) as i32;
        for (i, line) in text.split('\n').enumerate() {
            let top = y + i as i32 * advance;
            match &self.face {
                Face::Outline(font) => draw_outline_line(font, self.size, canvas, x, top, line, color),
                Face::Bitmap => draw_bitmap_line(self.bitmap_scale(), canvas, x, top, line, color),
            }
        }
    }
}

fn draw_outline_line(
    font: &FontArc,
    size: f32,
    canvas: &mut RgbaImage,
    x: i32,
    top: i32,
    line: &str,
    color: Rgba<u8>,
) {
    let scale = PxScale::from(size);
    let scaled = font.as_scaled(scale);
    let baseline = top as f32 + scaled.ascent();
    let mut cursor = x as f32;
    let mut prev: Option<GlyphId> = None;

    for c in line.chars() {
        let id = scaled.glyph_id(c);
        if let Some(prev) = prev {
            cursor += scaled.kern(prev, id);
        }
        let glyph = id.with_scale_and_position(scale, ab_glyph::point(cursor, baseline));
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let px = gx as i32 + bounds.min.x as i32;
                let py = gy as i32 + bounds.min.y as i32;
                stamp(canvas, px, py, color, coverage);
            });
        }
        cursor += scaled.h_advance(id);
        prev = Some(id);
    }
}

fn draw_bitmap_line(
    scale: u32,
    canvas: &mut RgbaImage,
    x: i32,
    top: i32,
    line: &str,
    color: Rgba<u8>,
) {
    let cell = (8 * scale) as i32;
    for (i, c) in line.chars().enumerate() {
        let Some(glyph) = BASIC_FONTS
            .get(c)
            .or_else(|| LATIN_FONTS.get(c))
            .or_else(|| BASIC_FONTS.get('?'))
        else {
            continue;
        };
        let origin_x = x + i as i32 * cell;
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..8 {
                if (bits >> col) & 1 == 0 {
                    continue;
                }
                let bx = origin_x + col * scale as i32;
                let by = top + row as i32 * scale as i32;
                for dy in 0..scale as i32 {
                    for dx in 0..scale as i32 {
                        stamp(canvas, bx + dx, by + dy, color, 1.0);
                    }
                }
            }
        }
    }
}

fn stamp(canvas: &mut RgbaImage, x: i32, y: i32, ink: Rgba<u8>, coverage: f32) {
    if x < 0 || y < 0 || x >= canvas.width() as i32 || y >= canvas.height() as i32 {
        return;
    }
    let coverage = coverage.clamp(0.0, 1.0);
    if coverage <= 0.0 {
        return;
    }
    let dst = canvas.get_pixel_mut(x as u32, y as u32);
    for c in 0..4 {
        let mixed = f32::from(dst[c]) * (1.0 - coverage) + f32::from(ink[c]) * coverage;
        dst[c] = mixed.round().clamp(0.0, 255.0) as u8;
    }
}

/// Thread-safe cache of resolved fonts keyed by (family, size).
///
/// Concurrent misses on the same key may both resolve the font; the second
/// insert simply replaces the first.
pub struct FontCache {
    dirs: Vec<PathBuf>,
    index: OnceLock<HashMap<String, PathBuf>>,
    faces: RwLock<HashMap<String, Face>>,
    handles: RwLock<HashMap<(String, u32), FontHandle>>,
}

impl fmt::Debug for FontCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontCache")
            .field("dirs", &self.dirs)
            .field("cached", &read(&self.handles).len())
            .finish()
    }
}

impl Default for FontCache {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FontCache {
    /// Search `extra_dirs` first, then the platform font directories.
    pub fn new(extra_dirs: Vec<PathBuf>) -> Self {
        let mut dirs = extra_dirs;
        dirs.extend(platform_font_dirs());
        Self::with_dirs(dirs)
    }

    /// A cache that never looks at the filesystem and always yields the
    /// bitmap font.
    pub fn builtin() -> Self {
        Self::with_dirs(Vec::new())
    }

    fn with_dirs(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            index: OnceLock::new(),
            faces: RwLock::new(HashMap::new()),
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Number of (family, size) entries resolved so far.
    pub fn len(&self) -> usize {
        read(&self.handles).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up or resolve a font. Never fails.
    pub fn resolve(&self, family: &str, size: u32) -> FontHandle {
        let key = (family.trim().to_lowercase(), size);
        if let Some(handle) = read(&self.handles).get(&key) {
            return handle.clone();
        }

        let handle = FontHandle {
            face: self.face(family.trim()),
            size: size as f32,
        };
        write(&self.handles).insert(key, handle.clone());
        handle
    }

    fn face(&self, family: &str) -> Face {
        let key = family.to_lowercase();
        if let Some(face) = read(&self.faces).get(&key) {
            return face.clone();
        }

        let face = match self.load_face(family) {
            Some(font) => Face::Outline(font),
            None => match FALLBACK_FAMILIES.iter().find_map(|f| self.load_face(f)) {
                Some(font) => {
                    tracing::warn!(family, "Font not found, using a generic sans-serif");
                    Face::Outline(font)
                }
                None => {
                    tracing::warn!(family, "No font files available, using built-in bitmap font");
                    Face::Bitmap
                }
            },
        };
        write(&self.faces).insert(key, face.clone());
        face
    }

    fn load_face(&self, family: &str) -> Option<FontArc> {
        if family.is_empty() {
            return None;
        }

        // A family given as a path to a font file is loaded directly.
        let direct = Path::new(family);
        if direct.is_file() {
            return load_font_file(direct);
        }

        let index = self.index.get_or_init(|| build_index(&self.dirs));
        candidate_file_names(family)
            .iter()
            .filter_map(|name| index.get(name))
            .find_map(|path| load_font_file(path))
    }
}

/// Collections (`.ttc`) load their first face.
fn load_font_file(path: &Path) -> Option<FontArc> {
    let data = std::fs::read(path).ok()?;
    match FontArc::try_from_vec(data) {
        Ok(font) => {
            tracing::debug!(path = %path.display(), "Loaded font");
            Some(font)
        }
        Err(e) => {
            tracing::debug!(path = %path.display(), "Skipping unreadable font: {e}");
            None
        }
    }
}

/// Lower-cased file names that may hold `family`.
fn candidate_file_names(family: &str) -> Vec<String> {
    let lower = family.to_lowercase();
    let compact: String = lower.chars().filter(|c| !c.is_whitespace()).collect();
    let dashed = lower.split_whitespace().collect::<Vec<_>>().join("-");

    let mut stems = vec![compact.clone(), format!("{compact}-regular"), lower, dashed];
    stems.dedup();

    let mut names = Vec::new();
    for stem in stems {
        for ext in FONT_EXTENSIONS {
            let name = format!("{stem}.{ext}");
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// Map of lower-cased font file name to its first location.
fn build_index(dirs: &[PathBuf]) -> HashMap<String, PathBuf> {
    let mut index = HashMap::new();
    for dir in dirs.iter().filter(|d| d.is_dir()) {
        for entry in WalkDir::new(dir)
            .follow_links(true)
            .max_depth(6)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            let is_font = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| FONT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                .unwrap_or(false);
            if !is_font || !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                index
                    .entry(name.to_lowercase())
                    .or_insert_with(|| path.to_path_buf());
            }
        }
    }
    tracing::debug!(fonts = index.len(), "Indexed font directories");
    index
}

fn platform_font_dirs() -> Vec<PathBuf> {
    let home = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf());
    let mut dirs = Vec::new();

    if cfg!(target_os = "windows") {
        dirs.push(PathBuf::from("C:/Windows/Fonts"));
        if let Some(home) = &home {
            dirs.push(home.join("AppData/Local/Microsoft/Windows/Fonts"));
        }
    } else if cfg!(target_os = "macos") {
        dirs.push(PathBuf::from("/Library/Fonts"));
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        if let Some(home) = &home {
            dirs.push(home.join("Library/Fonts"));
        }
    } else {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Some(home) = &home {
            dirs.push(home.join(".fonts"));
            dirs.push(home.join(".local/share/fonts"));
        }
    }
    dirs
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
