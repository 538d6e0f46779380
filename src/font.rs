//! The seam to the font shaping and rasterization layer.
//!
//! Shaping is an external collaborator: the core only asks "give me
//! the glyph for this codepoint" and composites the result. Four font
//! faces cover the bold/italic matrix, with terminal-wide vertical
//! extents driving the cell geometry.

use crate::render::pixels::{AlphaPixmap, ArgbPixmap};
use crate::terminal::cursor::CellAttrs;

/// Terminal-wide vertical font extents in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontExtents {
    pub ascent: i32,
    pub descent: i32,
    pub height: i32,
}

/// Position and thickness of an underline or strikeout stroke,
/// measured up from the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineMetrics {
    pub position: i32,
    pub thickness: i32,
}

/// A rasterized glyph.
///
/// `pix` is either a pre-rendered premultiplied ARGB image (color
/// emoji) composited as-is, or an alpha mask through which the cell
/// foreground is drawn. `x`/`y` are the bearing relative to the pen
/// position, `cols` the number of terminal cells the glyph spans.
#[derive(Debug, Clone)]
pub struct Glyph {
    pub pix: GlyphPixmap,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub cols: u16,
}

#[derive(Debug, Clone)]
pub enum GlyphPixmap {
    Argb(ArgbPixmap),
    Alpha(AlphaPixmap),
}

/// One font face.
pub trait Font: Send + Sync {
    fn glyph_for(&self, wc: char) -> Option<&Glyph>;
    fn underline(&self) -> LineMetrics;
    fn strikeout(&self) -> LineMetrics;
}

/// The four faces of the bold/italic matrix plus shared geometry.
pub struct FontSet {
    fonts: [Box<dyn Font>; 4],
    pub extents: FontExtents,
    pub cell_width: i32,
    pub cell_height: i32,
}

impl FontSet {
    /// `fonts` in index order: regular, bold, italic, bold-italic.
    pub fn new(
        fonts: [Box<dyn Font>; 4],
        extents: FontExtents,
        cell_width: i32,
        cell_height: i32,
    ) -> Self {
        Self {
            fonts,
            extents,
            cell_width,
            cell_height,
        }
    }

    /// The face matching a cell's bold/italic attributes.
    pub fn for_attrs(&self, attrs: CellAttrs) -> &dyn Font {
        let idx = ((attrs.contains(CellAttrs::ITALIC) as usize) << 1)
            | attrs.contains(CellAttrs::BOLD) as usize;
        self.fonts[idx].as_ref()
    }
}
