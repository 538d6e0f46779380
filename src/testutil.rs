//! Shared test fixtures: a fake font set, a recording surface, and a
//! canvas for pixel assertions.

use std::collections::HashMap;
use std::sync::Arc;

use crate::compositor::{BufferId, OverlayId, WindowSurface};
use crate::config::SquallConfig;
use crate::font::{Font, FontExtents, FontSet, Glyph, GlyphPixmap, LineMetrics};
use crate::render::pixels::{AlphaPixmap, ArgbPixmap, Image, Rect};
use crate::terminal::Terminal;
use crate::width::char_width;

pub const CELL_W: i32 = 4;
pub const CELL_H: i32 = 8;
const ASCENT: i32 = 6;

/// A font whose glyphs are full-coverage alpha masks sized to the
/// cell, with a pre-rendered ARGB glyph for one emoji. Glyph columns
/// come from the display-width classifier.
pub struct FakeFont {
    glyphs: HashMap<char, Glyph>,
}

impl FakeFont {
    pub fn new() -> Self {
        let mut glyphs = HashMap::new();

        let mut chars: Vec<char> = (0x20u8..0x7f).map(|b| b as char).collect();
        chars.push('漢');
        for wc in chars {
            let cols = char_width(wc).max(1) as u16;
            let width = cols as i32 * CELL_W;
            // Space has an empty mask, everything else full coverage.
            let coverage = if wc == ' ' { 0x00 } else { 0xff };
            glyphs.insert(
                wc,
                Glyph {
                    pix: GlyphPixmap::Alpha(AlphaPixmap {
                        width,
                        height: CELL_H,
                        data: vec![coverage; (width * CELL_H) as usize],
                    }),
                    x: 0,
                    y: ASCENT,
                    width,
                    height: CELL_H,
                    cols,
                },
            );
        }

        // One pre-rendered color glyph.
        let emoji = '🥲';
        let width = 2 * CELL_W;
        glyphs.insert(
            emoji,
            Glyph {
                pix: GlyphPixmap::Argb(ArgbPixmap {
                    width,
                    height: CELL_H,
                    data: vec![0xffff_cc00; (width * CELL_H) as usize],
                }),
                x: 0,
                y: ASCENT,
                width,
                height: CELL_H,
                cols: 2,
            },
        );

        Self { glyphs }
    }

    /// A one-glyph font whose 'x' glyph carries `tag` in its `y`
    /// bearing, for face-selection assertions.
    pub fn tagged(tag: i32) -> Self {
        let mut glyphs = HashMap::new();
        glyphs.insert(
            'x',
            Glyph {
                pix: GlyphPixmap::Alpha(AlphaPixmap {
                    width: CELL_W,
                    height: CELL_H,
                    data: vec![0xff; (CELL_W * CELL_H) as usize],
                }),
                x: 0,
                y: tag,
                width: CELL_W,
                height: CELL_H,
                cols: 1,
            },
        );
        Self { glyphs }
    }
}

impl Font for FakeFont {
    fn glyph_for(&self, wc: char) -> Option<&Glyph> {
        self.glyphs.get(&wc)
    }

    fn underline(&self) -> LineMetrics {
        LineMetrics {
            position: 1,
            thickness: 1,
        }
    }

    fn strikeout(&self) -> LineMetrics {
        LineMetrics {
            position: 3,
            thickness: 1,
        }
    }
}

pub fn fake_font_set() -> Arc<FontSet> {
    Arc::new(FontSet::new(
        [
            Box::new(FakeFont::new()),
            Box::new(FakeFont::new()),
            Box::new(FakeFont::new()),
            Box::new(FakeFont::new()),
        ],
        FontExtents {
            ascent: ASCENT,
            descent: CELL_H - ASCENT,
            height: CELL_H,
        },
        CELL_W,
        CELL_H,
    ))
}

/// A terminal sized to exactly `cols` x `rows` cells, with a small
/// scrollback and no render workers involved.
pub fn test_terminal(cols: u16, rows: u16) -> Terminal {
    let mut config = SquallConfig::default();
    config.terminal.scrollback_lines = 16;

    Terminal::new(
        &config,
        fake_font_set(),
        cols as i32 * CELL_W,
        rows as i32 * CELL_H,
        1,
    )
    .expect("test terminal")
}

/// Write `text` into the grid at a view position, marking the row
/// dirty.
pub fn put_text(term: &mut Terminal, row: u16, col: u16, text: &str) {
    let grid = term.grid_mut();
    let line = grid.row_in_view_mut(row);
    for (i, wc) in text.chars().enumerate() {
        line.cells[col as usize + i].set_char(wc);
    }
    line.dirty = true;
}

/// A standalone pixel canvas for exercising the cell renderer.
pub struct TestCanvas {
    pixels: Vec<u32>,
    width: i32,
    height: i32,
}

impl TestCanvas {
    pub fn for_term(term: &Terminal) -> Self {
        Self {
            pixels: vec![0; (term.width * term.height) as usize],
            width: term.width,
            height: term.height,
        }
    }

    pub fn image(&mut self) -> Image {
        unsafe { Image::from_raw(self.pixels.as_mut_ptr(), self.width, self.height, self.width) }
    }

    pub fn at(&self, x: i32, y: i32) -> u32 {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn poison(&mut self, value: u32) {
        self.pixels.fill(value);
    }

    pub fn all_pixels(&self, pred: impl Fn(u32) -> bool) -> bool {
        self.pixels.iter().all(|&px| pred(px))
    }

    pub fn rect_is(&self, rect: Rect, pred: impl Fn(u32) -> bool) -> bool {
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                if !pred(self.at(x, y)) {
                    return false;
                }
            }
        }
        true
    }
}

/// A recording stand-in for the compositor-facing window surface.
#[derive(Default)]
pub struct FakeSurface {
    pub commits: usize,
    pub frame_requests: usize,
    pub attached: Vec<BufferId>,
    pub damage_rects: Vec<Rect>,
    pub buffer_scale: i32,
    pub title: Option<String>,
    pub overlays: Vec<OverlayId>,
    pub destroyed: Vec<OverlayId>,
    pub fail_overlays: bool,
    pub next_overlay: OverlayId,
}

impl WindowSurface for FakeSurface {
    fn attach(&mut self, buffer: BufferId) {
        self.attached.push(buffer);
    }

    fn damage(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.damage_rects.push(Rect::new(x, y, width, height));
    }

    fn set_buffer_scale(&mut self, scale: i32) {
        self.buffer_scale = scale;
    }

    fn commit(&mut self) {
        self.commits += 1;
    }

    fn request_frame(&mut self) {
        self.frame_requests += 1;
    }

    fn set_title(&mut self, title: &str) {
        self.title = Some(title.to_string());
    }

    fn create_url_overlay(&mut self) -> Option<OverlayId> {
        if self.fail_overlays {
            return None;
        }
        self.next_overlay += 1;
        self.overlays.push(self.next_overlay);
        Some(self.next_overlay)
    }

    fn destroy_overlay(&mut self, overlay: OverlayId) {
        self.destroyed.push(overlay);
    }
}
