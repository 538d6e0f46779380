//! Rendering of a single cell onto the frame's pixel buffer.
//!
//! `render_cell` is the one place pixels are produced from cell state:
//! background, glyph, decorations, cursor styling, selection
//! inversion and blink masking all happen here, for the main thread
//! and render workers alike.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::font::{Font, FontSet, FontExtents, GlyphPixmap};
use crate::terminal::color::{color_is_set, color_rgb, Palette};
use crate::terminal::cursor::{BlinkState, CellAttrs, CursorStyle};
use crate::terminal::grid::{Cell, Row};
use crate::terminal::state::{Selection, Terminal};

use super::pixels::{Image, PixColor, Rect};

/// Immutable per-frame snapshot of everything cell rendering needs.
///
/// Shared across render workers; the only mutable member is the blink
/// arm request, which the orchestrator folds back into the timer after
/// the row pass.
pub struct RenderContext {
    pub cell_width: i32,
    pub cell_height: i32,
    pub fonts: Arc<FontSet>,
    pub fextents: FontExtents,
    pub cursor_style: CursorStyle,
    pub reverse: bool,
    pub colors: Palette,
    pub selection: Selection,
    pub view: usize,
    pub blink_on: bool,
    pub blink_armed: bool,
    blink_request: AtomicBool,
}

impl RenderContext {
    pub fn from_term(term: &Terminal) -> Self {
        Self {
            cell_width: term.cell_width,
            cell_height: term.cell_height,
            fonts: Arc::clone(&term.fonts),
            fextents: term.fextents,
            cursor_style: term.cursor_style,
            reverse: term.reverse,
            colors: term.colors,
            selection: term.selection,
            view: term.grid().view,
            blink_on: term.blink.state == BlinkState::On,
            blink_armed: term.blink.active,
            blink_request: AtomicBool::new(false),
        }
    }

    /// A blinking cell was rendered while the timer was unarmed.
    pub fn blink_requested(&self) -> bool {
        self.blink_request.load(Ordering::Relaxed)
    }
}

fn draw_bar(ctx: &RenderContext, pix: Image, color: PixColor, x: i32, y: i32) {
    pix.fill_rect(color, Rect::new(x, y, 1, ctx.cell_height));
}

fn draw_underline(
    ctx: &RenderContext,
    pix: Image,
    font: &dyn Font,
    color: PixColor,
    x: i32,
    y: i32,
    cols: i32,
) {
    let baseline = y + ctx.fextents.height - ctx.fextents.descent;
    let width = font.underline().thickness;
    let y_under = baseline - font.underline().position - width / 2;

    pix.fill_rect(color, Rect::new(x, y_under, cols * ctx.cell_width, width));
}

fn draw_strikeout(
    ctx: &RenderContext,
    pix: Image,
    font: &dyn Font,
    color: PixColor,
    x: i32,
    y: i32,
    cols: i32,
) {
    let baseline = y + ctx.fextents.height - ctx.fextents.descent;
    let width = font.strikeout().thickness;
    let y_strike = baseline - font.strikeout().position - width / 2;

    pix.fill_rect(color, Rect::new(x, y_strike, cols * ctx.cell_width, width));
}

/// Render one cell at view position `(col, view_row)`. Returns the
/// number of columns drawn, or 0 when the cell was already clean and
/// nothing was touched.
pub fn render_cell(
    ctx: &RenderContext,
    pix: Image,
    cell: &mut Cell,
    col: u16,
    view_row: u16,
    has_cursor: bool,
) -> u16 {
    if cell.is_clean() {
        return 0;
    }

    cell.mark_clean();

    let width = ctx.cell_width;
    let height = ctx.cell_height;
    let x = col as i32 * width;
    let y = view_row as i32 * height;

    let block_cursor = has_cursor && ctx.cursor_style == CursorStyle::Block;
    let is_selected = ctx.selection.contains(col, view_row, ctx.view);

    let mut fg_rgb = if cell.attrs.contains(CellAttrs::HAVE_FG) {
        cell.fg
    } else if !ctx.reverse {
        ctx.colors.fg
    } else {
        ctx.colors.bg
    };
    let mut bg_rgb = if cell.attrs.contains(CellAttrs::HAVE_BG) {
        cell.bg
    } else if !ctx.reverse {
        ctx.colors.bg
    } else {
        ctx.colors.fg
    };

    /* If an odd number of these apply, we reverse */
    if block_cursor ^ cell.attrs.contains(CellAttrs::REVERSE) ^ is_selected {
        std::mem::swap(&mut fg_rgb, &mut bg_rgb);
    }

    let blink_masked = cell.attrs.contains(CellAttrs::BLINK) && !ctx.blink_on;
    if blink_masked {
        fg_rgb = bg_rgb;
    }

    let mut fg = PixColor::from_rgb(fg_rgb);
    let mut bg = PixColor::from_rgb_alpha(
        bg_rgb,
        if block_cursor { 0xffff } else { ctx.colors.alpha },
    );

    if cell.attrs.contains(CellAttrs::DIM) {
        fg.dim();
    }

    if block_cursor && color_is_set(ctx.colors.cursor_text) {
        /* User configured cursor color overrides all attributes */
        debug_assert!(color_is_set(ctx.colors.cursor_cursor));
        fg = PixColor::from_rgb(color_rgb(ctx.colors.cursor_text));
        bg = PixColor::from_rgb(color_rgb(ctx.colors.cursor_cursor));
    }

    let font = ctx.fonts.for_attrs(cell.attrs);
    let glyph = font.glyph_for(cell.wc);

    let cell_cols = glyph.map(|g| g.cols.max(1)).unwrap_or(1);

    /* Background */
    pix.fill_rect(bg, Rect::new(x, y, cell_cols as i32 * width, height));

    /* Non-block cursors */
    if has_cursor {
        let cursor_color = if color_is_set(ctx.colors.cursor_text) {
            PixColor::from_rgb(color_rgb(ctx.colors.cursor_cursor))
        } else {
            PixColor::from_rgb(fg_rgb)
        };

        match ctx.cursor_style {
            CursorStyle::Bar => draw_bar(ctx, pix, cursor_color, x, y),
            CursorStyle::Underline => {
                draw_underline(ctx, pix, font, cursor_color, x, y, cell_cols as i32)
            }
            CursorStyle::Block => {}
        }
    }

    if cell.attrs.contains(CellAttrs::BLINK) && !ctx.blink_armed {
        /* First cell we see that has blink set - request timer arm */
        ctx.blink_request.store(true, Ordering::Relaxed);
    }

    if cell.wc == '\0' || cell.attrs.contains(CellAttrs::CONCEAL) {
        return cell_cols;
    }

    if let Some(glyph) = glyph {
        match &glyph.pix {
            GlyphPixmap::Argb(argb) => {
                /* Glyph surface is a pre-rendered image (e.g. a color emoji) */
                if !blink_masked {
                    pix.composite_argb(
                        argb,
                        x + glyph.x,
                        y + ctx.fextents.ascent - glyph.y,
                    );
                }
            }
            GlyphPixmap::Alpha(mask) => {
                /* Glyph surface is an alpha mask */
                pix.composite_mask(fg, mask, x + glyph.x, y + ctx.fextents.ascent - glyph.y);
            }
        }
    }

    /* Underline; URL-tagged cells are highlighted the same way */
    if cell.attrs.intersects(CellAttrs::UNDERLINE | CellAttrs::URL) {
        let color = PixColor::from_rgb(fg_rgb);
        draw_underline(ctx, pix, font, color, x, y, cell_cols as i32);
    }

    if cell.attrs.contains(CellAttrs::STRIKETHROUGH) {
        let color = PixColor::from_rgb(fg_rgb);
        draw_strikeout(ctx, pix, font, color, x, y, cell_cols as i32);
    }

    cell_cols
}

/// Render every cell of a row; used by the inline path and workers.
pub(crate) fn render_row(ctx: &RenderContext, pix: Image, row: &mut Row, view_row: u16) {
    for col in (0..row.cells.len()).rev() {
        render_cell(ctx, pix, &mut row.cells[col], col as u16, view_row, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::grid::AbsPos;
    use crate::testutil::{test_terminal, TestCanvas};

    fn ctx_for(term: &Terminal) -> RenderContext {
        RenderContext::from_term(term)
    }

    #[test]
    fn clean_cell_is_left_untouched() {
        let term = test_terminal(4, 2);
        let ctx = ctx_for(&term);
        let mut canvas = TestCanvas::for_term(&term);

        let mut cell = Cell::default();
        cell.set_char('a');

        assert_eq!(render_cell(&ctx, canvas.image(), &mut cell, 0, 0, false), 1);
        assert!(cell.is_clean());

        canvas.poison(0xdeadbeef);
        assert_eq!(render_cell(&ctx, canvas.image(), &mut cell, 0, 0, false), 0);
        assert!(
            canvas.all_pixels(|px| px == 0xdeadbeef),
            "second render of a clean cell must not write"
        );
    }

    #[test]
    fn background_uses_default_palette() {
        let term = test_terminal(4, 2);
        let ctx = ctx_for(&term);
        let mut canvas = TestCanvas::for_term(&term);

        let mut cell = Cell::default();
        cell.set_char(' ');
        render_cell(&ctx, canvas.image(), &mut cell, 1, 0, false);

        let bg = canvas.at(term.cell_width, 0);
        assert_eq!(bg & 0xffffff, term.colors.bg, "cell bg is the default bg");
    }

    #[test]
    fn reverse_attribute_swaps_colors() {
        let term = test_terminal(4, 2);
        let ctx = ctx_for(&term);
        let mut canvas = TestCanvas::for_term(&term);

        let mut cell = Cell::default();
        cell.set_char(' ');
        cell.set_attr(CellAttrs::REVERSE, true);
        render_cell(&ctx, canvas.image(), &mut cell, 0, 0, false);

        let bg = canvas.at(0, 0);
        assert_eq!(bg & 0xffffff, term.colors.fg, "reversed bg is the fg color");
    }

    #[test]
    fn block_cursor_and_reverse_cancel_out() {
        let term = test_terminal(4, 2);
        let ctx = ctx_for(&term);
        let mut canvas = TestCanvas::for_term(&term);

        let mut cell = Cell::default();
        cell.set_char(' ');
        cell.set_attr(CellAttrs::REVERSE, true);
        render_cell(&ctx, canvas.image(), &mut cell, 0, 0, true);

        let bg = canvas.at(0, 0);
        assert_eq!(
            bg & 0xffffff,
            term.colors.bg,
            "block cursor on a reversed cell swaps twice"
        );
    }

    #[test]
    fn selection_inverts_cell() {
        let mut term = test_terminal(4, 2);
        term.selection = Selection {
            start: AbsPos { col: 0, row: 0 },
            end: AbsPos { col: 3, row: 0 },
        };
        let ctx = ctx_for(&term);
        let mut canvas = TestCanvas::for_term(&term);

        let mut cell = Cell::default();
        cell.set_char(' ');
        render_cell(&ctx, canvas.image(), &mut cell, 2, 0, false);

        assert_eq!(canvas.at(2 * term.cell_width, 0) & 0xffffff, term.colors.fg);
    }

    #[test]
    fn per_cell_colors_override_palette() {
        let term = test_terminal(4, 2);
        let ctx = ctx_for(&term);
        let mut canvas = TestCanvas::for_term(&term);

        let mut cell = Cell::default();
        cell.set_char(' ');
        cell.set_bg(0x123456);
        render_cell(&ctx, canvas.image(), &mut cell, 0, 0, false);

        assert_eq!(canvas.at(0, 0) & 0xffffff, 0x123456);
    }

    #[test]
    fn blink_off_phase_hides_glyph() {
        let mut term = test_terminal(4, 2);
        term.blink.state = BlinkState::Off;
        term.blink.active = true;
        let ctx = ctx_for(&term);
        let mut canvas = TestCanvas::for_term(&term);

        let mut cell = Cell::default();
        cell.set_char('#');
        cell.set_attr(CellAttrs::BLINK, true);
        render_cell(&ctx, canvas.image(), &mut cell, 0, 0, false);

        // The glyph mask covers the whole cell; in the off phase every
        // pixel must still be the background color.
        assert_eq!(canvas.at(0, 0) & 0xffffff, term.colors.bg);
        assert!(!ctx.blink_requested(), "timer already armed");
    }

    #[test]
    fn blinking_cell_requests_timer_arm() {
        let term = test_terminal(4, 2);
        let ctx = ctx_for(&term);
        let mut canvas = TestCanvas::for_term(&term);

        let mut cell = Cell::default();
        cell.set_char('#');
        cell.set_attr(CellAttrs::BLINK, true);
        render_cell(&ctx, canvas.image(), &mut cell, 0, 0, false);

        assert!(ctx.blink_requested());
    }

    #[test]
    fn configured_cursor_colors_win_under_block_cursor() {
        let mut term = test_terminal(4, 2);
        term.colors.cursor_text = 1 << 31 | 0x101010;
        term.colors.cursor_cursor = 1 << 31 | 0xededed;
        let ctx = ctx_for(&term);
        let mut canvas = TestCanvas::for_term(&term);

        let mut cell = Cell::default();
        cell.set_char(' ');
        render_cell(&ctx, canvas.image(), &mut cell, 0, 0, true);

        assert_eq!(canvas.at(0, 0) & 0xffffff, 0xededed);
    }

    #[test]
    fn bar_cursor_draws_single_column(){
        let mut term = test_terminal(4, 2);
        term.cursor_style = CursorStyle::Bar;
        let ctx = ctx_for(&term);
        let mut canvas = TestCanvas::for_term(&term);

        let mut cell = Cell::default();
        cell.set_char('\0');
        render_cell(&ctx, canvas.image(), &mut cell, 1, 0, true);

        let x = term.cell_width;
        assert_eq!(
            canvas.at(x, 0) & 0xffffff,
            term.colors.fg,
            "bar drawn in cursor color at cell origin"
        );
        assert_eq!(
            canvas.at(x + 1, 0) & 0xffffff,
            term.colors.bg,
            "rest of the cell keeps the bg"
        );
    }

    #[test]
    fn wide_glyph_returns_two_columns() {
        let term = test_terminal(4, 2);
        let ctx = ctx_for(&term);
        let mut canvas = TestCanvas::for_term(&term);

        let mut cell = Cell::default();
        cell.set_char('漢');
        assert_eq!(render_cell(&ctx, canvas.image(), &mut cell, 0, 0, false), 2);
    }

    #[test]
    fn conceal_skips_the_glyph_but_fills_background() {
        let term = test_terminal(4, 2);
        let ctx = ctx_for(&term);
        let mut canvas = TestCanvas::for_term(&term);

        let mut cell = Cell::default();
        cell.set_char('x');
        cell.set_attr(CellAttrs::CONCEAL, true);
        render_cell(&ctx, canvas.image(), &mut cell, 0, 0, false);

        assert!(
            canvas.rect_is(
                Rect::new(0, 0, term.cell_width, term.cell_height),
                |px| px & 0xffffff == term.colors.bg
            ),
            "concealed cell renders as plain background"
        );
    }
}
