//! The frame orchestrator.
//!
//! Drives one frame end to end: acquire a buffer, erase the previous
//! cursor, apply pending scroll damage as pixel memmoves, dispatch
//! dirty rows to the worker pool, wait, paint the cursor and flash
//! overlay, then attach/commit with a frame callback. Frames are
//! paced by the compositor: while a callback is pending, refresh
//! requests coalesce into the next callback-driven frame.

use std::sync::Arc;

use crate::compositor::{BufferId, WindowSurface};
use crate::error::Error;
use crate::terminal::cursor::CellAttrs;
use crate::terminal::grid::{ScrollDamage, ScrollKind, ViewPos};
use crate::terminal::Terminal;

use super::buffer::{Buffer, BufferPool};
use super::cell::{render_cell, render_row, RenderContext};
use super::pixels::{Image, PixColor, Rect};
use super::workers::WorkerPool;

/// Cursor cell rendered last frame, kept so the next frame can erase
/// the decoration without redrawing the whole row.
struct LastCursor {
    /// Ring index of the row the cursor cell lives in.
    ring_row: usize,
    col: u16,
    in_view: ViewPos,
    /// Offset-relative cursor position at render time, for movement
    /// detection.
    actual: (u16, u16),
}

pub struct Renderer {
    pool: BufferPool,
    workers: WorkerPool,
    frame_callback_pending: bool,
    last_buf: Option<BufferId>,
    was_flashing: bool,
    last_cursor: Option<LastCursor>,
}

impl Renderer {
    pub fn new(worker_count: usize) -> Result<Self, Error> {
        Ok(Self {
            pool: BufferPool::new(),
            workers: WorkerPool::spawn(worker_count)?,
            frame_callback_pending: false,
            last_buf: None,
            was_flashing: false,
            last_cursor: None,
        })
    }

    pub fn from_config(config: &crate::config::SquallConfig) -> Result<Self, Error> {
        Self::new(config.terminal.render_workers)
    }

    /// Request a frame. Dropped silently while a frame callback is
    /// pending; the callback will re-enter the renderer.
    pub fn refresh(&mut self, term: &mut Terminal, surface: &mut dyn WindowSurface) {
        if !self.frame_callback_pending {
            self.grid_render(term, surface);
        }
    }

    /// The compositor's frame callback fired.
    pub fn frame_done(&mut self, term: &mut Terminal, surface: &mut dyn WindowSurface) {
        self.frame_callback_pending = false;
        self.grid_render(term, surface);
    }

    /// The compositor released a buffer; it becomes reusable.
    pub fn buffer_released(&mut self, id: BufferId) {
        self.pool.release(id);
    }

    /// Whether a frame callback is outstanding.
    pub fn awaiting_frame(&self) -> bool {
        self.frame_callback_pending
    }

    pub fn set_title(&self, surface: &mut dyn WindowSurface, title: &str) {
        surface.set_title(title);
    }

    /// Pixel-buffer inspection between frames.
    pub fn buffer(&self, id: BufferId) -> Option<&std::rc::Rc<Buffer>> {
        self.pool.get(id)
    }

    fn grid_render(&mut self, term: &mut Terminal, surface: &mut dyn WindowSurface) {
        debug_assert!(term.width > 0 && term.height > 0);

        let buf = match self.pool.acquire(term.width, term.height) {
            Ok(buf) => buf,
            Err(Error::BufferUnavailable { width, height }) => {
                tracing::warn!("no buffer for {width}x{height}; skipping frame");
                return;
            }
            Err(e) => {
                tracing::warn!("buffer acquisition failed: {e}; skipping frame");
                return;
            }
        };
        let pix = buf.image();

        let ctx = Arc::new(RenderContext::from_term(term));
        let cw = term.cell_width;
        let ch = term.cell_height;

        let mut all_clean = term.grid().scroll_damage.is_empty();

        /* Erase old cursor (if we rendered a cursor last time) */
        if let Some(last) = self.last_cursor.take() {
            let ring_row = last.ring_row;
            if let Some(row) = term.grid_mut().row_at_mut(ring_row) {
                let cell = &mut row.cells[last.col as usize];
                if cell.is_clean() {
                    cell.clear_clean();
                    render_cell(&ctx, pix, cell, last.col, last.in_view.row, false);

                    surface.damage(
                        last.col as i32 * cw,
                        last.in_view.row as i32 * ch,
                        cw,
                        ch,
                    );
                }
            }

            if last.actual != (term.cursor.col, term.cursor.row) {
                /* The cursor moved; cells it merely passed through
                 * don't get dirtied, only the final cell matters. */
                all_clean = false;
            }
        }

        if term.flash.active {
            term.damage_view();
        }

        /* Window resized, flashing, or flash just ended */
        if self.last_buf != Some(buf.id()) || term.flash.active || self.was_flashing {
            tracing::debug!("new buffer");

            /* Fill area outside the cell grid with the default background */
            let rmargin = term.cols as i32 * cw;
            let bmargin = term.rows as i32 * ch;
            let rmargin_width = term.width - rmargin;
            let bmargin_height = term.height - bmargin;

            let bg_rgb = if !term.reverse {
                term.colors.bg
            } else {
                term.colors.fg
            };
            let bg = PixColor::from_rgb_alpha(bg_rgb, term.colors.alpha);

            pix.fill_rect(bg, Rect::new(rmargin, 0, rmargin_width, term.height));
            pix.fill_rect(bg, Rect::new(0, bmargin, term.width, bmargin_height));

            surface.damage(rmargin, 0, rmargin_width, term.height);
            surface.damage(0, bmargin, term.width, bmargin_height);

            /* Force a full grid refresh */
            term.damage_view();

            self.last_buf = Some(buf.id());
            self.was_flashing = term.flash.active;
        }

        while let Some(dmg) = term.grid_mut().scroll_damage.pop_front() {
            apply_scroll_damage(pix, surface, &dmg, ch);
        }

        if self.workers.count() > 0 {
            self.workers.begin_frame(Arc::clone(&ctx), pix);

            for r in 0..term.rows {
                let Some(row) = term.grid_mut().take_row_if_dirty(r) else {
                    continue;
                };

                self.workers.submit(r, row);
                all_clean = false;

                surface.damage(0, r as i32 * ch, term.width, ch);
            }

            for (r, row) in self.workers.finish_frame() {
                term.grid_mut().restore_row_in_view(r, row);
            }
        } else {
            for r in 0..term.rows {
                let grid = term.grid_mut();
                let row = grid.row_in_view_mut(r);
                if !row.dirty {
                    continue;
                }

                render_row(&ctx, pix, row, r);
                row.dirty = false;
                all_clean = false;

                surface.damage(0, r as i32 * ch, term.width, ch);
            }
        }

        if ctx.blink_requested() && !term.blink.active {
            term.blink.arm();
        }

        if term.blink.active {
            /* Check if there are still any visible blinking cells */
            let none_is_blinking = (0..term.rows).all(|r| {
                term.grid()
                    .row_in_view(r)
                    .cells
                    .iter()
                    .all(|cell| !cell.attrs.contains(CellAttrs::BLINK))
            });

            /* No, disarm the blink timer */
            if none_is_blinking {
                term.blink.disarm();
            }
        }

        /*
         * Determine if we need to render a cursor or not. The cursor
         * could be hidden, or scrolled out of view.
         */
        let grid = term.grid();
        let num_rows = grid.num_rows;
        let view = grid.view;
        let view_end = (view + term.rows as usize - 1) % num_rows;
        let cursor_row = (grid.offset + term.cursor.row as usize) % num_rows;

        let cursor_is_visible = if view_end >= view {
            /* Not wrapped */
            cursor_row >= view && cursor_row <= view_end
        } else {
            /* Wrapped */
            cursor_row >= view || cursor_row <= view_end
        };

        if cursor_is_visible && !term.hide_cursor {
            /* Remember cursor coordinates so we can erase it next
             * frame; they must be re-aligned against the view. */
            let view_aligned_row = ((cursor_row + num_rows - view) % num_rows) as u16;
            let col = term.cursor.col;
            let actual = (term.cursor.col, term.cursor.row);

            let row = term.grid_mut().row_in_view_mut(view_aligned_row);
            let cell = &mut row.cells[col as usize];
            cell.clear_clean();

            let cols_updated = render_cell(&ctx, pix, cell, col, view_aligned_row, true);

            self.last_cursor = Some(LastCursor {
                ring_row: cursor_row,
                col,
                in_view: ViewPos {
                    col,
                    row: view_aligned_row,
                },
                actual,
            });

            surface.damage(
                col as i32 * cw,
                view_aligned_row as i32 * ch,
                cols_updated as i32 * cw,
                ch,
            );
        }

        if ctx.blink_requested() && !term.blink.active {
            term.blink.arm();
        }

        if all_clean {
            buf.set_busy(false);
            return;
        }

        if term.flash.active {
            /* Alpha is pre-multiplied into each color component */
            pix.fill_rect_over(
                PixColor {
                    red: 0x7fff,
                    green: 0x7fff,
                    blue: 0,
                    alpha: 0x7fff,
                },
                Rect::new(0, 0, term.width, term.height),
            );

            surface.damage(0, 0, term.width, term.height);
        }

        debug_assert!(term.grid().offset < term.grid().num_rows);
        debug_assert!(term.grid().view < term.grid().num_rows);

        surface.attach(buf.id());

        debug_assert!(!self.frame_callback_pending);
        self.frame_callback_pending = true;
        surface.request_frame();

        surface.set_buffer_scale(term.scale);
        surface.commit();
    }

    /// Handle a window geometry change: recompute the grid dimensions,
    /// rebuild both grids (columns truncated, no reflow) and schedule
    /// a full repaint.
    pub fn resize(
        &mut self,
        term: &mut Terminal,
        surface: &mut dyn WindowSurface,
        width: i32,
        height: i32,
        scale: i32,
    ) {
        if width == 0 && height == 0 {
            /* Not fully up and running yet */
            return;
        }

        if width == term.width && height == term.height && scale == term.scale {
            return;
        }

        term.width = width;
        term.height = height;
        term.scale = scale;

        let new_cols = ((width / term.cell_width).max(1)) as u16;
        let new_rows = ((height / term.cell_height).max(1)) as u16;

        term.resize_grids(new_cols, new_rows);

        self.last_cursor = None;

        term.damage_view();
        self.refresh(term, surface);
    }
}

fn apply_scroll_damage(
    pix: Image,
    surface: &mut dyn WindowSurface,
    dmg: &ScrollDamage,
    cell_height: i32,
) {
    let (dst_y, src_y) = match dmg.kind {
        ScrollKind::Scroll => (
            dmg.region.start as i32 * cell_height,
            (dmg.region.start + dmg.lines) as i32 * cell_height,
        ),
        ScrollKind::ScrollReverse => (
            (dmg.region.start + dmg.lines) as i32 * cell_height,
            dmg.region.start as i32 * cell_height,
        ),
    };

    let height =
        (dmg.region.end as i32 - dmg.region.start as i32 - dmg.lines as i32) * cell_height;

    tracing::debug!(
        "damage: {:?}: {}-{} by {} lines (dst-y: {dst_y}, src-y: {src_y}, height: {height})",
        dmg.kind,
        dmg.region.start,
        dmg.region.end,
        dmg.lines,
    );

    if height > 0 {
        pix.shift_rows(dst_y, src_y, height);
        surface.damage(0, dst_y, pix.width(), height);
    }
}
