use std::os::fd::RawFd;
use std::sync::Arc;

use crate::compositor::OverlayId;
use crate::config::SquallConfig;
use crate::error::Error;
use crate::font::{FontExtents, FontSet};
use crate::url::Url;

use super::color::Palette;
use super::cursor::{Blink, Cursor, CursorStyle};
use super::grid::{AbsPos, Grid, ScrollRegion};

/// Which grid is live: the alternate screen has no scrollback and is
/// used by full-screen programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveGrid {
    Normal,
    Alt,
}

/// Visual-bell state; while active every frame gets a translucent
/// overlay.
#[derive(Debug, Clone, Copy, Default)]
pub struct Flash {
    pub active: bool,
}

/// A selection span in absolute row coordinates. `col == -1` on either
/// endpoint means no selection.
#[derive(Debug, Clone, Copy)]
pub struct Selection {
    pub start: AbsPos,
    pub end: AbsPos,
}

impl Selection {
    pub fn none() -> Self {
        Self {
            start: AbsPos { col: -1, row: -1 },
            end: AbsPos { col: -1, row: -1 },
        }
    }

    /// Whether the view-relative position `(col, view_row)` falls
    /// within the selection. Endpoints may be given in either order.
    pub fn contains(&self, col: u16, view_row: u16, view: usize) -> bool {
        if self.start.col == -1 || self.end.col == -1 {
            return false;
        }

        let (start, end) = if self.start.row > self.end.row
            || (self.start.row == self.end.row && self.start.col > self.end.col)
        {
            (self.end, self.start)
        } else {
            (self.start, self.end)
        };

        let row = view_row as i32 + view as i32;
        let col = col as i32;

        if start.row == end.row {
            row == start.row && col >= start.col && col <= end.col
        } else if row == start.row {
            col >= start.col
        } else if row == end.row {
            col <= end.col
        } else {
            row >= start.row && row <= end.row
        }
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::none()
    }
}

/// Aggregate view state for one terminal window.
pub struct Terminal {
    pub normal: Grid,
    pub alt: Grid,
    active: ActiveGrid,

    pub cols: u16,
    pub rows: u16,
    pub cell_width: i32,
    pub cell_height: i32,
    pub width: i32,
    pub height: i32,
    pub scale: i32,

    pub fonts: Arc<FontSet>,
    pub fextents: FontExtents,

    pub scroll_region: ScrollRegion,
    pub cursor: Cursor,
    pub cursor_style: CursorStyle,
    pub hide_cursor: bool,
    pub reverse: bool,
    pub colors: Palette,
    pub selection: Selection,
    pub blink: Blink,
    pub flash: Flash,

    pub urls: Vec<Url>,
    pub url_keys: String,
    pub url_overlays: Vec<OverlayId>,
    /// Launch command template; `{url}` expands to the URL text.
    pub url_launch: Vec<String>,

    scrollback: usize,
    pty_fd: Option<RawFd>,
}

impl Terminal {
    pub fn new(
        config: &SquallConfig,
        fonts: Arc<FontSet>,
        width: i32,
        height: i32,
        scale: i32,
    ) -> Result<Self, Error> {
        let cell_width = fonts.cell_width;
        let cell_height = fonts.cell_height;
        let cols = ((width / cell_width).max(1)) as u16;
        let rows = ((height / cell_height).max(1)) as u16;
        let scrollback = config.terminal.scrollback_lines;

        let normal = Grid::new(rows as usize + scrollback, rows, cols);
        let alt = Grid::new(rows as usize, rows, cols);
        let extents = fonts.extents;

        Ok(Self {
            normal,
            alt,
            active: ActiveGrid::Normal,
            cols,
            rows,
            cell_width,
            cell_height,
            width,
            height,
            scale,
            fonts,
            fextents: extents,
            scroll_region: ScrollRegion { start: 0, end: rows },
            cursor: Cursor::default(),
            cursor_style: config.terminal.cursor_style,
            hide_cursor: false,
            reverse: false,
            colors: config.colors.to_palette(),
            selection: Selection::none(),
            blink: Blink::new()?,
            flash: Flash::default(),
            urls: Vec::new(),
            url_keys: String::new(),
            url_overlays: Vec::new(),
            url_launch: config.url.launch.clone(),
            scrollback,
            pty_fd: None,
        })
    }

    pub fn grid(&self) -> &Grid {
        match self.active {
            ActiveGrid::Normal => &self.normal,
            ActiveGrid::Alt => &self.alt,
        }
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        match self.active {
            ActiveGrid::Normal => &mut self.normal,
            ActiveGrid::Alt => &mut self.alt,
        }
    }

    pub fn active_grid(&self) -> ActiveGrid {
        self.active
    }

    /// Switch between the normal and alternate screens; the incoming
    /// grid is fully damaged so the next frame repaints it.
    pub fn select_grid(&mut self, which: ActiveGrid) {
        if self.active != which {
            self.active = which;
            self.damage_view();
        }
    }

    pub fn coord_in_selection(&self, col: u16, view_row: u16) -> bool {
        self.selection.contains(col, view_row, self.grid().view)
    }

    /// Mark every in-view row and cell as needing a redraw.
    pub fn damage_view(&mut self) {
        let rows = self.rows;
        let grid = self.grid_mut();
        for r in 0..rows {
            let row = grid.row_in_view_mut(r);
            row.dirty = true;
            for cell in &mut row.cells {
                cell.clear_clean();
            }
        }
    }

    pub fn set_pty(&mut self, fd: RawFd) {
        self.pty_fd = Some(fd);
    }

    /// Resize both grids to the current pixel dimensions, clamping the
    /// scroll region and cursor and notifying the PTY.
    pub fn resize_grids(&mut self, new_cols: u16, new_rows: u16) {
        let old_rows = self.rows;

        self.normal
            .resize(new_cols, new_rows, new_rows as usize + self.scrollback);
        self.alt.resize(new_cols, new_rows, new_rows as usize);

        self.cols = new_cols;
        self.rows = new_rows;

        tracing::debug!(
            "resize: {}x{} px, grid: cols={} rows={}",
            self.width,
            self.height,
            self.cols,
            self.rows
        );

        self.signal_winsize();

        if self.scroll_region.start >= self.rows {
            self.scroll_region.start = 0;
        }
        if self.scroll_region.end >= old_rows {
            self.scroll_region.end = self.rows;
        }

        self.cursor.row = self.cursor.row.min(self.rows - 1);
        self.cursor.col = self.cursor.col.min(self.cols - 1);
    }

    fn signal_winsize(&self) {
        let Some(fd) = self.pty_fd else {
            return;
        };

        let size = libc::winsize {
            ws_row: self.rows,
            ws_col: self.cols,
            ws_xpixel: self.width as u16,
            ws_ypixel: self.height as u16,
        };

        let ret = unsafe { libc::ioctl(fd, libc::TIOCSWINSZ, &size) };
        if ret < 0 {
            tracing::error!(
                "TIOCSWINSZ: {}",
                std::io::Error::last_os_error()
            );
        }
    }
}
