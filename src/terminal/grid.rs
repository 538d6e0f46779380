use std::collections::VecDeque;

use super::cursor::CellAttrs;

/// Position of a cell relative to the current view: row 0 is the top
/// of what the user sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewPos {
    pub col: u16,
    pub row: u16,
}

/// Position of a cell in absolute row space: the view cursor plus the
/// view-relative row, *not* reduced modulo the ring length. Reduce
/// with `% num_rows` when indexing the ring. `col == -1` serves as the
/// inactive sentinel in selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsPos {
    pub col: i32,
    pub row: i32,
}

/// A single terminal cell: one codepoint plus attributes and the
/// optional per-cell color pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub wc: char,
    pub attrs: CellAttrs,
    pub fg: u32,
    pub bg: u32,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            wc: '\0',
            attrs: CellAttrs::empty(),
            fg: 0,
            bg: 0,
        }
    }
}

impl Cell {
    pub fn is_clean(&self) -> bool {
        self.attrs.contains(CellAttrs::CLEAN)
    }

    /// Renderer-only: record that the cell's pixels match its state.
    pub fn mark_clean(&mut self) {
        self.attrs.insert(CellAttrs::CLEAN);
    }

    pub fn clear_clean(&mut self) {
        self.attrs.remove(CellAttrs::CLEAN);
    }

    pub fn set_char(&mut self, wc: char) {
        self.wc = wc;
        self.clear_clean();
    }

    /// Replace the logical attributes, preserving nothing; the clean
    /// bit is dropped with the rest.
    pub fn set_attrs(&mut self, attrs: CellAttrs) {
        self.attrs = attrs - CellAttrs::CLEAN;
    }

    pub fn set_attr(&mut self, attr: CellAttrs, value: bool) {
        self.attrs.set(attr, value);
        self.clear_clean();
    }

    pub fn set_fg(&mut self, rgb: u32) {
        self.fg = rgb & 0x00ff_ffff;
        self.attrs.insert(CellAttrs::HAVE_FG);
        self.clear_clean();
    }

    pub fn set_bg(&mut self, rgb: u32) {
        self.bg = rgb & 0x00ff_ffff;
        self.attrs.insert(CellAttrs::HAVE_BG);
        self.clear_clean();
    }

    /// Reset to the default blank state.
    pub fn erase(&mut self) {
        *self = Self::default();
    }
}

/// A single row of cells plus damage bookkeeping.
///
/// `linebreak` is true when the row ends with a hard newline rather
/// than a wrap; the URL scanner uses it to decide whether a URL may
/// continue onto the next row.
#[derive(Debug, Clone)]
pub struct Row {
    pub cells: Vec<Cell>,
    pub dirty: bool,
    pub linebreak: bool,
}

impl Row {
    pub fn new(cols: u16) -> Self {
        Self {
            cells: vec![Cell::default(); cols as usize],
            dirty: true,
            linebreak: false,
        }
    }

    pub fn erase(&mut self) {
        for cell in &mut self.cells {
            cell.erase();
        }
        self.linebreak = false;
        self.dirty = true;
    }
}

/// Direction of a pending scroll realized as a pixel memmove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollKind {
    Scroll,
    ScrollReverse,
}

/// Half-open row range `[start, end)` in view-relative rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollRegion {
    pub start: u16,
    pub end: u16,
}

/// A region-local scroll recorded by the grid mutator, translated by
/// the frame orchestrator into a memmove within the pixel buffer
/// instead of a per-cell redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollDamage {
    pub kind: ScrollKind,
    pub region: ScrollRegion,
    pub lines: u16,
}

/// Ring-buffered row storage for one screen.
///
/// `offset` is the logical top of the live screen, `view` the top of
/// what the user currently sees (they differ while scrolled back);
/// both are kept in `[0, num_rows)`. Rows are allocated lazily:
/// positions inside the view are always populated, scrollback slots
/// fill in as the embedding parser scrolls.
pub struct Grid {
    rows: Vec<Option<Row>>,
    pub num_rows: usize,
    pub num_cols: u16,
    pub offset: usize,
    pub view: usize,
    pub scroll_damage: VecDeque<ScrollDamage>,
}

impl Grid {
    /// Create a grid of `num_rows` ring slots with `visible_rows`
    /// rows allocated starting at view position 0.
    pub fn new(num_rows: usize, visible_rows: u16, cols: u16) -> Self {
        let mut rows: Vec<Option<Row>> = Vec::with_capacity(num_rows);
        rows.resize_with(num_rows, || None);

        for r in 0..visible_rows as usize {
            rows[r % num_rows] = Some(Row::new(cols));
        }

        Self {
            rows,
            num_rows,
            num_cols: cols,
            offset: 0,
            view: 0,
            scroll_damage: VecDeque::new(),
        }
    }

    fn view_index(&self, r: u16) -> usize {
        (self.view + r as usize) % self.num_rows
    }

    /// The row at view position `r`.
    ///
    /// In-view rows are always allocated; a missing row is a broken
    /// grid invariant.
    pub fn row_in_view(&self, r: u16) -> &Row {
        let idx = self.view_index(r);
        self.rows[idx].as_ref().expect("in-view row not allocated")
    }

    pub fn row_in_view_mut(&mut self, r: u16) -> &mut Row {
        let idx = self.view_index(r);
        let cols = self.num_cols;
        self.rows[idx].get_or_insert_with(|| Row::new(cols))
    }

    /// The row at ring index `idx`, if allocated.
    pub fn row_at(&self, idx: usize) -> Option<&Row> {
        self.rows[idx % self.num_rows].as_ref()
    }

    pub fn row_at_mut(&mut self, idx: usize) -> Option<&mut Row> {
        let idx = idx % self.num_rows;
        self.rows[idx].as_mut()
    }

    /// Move a dirty in-view row out of the grid for worker rendering,
    /// clearing its dirty flag. Returns `None` if the row is clean.
    pub fn take_row_if_dirty(&mut self, r: u16) -> Option<Row> {
        let idx = self.view_index(r);
        if !self.rows[idx].as_ref().is_some_and(|row| row.dirty) {
            return None;
        }

        let mut row = self.rows[idx].take();
        if let Some(row) = row.as_mut() {
            row.dirty = false;
        }
        row
    }

    /// Hand a row back after worker rendering.
    pub fn restore_row_in_view(&mut self, r: u16, row: Row) {
        let idx = self.view_index(r);
        self.rows[idx] = Some(row);
    }

    /// Translate a view position into absolute row space.
    pub fn abs_pos(&self, pos: ViewPos) -> AbsPos {
        AbsPos {
            col: pos.col as i32,
            row: pos.row as i32 + self.view as i32,
        }
    }

    /// Move the view, allocating any rows scrolled into sight.
    pub fn set_view(&mut self, view: usize, visible_rows: u16) {
        self.view = view % self.num_rows;
        for r in 0..visible_rows {
            self.row_in_view_mut(r);
        }
    }

    /// Record a region-local scroll to be realized as a pixel-level
    /// memmove by the next frame. Does not move any cell data.
    pub fn emit_scroll_damage(&mut self, kind: ScrollKind, region: ScrollRegion, lines: u16) {
        self.scroll_damage.push_back(ScrollDamage {
            kind,
            region,
            lines,
        });
    }

    /// Resize the ring to `new_num_rows` slots of `new_cols` columns,
    /// with `visible_rows` rows allocated in view.
    ///
    /// Surviving rows are copied slot-aligned with columns truncated
    /// to `min(old, new)`; there is no reflow of logical lines. The
    /// `offset` and `view` cursors are reduced modulo the new length.
    pub fn resize(&mut self, new_cols: u16, visible_rows: u16, new_num_rows: usize) {
        self.offset %= new_num_rows;
        self.view %= new_num_rows;

        let mut rows: Vec<Option<Row>> = Vec::with_capacity(new_num_rows);
        rows.resize_with(new_num_rows, || None);

        for r in 0..visible_rows as usize {
            rows[(self.view + r) % new_num_rows] = Some(Row::new(new_cols));
        }

        let copy_cols = self.num_cols.min(new_cols) as usize;
        for r in 0..new_num_rows.min(self.num_rows) {
            let Some(old) = self.rows[r].as_ref() else {
                continue;
            };

            let row = rows[r].get_or_insert_with(|| Row::new(new_cols));
            row.dirty = old.dirty;
            row.linebreak = old.linebreak;
            row.cells[..copy_cols].clone_from_slice(&old.cells[..copy_cols]);
            for cell in &mut row.cells[copy_cols..] {
                *cell = Cell::default();
            }
        }

        self.rows = rows;
        self.num_rows = new_num_rows;
        self.num_cols = new_cols;
    }

    /// Write a character at a view position, for the embedding parser.
    pub fn set_char(&mut self, pos: ViewPos, wc: char) {
        if pos.col >= self.num_cols {
            return;
        }
        let row = self.row_in_view_mut(pos.row);
        row.cells[pos.col as usize].set_char(wc);
        row.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_mutators_clear_clean() {
        let mut cell = Cell::default();
        cell.mark_clean();
        assert!(cell.is_clean());

        cell.set_char('x');
        assert!(!cell.is_clean());

        cell.mark_clean();
        cell.set_fg(0xff0000);
        assert!(!cell.is_clean());
        assert!(cell.attrs.contains(CellAttrs::HAVE_FG));

        cell.mark_clean();
        cell.set_attr(CellAttrs::BOLD, true);
        assert!(!cell.is_clean());

        cell.mark_clean();
        cell.erase();
        assert!(!cell.is_clean());
    }

    #[test]
    fn set_attrs_never_smuggles_clean() {
        let mut cell = Cell::default();
        cell.set_attrs(CellAttrs::BOLD | CellAttrs::CLEAN);
        assert!(cell.attrs.contains(CellAttrs::BOLD));
        assert!(!cell.is_clean());
    }

    #[test]
    fn row_in_view_follows_view_cursor() {
        let mut grid = Grid::new(8, 4, 10);
        grid.row_in_view_mut(0).cells[0].set_char('a');

        grid.set_view(2, 4);
        grid.row_in_view_mut(0).cells[0].set_char('b');

        assert_eq!(grid.row_at(2).unwrap().cells[0].wc, 'b');
        assert_eq!(grid.row_at(0).unwrap().cells[0].wc, 'a');

        // Wrapped view positions land back at the ring start.
        grid.set_view(6, 4);
        grid.row_in_view_mut(3).cells[0].set_char('c');
        assert_eq!(grid.row_at(1).unwrap().cells[0].wc, 'c');
    }

    #[test]
    fn scroll_damage_is_fifo() {
        let mut grid = Grid::new(4, 4, 10);
        grid.emit_scroll_damage(
            ScrollKind::Scroll,
            ScrollRegion { start: 0, end: 4 },
            1,
        );
        grid.emit_scroll_damage(
            ScrollKind::ScrollReverse,
            ScrollRegion { start: 1, end: 3 },
            2,
        );

        let first = grid.scroll_damage.pop_front().unwrap();
        assert_eq!(first.kind, ScrollKind::Scroll);
        assert_eq!(first.lines, 1);

        let second = grid.scroll_damage.pop_front().unwrap();
        assert_eq!(second.kind, ScrollKind::ScrollReverse);
        assert_eq!(second.region, ScrollRegion { start: 1, end: 3 });
    }

    #[test]
    fn resize_truncates_columns_and_remodulos_cursors() {
        let mut grid = Grid::new(16, 4, 8);
        grid.offset = 13;
        grid.view = 13;

        for c in 0..8u16 {
            grid.row_in_view_mut(0).cells[c as usize]
                .set_char((b'a' + c as u8) as char);
        }

        grid.resize(4, 4, 8);

        assert!(grid.offset < 8, "offset in [0, num_rows)");
        assert!(grid.view < 8, "view in [0, num_rows)");
        assert_eq!(grid.num_cols, 4);

        // Slot 13 held the written row; slot-aligned copy means it did
        // not survive the shrink from 16 to 8 slots. The view rows are
        // freshly allocated at the remodulo'd view position.
        let row = grid.row_in_view(0);
        assert_eq!(row.cells.len(), 4);
    }

    #[test]
    fn resize_copies_surviving_rows_column_truncated() {
        let mut grid = Grid::new(8, 4, 8);
        for c in 0..8u16 {
            grid.row_in_view_mut(1).cells[c as usize]
                .set_char((b'0' + c as u8) as char);
        }
        grid.row_in_view_mut(1).linebreak = true;

        grid.resize(5, 4, 8);

        let row = grid.row_in_view(1);
        let text: String = row.cells.iter().map(|c| c.wc).collect();
        assert_eq!(text, "01234");
        assert!(row.linebreak);

        grid.resize(7, 4, 8);
        let row = grid.row_in_view(1);
        assert_eq!(row.cells[4].wc, '4');
        assert_eq!(row.cells[5].wc, '\0', "grown columns are blank");
    }

    #[test]
    fn take_and_restore_dirty_rows() {
        let mut grid = Grid::new(4, 4, 10);
        grid.row_in_view_mut(2).dirty = true;
        grid.row_in_view_mut(1).dirty = false;

        assert!(grid.take_row_if_dirty(1).is_none());
        let row = grid.take_row_if_dirty(2).expect("row 2 is dirty");
        assert!(!row.dirty, "dirty flag cleared on take");

        grid.restore_row_in_view(2, row);
        assert!(!grid.row_in_view(2).dirty);
    }
}
