//! Display-width classifier for monospace layout.
//!
//! Maps a codepoint to the number of terminal cells it occupies:
//! 0 (combining/format), 1, 2 (East Asian wide, emoji), or -1 for
//! codepoints with no display representation (C0/C1 controls,
//! surrogates, noncharacters).

mod tables;

pub use tables::UcsRange;

use std::cmp::Ordering;

fn in_table(table: &[UcsRange], wc: u32) -> bool {
    // The common ASCII path is rejected by the min/max check alone.
    if wc < table[0].start || wc > table[table.len() - 1].stop {
        return false;
    }

    table
        .binary_search_by(|range| {
            if range.stop < wc {
                Ordering::Less
            } else if range.start > wc {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        })
        .is_ok()
}

/// Number of cells `wc` occupies, or -1 if it is not displayable.
pub fn width(wc: u32) -> i32 {
    if wc == 0 {
        return 0;
    }

    if wc < 0x20 || (0x7f..0xa0).contains(&wc) {
        /* C0/C1/DEL */
        return -1;
    }

    if wc == 0xad {
        /* SOFT HYPHEN. TODO: return 0 instead? */
        return 1;
    }

    if in_table(tables::DOUBLE_WIDTH, wc) {
        return 2;
    }

    if in_table(tables::ZERO_WIDTH, wc) {
        return 0;
    }

    if in_table(tables::INVALID, wc) {
        return -1;
    }

    1
}

/// Width of a single character cell.
pub fn char_width(wc: char) -> i32 {
    width(wc as u32)
}

/// Total display width of the first `n` characters of `s`, stopping at
/// an embedded NUL. Returns -1 if any character is not displayable.
pub fn string_width(s: &str, n: usize) -> i32 {
    let mut total = 0;

    for wc in s.chars().take(n) {
        if wc == '\0' {
            break;
        }

        let w = char_width(wc);
        if w < 0 {
            return -1;
        }
        total += w;
    }

    total
}
