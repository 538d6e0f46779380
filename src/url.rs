//! URL detection and hint mode.
//!
//! Entering URL mode scans the visible grid for URL-looking text,
//! assigns each hit a short typable hint key, tags the underlying
//! cells for highlight and opens one overlay subsurface per URL.
//! Keystrokes then narrow the hint prefix until a single URL matches,
//! which is copied to the clipboard or launched.

use std::collections::VecDeque;
use std::process::Stdio;

use serde::{Deserialize, Serialize};

use crate::compositor::WindowSurface;
use crate::render::Renderer;
use crate::terminal::cursor::CellAttrs;
use crate::terminal::grid::AbsPos;
use crate::terminal::Terminal;

/// What activating a URL does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlAction {
    Copy,
    Launch,
}

/// A detected URL. `start`/`end` are inclusive cell coordinates in
/// absolute (view-translated) row space.
#[derive(Debug, Clone, PartialEq)]
pub struct Url {
    pub url: String,
    pub key: String,
    pub start: AbsPos,
    pub end: AbsPos,
    pub action: UrlAction,
}

/// A URL-mode input event, pre-digested by the key binding layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlEvent {
    Key(char),
    Backspace,
    Cancel,
}

const PROTOCOLS: &[&str] = &[
    "http://",
    "https://",
    "ftp://",
    "ftps://",
    "file://",
    "gemini://",
    "gopher://",
];

fn is_url_char(wc: char) -> bool {
    matches!(wc,
        'a'..='z' | 'A'..='Z' | '0'..='9'
        | '-' | '.' | '_' | '~' | ':' | '/' | '?' | '#' | '@' | '!'
        | '$' | '&' | '\'' | '*' | '+' | ',' | ';' | '=' | '"' | '%')
}

fn is_trim_char(wc: char) -> bool {
    matches!(wc, '.' | ',' | ':' | ';' | '?' | '!' | '"' | '\'' | '%')
}

/// Scan the visible grid for URLs, in reading order.
pub fn urls_collect(term: &Terminal, action: UrlAction) -> Vec<Url> {
    debug_assert!(term.urls.is_empty());

    let mut urls = Vec::new();
    auto_detect(term, action, &mut urls);
    urls
}

#[derive(Clone, Copy, PartialEq)]
enum ScanState {
    Protocol,
    Url,
}

fn auto_detect(term: &Terminal, action: UrlAction, urls: &mut Vec<Url>) {
    let max_prot_len = PROTOCOLS.iter().map(|p| p.len()).max().unwrap_or(0);
    let cols = term.cols as i32;
    let view = term.grid().view as i32;

    // Sliding window of the last `max_prot_len` codepoints with the
    // coordinate each was seen at.
    let mut window: VecDeque<(char, (u16, u16))> = VecDeque::with_capacity(max_prot_len);

    let mut state = ScanState::Protocol;
    let mut start = (0u16, 0u16);
    let mut url: Vec<char> = Vec::new();
    let mut parenthesis: i32 = 0;
    let mut brackets: i32 = 0;

    for r in 0..term.rows {
        let row = term.grid().row_in_view(r);

        for c in 0..term.cols {
            let wc = row.cells[c as usize].wc;

            match state {
                ScanState::Protocol => {
                    window.push_back((wc, (c, r)));
                    if window.len() > max_prot_len {
                        window.pop_front();
                    }

                    for prot in PROTOCOLS {
                        let prot_len = prot.len();
                        if window.len() < prot_len {
                            continue;
                        }

                        let tail = window.len() - prot_len;
                        let matches = window
                            .iter()
                            .skip(tail)
                            .zip(prot.chars())
                            .all(|((seen, _), want)| seen.eq_ignore_ascii_case(&want));

                        if matches {
                            state = ScanState::Url;
                            start = window[tail].1;

                            // Seed with the characters as displayed,
                            // preserving their case.
                            url.clear();
                            url.extend(window.iter().skip(tail).map(|(seen, _)| *seen));

                            parenthesis = 0;
                            brackets = 0;
                            break;
                        }
                    }
                }

                ScanState::Url => {
                    let mut emit_url = false;

                    match wc {
                        _ if is_url_char(wc) => url.push(wc),

                        '(' => {
                            parenthesis += 1;
                            url.push(wc);
                        }

                        '[' => {
                            brackets += 1;
                            url.push(wc);
                        }

                        ')' => {
                            parenthesis -= 1;
                            if parenthesis < 0 {
                                emit_url = true;
                            } else {
                                url.push(wc);
                            }
                        }

                        ']' => {
                            brackets -= 1;
                            if brackets < 0 {
                                emit_url = true;
                            } else {
                                url.push(wc);
                            }
                        }

                        _ => emit_url = true,
                    }

                    if c >= term.cols - 1 && row.linebreak {
                        emit_url = true;
                    }

                    if emit_url {
                        /* Trim trailing characters that are valid URL
                         * characters, but typically not at the end of
                         * one */
                        let mut end = (c as i32, r as i32);
                        end.0 -= 1;
                        if end.0 < 0 {
                            end.1 -= 1;
                            end.0 = cols - 1;
                        }

                        while url.last().copied().is_some_and(is_trim_char) {
                            url.pop();
                            end.0 -= 1;
                            if end.0 < 0 {
                                end.1 -= 1;
                                end.0 = cols - 1;
                            }
                        }

                        urls.push(Url {
                            url: url.iter().collect(),
                            key: String::new(),
                            start: AbsPos {
                                col: start.0 as i32,
                                row: start.1 as i32 + view,
                            },
                            end: AbsPos {
                                col: end.0,
                                row: end.1 + view,
                            },
                            action,
                        });

                        state = ScanState::Protocol;
                        url.clear();
                        parenthesis = 0;
                        brackets = 0;
                    }
                }
            }
        }
    }
}

/* vimium default */
const HINT_ALPHABET: &str = "sadfjklewcmpgh";

/// Generate `count` hint keys over the hint alphabet, breadth-first.
///
/// Candidates are built with the newest letter *prepended*, then the
/// emitted slice is sorted and each string reversed; sorting the
/// reversed strings is a deliberate shuffle that spreads the common
/// starting letters.
fn generate_key_combos(count: usize) -> Vec<String> {
    let alphabet: Vec<char> = HINT_ALPHABET.chars().collect();

    let mut hints: Vec<String> = vec![String::new()];
    let mut offset = 0;

    loop {
        let prefix = hints[offset].clone();
        offset += 1;

        for &wc in &alphabet {
            let mut hint = String::with_capacity(prefix.len() + 1);
            hint.push(wc);
            hint.push_str(&prefix);
            hints.push(hint);
        }

        if hints.len() - offset >= count {
            break;
        }
    }

    let mut combos: Vec<String> = hints[offset..offset + count].to_vec();
    combos.sort();

    for combo in &mut combos {
        *combo = combo.chars().rev().collect();
    }

    combos
}

/// Assign hint keys to the collected URLs in iteration order.
pub fn urls_assign_key_combos(urls: &mut [Url]) {
    if urls.is_empty() {
        return;
    }

    let combos = generate_key_combos(urls.len());
    for (url, key) in urls.iter_mut().zip(combos) {
        url.key = key;
        tracing::debug!("URL: {} ({})", url.url, url.key);
    }
}

/// Outcome of feeding one keypress into the hint matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyMatch {
    Activate(usize),
    Extend,
    Ignore,
}

/// Determine whether `wc` is a valid next key: some URL's hint must
/// continue the typed sequence with it. An exact-length match
/// activates that URL.
pub(crate) fn match_url_key(urls: &[Url], seq: &str, wc: char) -> KeyMatch {
    let seq_len = seq.chars().count();
    let mut is_valid = false;

    for (idx, url) in urls.iter().enumerate() {
        let key: Vec<char> = url.key.chars().collect();

        if key.len() >= seq_len + 1 && url.key.starts_with(seq) && key[seq_len] == wc {
            is_valid = true;
            if key.len() == seq_len + 1 {
                return KeyMatch::Activate(idx);
            }
        }
    }

    if is_valid {
        KeyMatch::Extend
    } else {
        KeyMatch::Ignore
    }
}

/// Enter URL mode: collect, assign hints, tag cells and open the
/// overlay surfaces.
pub fn urls_enter(
    term: &mut Terminal,
    renderer: &mut Renderer,
    surface: &mut dyn WindowSurface,
    action: UrlAction,
) {
    let mut urls = urls_collect(term, action);
    urls_assign_key_combos(&mut urls);
    term.urls = urls;

    urls_render(term, renderer, surface);
}

/// Feed one URL-mode input event.
pub fn urls_input(
    term: &mut Terminal,
    renderer: &mut Renderer,
    surface: &mut dyn WindowSurface,
    event: UrlEvent,
) {
    match event {
        UrlEvent::Cancel => urls_reset(term, renderer, surface),

        UrlEvent::Backspace => {
            if term.url_keys.pop().is_some() {
                renderer.refresh(term, surface);
            }
        }

        UrlEvent::Key(wc) => match match_url_key(&term.urls, &term.url_keys, wc) {
            KeyMatch::Activate(idx) => {
                let url = term.urls[idx].clone();
                activate_url(term, &url);
                urls_reset(term, renderer, surface);
            }
            KeyMatch::Extend => {
                term.url_keys.push(wc);
                renderer.refresh(term, surface);
            }
            KeyMatch::Ignore => {}
        },
    }
}

/// Leave URL mode: destroy overlays, untag cells, clear input state.
pub fn urls_reset(term: &mut Terminal, renderer: &mut Renderer, surface: &mut dyn WindowSurface) {
    if term.urls.is_empty() {
        return;
    }

    for overlay in term.url_overlays.drain(..) {
        surface.destroy_overlay(overlay);
    }

    let urls = std::mem::take(&mut term.urls);
    for url in &urls {
        tag_cells(term, url.start, url.end, false);
    }

    term.url_keys.clear();
    renderer.refresh(term, surface);
}

fn urls_render(term: &mut Terminal, renderer: &mut Renderer, surface: &mut dyn WindowSurface) {
    if term.urls.is_empty() {
        return;
    }

    debug_assert!(term.url_overlays.is_empty());

    for _ in 0..term.urls.len() {
        match surface.create_url_overlay() {
            Some(overlay) => term.url_overlays.push(overlay),
            None => tracing::warn!("failed to create URL (sub)surface"),
        }
    }

    let urls = std::mem::take(&mut term.urls);
    for url in &urls {
        tag_cells(term, url.start, url.end, true);
    }
    term.urls = urls;

    renderer.refresh(term, surface);
}

/// Walk the cells from `start` to `end` (inclusive, wrapping across
/// rows) setting or clearing the URL highlight attribute.
fn tag_cells(term: &mut Terminal, start: AbsPos, end: AbsPos, value: bool) {
    let grid = term.grid_mut();
    let num_rows = grid.num_rows;
    let cols = grid.num_cols as usize;

    let end_r = (end.row.rem_euclid(num_rows as i32)) as usize;
    let end_c = end.col.max(0) as usize;

    let mut r = (start.row.rem_euclid(num_rows as i32)) as usize;
    let mut c = start.col.max(0) as usize;

    'rows: loop {
        let Some(row) = grid.row_at_mut(r) else {
            break;
        };
        row.dirty = true;

        loop {
            row.cells[c].set_attr(CellAttrs::URL, value);

            if r == end_r && c == end_c {
                break 'rows;
            }

            c += 1;
            if c >= cols {
                c = 0;
                r = (r + 1) % num_rows;
                break;
            }
        }
    }
}

fn activate_url(term: &Terminal, url: &Url) {
    match url.action {
        UrlAction::Copy => match arboard::Clipboard::new() {
            Ok(mut clipboard) => {
                if let Err(e) = clipboard.set_text(url.url.clone()) {
                    tracing::warn!("failed to copy URL to clipboard: {e}");
                }
            }
            Err(e) => tracing::warn!("clipboard unavailable: {e}"),
        },

        UrlAction::Launch => {
            let argv = expand_template(&term.url_launch, &url.url);
            spawn_detached(&argv);
        }
    }
}

/// Expand the launch template, binding `{url}` to the URL text.
fn expand_template(template: &[String], url: &str) -> Vec<String> {
    template.iter().map(|arg| arg.replace("{url}", url)).collect()
}

/// Spawn the launcher detached, with stdio closed. Reaping is the
/// embedding application's job.
fn spawn_detached(argv: &[String]) {
    let Some((program, args)) = argv.split_first() else {
        tracing::warn!("empty URL launch template");
        return;
    };

    match std::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => tracing::debug!("launched {program} (pid {})", child.id()),
        Err(e) => tracing::warn!("failed to launch {program}: {e}"),
    }
}
