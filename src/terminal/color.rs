use serde::{Deserialize, Serialize};

/// Bit set on a packed color when the user has configured it; the low
/// 24 bits hold the RGB value.
pub const COLOR_CONFIGURED: u32 = 1 << 31;

/// True if a packed optional color carries a configured value.
pub fn color_is_set(color: u32) -> bool {
    color >> 31 != 0
}

/// Strip the configured-flag, leaving the 24-bit RGB value.
pub fn color_rgb(color: u32) -> u32 {
    color & 0x00ff_ffff
}

/// Terminal-wide color state: default foreground/background, surface
/// alpha, and the optional cursor color pair.
///
/// `cursor_text` and `cursor_cursor` use the high-bit sentinel: both
/// are either configured together or not at all.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub fg: u32,
    pub bg: u32,
    pub alpha: u16,
    pub cursor_text: u32,
    pub cursor_cursor: u32,
}

impl Default for Palette {
    fn default() -> Self {
        ColorConfig::default().to_palette()
    }
}

/// User-facing color configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorConfig {
    pub foreground: u32,
    pub background: u32,
    /// Surface alpha, 0 (transparent) to 0xffff (opaque).
    pub alpha: u16,
    pub cursor_foreground: Option<u32>,
    pub cursor_background: Option<u32>,
}

impl Default for ColorConfig {
    fn default() -> Self {
        // Tokyo Night bright white on near-black.
        Self {
            foreground: 0xc0caf5,
            background: 0x15161e,
            alpha: 0xffff,
            cursor_foreground: None,
            cursor_background: None,
        }
    }
}

impl ColorConfig {
    pub fn to_palette(&self) -> Palette {
        // The cursor color pair only takes effect when both halves are
        // configured; a lone half falls back to cell colors.
        let (cursor_text, cursor_cursor) =
            match (self.cursor_foreground, self.cursor_background) {
                (Some(text), Some(cursor)) => (
                    COLOR_CONFIGURED | (text & 0x00ff_ffff),
                    COLOR_CONFIGURED | (cursor & 0x00ff_ffff),
                ),
                _ => (0, 0),
            };

        Palette {
            fg: self.foreground & 0x00ff_ffff,
            bg: self.background & 0x00ff_ffff,
            alpha: self.alpha,
            cursor_text,
            cursor_cursor,
        }
    }
}
