//! Rendering and view-state core of a Wayland-native terminal
//! emulator.
//!
//! The crate owns the grid model (normal and alternate screens with
//! scrollback), the incremental cell renderer and its worker pool,
//! cursor/damage/blink tracking, URL hint mode, and the display-width
//! classifier. The Wayland connection, shm allocation internals, font
//! rasterization and the PTY/escape parser are external collaborators
//! reached through the seams in [`compositor`], [`font`] and the grid
//! mutation API.
//!
//! Resizing truncates rows to the new column count; logical lines are
//! not reflowed.

pub mod compositor;
pub mod config;
pub mod error;
pub mod font;
pub mod render;
pub mod terminal;
pub mod url;
pub mod width;

#[cfg(test)]
mod testutil;

pub use config::SquallConfig;
pub use error::Error;
pub use render::Renderer;
pub use terminal::Terminal;

/// Install the process-wide tracing subscriber. Call once from the
/// embedding binary before creating any terminal.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "squall=info".into()),
        )
        .init();
}
