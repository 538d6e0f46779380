//! The seam to the Wayland compositor.
//!
//! The connection bind-up, shm plumbing and event dispatch live in the
//! embedding application; the core drives a window through this trait:
//! attach/damage/commit on the main surface, frame-callback pacing,
//! and sync'd subsurfaces for URL-hint overlays.
//!
//! The contract mirrors the wl_surface lifecycle: a buffer must not be
//! written between attach and the compositor's release, `damage`
//! coordinates are buffer-local pixels, and `request_frame` registers
//! a one-shot callback that the event loop surfaces by calling
//! [`crate::render::Renderer::frame_done`].

/// Identity of a pooled pixel buffer (stands in for the wl_buffer).
pub type BufferId = u64;

/// Identity of a URL overlay subsurface.
pub type OverlayId = u64;

pub trait WindowSurface {
    fn attach(&mut self, buffer: BufferId);
    fn damage(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn set_buffer_scale(&mut self, scale: i32);
    fn commit(&mut self);
    fn request_frame(&mut self);
    fn set_title(&mut self, title: &str);

    /// Create a sync'd subsurface for one URL hint label. `None` means
    /// the compositor refused; the URL is shown without an overlay.
    fn create_url_overlay(&mut self) -> Option<OverlayId>;
    fn destroy_overlay(&mut self, overlay: OverlayId);
}
