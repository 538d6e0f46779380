pub mod buffer;
pub mod cell;
pub mod frame;
pub mod pixels;
pub mod workers;

pub use frame::Renderer;
