pub mod color;
pub mod cursor;
pub mod grid;
pub mod state;

pub use state::Terminal;
