pub mod health;
pub mod predict;

pub use health::*;
pub use predict::*;
