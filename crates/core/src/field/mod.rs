//! The raw cloud pattern: fractal tile generation and wind-driven advection

pub mod advection;
pub mod pattern;
pub(crate) mod tile;

pub use advection::{AdvectStats, WindState};
pub use pattern::{CloudField, Pattern};
