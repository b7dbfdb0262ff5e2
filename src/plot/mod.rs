//! Plot rendering: terminal ASCII grids and SVG files.

pub mod ascii;
pub mod svg;

pub use ascii::*;
pub use svg::*;
