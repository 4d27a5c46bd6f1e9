//! Isosurface mesh extraction
//!
//! The dual-contouring extractor and its supporting pieces: the packed
//! vertex layout and the quadratic-error vertex minimizer.

pub mod extractor;
pub mod qef;
pub mod vertex;

pub use extractor::{extract_chunk, EdgeCrossings, ExtractResult};
pub use vertex::{TerrainIndex, TerrainVertex};

#[cfg(test)]
mod tests;
