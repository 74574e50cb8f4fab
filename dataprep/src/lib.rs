//! Embedding and indexing stages of the preparation pipeline.
//!
//! Both stages enumerate the same paper directory with
//! [`Paperset`](galen_core::corpus::Paperset) and record the corpus
//! fingerprint of what they processed, so the viewer can verify that table
//! row `i` and index id `i` name the same document.

pub mod coords;
pub mod index;

pub use coords::{make_coords, CoordsOptions};
pub use index::make_index;
