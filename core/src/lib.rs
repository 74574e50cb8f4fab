pub mod corpus;
pub mod error;
pub mod nearest;
pub mod persist;
pub mod projection;
pub mod search;
pub mod table;
pub mod tfidf;
pub mod tokenizer;

pub use error::GalenError;

pub type TermId = u32;
/// Positional identifier of a document in the enumerated corpus.
pub type DocId = u32;

/// Sparse row of (term id, weight), sorted by term id.
pub type SparseVec = Vec<(TermId, f32)>;

/// A 2D coordinate produced by the projection.
pub type Point = [f32; 2];

/// Number of documents processed when the pipeline runs in test mode.
pub const TEST_DOC_LIMIT: usize = 2000;
