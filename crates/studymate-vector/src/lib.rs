//! studymate-vector
//!
//! Embedding index over syllabus and knowledge-base fragments. See `index`
//! for the snapshot/swap rebuild model and the refresh policies.

pub mod index;

pub use index::{cosine_distance, EmbeddingIndex, IndexSnapshot, DEFAULT_TOP_K};
