//! Relevance ranking over the embedding index.

pub mod ranker;
pub mod retriever;

pub use ranker::{is_no_context, rank, significant_words, NO_RELEVANT_CONTEXT};
pub use retriever::Retriever;
