// Similarity queries — documents sharing analyzed terms with a reference text.

pub mod engine;

pub use engine::{SimilarityEngine, SimilarityResult, SimilaritySettings};
