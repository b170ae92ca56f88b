//! Feature extraction for trademark conflict analysis.
//!
//! Provides the pure building blocks used in scoring:
//! - Text normalization for mark names and goods/services descriptions
//! - String similarity (ratio, partial ratio, edit distance, cosine)
//! - Phonetic encodings (Metaphone)
//! - Name signal evaluators and class / goods-services overlap
//! - Prominent (distinctive) element selection
//!
//! Embedding and oracle services are collaborators behind traits; every
//! evaluator that uses one degrades to a deterministic result when the
//! collaborator fails.

pub mod embed;
pub mod normalize;
pub mod overlap;
pub mod phonetic;
pub mod prominent;
pub mod signals;
pub mod similarity;

pub use embed::{
    Embedder, Embedding, EmbeddingError, HashingEmbedder, PrecomputedEmbedder, SharedEmbedder,
};
pub use normalize::Normalizer;
pub use overlap::{
    class_overlap, classes_overlap, goods_services_overlap, is_relevant_goods,
    keyword_overlap_ratio, lemmatize, GoodsOverlap,
};
pub use phonetic::{codes_match, phonetic_key};
pub use prominent::{
    prominent_phonetic_match, ElementSource, HeuristicStrategy, OracleError, OracleStrategy,
    ProminentElement, ProminentElementOracle, ProminentElementResolver, ProminentElementStrategy,
    ProminentMatch,
};
pub use signals::{
    evaluate_cross_class_signals, evaluate_name_signals, Confidence, CrossClassSignals,
    NameSignal, NameSignals,
};
pub use similarity::{cosine_similarity, edit_distance, partial_ratio, ratio};
