//! Conflict model: extraction, pattern clustering, and strategy
//! recommendation.

pub mod cluster;
pub mod extractor;
pub mod strategy;

pub use cluster::{ConflictPattern, PatternClusterer};
pub use extractor::{
    ConflictExtractor, ConflictKind, ConflictRecord, ExtractionOutcome, MalformedFile,
};
pub use strategy::{Alternative, BranchIntents, Strategy, StrategyProposal, StrategyRecommender};
