//! Training module for maximum entropy models
//!
//! This module contains all the components needed to train models: the
//! vocabulary tables, the data indexer, the optimizers and the string-keyed
//! training configuration.

mod dictionary;
mod indexer;
mod params;
mod trainer;

// Re-export public types
pub use self::dictionary::Dictionary;
pub use self::indexer::{DataIndexer, IndexedCorpus, IndexerConfig, IndexingPasses};
pub use self::params::{train_model, Algorithm, TrainingParameters};
pub use self::trainer::{
    Gis, GisParams, LineSearchAlgorithm, Qn, QnParams, Trainer, TrainingAlgorithm,
};
