//! Maximum entropy classifiers in pure Rust
//!
//! This library trains maximum entropy (multinomial logistic regression)
//! models from labeled events with either generalized iterative scaling or a
//! quasi-Newton optimizer, evaluates them, and reads and writes them in a
//! compact binary format compatible with Java `DataOutputStream` encodings.
//!
//! # Examples
//!
//! ## Training
//!
//! ```no_run
//! use maxent::{DataIndexer, Event, IndexerConfig, Trainer};
//!
//! let events = vec![
//!     Event::new("sunny", ["walk", "shop"]),
//!     Event::new("rainy", ["clean", "shop"]),
//! ];
//! let corpus = DataIndexer::new(IndexerConfig::default()).index_events(events)?;
//!
//! let model = Trainer::qn().with_c2(1.0)?.train(&corpus)?;
//! model.save("weather.bin")?;
//! # Ok::<(), maxent::Error>(())
//! ```
//!
//! ## Prediction
//!
//! ```no_run
//! use maxent::Model;
//!
//! let model = Model::load("weather.bin")?;
//! let probs = model.eval(&["walk", "shop"]);
//! println!("{}", model.all_outcomes(&probs));
//! # Ok::<(), maxent::Error>(())
//! ```

mod context;
mod dataset;
mod error;
mod event;
mod model;
mod model_reader;
mod model_writer;
mod mutf8;
mod prior;
mod stream;

/// Training module containing all components for training models
pub mod train;

// Re-export main types
pub use self::context::Context;
pub use self::dataset::IndexedEvent;
pub use self::error::{Error, Result};
pub use self::event::{Event, EventStream, ListEventStream};
pub use self::model::{Correction, Model, ModelKind};
pub use self::model_reader::{read_model, BinaryModelReader, ModelReader, PlainTextModelReader};
pub use self::model_writer::{persist, BinaryModelWriter, ModelWriter, PlainTextModelWriter};
pub use self::prior::{Prior, UniformPrior};
pub use self::stream::FileEventStream;

// Re-export training types for convenience
pub use self::train::{
    train_model, DataIndexer, IndexedCorpus, IndexerConfig, IndexingPasses, Trainer,
    TrainingParameters,
};
