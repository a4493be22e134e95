use std::sync::Arc;

use tracing::info;

use super::indexer::{DataIndexer, IndexedCorpus, IndexerConfig};
use crate::error::Result;
use crate::event::{Event, EventStream};
use crate::model::Model;
use crate::prior::Prior;

mod gis;
mod qn;

pub use self::gis::GisParams;
pub use self::qn::{LineSearchAlgorithm, QnParams};

/// Training algorithm marker for generalized iterative scaling.
#[derive(Debug, Clone, Copy)]
pub struct Gis;

/// Training algorithm marker for quasi-Newton (L-BFGS / OWL-QN).
#[derive(Debug, Clone, Copy)]
pub struct Qn;

/// Training algorithm interface.
pub trait TrainingAlgorithm {
    type Params: Default;

    /// Fit a model to an indexed corpus
    fn train(params: &Self::Params, corpus: &IndexedCorpus) -> Result<Model>;
}

/// Maximum entropy trainer
///
/// The algorithm is picked at compile time through the marker type:
///
/// ```no_run
/// use maxent::{DataIndexer, Event, IndexerConfig, Trainer};
///
/// let events = vec![
///     Event::new("sunny", ["walk", "shop"]),
///     Event::new("rainy", ["clean"]),
/// ];
/// let corpus = DataIndexer::new(IndexerConfig::default()).index_events(events)?;
/// let model = Trainer::gis().with_iterations(50)?.train(&corpus)?;
/// let probs = model.eval(&["walk"]);
/// # Ok::<(), maxent::Error>(())
/// ```
#[derive(Debug)]
pub struct Trainer<A: TrainingAlgorithm> {
    /// Training parameters
    params: A::Params,
}

impl<A: TrainingAlgorithm> Trainer<A> {
    /// Create a new trainer with default parameters
    pub fn new() -> Self {
        Self {
            params: A::Params::default(),
        }
    }

    /// Create a trainer with the given parameters
    pub fn from_params(params: A::Params) -> Self {
        Self { params }
    }

    /// Get training parameters
    pub fn params(&self) -> &A::Params {
        &self.params
    }

    /// Get training parameters for mutation
    pub fn params_mut(&mut self) -> &mut A::Params {
        &mut self.params
    }

    /// Train a model on an indexed corpus
    pub fn train(&self, corpus: &IndexedCorpus) -> Result<Model> {
        let model = A::train(&self.params, corpus)?;
        info!(
            outcomes = model.num_outcomes(),
            predicates = model.num_predicates(),
            kind = model.kind().tag(),
            "trained model"
        );
        Ok(model)
    }

    /// Index `stream` with `config`, then train on the result
    pub fn train_stream<S: EventStream + ?Sized>(
        &self,
        stream: &mut S,
        config: IndexerConfig,
    ) -> Result<Model> {
        let corpus = DataIndexer::new(config).index(stream)?;
        self.train(&corpus)
    }

    /// Index in-memory events with `config`, then train on the result
    pub fn train_events(&self, events: Vec<Event>, config: IndexerConfig) -> Result<Model> {
        let corpus = DataIndexer::new(config).index_events(events)?;
        self.train(&corpus)
    }
}

impl Trainer<Gis> {
    /// Create a new iterative scaling trainer
    pub fn gis() -> Self {
        Self::new()
    }

    /// Set the number of iterations (builder pattern)
    pub fn with_iterations(mut self, iterations: usize) -> Result<Self> {
        self.params.set_iterations(iterations)?;
        Ok(self)
    }

    /// Enable or disable smoothing (builder pattern)
    pub fn with_smoothing(mut self, enabled: bool) -> Self {
        self.params.set_smoothing(enabled);
        self
    }

    /// Set the observed mass of unseen predicate/outcome pairs (builder pattern)
    pub fn with_smoothing_observation(mut self, observation: f64) -> Result<Self> {
        self.params.set_smoothing_observation(observation)?;
        Ok(self)
    }

    /// Set the number of worker threads (builder pattern)
    pub fn with_threads(mut self, threads: usize) -> Result<Self> {
        self.params.set_threads(threads)?;
        Ok(self)
    }

    /// Set the outcome prior (builder pattern)
    pub fn with_prior(mut self, prior: Arc<dyn Prior>) -> Self {
        self.params.set_prior(prior);
        self
    }
}

impl Trainer<Qn> {
    /// Create a new quasi-Newton trainer
    pub fn qn() -> Self {
        Self::new()
    }

    /// Set L1 regularization coefficient (builder pattern)
    pub fn with_c1(mut self, c1: f64) -> Result<Self> {
        self.params.set_c1(c1)?;
        Ok(self)
    }

    /// Set L2 regularization coefficient (builder pattern)
    pub fn with_c2(mut self, c2: f64) -> Result<Self> {
        self.params.set_c2(c2)?;
        Ok(self)
    }

    /// Set maximum iterations (builder pattern)
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Result<Self> {
        self.params.set_max_iterations(max_iterations)?;
        Ok(self)
    }

    /// Set convergence epsilon (builder pattern)
    pub fn with_epsilon(mut self, epsilon: f64) -> Result<Self> {
        self.params.set_epsilon(epsilon)?;
        Ok(self)
    }

    /// Set line search algorithm (builder pattern)
    pub fn with_linesearch(mut self, linesearch: LineSearchAlgorithm) -> Self {
        self.params.set_linesearch(linesearch);
        self
    }
}

impl<A: TrainingAlgorithm> Default for Trainer<A> {
    fn default() -> Self {
        Self::new()
    }
}
