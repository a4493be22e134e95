use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, info};

use super::super::indexer::IndexedCorpus;
use super::{Gis, TrainingAlgorithm};
use crate::context::{eval_context, Context, Slack};
use crate::dataset::IndexedEvent;
use crate::error::{Error, Result};
use crate::model::{Correction, Model};
use crate::prior::{Prior, UniformPrior};

/// GIS training parameters.
#[derive(Debug, Clone)]
pub struct GisParams {
    iterations: usize,
    smoothing: bool,
    smoothing_observation: f64,
    threads: usize,
    prior: Arc<dyn Prior>,
}

impl Default for GisParams {
    fn default() -> Self {
        Self {
            iterations: 100,
            smoothing: false,
            smoothing_observation: 0.1,
            threads: 1,
            prior: Arc::new(UniformPrior),
        }
    }
}

impl GisParams {
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn set_iterations(&mut self, iterations: usize) -> Result<()> {
        if iterations < 1 {
            return Err(Error::config("iterations must be at least 1"));
        }
        self.iterations = iterations;
        Ok(())
    }

    pub fn smoothing(&self) -> bool {
        self.smoothing
    }

    /// Give every predicate the full outcome set.
    ///
    /// Predicate/outcome pairs never seen in training get the observed
    /// expectation `smoothing_observation` instead of being left out.
    pub fn set_smoothing(&mut self, enabled: bool) {
        self.smoothing = enabled;
    }

    pub fn smoothing_observation(&self) -> f64 {
        self.smoothing_observation
    }

    pub fn set_smoothing_observation(&mut self, observation: f64) -> Result<()> {
        if !(observation > 0.0 && observation.is_finite()) {
            return Err(Error::config(
                "smoothing observation must be positive and finite",
            ));
        }
        self.smoothing_observation = observation;
        Ok(())
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn set_threads(&mut self, threads: usize) -> Result<()> {
        if threads < 1 {
            return Err(Error::config("threads must be at least 1"));
        }
        self.threads = threads;
        Ok(())
    }

    pub fn prior(&self) -> &Arc<dyn Prior> {
        &self.prior
    }

    pub fn set_prior(&mut self, prior: Arc<dyn Prior>) {
        self.prior = prior;
    }
}

impl TrainingAlgorithm for Gis {
    type Params = GisParams;

    fn train(params: &GisParams, corpus: &IndexedCorpus) -> Result<Model> {
        GisState::new(params, corpus)?.run(params)
    }
}

/// Partial sums of one E-step slice
#[derive(Debug)]
struct Expectations {
    /// Model expectation of every pattern entry, flattened in predicate order
    model: Vec<f64>,
    correction: f64,
    log_likelihood: f64,
    correct: u64,
}

impl Expectations {
    fn new(size: usize) -> Self {
        Self {
            model: vec![0.0; size],
            correction: 0.0,
            log_likelihood: 0.0,
            correct: 0,
        }
    }

    fn merge(&mut self, other: &Expectations) {
        for (a, b) in self.model.iter_mut().zip(&other.model) {
            *a += b;
        }
        self.correction += other.correction;
        self.log_likelihood += other.log_likelihood;
        self.correct += other.correct;
    }
}

/// Parameters in λ-space together with everything the updates need
struct GisState<'a> {
    corpus: &'a IndexedCorpus,
    prior: &'a dyn Prior,
    contexts: Vec<Context>,
    /// Start of each predicate's pattern in the flattened expectations
    offsets: Vec<usize>,
    observed: Vec<f64>,
    observed_correction: f64,
    /// Largest total predicate value of any event
    constant: f64,
    /// Weight of the correction feature
    correction: f64,
}

impl<'a> GisState<'a> {
    fn new(params: &'a GisParams, corpus: &'a IndexedCorpus) -> Result<Self> {
        let num_outcomes = corpus.num_outcomes();
        let mut pairs: Vec<BTreeMap<u32, f64>> = vec![BTreeMap::new(); corpus.num_predicates()];
        let mut constant = 0.0f64;
        for event in corpus.events() {
            let count = f64::from(event.count);
            for (pid, value) in event.active() {
                if value < 0.0 {
                    return Err(Error::config(format!(
                        "predicate {:?} has negative value {}",
                        corpus.predicate_labels()[pid as usize],
                        value
                    )));
                }
                *pairs[pid as usize].entry(event.outcome).or_insert(0.0) += count * value;
            }
            constant = constant.max(event.total_value());
        }
        if !constant.is_finite() {
            return Err(Error::numerical("total predicate value overflows"));
        }
        if constant <= 0.0 {
            return Err(Error::config("every training event has zero total value"));
        }

        let mut contexts = Vec::with_capacity(pairs.len());
        let mut offsets = Vec::with_capacity(pairs.len());
        let mut observed = Vec::new();
        for seen in &pairs {
            offsets.push(observed.len());
            // a predicate that is never active cannot carry model mass
            let smooth = params.smoothing && seen.values().any(|&obs| obs > 0.0);
            let mut pattern = Vec::new();
            for oid in 0..num_outcomes as u32 {
                match seen.get(&oid) {
                    Some(&obs) if obs > 0.0 => {
                        pattern.push(oid);
                        observed.push(obs);
                    }
                    _ if smooth => {
                        pattern.push(oid);
                        observed.push(params.smoothing_observation);
                    }
                    _ => {}
                }
            }
            contexts.push(Context::zeros(pattern));
        }

        // An active predicate with positive value always has the event's
        // outcome in its pattern, so s(x, y) is the total value
        let observed_correction = corpus
            .events()
            .iter()
            .map(|e| f64::from(e.count) * (constant - e.total_value()))
            .sum();

        Ok(Self {
            corpus,
            prior: params.prior.as_ref(),
            contexts,
            offsets,
            observed,
            observed_correction,
            constant,
            correction: 0.0,
        })
    }

    fn run(mut self, params: &GisParams) -> Result<Model> {
        let corpus = self.corpus;
        let events = corpus.events();
        let threads = params.threads.min(events.len()).max(1);
        let pool = if threads > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| Error::config(format!("cannot start {} threads: {}", threads, e)))?;
            Some(pool)
        } else {
            None
        };
        let chunk_size = (events.len() + threads - 1) / threads;
        let num_instances = corpus.num_instances() as f64;

        info!(
            events = events.len(),
            predicates = corpus.num_predicates(),
            outcomes = corpus.num_outcomes(),
            correction_constant = self.constant,
            threads,
            "training GIS model"
        );

        let mut log_likelihood = 0.0;
        for iteration in 1..=params.iterations {
            let expectations = match &pool {
                Some(pool) => {
                    let state = &self;
                    let partials: Vec<Expectations> = pool.install(|| {
                        events
                            .par_chunks(chunk_size)
                            .map(|slice| state.expect(slice))
                            .collect()
                    });
                    let mut total = Expectations::new(self.observed.len());
                    for partial in &partials {
                        total.merge(partial);
                    }
                    total
                }
                None => self.expect(events),
            };

            log_likelihood = expectations.log_likelihood;
            debug!(
                iteration,
                log_likelihood,
                accuracy = expectations.correct as f64 / num_instances,
                "GIS iteration"
            );
            self.update(&expectations, iteration)?;
        }

        info!(
            iterations = params.iterations,
            log_likelihood, "finished GIS training"
        );
        self.into_model()
    }

    /// Accumulate model expectations over a slice of events
    fn expect(&self, events: &[IndexedEvent]) -> Expectations {
        let num_outcomes = self.corpus.num_outcomes();
        let mut acc = Expectations::new(self.observed.len());
        let mut dist = vec![0.0; num_outcomes];
        let mut mass = vec![0.0; num_outcomes];
        let slack = Slack {
            constant: self.constant,
            weight: self.correction,
        };

        for event in events {
            let count = f64::from(event.count);
            self.prior
                .log_prior(&mut dist, &event.predicates, event.values.as_deref());
            eval_context(
                &self.contexts,
                event.active().map(|(pid, value)| (pid as usize, value)),
                1.0,
                Some(slack),
                &mut dist,
                &mut mass,
            );

            for (pid, value) in event.active() {
                let pid = pid as usize;
                let offset = self.offsets[pid];
                for (k, &oid) in self.contexts[pid].outcomes().iter().enumerate() {
                    acc.model[offset + k] += count * value * dist[oid as usize];
                }
            }
            acc.correction += count
                * dist
                    .iter()
                    .zip(&mass)
                    .map(|(p, m)| p * (self.constant - m))
                    .sum::<f64>();
            acc.log_likelihood += count * dist[event.outcome as usize].ln();
            if argmax(&dist) == event.outcome as usize {
                acc.correct += u64::from(event.count);
            }
        }
        acc
    }

    fn update(&mut self, expectations: &Expectations, iteration: usize) -> Result<()> {
        if !expectations.correction.is_finite() {
            return Err(Error::numerical(format!(
                "correction expectation is {} at iteration {}",
                expectations.correction, iteration
            )));
        }
        let mut k = 0;
        for (pid, context) in self.contexts.iter_mut().enumerate() {
            for param in context.parameters_mut() {
                let model = expectations.model[k];
                let observed = self.observed[k];
                k += 1;
                if !(model > 0.0 && model.is_finite()) {
                    return Err(Error::numerical(format!(
                        "model expectation of predicate {:?} is {} at iteration {}",
                        self.corpus.predicate_labels()[pid],
                        model,
                        iteration
                    )));
                }
                *param += (observed / model).ln() / self.constant;
                if !param.is_finite() {
                    return Err(Error::numerical(format!(
                        "parameter of predicate {:?} diverged at iteration {}",
                        self.corpus.predicate_labels()[pid],
                        iteration
                    )));
                }
            }
        }
        if self.observed_correction > 0.0 && expectations.correction > 0.0 {
            self.correction +=
                (self.observed_correction / expectations.correction).ln() / self.constant;
            if !self.correction.is_finite() {
                return Err(Error::numerical(format!(
                    "correction parameter diverged at iteration {}",
                    iteration
                )));
            }
        }
        Ok(())
    }

    /// Scale the λ-space parameters by the persisted correction constant
    fn into_model(self) -> Result<Model> {
        let scale = self.constant.ceil().max(1.0);
        if scale > f64::from(i32::MAX) {
            return Err(Error::config(format!(
                "correction constant {} does not fit the model format",
                self.constant
            )));
        }
        let contexts = self
            .contexts
            .into_iter()
            .map(|mut context| {
                for param in context.parameters_mut() {
                    *param *= scale;
                }
                context
            })
            .collect();
        let correction = Correction {
            constant: scale as i32,
            parameter: scale * self.correction,
        };
        Model::gis(
            self.corpus.predicate_labels().to_vec(),
            self.corpus.outcome_labels().to_vec(),
            contexts,
            correction,
        )
    }
}

/// Index of the first largest entry
fn argmax(dist: &[f64]) -> usize {
    let mut best = 0;
    for (i, &p) in dist.iter().enumerate() {
        if p > dist[best] {
            best = i;
        }
    }
    best
}
