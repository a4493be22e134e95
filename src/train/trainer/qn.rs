use tracing::{debug, info, warn};

use super::super::indexer::IndexedCorpus;
use super::{Qn, TrainingAlgorithm};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::model::Model;

/// Line search algorithm for L-BFGS optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineSearchAlgorithm {
    /// More-Thuente line search (default)
    #[default]
    MoreThuente,
    /// Backtracking with Armijo condition
    BacktrackingArmijo,
    /// Backtracking with Wolfe condition
    BacktrackingWolfe,
    /// Backtracking with strong Wolfe condition
    BacktrackingStrongWolfe,
}

impl LineSearchAlgorithm {
    fn to_liblbfgs_str(self) -> &'static str {
        match self {
            Self::MoreThuente => "MoreThuente",
            Self::BacktrackingArmijo => "BacktrackingArmijo",
            Self::BacktrackingWolfe => "BacktrackingWolfe",
            Self::BacktrackingStrongWolfe => "BacktrackingStrongWolfe",
        }
    }
}

/// Quasi-Newton training parameters.
#[derive(Debug, Clone)]
pub struct QnParams {
    c1: f64,
    c2: f64,
    max_iterations: usize,
    epsilon: f64,
    period: usize,
    delta: f64,
    linesearch: LineSearchAlgorithm,
    max_linesearch: usize,
}

impl Default for QnParams {
    fn default() -> Self {
        Self {
            c1: 0.0,
            c2: 0.1,
            max_iterations: 100,
            epsilon: 1e-5,
            period: 10,
            delta: 1e-5,
            linesearch: LineSearchAlgorithm::default(),
            max_linesearch: 20,
        }
    }
}

impl QnParams {
    pub fn c1(&self) -> f64 {
        self.c1
    }

    pub fn set_c1(&mut self, c1: f64) -> Result<()> {
        if !(c1 >= 0.0) {
            return Err(Error::config("c1 must be non-negative"));
        }
        self.c1 = c1;
        Ok(())
    }

    pub fn c2(&self) -> f64 {
        self.c2
    }

    pub fn set_c2(&mut self, c2: f64) -> Result<()> {
        if !(c2 >= 0.0) {
            return Err(Error::config("c2 must be non-negative"));
        }
        self.c2 = c2;
        Ok(())
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) -> Result<()> {
        if max_iterations < 1 {
            return Err(Error::config("max_iterations must be at least 1"));
        }
        self.max_iterations = max_iterations;
        Ok(())
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn set_epsilon(&mut self, epsilon: f64) -> Result<()> {
        if !(epsilon >= 0.0) {
            return Err(Error::config("epsilon must be non-negative"));
        }
        self.epsilon = epsilon;
        Ok(())
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Set the period for delta-based convergence test.
    ///
    /// Setting period to 0 disables the delta-based convergence test
    /// (only gradient-based epsilon test is used).
    pub fn set_period(&mut self, period: usize) {
        self.period = period;
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn set_delta(&mut self, delta: f64) -> Result<()> {
        if !(delta >= 0.0) {
            return Err(Error::config("delta must be non-negative"));
        }
        self.delta = delta;
        Ok(())
    }

    pub fn linesearch(&self) -> LineSearchAlgorithm {
        self.linesearch
    }

    pub fn set_linesearch(&mut self, linesearch: LineSearchAlgorithm) {
        self.linesearch = linesearch;
    }

    pub fn max_linesearch(&self) -> usize {
        self.max_linesearch
    }

    pub fn set_max_linesearch(&mut self, max_linesearch: usize) -> Result<()> {
        if max_linesearch == 0 {
            return Err(Error::config("max_linesearch must be positive"));
        }
        self.max_linesearch = max_linesearch;
        Ok(())
    }
}

impl TrainingAlgorithm for Qn {
    type Params = QnParams;

    fn train(params: &QnParams, corpus: &IndexedCorpus) -> Result<Model> {
        let num_outcomes = corpus.num_outcomes();
        let num_weights = corpus.num_predicates() * num_outcomes;
        let mut weights = vec![0.0; num_weights];

        let c1 = params.c1();
        let c2 = params.c2();
        info!(
            events = corpus.num_events(),
            predicates = corpus.num_predicates(),
            outcomes = num_outcomes,
            c1,
            c2,
            "training QN model"
        );

        let mut scores = vec![0.0; num_outcomes];
        let mut non_finite: Option<String> = None;
        let mut iterations = 0;

        // Objective function: negative log-likelihood + L2 regularization
        let evaluate = |x: &[f64], gx: &mut [f64]| -> std::result::Result<f64, anyhow::Error> {
            let mut loss = negative_log_likelihood(corpus, x, gx, &mut scores);

            // Factor of 2 comes from derivative of c2 * x[i]^2 -> 2 * c2 * x[i]
            if c2 > 0.0 {
                let two_c2 = c2 * 2.0;
                for (g, &w) in gx.iter_mut().zip(x) {
                    *g += two_c2 * w;
                    loss += c2 * w * w;
                }
            }

            if !loss.is_finite() || gx.iter().any(|g| !g.is_finite()) {
                let message = format!("objective is {} during optimization", loss);
                non_finite = Some(message.clone());
                return Err(anyhow::anyhow!(message));
            }
            Ok(loss)
        };

        let progress = |prgr: &liblbfgs::Progress| -> bool {
            iterations = prgr.niter;
            debug!(
                iteration = prgr.niter,
                loss = prgr.fx,
                xnorm = prgr.xnorm,
                gnorm = prgr.gnorm,
                "QN iteration"
            );
            false // continue optimization
        };

        let mut lbfgs = liblbfgs::lbfgs()
            .with_max_iterations(params.max_iterations())
            .with_epsilon(params.epsilon())
            .with_fx_delta(params.delta(), params.period())
            .with_max_linesearch(params.max_linesearch());

        // OWL-QN only supports backtracking line search
        if c1 > 0.0 {
            lbfgs = lbfgs
                .with_linesearch_algorithm("BacktrackingStrongWolfe")
                .with_orthantwise(c1, 0, num_weights);
        } else {
            lbfgs = lbfgs.with_linesearch_algorithm(params.linesearch().to_liblbfgs_str());
        }

        let result = lbfgs.minimize(&mut weights, evaluate, progress);
        if let Some(message) = non_finite {
            return Err(Error::numerical(message));
        }
        let report = result.map_err(|e| Error::Optimization(e.to_string()))?;

        if iterations >= params.max_iterations() {
            warn!(
                max_iterations = params.max_iterations(),
                "QN optimizer stopped at the iteration limit"
            );
        }
        info!(iterations, loss = report.fx, "finished QN training");

        into_model(corpus, &weights)
    }
}

/// Negative log-likelihood of the corpus, writing its gradient into `gx`
fn negative_log_likelihood(
    corpus: &IndexedCorpus,
    x: &[f64],
    gx: &mut [f64],
    scores: &mut [f64],
) -> f64 {
    let num_outcomes = scores.len();
    gx.fill(0.0);
    let mut loss = 0.0;
    for event in corpus.events() {
        let count = f64::from(event.count);
        scores.fill(0.0);
        for (pid, value) in event.active() {
            let row = &x[pid as usize * num_outcomes..][..num_outcomes];
            for (s, &w) in scores.iter_mut().zip(row) {
                *s += w * value;
            }
        }

        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let log_z = max + scores.iter().map(|s| (s - max).exp()).sum::<f64>().ln();
        let outcome = event.outcome as usize;
        loss -= count * (scores[outcome] - log_z);

        // scores become residuals p(o|x) - [o == y]
        for (oid, s) in scores.iter_mut().enumerate() {
            *s = (*s - log_z).exp();
            if oid == outcome {
                *s -= 1.0;
            }
        }
        for (pid, value) in event.active() {
            let row = &mut gx[pid as usize * num_outcomes..][..num_outcomes];
            for (g, &r) in row.iter_mut().zip(scores.iter()) {
                *g += count * value * r;
            }
        }
    }
    loss
}

/// Keep the non-zero weights of every predicate
fn into_model(corpus: &IndexedCorpus, weights: &[f64]) -> Result<Model> {
    let num_outcomes = corpus.num_outcomes();
    let mut contexts = Vec::with_capacity(corpus.num_predicates());
    for (pid, row) in weights.chunks(num_outcomes.max(1)).enumerate() {
        let mut outcomes = Vec::new();
        let mut parameters = Vec::new();
        for (oid, &w) in row.iter().enumerate() {
            if !w.is_finite() {
                return Err(Error::numerical(format!(
                    "weight of predicate {:?} is not finite",
                    corpus.predicate_labels()[pid]
                )));
            }
            if w != 0.0 {
                outcomes.push(oid as u32);
                parameters.push(w);
            }
        }
        contexts.push(Context::new(outcomes, parameters)?);
    }
    Model::qn(
        corpus.predicate_labels().to_vec(),
        corpus.outcome_labels().to_vec(),
        contexts,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::train::indexer::{DataIndexer, IndexerConfig};

    fn corpus(events: Vec<Event>) -> IndexedCorpus {
        DataIndexer::new(IndexerConfig::default())
            .index_events(events)
            .unwrap()
    }

    #[test]
    fn test_default_params() {
        let params = QnParams::default();
        assert_eq!(params.c1(), 0.0);
        assert_eq!(params.c2(), 0.1);
        assert_eq!(params.max_iterations(), 100);
        assert_eq!(params.linesearch(), LineSearchAlgorithm::MoreThuente);
        assert_eq!(params.max_linesearch(), 20);
    }

    #[test]
    fn test_nll_at_zero() {
        let corpus = corpus(vec![
            Event::new("a", ["x"]),
            Event::new("b", ["x"]),
            Event::new("a", ["x"]),
        ]);
        let x = vec![0.0; 2];
        let mut gx = vec![0.0; 2];
        let mut scores = vec![0.0; 2];
        let loss = negative_log_likelihood(&corpus, &x, &mut gx, &mut scores);
        assert!((loss - 3.0 * 2.0f64.ln()).abs() < 1e-12);
        // two "a" events pull x->a up, one "b" event pulls x->b up
        assert!((gx[0] - (3.0 * 0.5 - 2.0)).abs() < 1e-12);
        assert!((gx[1] - (3.0 * 0.5 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_into_model_prunes_zeros() {
        let corpus = corpus(vec![Event::new("a", ["x", "y"]), Event::new("b", ["y"])]);
        let model = into_model(&corpus, &[0.5, 0.0, 0.0, -0.25]).unwrap();
        assert_eq!(model.context("x").unwrap().outcomes(), &[0]);
        assert_eq!(model.context("y").unwrap().outcomes(), &[1]);
        assert!(into_model(&corpus, &[f64::NAN, 0.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_l1_produces_sparse_model() {
        let corpus = corpus(vec![
            Event::new("a", ["x", "noise"]),
            Event::new("a", ["x"]),
            Event::new("b", ["y", "noise"]),
            Event::new("b", ["y"]),
        ]);
        let mut params = QnParams::default();
        params.set_c1(0.5).unwrap();
        params.set_c2(0.0).unwrap();
        let model = Qn::train(&params, &corpus).unwrap();
        let dense: usize = model.contexts().iter().map(Context::len).sum();
        assert!(dense < corpus.num_predicates() * corpus.num_outcomes());
        let probs = model.eval(&["x"]);
        assert_eq!(model.best_outcome(&probs), Some("a"));
    }
}
