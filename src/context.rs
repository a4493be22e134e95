use crate::error::{Error, Result};

/// The parameters of one predicate
///
/// A predicate only carries weights for the outcomes it was seen with during
/// training (its outcome pattern); every other outcome implicitly has weight
/// zero. Outcome ids are strictly ascending and there is exactly one
/// parameter per outcome id.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    outcomes: Vec<u32>,
    parameters: Vec<f64>,
}

impl Context {
    /// Create a context from an outcome pattern and its parameters
    pub fn new(outcomes: Vec<u32>, parameters: Vec<f64>) -> Result<Self> {
        if outcomes.len() != parameters.len() {
            return Err(Error::config(format!(
                "context has {} outcomes but {} parameters",
                outcomes.len(),
                parameters.len()
            )));
        }
        if outcomes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::config(format!(
                "outcome pattern {:?} is not strictly ascending",
                outcomes
            )));
        }
        Ok(Self {
            outcomes,
            parameters,
        })
    }

    /// Create a context with all parameters set to zero
    pub(crate) fn zeros(outcomes: Vec<u32>) -> Self {
        let parameters = vec![0.0; outcomes.len()];
        Self {
            outcomes,
            parameters,
        }
    }

    /// The outcome pattern
    pub fn outcomes(&self) -> &[u32] {
        &self.outcomes
    }

    pub fn parameters(&self) -> &[f64] {
        &self.parameters
    }

    pub(crate) fn parameters_mut(&mut self) -> &mut [f64] {
        &mut self.parameters
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Iterate over `(outcome id, parameter)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.outcomes
            .iter()
            .copied()
            .zip(self.parameters.iter().copied())
    }

    /// Parameter for `outcome`, `None` if it is not part of the pattern
    pub fn parameter(&self, outcome: u32) -> Option<f64> {
        self.outcomes
            .binary_search(&outcome)
            .ok()
            .map(|i| self.parameters[i])
    }
}

/// The GIS correction feature
///
/// For an event `x` and an outcome `o` the feature value is
/// `constant - s(x, o)`, where `s(x, o)` is the total value of the active
/// predicates whose pattern contains `o`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Slack {
    pub constant: f64,
    pub weight: f64,
}

/// Compute the outcome distribution for a set of active predicates.
///
/// On entry `dist` holds the log prior of every outcome (zeros for none).
/// Weighted parameter sums are added to it, multiplied by `scale`, corrected
/// by `slack` and finally normalized with a softmax. `mass` is scratch space
/// with one slot per outcome.
pub(crate) fn eval_context<I>(
    contexts: &[Context],
    active: I,
    scale: f64,
    slack: Option<Slack>,
    dist: &mut [f64],
    mass: &mut [f64],
) where
    I: IntoIterator<Item = (usize, f64)>,
{
    mass.fill(0.0);
    for (pid, value) in active {
        let context = &contexts[pid];
        for (oid, param) in context.iter() {
            dist[oid as usize] += param * value;
            mass[oid as usize] += value;
        }
    }

    let mut max = f64::NEG_INFINITY;
    for (oid, d) in dist.iter_mut().enumerate() {
        *d *= scale;
        if let Some(slack) = slack {
            *d += slack.weight * (slack.constant - mass[oid]);
        }
        max = max.max(*d);
    }
    softmax(dist, max);
}

fn softmax(dist: &mut [f64], max: f64) {
    let mut norm = 0.0;
    for d in dist.iter_mut() {
        *d = (*d - max).exp();
        norm += *d;
    }
    for d in dist.iter_mut() {
        *d /= norm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_invariants() {
        let ctx = Context::new(vec![0, 2], vec![0.5, -0.5]).unwrap();
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.parameter(2), Some(-0.5));
        assert_eq!(ctx.parameter(1), None);

        assert!(Context::new(vec![0, 1], vec![0.5]).is_err());
        assert!(Context::new(vec![1, 0], vec![0.5, 0.5]).is_err());
        assert!(Context::new(vec![1, 1], vec![0.5, 0.5]).is_err());
    }

    #[test]
    fn test_eval_context_sparse() {
        let contexts = vec![
            Context::new(vec![0], vec![2.0f64.ln()]).unwrap(),
            Context::new(vec![1, 2], vec![0.0, 3.0f64.ln()]).unwrap(),
        ];
        let mut dist = vec![0.0; 3];
        let mut mass = vec![0.0; 3];
        eval_context(&contexts, [(0, 1.0), (1, 1.0)], 1.0, None, &mut dist, &mut mass);
        // unnormalized: 2, 1, 3
        assert!((dist[0] - 2.0 / 6.0).abs() < 1e-12);
        assert!((dist[1] - 1.0 / 6.0).abs() < 1e-12);
        assert!((dist[2] - 3.0 / 6.0).abs() < 1e-12);
        assert_eq!(mass, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_eval_context_slack() {
        let contexts = vec![Context::new(vec![0], vec![0.0]).unwrap()];
        let mut dist = vec![0.0; 2];
        let mut mass = vec![0.0; 2];
        let slack = Slack {
            constant: 1.0,
            weight: 2.0f64.ln(),
        };
        eval_context(&contexts, [(0, 1.0)], 1.0, Some(slack), &mut dist, &mut mass);
        // outcome 1 gets the whole correction feature: exp(ln 2) vs exp(0)
        assert!((dist[0] - 1.0 / 3.0).abs() < 1e-12);
        assert!((dist[1] - 2.0 / 3.0).abs() < 1e-12);
    }
}
