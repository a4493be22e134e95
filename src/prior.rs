use std::fmt;

/// A prior distribution over outcomes used during GIS training
///
/// Implementations write the log prior of every outcome into `dist` before
/// the model's feature weights are added.
pub trait Prior: fmt::Debug + Send + Sync {
    /// Fill `dist` with log prior probabilities for the given context
    fn log_prior(&self, dist: &mut [f64], context: &[u32], values: Option<&[f64]>);
}

/// Every outcome is equally likely a priori
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformPrior;

impl Prior for UniformPrior {
    fn log_prior(&self, dist: &mut [f64], _context: &[u32], _values: Option<&[f64]>) {
        if dist.is_empty() {
            return;
        }
        let log_uniform = (1.0 / dist.len() as f64).ln();
        dist.fill(log_uniform);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_prior() {
        let mut dist = vec![0.0; 4];
        UniformPrior.log_prior(&mut dist, &[0, 1], None);
        for p in dist {
            assert!((p.exp() - 0.25).abs() < 1e-12);
        }
    }
}
