use std::cmp::Ordering;

/// A compiled training event
///
/// Identical events are merged into one record whose `count` holds their
/// multiplicity.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedEvent {
    /// Outcome id
    pub outcome: u32,
    /// Ascending predicate ids
    pub predicates: Vec<u32>,
    /// Predicate values parallel to `predicates`, `None` for binary events
    pub values: Option<Vec<f64>>,
    /// Number of times this event was observed
    pub count: u32,
}

impl IndexedEvent {
    /// Build an event, sorting predicate ids and their values in tandem
    pub fn new(outcome: u32, predicates: Vec<u32>, values: Option<Vec<f64>>) -> Self {
        let (predicates, values) = match values {
            None => {
                let mut predicates = predicates;
                predicates.sort_unstable();
                (predicates, None)
            }
            Some(values) => {
                let mut pairs: Vec<(u32, f64)> = predicates.into_iter().zip(values).collect();
                pairs.sort_by_key(|&(pid, _)| pid);
                let (predicates, values): (Vec<u32>, Vec<f64>) = pairs.into_iter().unzip();
                (predicates, Some(values))
            }
        };
        Self {
            outcome,
            predicates,
            values,
            count: 1,
        }
    }

    /// Value of the predicate at `index`, 1.0 for binary events
    #[inline]
    pub fn value(&self, index: usize) -> f64 {
        self.values.as_ref().map_or(1.0, |v| v[index])
    }

    /// Iterate over `(predicate id, value)` pairs
    pub fn active(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.predicates
            .iter()
            .enumerate()
            .map(move |(i, &pid)| (pid, self.value(i)))
    }

    /// Sum of the predicate values of this event
    pub fn total_value(&self) -> f64 {
        match &self.values {
            Some(values) => values.iter().sum(),
            None => self.predicates.len() as f64,
        }
    }

    /// Ordering used for sorting before merging duplicates
    pub(crate) fn compare(&self, other: &Self) -> Ordering {
        self.outcome
            .cmp(&other.outcome)
            .then_with(|| self.predicates.cmp(&other.predicates))
            .then_with(|| match (&self.values, &other.values) {
                (Some(a), Some(b)) => a
                    .iter()
                    .zip(b.iter())
                    .map(|(x, y)| x.total_cmp(y))
                    .find(|o| o.is_ne())
                    .unwrap_or_else(|| a.len().cmp(&b.len())),
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
            })
    }
}
