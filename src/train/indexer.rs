use tracing::{debug, info};

use super::dictionary::Dictionary;
use crate::dataset::IndexedEvent;
use crate::error::{Error, Result};
use crate::event::{Event, EventStream, ListEventStream};

/// How many times the indexer reads the event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexingPasses {
    /// Buffer all events in memory while counting predicates
    #[default]
    OnePass,
    /// Count predicates first, then rewind the stream and compile
    TwoPass,
}

/// Data indexer configuration
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Predicates seen fewer times than this are dropped
    pub cutoff: u32,
    /// Sort events and merge identical ones into counted records
    pub sort: bool,
    pub passes: IndexingPasses,
    /// Keep predicate values instead of treating predicates as indicators
    pub real_valued: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            cutoff: 0,
            sort: true,
            passes: IndexingPasses::OnePass,
            real_valued: false,
        }
    }
}

impl IndexerConfig {
    pub fn with_cutoff(mut self, cutoff: u32) -> Self {
        self.cutoff = cutoff;
        self
    }

    pub fn with_sort(mut self, sort: bool) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_passes(mut self, passes: IndexingPasses) -> Self {
        self.passes = passes;
        self
    }

    pub fn with_real_values(mut self, real_valued: bool) -> Self {
        self.real_valued = real_valued;
        self
    }
}

/// Training events compiled into dense integer arrays
#[derive(Debug, Clone)]
pub struct IndexedCorpus {
    events: Vec<IndexedEvent>,
    predicate_labels: Vec<String>,
    outcome_labels: Vec<String>,
    predicate_counts: Vec<u32>,
    real_valued: bool,
}

impl IndexedCorpus {
    /// Compiled events, sorted and merged when the indexer was asked to
    pub fn events(&self) -> &[IndexedEvent] {
        &self.events
    }

    /// Predicate names in id order
    pub fn predicate_labels(&self) -> &[String] {
        &self.predicate_labels
    }

    /// Outcome names in id order
    pub fn outcome_labels(&self) -> &[String] {
        &self.outcome_labels
    }

    /// Occurrence count of every retained predicate, in id order
    pub fn predicate_counts(&self) -> &[u32] {
        &self.predicate_counts
    }

    pub fn num_predicates(&self) -> usize {
        self.predicate_labels.len()
    }

    pub fn num_outcomes(&self) -> usize {
        self.outcome_labels.len()
    }

    /// Number of distinct compiled events
    pub fn num_events(&self) -> usize {
        self.events.len()
    }

    /// Number of retained training instances, counting merged duplicates
    pub fn num_instances(&self) -> u64 {
        self.events.iter().map(|e| u64::from(e.count)).sum()
    }

    pub fn is_real_valued(&self) -> bool {
        self.real_valued
    }
}

/// Compiles event streams into an [`IndexedCorpus`]
#[derive(Debug, Clone, Default)]
pub struct DataIndexer {
    config: IndexerConfig,
}

impl DataIndexer {
    pub fn new(config: IndexerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Index every event of `stream`
    pub fn index<S: EventStream + ?Sized>(&self, stream: &mut S) -> Result<IndexedCorpus> {
        match self.config.passes {
            IndexingPasses::OnePass => self.index_one_pass(stream),
            IndexingPasses::TwoPass => self.index_two_pass(stream),
        }
    }

    /// Index an in-memory list of events
    pub fn index_events(&self, events: Vec<Event>) -> Result<IndexedCorpus> {
        self.index(&mut ListEventStream::new(events))
    }

    fn index_one_pass<S: EventStream + ?Sized>(&self, stream: &mut S) -> Result<IndexedCorpus> {
        let mut counter = PredicateCounter::default();
        let mut events = Vec::new();
        while let Some(event) = stream.read()? {
            counter.observe(&event);
            events.push(event);
        }
        if events.is_empty() {
            return Err(Error::config("event stream is empty"));
        }
        debug!(
            events = events.len(),
            predicates = counter.dict.len(),
            "computed predicate counts"
        );

        let (predicates, counts) = counter.retain(self.config.cutoff)?;
        let mut compiler = Compiler::new(&predicates, self.config.real_valued);
        for event in &events {
            compiler.add(event)?;
        }
        self.finish(compiler, counts)
    }

    fn index_two_pass<S: EventStream + ?Sized>(&self, stream: &mut S) -> Result<IndexedCorpus> {
        let mut counter = PredicateCounter::default();
        let mut num_events = 0usize;
        while let Some(event) = stream.read()? {
            counter.observe(&event);
            num_events += 1;
        }
        if num_events == 0 {
            return Err(Error::config("event stream is empty"));
        }
        debug!(
            events = num_events,
            predicates = counter.dict.len(),
            "computed predicate counts"
        );

        let (predicates, counts) = counter.retain(self.config.cutoff)?;
        stream.reset()?;
        let mut compiler = Compiler::new(&predicates, self.config.real_valued);
        while let Some(event) = stream.read()? {
            compiler.add(&event)?;
        }
        self.finish(compiler, counts)
    }

    fn finish(&self, compiler: Compiler<'_>, predicate_counts: Vec<u32>) -> Result<IndexedCorpus> {
        let Compiler {
            predicates,
            outcomes,
            mut events,
            dropped,
            real_valued,
        } = compiler;
        if events.is_empty() {
            return Err(Error::config(
                "no event has a predicate above the cutoff",
            ));
        }
        if self.config.sort {
            events = sort_and_merge(events);
        }

        let corpus = IndexedCorpus {
            events,
            predicate_labels: predicates.clone().into_names(),
            outcome_labels: outcomes.into_names(),
            predicate_counts,
            real_valued,
        };
        info!(
            events = corpus.num_events(),
            instances = corpus.num_instances(),
            dropped,
            predicates = corpus.num_predicates(),
            outcomes = corpus.num_outcomes(),
            "indexed training events"
        );
        Ok(corpus)
    }
}

/// Occurrence counts of every predicate, in first-appearance order
#[derive(Debug, Default)]
struct PredicateCounter {
    dict: Dictionary,
    counts: Vec<u32>,
}

impl PredicateCounter {
    fn observe(&mut self, event: &Event) {
        for pred in &event.context {
            let id = self.dict.get_or_insert(pred) as usize;
            if id == self.counts.len() {
                self.counts.push(0);
            }
            self.counts[id] = self.counts[id].saturating_add(1);
        }
    }

    /// Keep the predicates seen at least `cutoff` times, renumbered densely
    fn retain(self, cutoff: u32) -> Result<(Dictionary, Vec<u32>)> {
        let mut retained = Dictionary::new();
        let mut counts = Vec::new();
        for (pred, id) in self.dict.iter() {
            let count = self.counts[id as usize];
            if count >= cutoff {
                retained.get_or_insert(pred);
                counts.push(count);
            }
        }
        if retained.is_empty() {
            return Err(Error::config(format!(
                "cutoff {} removed all {} predicates",
                cutoff,
                self.dict.len()
            )));
        }
        Ok((retained, counts))
    }
}

/// Turns events into [`IndexedEvent`]s against a fixed predicate table
struct Compiler<'a> {
    predicates: &'a Dictionary,
    outcomes: Dictionary,
    events: Vec<IndexedEvent>,
    dropped: usize,
    real_valued: bool,
}

impl<'a> Compiler<'a> {
    fn new(predicates: &'a Dictionary, real_valued: bool) -> Self {
        Self {
            predicates,
            outcomes: Dictionary::new(),
            events: Vec::new(),
            dropped: 0,
            real_valued,
        }
    }

    fn add(&mut self, event: &Event) -> Result<()> {
        if let Some(values) = &event.values {
            if values.len() != event.context.len() {
                return Err(Error::config(format!(
                    "event has {} predicates but {} values",
                    event.context.len(),
                    values.len()
                )));
            }
        }
        let outcome = self.outcomes.get_or_insert(&event.outcome);
        let mut pids = Vec::with_capacity(event.context.len());
        let mut values = Vec::new();
        for (i, pred) in event.context.iter().enumerate() {
            let pid = self.predicates.get(pred);
            if !self.real_valued {
                pids.extend(pid);
                continue;
            }
            let value = event.value(i);
            if !value.is_finite() {
                return Err(Error::config(format!(
                    "predicate {:?} has non-finite value {}",
                    pred, value
                )));
            }
            if let Some(pid) = pid {
                pids.push(pid);
                values.push(value);
            }
        }
        if pids.is_empty() {
            debug!(outcome = %event.outcome, "dropped event without retained predicates");
            self.dropped += 1;
            return Ok(());
        }
        let values = if self.real_valued { Some(values) } else { None };
        self.events.push(IndexedEvent::new(outcome, pids, values));
        Ok(())
    }
}

/// Sort events and collapse identical neighbours into a single counted record
fn sort_and_merge(mut events: Vec<IndexedEvent>) -> Vec<IndexedEvent> {
    events.sort_by(|a, b| a.compare(b));
    let mut merged: Vec<IndexedEvent> = Vec::with_capacity(events.len());
    for event in events {
        match merged.last_mut() {
            Some(last) if last.compare(&event).is_eq() => last.count += event.count,
            _ => merged.push(event),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weather() -> Vec<Event> {
        vec![
            Event::new("sunny", ["walk", "shop"]),
            Event::new("sunny", ["walk"]),
            Event::new("rainy", ["clean", "shop"]),
            Event::new("sunny", ["shop", "walk"]),
            Event::new("rainy", ["clean"]),
        ]
    }

    #[test]
    fn test_index_merges_duplicates() {
        let corpus = DataIndexer::default().index_events(weather()).unwrap();
        assert_eq!(corpus.predicate_labels(), ["walk", "shop", "clean"]);
        assert_eq!(corpus.outcome_labels(), ["sunny", "rainy"]);
        assert_eq!(corpus.predicate_counts(), [3, 3, 2]);
        // "walk shop" and "shop walk" are the same event once sorted
        assert_eq!(corpus.num_events(), 4);
        assert_eq!(corpus.num_instances(), 5);
        let merged = corpus
            .events()
            .iter()
            .find(|e| e.count == 2)
            .unwrap();
        assert_eq!(merged.predicates, vec![0, 1]);
        assert_eq!(merged.outcome, 0);
    }

    #[test]
    fn test_index_without_sort_keeps_order() {
        let config = IndexerConfig::default().with_sort(false);
        let corpus = DataIndexer::new(config).index_events(weather()).unwrap();
        assert_eq!(corpus.num_events(), 5);
        assert!(corpus.events().iter().all(|e| e.count == 1));
        assert_eq!(corpus.events()[2].outcome, 1);
    }

    #[test]
    fn test_cutoff_drops_predicates_and_events() {
        let events = vec![
            Event::new("a", ["x", "rare"]),
            Event::new("b", ["x"]),
            Event::new("c", ["rare2"]),
        ];
        let config = IndexerConfig::default().with_cutoff(2);
        let corpus = DataIndexer::new(config).index_events(events).unwrap();
        assert_eq!(corpus.predicate_labels(), ["x"]);
        // the outcome of the dropped event keeps its id
        assert_eq!(corpus.outcome_labels(), ["a", "b", "c"]);
        assert_eq!(corpus.num_instances(), 2);
    }

    #[test]
    fn test_empty_stream_fails() {
        for passes in [IndexingPasses::OnePass, IndexingPasses::TwoPass] {
            let config = IndexerConfig::default().with_passes(passes);
            let err = DataIndexer::new(config).index_events(Vec::new()).unwrap_err();
            assert!(matches!(err, Error::Configuration(_)));
            assert!(err.to_string().contains("empty"));
        }
    }

    #[test]
    fn test_cutoff_removing_everything_fails() {
        let config = IndexerConfig::default().with_cutoff(10);
        let err = DataIndexer::new(config).index_events(weather()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_real_valued_rejects_nan() {
        let events = vec![Event::with_values("a", ["x"], vec![f64::NAN]).unwrap()];
        let config = IndexerConfig::default().with_real_values(true);
        let err = DataIndexer::new(config).index_events(events).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_mismatched_values_rejected() {
        let event = Event {
            outcome: "a".to_string(),
            context: vec!["x".to_string(), "y".to_string()],
            values: Some(vec![1.0]),
        };
        for real_valued in [false, true] {
            let config = IndexerConfig::default().with_real_values(real_valued);
            let err = DataIndexer::new(config)
                .index_events(vec![event.clone()])
                .unwrap_err();
            assert!(matches!(err, Error::Configuration(_)));
            assert!(err.to_string().contains("2 predicates but 1 values"));
        }
    }

    #[test]
    fn test_binary_indexer_ignores_values() {
        let events = vec![Event::with_values("a", ["x"], vec![3.0]).unwrap()];
        let corpus = DataIndexer::default().index_events(events).unwrap();
        assert!(!corpus.is_real_valued());
        assert_eq!(corpus.events()[0].value(0), 1.0);
    }
}
