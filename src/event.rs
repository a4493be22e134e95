use std::fmt;

use crate::error::{Error, Result};

/// A labeled training instance
///
/// An event pairs an outcome with the predicates (contextual features) that
/// were active when it was observed. Real-valued events additionally carry a
/// value per predicate; binary events treat every predicate as having value 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Outcome label
    pub outcome: String,
    /// Active predicate names
    pub context: Vec<String>,
    /// Optional predicate values, parallel to `context`
    pub values: Option<Vec<f64>>,
}

impl Event {
    /// Create a binary event
    pub fn new<O, I, S>(outcome: O, context: I) -> Self
    where
        O: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            outcome: outcome.into(),
            context: context.into_iter().map(Into::into).collect(),
            values: None,
        }
    }

    /// Create a real-valued event
    pub fn with_values<O, I, S>(outcome: O, context: I, values: Vec<f64>) -> Result<Self>
    where
        O: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let context: Vec<String> = context.into_iter().map(Into::into).collect();
        if values.len() != context.len() {
            return Err(Error::config(format!(
                "event has {} predicates but {} values",
                context.len(),
                values.len()
            )));
        }
        Ok(Self {
            outcome: outcome.into(),
            context,
            values: Some(values),
        })
    }

    /// Value of the predicate at `index`, 1.0 for binary events
    #[inline]
    pub fn value(&self, index: usize) -> f64 {
        self.values.as_ref().map_or(1.0, |v| v[index])
    }
}

/// Renders the line format read by [`FileEventStream`](crate::FileEventStream)
impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.outcome)?;
        for (i, pred) in self.context.iter().enumerate() {
            match &self.values {
                Some(values) => write!(f, " {}={}", pred, values[i])?,
                None => write!(f, " {}", pred)?,
            }
        }
        Ok(())
    }
}

/// A resettable source of training events
///
/// `reset` rewinds the stream so that it can be read again; two-pass
/// indexing depends on it.
pub trait EventStream {
    /// Read the next event, `None` at the end of the stream
    fn read(&mut self) -> Result<Option<Event>>;

    /// Rewind to the first event
    fn reset(&mut self) -> Result<()>;
}

/// An event stream backed by an in-memory list
#[derive(Debug, Clone, Default)]
pub struct ListEventStream {
    events: Vec<Event>,
    position: usize,
}

impl ListEventStream {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            position: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl From<Vec<Event>> for ListEventStream {
    fn from(events: Vec<Event>) -> Self {
        Self::new(events)
    }
}

impl EventStream for ListEventStream {
    fn read(&mut self) -> Result<Option<Event>> {
        let event = self.events.get(self.position).cloned();
        if event.is_some() {
            self.position += 1;
        }
        Ok(event)
    }

    fn reset(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = Event::new("sunny", ["walk", "shop"]);
        assert_eq!(event.outcome, "sunny");
        assert_eq!(event.context, vec!["walk", "shop"]);
        assert!(event.values.is_none());
        assert_eq!(event.value(1), 1.0);

        let event = Event::with_values("rainy", ["clean"], vec![0.5]).unwrap();
        assert_eq!(event.value(0), 0.5);
    }

    #[test]
    fn test_event_rejects_value_mismatch() {
        let result = Event::with_values("rainy", ["clean", "walk"], vec![0.5]);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_list_stream_reset() {
        let mut stream = ListEventStream::new(vec![
            Event::new("a", ["x"]),
            Event::new("b", ["y"]),
        ]);
        assert_eq!(stream.read().unwrap().unwrap().outcome, "a");
        assert_eq!(stream.read().unwrap().unwrap().outcome, "b");
        assert!(stream.read().unwrap().is_none());

        stream.reset().unwrap();
        assert_eq!(stream.read().unwrap().unwrap().outcome, "a");
    }
}
