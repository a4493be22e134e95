use std::io::Write;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::model::Model;
use crate::mutf8;

/// Sink for the primitives of the persisted model layout
///
/// The layout itself is produced by [`persist`]; implementations only decide
/// how strings, integers and doubles are encoded.
pub trait ModelWriter {
    fn write_utf(&mut self, s: &str) -> Result<()>;
    fn write_int(&mut self, value: i32) -> Result<()>;
    fn write_double(&mut self, value: f64) -> Result<()>;
    /// Flush everything written so far
    fn close(&mut self) -> Result<()>;
}

/// Write `model` to `writer`.
///
/// Layout:
///
/// 1. model tag (`"GIS"` or `"QN"`)
/// 2. GIS only: correction constant (int) and correction parameter (double)
/// 3. outcome count followed by the outcome labels
/// 4. pattern count followed by one descriptor per pattern group,
///    `"<n> <oid> <oid> ..."` where `n` is the number of predicates sharing it
/// 5. predicate count followed by the predicate labels in group order
/// 6. every parameter as a double, in the same order
///
/// Predicates are stably sorted by their outcome pattern so that predicates
/// sharing a pattern are adjacent.
pub fn persist<W: ModelWriter + ?Sized>(model: &Model, writer: &mut W) -> Result<()> {
    writer.write_utf(model.kind().tag())?;
    if let Some(correction) = model.correction() {
        writer.write_int(correction.constant)?;
        writer.write_double(correction.parameter)?;
    }

    writer.write_int(count(model.num_outcomes(), "outcomes")?)?;
    for outcome in model.outcomes() {
        writer.write_utf(outcome)?;
    }

    let contexts = model.contexts();
    let mut order: Vec<usize> = (0..contexts.len()).collect();
    order.sort_by(|&a, &b| contexts[a].outcomes().cmp(contexts[b].outcomes()));
    let groups = group_by_pattern(contexts, &order);

    writer.write_int(count(groups.len(), "outcome patterns")?)?;
    for group in &groups {
        let pattern = contexts[group[0]].outcomes();
        writer.write_utf(&pattern_descriptor(group.len(), pattern))?;
    }

    writer.write_int(count(order.len(), "predicates")?)?;
    let predicates = model.predicates();
    for &pid in &order {
        writer.write_utf(&predicates[pid])?;
    }
    for &pid in &order {
        for &param in contexts[pid].parameters() {
            writer.write_double(param)?;
        }
    }
    Ok(())
}

fn count(n: usize, what: &str) -> Result<i32> {
    i32::try_from(n).map_err(|_| Error::format(format!("too many {}: {}", what, n)))
}

/// Split the sorted predicate ids into runs of equal outcome patterns
fn group_by_pattern<'a>(contexts: &[Context], order: &'a [usize]) -> Vec<&'a [usize]> {
    let mut groups = Vec::new();
    let mut start = 0;
    for i in 1..=order.len() {
        if i == order.len()
            || contexts[order[i]].outcomes() != contexts[order[start]].outcomes()
        {
            if i > start {
                groups.push(&order[start..i]);
            }
            start = i;
        }
    }
    groups
}

fn pattern_descriptor(n: usize, pattern: &[u32]) -> String {
    let mut descriptor = n.to_string();
    for oid in pattern {
        descriptor.push(' ');
        descriptor.push_str(&oid.to_string());
    }
    descriptor
}

/// Writes the layout with Java `DataOutput` encodings
///
/// Integers and doubles are big-endian, strings are a big-endian `u16` byte
/// length followed by modified UTF-8.
#[derive(Debug)]
pub struct BinaryModelWriter<W: Write> {
    inner: W,
}

impl<W: Write> BinaryModelWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> ModelWriter for BinaryModelWriter<W> {
    fn write_utf(&mut self, s: &str) -> Result<()> {
        let bytes = mutf8::encode(s);
        let len = u16::try_from(bytes.len()).map_err(|_| {
            Error::format(format!(
                "string of {} bytes does not fit the 65535 byte limit",
                bytes.len()
            ))
        })?;
        self.inner.write_all(&len.to_be_bytes())?;
        self.inner.write_all(&bytes)?;
        Ok(())
    }

    fn write_int(&mut self, value: i32) -> Result<()> {
        self.inner.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    fn write_double(&mut self, value: f64) -> Result<()> {
        self.inner.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Writes the layout as text, one value per line
///
/// Doubles use the shortest representation that parses back to the same
/// bits. Labels may not contain line breaks.
#[derive(Debug)]
pub struct PlainTextModelWriter<W: Write> {
    inner: W,
}

impl<W: Write> PlainTextModelWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> ModelWriter for PlainTextModelWriter<W> {
    fn write_utf(&mut self, s: &str) -> Result<()> {
        if s.contains(|c| c == '\n' || c == '\r') {
            return Err(Error::format(format!(
                "label {:?} contains a line break",
                s
            )));
        }
        writeln!(self.inner, "{}", s)?;
        Ok(())
    }

    fn write_int(&mut self, value: i32) -> Result<()> {
        writeln!(self.inner, "{}", value)?;
        Ok(())
    }

    fn write_double(&mut self, value: f64) -> Result<()> {
        writeln!(self.inner, "{:?}", value)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}
