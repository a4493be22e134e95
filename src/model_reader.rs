use std::collections::HashSet;
use std::io::{BufRead, Read};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::model::{Correction, Model, ModelKind};
use crate::mutf8;

/// Source of the primitives written by a [`ModelWriter`](crate::ModelWriter)
pub trait ModelReader {
    fn read_utf(&mut self) -> Result<String>;
    fn read_int(&mut self) -> Result<i32>;
    fn read_double(&mut self) -> Result<f64>;
}

/// Read a model in the layout produced by [`persist`](crate::persist)
///
/// The leading tag selects the model kind. Every count, pattern and label is
/// validated; any inconsistency is reported as [`Error::Format`].
pub fn read_model<R: ModelReader + ?Sized>(reader: &mut R) -> Result<Model> {
    let tag = reader.read_utf()?;
    let kind = ModelKind::from_tag(&tag)
        .ok_or_else(|| Error::format(format!("unknown model type {:?}", tag)))?;
    let correction = match kind {
        ModelKind::Gis => {
            let constant = reader.read_int()?;
            let parameter = reader.read_double()?;
            Some(Correction {
                constant,
                parameter,
            })
        }
        ModelKind::Qn => None,
    };

    let outcomes = read_labels(reader, "outcome")?;
    let patterns = read_patterns(reader, outcomes.len())?;
    let predicates = read_labels(reader, "predicate")?;

    let grouped = patterns
        .iter()
        .try_fold(0usize, |acc, (n, _)| acc.checked_add(*n))
        .ok_or_else(|| Error::format("pattern group sizes overflow"))?;
    if grouped != predicates.len() {
        return Err(Error::format(format!(
            "pattern groups cover {} predicates but {} were stored",
            grouped,
            predicates.len()
        )));
    }

    let mut contexts = Vec::with_capacity(predicates.len());
    for (n, pattern) in &patterns {
        for _ in 0..*n {
            let mut parameters = Vec::with_capacity(pattern.len());
            for _ in pattern {
                parameters.push(reader.read_double()?);
            }
            contexts.push(Context::new(pattern.clone(), parameters)?);
        }
    }

    match correction {
        Some(correction) => Model::gis(predicates, outcomes, contexts, correction),
        None => Model::qn(predicates, outcomes, contexts),
    }
}

fn read_count<R: ModelReader + ?Sized>(reader: &mut R, what: &str) -> Result<usize> {
    let n = reader.read_int()?;
    usize::try_from(n).map_err(|_| Error::format(format!("negative {} count {}", what, n)))
}

fn read_labels<R: ModelReader + ?Sized>(reader: &mut R, what: &str) -> Result<Vec<String>> {
    let n = read_count(reader, what)?;
    // the count is untrusted, let the vector grow past this
    let mut labels = Vec::with_capacity(n.min(1 << 16));
    let mut seen = HashSet::with_capacity(n.min(1 << 16));
    for _ in 0..n {
        let label = reader.read_utf()?;
        if !seen.insert(label.clone()) {
            return Err(Error::format(format!("duplicate {} {:?}", what, label)));
        }
        labels.push(label);
    }
    Ok(labels)
}

fn read_patterns<R: ModelReader + ?Sized>(
    reader: &mut R,
    num_outcomes: usize,
) -> Result<Vec<(usize, Vec<u32>)>> {
    let n = read_count(reader, "pattern")?;
    let mut patterns = Vec::with_capacity(n.min(1 << 16));
    for _ in 0..n {
        let descriptor = reader.read_utf()?;
        patterns.push(parse_pattern(&descriptor, num_outcomes)?);
    }
    Ok(patterns)
}

/// Parse `"<n> <oid> <oid> ..."`
fn parse_pattern(descriptor: &str, num_outcomes: usize) -> Result<(usize, Vec<u32>)> {
    let invalid = || Error::format(format!("invalid outcome pattern {:?}", descriptor));
    let mut fields = descriptor.split(' ');
    let n = fields
        .next()
        .and_then(|f| f.parse::<usize>().ok())
        .ok_or_else(invalid)?;
    let mut outcomes: Vec<u32> = Vec::new();
    for field in fields {
        let oid = field.parse::<u32>().map_err(|_| invalid())?;
        if oid as usize >= num_outcomes {
            return Err(Error::format(format!(
                "outcome pattern {:?} refers to outcome {} of {}",
                descriptor, oid, num_outcomes
            )));
        }
        if outcomes.last().map_or(false, |&last| last >= oid) {
            return Err(invalid());
        }
        outcomes.push(oid);
    }
    Ok((n, outcomes))
}

/// Reads the layout written by [`BinaryModelWriter`](crate::BinaryModelWriter)
#[derive(Debug)]
pub struct BinaryModelReader<R: Read> {
    inner: R,
}

impl<R: Read> BinaryModelReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf).map_err(Error::from_read)?;
        Ok(buf)
    }
}

impl<R: Read> ModelReader for BinaryModelReader<R> {
    fn read_utf(&mut self) -> Result<String> {
        let len = u16::from_be_bytes(self.read_array()?) as usize;
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf).map_err(Error::from_read)?;
        mutf8::decode(&buf)
    }

    fn read_int(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    fn read_double(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.read_array()?))
    }
}

/// Reads the layout written by [`PlainTextModelWriter`](crate::PlainTextModelWriter)
#[derive(Debug)]
pub struct PlainTextModelReader<R: BufRead> {
    inner: R,
    line: String,
}

impl<R: BufRead> PlainTextModelReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: String::new(),
        }
    }

    fn next_line(&mut self) -> Result<&str> {
        self.line.clear();
        if self.inner.read_line(&mut self.line)? == 0 {
            return Err(Error::format("truncated model stream"));
        }
        let trimmed = self.line.trim_end_matches(|c| c == '\n' || c == '\r');
        Ok(trimmed)
    }
}

impl<R: BufRead> ModelReader for PlainTextModelReader<R> {
    fn read_utf(&mut self) -> Result<String> {
        self.next_line().map(str::to_string)
    }

    fn read_int(&mut self) -> Result<i32> {
        let line = self.next_line()?;
        line.parse()
            .map_err(|_| Error::format(format!("expected an integer, got {:?}", line)))
    }

    fn read_double(&mut self) -> Result<f64> {
        let line = self.next_line()?;
        line.parse()
            .map_err(|_| Error::format(format!("expected a double, got {:?}", line)))
    }
}
