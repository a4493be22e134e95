use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::context::{eval_context, Context, Slack};
use crate::error::{Error, Result};
use crate::model_reader::{read_model, BinaryModelReader};
use crate::model_writer::{persist, BinaryModelWriter, ModelWriter};

/// Which optimizer produced a model
///
/// The kind is stored as the leading tag of the persisted model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// Generalized iterative scaling
    Gis,
    /// Quasi-Newton (L-BFGS)
    Qn,
}

impl ModelKind {
    /// The tag written at the start of a persisted model
    pub fn tag(self) -> &'static str {
        match self {
            Self::Gis => "GIS",
            Self::Qn => "QN",
        }
    }

    /// Parse a model tag, `None` for unknown kinds
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "GIS" => Some(Self::Gis),
            "QN" => Some(Self::Qn),
            _ => None,
        }
    }
}

/// The GIS correction constant and the weight of the correction feature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    /// Upper bound on the number of active predicates of a training event
    pub constant: i32,
    /// Weight of the correction feature
    pub parameter: f64,
}

/// A trained maximum entropy model
///
/// Models are immutable. Evaluation only reads the parameters, so a model
/// can be shared freely between threads.
#[derive(Debug, Clone)]
pub struct Model {
    kind: ModelKind,
    correction: Option<Correction>,
    outcomes: Vec<String>,
    predicates: Vec<String>,
    predicate_index: HashMap<String, usize>,
    contexts: Vec<Context>,
}

impl Model {
    /// Assemble an iterative scaling model
    pub fn gis(
        predicates: Vec<String>,
        outcomes: Vec<String>,
        contexts: Vec<Context>,
        correction: Correction,
    ) -> Result<Self> {
        if correction.constant < 1 {
            return Err(Error::format(format!(
                "correction constant must be positive, got {}",
                correction.constant
            )));
        }
        if !correction.parameter.is_finite() {
            return Err(Error::format("correction parameter is not finite"));
        }
        Self::build(
            ModelKind::Gis,
            Some(correction),
            predicates,
            outcomes,
            contexts,
        )
    }

    /// Assemble a quasi-Newton model
    pub fn qn(predicates: Vec<String>, outcomes: Vec<String>, contexts: Vec<Context>) -> Result<Self> {
        Self::build(ModelKind::Qn, None, predicates, outcomes, contexts)
    }

    fn build(
        kind: ModelKind,
        correction: Option<Correction>,
        predicates: Vec<String>,
        outcomes: Vec<String>,
        contexts: Vec<Context>,
    ) -> Result<Self> {
        if predicates.len() != contexts.len() {
            return Err(Error::format(format!(
                "{} predicates but {} contexts",
                predicates.len(),
                contexts.len()
            )));
        }
        let mut seen = HashSet::with_capacity(outcomes.len());
        for outcome in &outcomes {
            if !seen.insert(outcome.as_str()) {
                return Err(Error::format(format!("duplicate outcome {:?}", outcome)));
            }
        }
        let num_outcomes = outcomes.len();
        let mut predicate_index = HashMap::with_capacity(predicates.len());
        for (pid, (pred, context)) in predicates.iter().zip(&contexts).enumerate() {
            if predicate_index.insert(pred.clone(), pid).is_some() {
                return Err(Error::format(format!("duplicate predicate {:?}", pred)));
            }
            if let Some(&oid) = context.outcomes().last() {
                if oid as usize >= num_outcomes {
                    return Err(Error::format(format!(
                        "predicate {:?} refers to outcome {} of {}",
                        pred, oid, num_outcomes
                    )));
                }
            }
            if context.parameters().iter().any(|p| !p.is_finite()) {
                return Err(Error::format(format!(
                    "predicate {:?} has a non-finite parameter",
                    pred
                )));
            }
        }
        Ok(Self {
            kind,
            correction,
            outcomes,
            predicates,
            predicate_index,
            contexts,
        })
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    /// GIS correction scalars, `None` for quasi-Newton models
    pub fn correction(&self) -> Option<Correction> {
        self.correction
    }

    pub fn num_outcomes(&self) -> usize {
        self.outcomes.len()
    }

    pub fn num_predicates(&self) -> usize {
        self.predicates.len()
    }

    /// Outcome labels in id order
    pub fn outcomes(&self) -> &[String] {
        &self.outcomes
    }

    /// Predicate labels in id order
    pub fn predicates(&self) -> &[String] {
        &self.predicates
    }

    /// All contexts, indexed by predicate id
    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    /// Convert an outcome id to its label
    pub fn outcome(&self, id: usize) -> Option<&str> {
        self.outcomes.get(id).map(String::as_str)
    }

    /// Convert an outcome label to its id
    pub fn index_of(&self, outcome: &str) -> Option<usize> {
        self.outcomes.iter().position(|o| o == outcome)
    }

    /// Parameters of a predicate, `None` if the model never saw it
    pub fn context(&self, predicate: &str) -> Option<&Context> {
        self.predicate_index
            .get(predicate)
            .map(|&pid| &self.contexts[pid])
    }

    /// Evaluate a binary context, returning one probability per outcome
    ///
    /// Predicates unknown to the model are ignored.
    pub fn eval<S: AsRef<str>>(&self, context: &[S]) -> Vec<f64> {
        let mut probs = vec![0.0; self.num_outcomes()];
        self.eval_active(self.resolve(context, None), &mut probs);
        probs
    }

    /// Evaluate a real-valued context
    pub fn eval_with_values<S: AsRef<str>>(&self, context: &[S], values: &[f64]) -> Result<Vec<f64>> {
        let mut probs = vec![0.0; self.num_outcomes()];
        self.eval_into(context, Some(values), &mut probs)?;
        Ok(probs)
    }

    /// Evaluate into a caller-provided buffer of `num_outcomes()` slots
    pub fn eval_into<S: AsRef<str>>(
        &self,
        context: &[S],
        values: Option<&[f64]>,
        probs: &mut [f64],
    ) -> Result<()> {
        if probs.len() != self.num_outcomes() {
            return Err(Error::config(format!(
                "probability buffer has {} slots for {} outcomes",
                probs.len(),
                self.num_outcomes()
            )));
        }
        if let Some(values) = values {
            if values.len() != context.len() {
                return Err(Error::config(format!(
                    "context has {} predicates but {} values",
                    context.len(),
                    values.len()
                )));
            }
        }
        self.eval_active(self.resolve(context, values), probs);
        Ok(())
    }

    fn resolve<'a, S: AsRef<str> + 'a>(
        &'a self,
        context: &'a [S],
        values: Option<&'a [f64]>,
    ) -> impl Iterator<Item = (usize, f64)> + 'a {
        context.iter().enumerate().filter_map(move |(i, pred)| {
            self.predicate_index
                .get(pred.as_ref())
                .map(|&pid| (pid, values.map_or(1.0, |v| v[i])))
        })
    }

    fn eval_active<I: Iterator<Item = (usize, f64)>>(&self, active: I, probs: &mut [f64]) {
        probs.fill(0.0);
        let mut mass = vec![0.0; probs.len()];
        let (scale, slack) = match self.correction {
            Some(correction) => {
                let constant = f64::from(correction.constant);
                let slack = Slack {
                    constant,
                    weight: correction.parameter / constant,
                };
                (1.0 / constant, Some(slack))
            }
            None => (1.0, None),
        };
        eval_context(&self.contexts, active, scale, slack, probs, &mut mass);
    }

    /// Label of the most probable outcome in `probs`
    pub fn best_outcome(&self, probs: &[f64]) -> Option<&str> {
        let best = probs
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, &p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((i, p)),
            })?;
        self.outcome(best.0)
    }

    /// Render every outcome with its probability, e.g. `A[0.6000] B[0.4000]`
    pub fn all_outcomes(&self, probs: &[f64]) -> String {
        self.outcomes
            .iter()
            .zip(probs)
            .map(|(outcome, p)| format!("{}[{:.4}]", outcome, p))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Write the model in the binary format
    pub fn write<W: Write>(&self, w: W) -> Result<()> {
        let mut writer = BinaryModelWriter::new(w);
        persist(self, &mut writer)?;
        writer.close()
    }

    /// Read a model in the binary format
    pub fn read<R: Read>(r: R) -> Result<Self> {
        read_model(&mut BinaryModelReader::new(r))
    }

    /// Read a binary model from memory
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        Self::read(buf)
    }

    /// Save the model to a file in the binary format
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.write(BufWriter::new(file))
    }

    /// Load a binary model file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::read(BufReader::new(file))
    }

    /// Print the model in human-readable format
    pub fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "MODEL = {{")?;
        writeln!(w, "  kind: {}", self.kind.tag())?;
        if let Some(correction) = self.correction {
            writeln!(w, "  correction_constant: {}", correction.constant)?;
            writeln!(w, "  correction_parameter: {:.6}", correction.parameter)?;
        }
        writeln!(w, "  num_outcomes: {}", self.num_outcomes())?;
        writeln!(w, "  num_predicates: {}", self.num_predicates())?;
        writeln!(w, "}}\n")?;
        writeln!(w, "OUTCOMES = {{")?;
        for (i, outcome) in self.outcomes.iter().enumerate() {
            writeln!(w, "  {:>5}: {}", i, outcome)?;
        }
        writeln!(w, "}}\n")?;
        writeln!(w, "PARAMETERS = {{")?;
        for (pred, context) in self.predicates.iter().zip(&self.contexts) {
            for (oid, param) in context.iter() {
                writeln!(
                    w,
                    "  {} --> {}: {:.6}",
                    pred, self.outcomes[oid as usize], param
                )?;
            }
        }
        writeln!(w, "}}\n")?;
        Ok(())
    }
}
