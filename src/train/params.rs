use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use super::indexer::{DataIndexer, IndexerConfig, IndexingPasses};
use super::trainer::{Gis, GisParams, Qn, QnParams, Trainer};
use crate::error::{Error, Result};
use crate::event::EventStream;
use crate::model::Model;

/// Training algorithm selected by the `Algorithm` key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    /// Generalized iterative scaling
    #[default]
    Maxent,
    /// Quasi-Newton
    MaxentQn,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Maxent => "MAXENT",
            Self::MaxentQn => "MAXENT_QN",
        }
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MAXENT" => Ok(Self::Maxent),
            "MAXENT_QN" => Ok(Self::MaxentQn),
            _ => Err(Error::config(format!("unknown algorithm {:?}", s))),
        }
    }
}

/// String-keyed training configuration
///
/// Every value is validated when it is set, so a parameter set that was
/// built without errors always trains. Recognized keys:
///
/// | Key | Value |
/// |---|---|
/// | `Algorithm` | `MAXENT` or `MAXENT_QN` |
/// | `Iterations` | GIS iterations, QN iteration limit |
/// | `Cutoff` | minimum predicate frequency |
/// | `Threads` | GIS worker threads |
/// | `DataIndexer` | `OnePass` or `TwoPass` |
/// | `Sort` | merge duplicate events |
/// | `RealValued` | keep predicate values |
/// | `Smoothing` | GIS smoothing |
/// | `SmoothingObservation` | GIS smoothing mass |
/// | `L1Cost`, `L2Cost` | QN regularization |
/// | `Epsilon` | QN convergence tolerance |
#[derive(Debug, Clone, Default)]
pub struct TrainingParameters {
    algorithm: Algorithm,
    indexer: IndexerConfig,
    gis: GisParams,
    qn: QnParams,
    entries: BTreeMap<String, String>,
}

impl TrainingParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value` lines; blank lines and `#` comments are skipped
    pub fn from_properties(text: &str) -> Result<Self> {
        let mut params = Self::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                Error::config(format!(
                    "line {}: expected key=value, got {:?}",
                    lineno + 1,
                    line
                ))
            })?;
            params.set(key.trim(), value.trim())?;
        }
        Ok(params)
    }

    /// Read a properties file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_properties(&text)
    }

    /// Set a parameter from its string form
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "Algorithm" => self.algorithm = value.parse()?,
            "Iterations" => {
                let iterations = parse(key, value)?;
                self.gis.set_iterations(iterations)?;
                self.qn.set_max_iterations(iterations)?;
            }
            "Cutoff" => self.indexer.cutoff = parse(key, value)?,
            "Threads" => self.gis.set_threads(parse(key, value)?)?,
            "DataIndexer" => {
                self.indexer.passes = match value {
                    "OnePass" => IndexingPasses::OnePass,
                    "TwoPass" => IndexingPasses::TwoPass,
                    _ => {
                        return Err(Error::config(format!(
                            "unknown data indexer {:?}",
                            value
                        )))
                    }
                }
            }
            "Sort" => self.indexer.sort = parse(key, value)?,
            "RealValued" => self.indexer.real_valued = parse(key, value)?,
            "Smoothing" => self.gis.set_smoothing(parse(key, value)?),
            "SmoothingObservation" => self.gis.set_smoothing_observation(parse(key, value)?)?,
            "L1Cost" => self.qn.set_c1(parse(key, value)?)?,
            "L2Cost" => self.qn.set_c2(parse(key, value)?)?,
            "Epsilon" => self.qn.set_epsilon(parse(key, value)?)?,
            _ => return Err(Error::config(format!("unknown parameter {:?}", key))),
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// The value a key was last set to
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn indexer_config(&self) -> &IndexerConfig {
        &self.indexer
    }

    pub fn gis_params(&self) -> &GisParams {
        &self.gis
    }

    pub fn qn_params(&self) -> &QnParams {
        &self.qn
    }
}

/// Renders the explicitly set keys as properties text
impl fmt::Display for TrainingParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.entries {
            writeln!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::config(format!("invalid value {:?} for {}", value, key)))
}

/// Index `stream` and train a model as described by `params`
pub fn train_model<S: EventStream + ?Sized>(
    params: &TrainingParameters,
    stream: &mut S,
) -> Result<Model> {
    let corpus = DataIndexer::new(params.indexer_config().clone()).index(stream)?;
    match params.algorithm() {
        Algorithm::Maxent => Trainer::<Gis>::from_params(params.gis_params().clone()).train(&corpus),
        Algorithm::MaxentQn => Trainer::<Qn>::from_params(params.qn_params().clone()).train(&corpus),
    }
}
