use fxhash::FxHashMap;
use ndarray::{Array, Array1};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs::File;
use std::hash::Hash;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{AgentError, PersistError};

/// Sparse action-value table. Unseen states read as all zeros and are
/// inserted on first access through the `&mut self` lookups.
#[derive(Debug, Clone)]
pub struct ValueTable<S: Hash + Eq + Clone> {
    n_actions: usize,
    default: Array1<f64>,
    values: FxHashMap<S, Array1<f64>>,
}

#[derive(Serialize, Deserialize)]
struct Checkpoint<S> {
    n_actions: usize,
    entries: Vec<(S, Vec<f64>)>,
}

impl<S: Hash + Eq + Clone> ValueTable<S> {
    pub fn new(n_actions: usize) -> Result<Self, AgentError> {
        if n_actions == 0 {
            return Err(AgentError::InvalidConfiguration(
                "the action space must have at least one action".to_string(),
            ));
        }
        Ok(Self {
            n_actions,
            default: Array::zeros(n_actions),
            values: FxHashMap::default(),
        })
    }

    pub fn n_actions(&self) -> usize {
        self.n_actions
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn check_action(&self, action: usize) -> Result<(), AgentError> {
        if action >= self.n_actions {
            return Err(AgentError::InvalidAction {
                action,
                n_actions: self.n_actions,
            });
        }
        Ok(())
    }

    /// Stored vector for `state`, or `None` if it was never touched.
    pub fn peek(&self, state: &S) -> Option<&Array1<f64>> {
        self.values.get(state)
    }

    pub fn get_vector(&mut self, state: &S) -> &Array1<f64> {
        self.entry(state)
    }

    fn entry(&mut self, state: &S) -> &mut Array1<f64> {
        let default: &Array1<f64> = &self.default;
        self.values
            .entry(state.clone())
            .or_insert_with(|| default.clone())
    }

    pub fn get_value(&mut self, state: &S, action: usize) -> Result<f64, AgentError> {
        self.check_action(action)?;
        Ok(self.entry(state)[action])
    }

    pub fn set_value(&mut self, state: &S, action: usize, value: f64) -> Result<(), AgentError> {
        self.check_action(action)?;
        self.entry(state)[action] = value;
        Ok(())
    }

    pub fn max_value(&mut self, state: &S) -> f64 {
        let values: &Array1<f64> = self.entry(state);
        values
            .iter()
            .skip(1)
            .fold(values[0], |acc, x| acc.max(*x))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&S, &Array1<f64>)> {
        self.values.iter()
    }
}

impl<S: Hash + Eq + Clone + Serialize + DeserializeOwned> ValueTable<S> {
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), PersistError> {
        let checkpoint: Checkpoint<&S> = Checkpoint {
            n_actions: self.n_actions,
            entries: self
                .values
                .iter()
                .map(|(state, values)| (state, values.to_vec()))
                .collect(),
        };
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, &checkpoint)?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, PersistError> {
        let reader = BufReader::new(File::open(path)?);
        let checkpoint: Checkpoint<S> = serde_json::from_reader(reader)?;
        let mut table: ValueTable<S> = Self::new(checkpoint.n_actions)?;
        for (state, values) in checkpoint.entries {
            if values.len() != table.n_actions {
                return Err(PersistError::LengthMismatch {
                    expected: table.n_actions,
                    found: values.len(),
                });
            }
            table.values.insert(state, Array1::from(values));
        }
        Ok(table)
    }
}
