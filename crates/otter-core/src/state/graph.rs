//! Validated, dependency-ordered collection of state entries.
//!
//! Invariants held by every `StateGraph`:
//! - no two entries share equal `Metadata`
//! - every requirement name resolves to at least one entry in the graph
//! - the requirement relation is acyclic
//!
//! Entries are stored in an order in which every requirement appears before
//! the entries that need it. Among independent entries, input order is kept;
//! otherwise any order satisfying the requirements is acceptable.

use super::{Metadata, StateVariant};
use crate::effects::ReconcileEffects;
use crate::errors::Result;
use crate::result::StateResult;
use std::collections::{HashMap, HashSet, VecDeque};

/// State graph validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// An entry with equal metadata already exists.
    #[error("Detected duplicate state entry: {metadata}")]
    DuplicateEntry {
        /// Offending entry
        metadata: Metadata,
    },
    /// A requirement names no entry.
    #[error("Unable to find requirement {requirement} for {metadata}")]
    MissingRequirement {
        /// Entry declaring the requirement
        metadata: Metadata,
        /// Unresolved name
        requirement: String,
    },
    /// Entries require each other, directly or transitively.
    #[error("Detected circular requirement between: {}", names.join(", "))]
    Cycle {
        /// Names of the entries that could not be ordered
        names: Vec<String>,
    },
    /// Declared fields do not describe a valid entry.
    #[error("Invalid state entry {name}: {reason}")]
    InvalidEntry {
        /// Entry name
        name: String,
        /// Validation failure
        reason: String,
    },
    /// The kind selector names no known variant.
    #[error("Unknown state kind: {kind}")]
    UnknownKind {
        /// Unrecognised kind
        kind: String,
    },
}

/// Ordered, validated set of desired states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateGraph {
    entries: Vec<StateVariant>,
}

impl StateGraph {
    /// Empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from unordered entries.
    pub fn from_entries(entries: Vec<StateVariant>) -> std::result::Result<Self, GraphError> {
        let mut graph = Self::new();
        graph.add_many(entries)?;
        Ok(graph)
    }

    /// Add a single entry whose requirements are already present.
    pub fn add(&mut self, entry: StateVariant) -> std::result::Result<(), GraphError> {
        if self.contains(entry.metadata()) {
            return Err(GraphError::DuplicateEntry {
                metadata: entry.metadata().clone(),
            });
        }
        if let Some(missing) = entry
            .requirements()
            .iter()
            .find(|req| !self.contains_name(req))
        {
            return Err(GraphError::MissingRequirement {
                metadata: entry.metadata().clone(),
                requirement: missing.clone(),
            });
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Add a batch of entries in any order.
    ///
    /// Orders the batch with Kahn's algorithm: an entry becomes ready once
    /// every other batch entry carrying one of its required names is placed.
    /// Requirements already satisfied by the graph impose no ordering. The
    /// graph is left untouched on error.
    pub fn add_many(&mut self, entries: Vec<StateVariant>) -> std::result::Result<(), GraphError> {
        let mut seen: HashSet<&Metadata> = self.entries.iter().map(|e| e.metadata()).collect();
        for entry in &entries {
            if !seen.insert(entry.metadata()) {
                return Err(GraphError::DuplicateEntry {
                    metadata: entry.metadata().clone(),
                });
            }
        }

        let mut batch_by_name: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            batch_by_name
                .entry(entry.metadata().name.as_str())
                .or_default()
                .push(idx);
        }

        let mut in_degree = vec![0usize; entries.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); entries.len()];
        for (idx, entry) in entries.iter().enumerate() {
            let mut names: Vec<&str> = entry.requirements().iter().map(String::as_str).collect();
            names.sort_unstable();
            names.dedup();
            for name in names {
                if self.contains_name(name) {
                    continue;
                }
                // An entry never provides for itself; a same-named sibling does.
                let providers: Vec<usize> = batch_by_name
                    .get(name)
                    .into_iter()
                    .flatten()
                    .copied()
                    .filter(|&provider| provider != idx)
                    .collect();
                if providers.is_empty() {
                    return Err(GraphError::MissingRequirement {
                        metadata: entry.metadata().clone(),
                        requirement: name.to_string(),
                    });
                }
                for provider in providers {
                    dependents[provider].push(idx);
                    in_degree[idx] += 1;
                }
            }
        }

        let mut ready: VecDeque<usize> = (0..entries.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(entries.len());
        while let Some(idx) = ready.pop_front() {
            order.push(idx);
            for &next in &dependents[idx] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push_back(next);
                }
            }
        }

        if order.len() < entries.len() {
            let mut names: Vec<String> = Vec::new();
            for (idx, entry) in entries.iter().enumerate() {
                let name = &entry.metadata().name;
                if in_degree[idx] > 0 && !names.contains(name) {
                    names.push(name.clone());
                }
            }
            return Err(GraphError::Cycle { names });
        }

        let mut slots: Vec<Option<StateVariant>> = entries.into_iter().map(Some).collect();
        for idx in order {
            if let Some(entry) = slots[idx].take() {
                self.entries.push(entry);
            }
        }
        Ok(())
    }

    /// True when an entry with equal metadata exists.
    pub fn contains(&self, metadata: &Metadata) -> bool {
        self.entries.iter().any(|e| e.metadata() == metadata)
    }

    /// True when any entry carries `name`.
    pub fn contains_name(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.metadata().name == name)
    }

    /// Entries carrying `name`.
    pub fn get<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a StateVariant> + 'a {
        self.entries.iter().filter(move |e| e.metadata().name == name)
    }

    /// Entries in dependency order.
    pub fn iter(&self) -> impl Iterator<Item = &StateVariant> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True for an empty graph.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run the consistency check of every entry, in order.
    pub async fn check_all<E>(&self, effects: &E) -> Vec<StateResult>
    where
        E: ReconcileEffects + ?Sized,
    {
        let mut results = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            results.push(entry.consistent(effects).await);
        }
        results
    }

    /// Apply every entry, in order. A failing entry does not stop the rest.
    pub async fn apply_all<E>(&self, effects: &E) -> Vec<StateResult>
    where
        E: ReconcileEffects + ?Sized,
    {
        let mut results = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let result = entry.apply(effects).await;
            if !result.consistent {
                tracing::warn!(entry = %entry.metadata(), message = %result.message, "state failed");
            }
            results.push(result);
        }
        results
    }

    /// Encode the processed (wire) form: a JSON array of entries.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.entries)?)
    }

    /// Decode and validate the processed (wire) form.
    pub fn from_json(data: &str) -> Result<Self> {
        let entries: Vec<StateVariant> = serde_json::from_str(data)?;
        Ok(Self::from_entries(entries)?)
    }

    /// Decode and validate the declarative form
    /// `{ name: { "<kind>.<state>": { fields } } }`.
    pub fn from_declarative(document: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(names) = document else {
            return Err(crate::OtterError::invalid(
                "state document must map entry names to sections",
            ));
        };
        let mut entries = Vec::new();
        for (name, sections) in names {
            let serde_json::Value::Object(sections) = sections else {
                return Err(GraphError::InvalidEntry {
                    name,
                    reason: "expected a mapping of <kind>.<state> sections".to_string(),
                }
                .into());
            };
            for (section, fields) in sections {
                let metadata = Metadata::from_section(&name, &section)?;
                entries.push(StateVariant::from_section(metadata, fields)?);
            }
        }
        Ok(Self::from_entries(entries)?)
    }
}

impl<'a> IntoIterator for &'a StateGraph {
    type Item = &'a StateVariant;
    type IntoIter = std::slice::Iter<'a, StateVariant>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
