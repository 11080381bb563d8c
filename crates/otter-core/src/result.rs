//! Reconciliation outcomes and their per-host aggregation.

use crate::errors::Result;
use crate::state::Metadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of one consistency check or apply for one entry on one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateResult {
    /// Host that produced the result; empty means "the local host"
    #[serde(default)]
    pub host: String,
    /// Whether the host matches the desired state
    pub consistent: bool,
    /// Entry the result refers to
    pub metadata: Metadata,
    /// Diagnostic message
    #[serde(default)]
    pub message: String,
}

impl StateResult {
    /// A passing result.
    pub fn consistent(metadata: Metadata, message: impl Into<String>) -> Self {
        Self {
            host: String::new(),
            consistent: true,
            metadata,
            message: message.into(),
        }
    }

    /// A failing result.
    pub fn inconsistent(metadata: Metadata, message: impl Into<String>) -> Self {
        Self {
            host: String::new(),
            consistent: false,
            metadata,
            message: message.into(),
        }
    }

    /// Synthetic failure for a host whose command could not complete.
    pub fn faulted(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            consistent: false,
            metadata: Metadata::faulted(),
            message: message.into(),
        }
    }

    /// Attribute the result to `host`.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Decode a JSON array of results as published under `/result/<id>`.
    pub fn list_from_json(data: &str) -> Result<Vec<StateResult>> {
        Ok(serde_json::from_str(data)?)
    }

    /// Encode a result list for publication.
    pub fn list_to_json(results: &[StateResult]) -> Result<String> {
        Ok(serde_json::to_string(results)?)
    }
}

/// Results grouped by host, at most one per `(host, metadata)` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultMap {
    local_host: String,
    results: BTreeMap<String, Vec<StateResult>>,
}

impl ResultMap {
    /// Empty map; results without a host are attributed to `local_host`.
    pub fn new(local_host: impl Into<String>) -> Self {
        Self {
            local_host: local_host.into(),
            results: BTreeMap::new(),
        }
    }

    /// Host used for results that arrive without one.
    pub fn local_host(&self) -> &str {
        &self.local_host
    }

    /// Insert a result. Returns `false` when an entry for the same host and
    /// metadata already exists; the duplicate is dropped.
    pub fn add(&mut self, mut result: StateResult) -> bool {
        if result.host.is_empty() {
            result.host = self.local_host.clone();
        }
        let entries = self.results.entry(result.host.clone()).or_default();
        if entries.iter().any(|r| r.metadata == result.metadata) {
            return false;
        }
        entries.push(result);
        true
    }

    /// Add every result from an iterator.
    pub fn extend(&mut self, results: impl IntoIterator<Item = StateResult>) {
        for result in results {
            self.add(result);
        }
    }

    /// Fold another map into this one.
    pub fn merge(&mut self, other: &ResultMap) {
        for result in other.iter() {
            self.add(result.clone());
        }
    }

    /// Results reported by `host`, in arrival order.
    pub fn results(&self, host: &str) -> &[StateResult] {
        self.results.get(host).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Hosts present in the map, sorted.
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.results.keys().map(String::as_str)
    }

    /// Number of distinct hosts.
    pub fn host_count(&self) -> usize {
        self.results.len()
    }

    /// Total number of results across hosts.
    pub fn len(&self) -> usize {
        self.results.values().map(Vec::len).sum()
    }

    /// True when no results have been added.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Every result, grouped by host.
    pub fn iter(&self) -> impl Iterator<Item = &StateResult> {
        self.results.values().flatten()
    }

    /// True when every result is consistent.
    pub fn is_consistent(&self) -> bool {
        self.iter().all(|r| r.consistent)
    }

    /// Encode as `{ host: [result, ...] }`.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.results)?)
    }

    /// Decode a `{ host: [result, ...] }` document, applying the usual
    /// de-duplication.
    pub fn from_json(local_host: impl Into<String>, data: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<StateResult>> = serde_json::from_str(data)?;
        let mut map = Self::new(local_host);
        for (host, results) in raw {
            map.extend(results.into_iter().map(|r| {
                if r.host.is_empty() {
                    r.with_host(host.clone())
                } else {
                    r
                }
            }));
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_meta() -> Metadata {
        Metadata::new("/etc/motd", "file", "rendered")
    }

    #[test]
    fn add_defaults_host_to_local() {
        let mut map = ResultMap::new("alpha");
        map.add(StateResult::consistent(file_meta(), "Success"));
        assert_eq!(map.results("alpha").len(), 1);
        assert_eq!(map.results("alpha")[0].host, "alpha");
    }

    #[test]
    fn add_is_idempotent_per_host_and_metadata() {
        let mut map = ResultMap::new("alpha");
        assert!(map.add(StateResult::consistent(file_meta(), "first")));
        assert!(!map.add(StateResult::inconsistent(file_meta(), "second")));
        assert_eq!(map.len(), 1);
        assert_eq!(map.results("alpha")[0].message, "first");
    }

    #[test]
    fn same_metadata_on_different_hosts_is_kept() {
        let mut map = ResultMap::new("alpha");
        map.add(StateResult::consistent(file_meta(), "").with_host("alpha"));
        map.add(StateResult::consistent(file_meta(), "").with_host("beta"));
        assert_eq!(map.host_count(), 2);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn merge_skips_duplicates() {
        let mut left = ResultMap::new("alpha");
        left.add(StateResult::consistent(file_meta(), ""));
        let mut right = ResultMap::new("alpha");
        right.add(StateResult::consistent(file_meta(), ""));
        right.add(StateResult::consistent(
            Metadata::new("docker", "package", "installed"),
            "",
        ));
        left.merge(&right);
        assert_eq!(left.results("alpha").len(), 2);
    }

    #[test]
    fn json_roundtrip_keeps_hosts() {
        let mut map = ResultMap::new("alpha");
        map.add(StateResult::faulted("beta", "timeout"));
        map.add(StateResult::consistent(file_meta(), "Success"));
        let json = map.to_json().unwrap();
        let back = ResultMap::from_json("alpha", &json).unwrap();
        assert_eq!(back, map);
        assert!(!back.is_consistent());
    }

    #[test]
    fn faulted_result_carries_marker_metadata() {
        let result = StateResult::faulted("beta", "boom");
        assert_eq!(result.metadata.kind, "Faulted");
        assert_eq!(result.metadata.name, "Faulted");
        assert_eq!(result.metadata.desired_state, "Faulted");
        assert!(!result.consistent);
    }
}
