//! Raw and assembled execution results.

use std::collections::BTreeMap;

use arnica_ir::ClassicalRegister;
use serde::{Deserialize, Serialize};

use crate::job::JobId;

/// Per-shot measurement samples of one circuit, as reported by the resource.
///
/// `samples[shot][qubit]` is the state (`0` or `1`) of `qubit` in `shot`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawResult {
    /// Samples in shot order.
    pub samples: Vec<Vec<u8>>,
}

impl RawResult {
    /// Wrap a sample list.
    pub fn new(samples: Vec<Vec<u8>>) -> Self {
        Self { samples }
    }

    /// Number of shots.
    pub fn shots(&self) -> usize {
        self.samples.len()
    }
}

/// Frequency table keyed by formatted classical-bit strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Counts(BTreeMap<String, u64>);

impl Counts {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the count of `bitstring`.
    pub fn insert(&mut self, bitstring: impl Into<String>, count: u64) {
        self.0.insert(bitstring.into(), count);
    }

    /// Add `count` to the count of `bitstring`.
    pub fn increment(&mut self, bitstring: impl Into<String>, count: u64) {
        *self.0.entry(bitstring.into()).or_insert(0) += count;
    }

    /// Count of `bitstring`, if observed.
    pub fn get(&self, bitstring: &str) -> Option<u64> {
        self.0.get(bitstring).copied()
    }

    /// Iterate over `(bitstring, count)` in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &u64)> {
        self.0.iter()
    }

    /// Distinct outcomes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing was observed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all counts.
    pub fn total_shots(&self) -> u64 {
        self.0.values().sum()
    }

    /// Outcome with the highest count; ties go to the smallest key.
    pub fn most_frequent(&self) -> Option<(&String, u64)> {
        self.0
            .iter()
            .fold(None, |best: Option<(&String, u64)>, (k, &v)| match best {
                Some((_, bv)) if bv >= v => best,
                _ => Some((k, v)),
            })
    }

    /// Outcomes sorted by decreasing count.
    pub fn sorted(&self) -> Vec<(&String, u64)> {
        let mut entries: Vec<_> = self.0.iter().map(|(k, &v)| (k, v)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }

    /// The same table keyed by `0x…` integers instead of bit strings.
    pub fn to_hex(&self) -> Counts {
        let mut hex = Counts::new();
        for (key, &count) in &self.0 {
            let digits: String = key.chars().filter(|c| !c.is_whitespace()).collect();
            if let Ok(value) = u64::from_str_radix(&digits, 2) {
                hex.increment(format!("{value:#x}"), count);
            }
        }
        hex
    }
}

impl FromIterator<(String, u64)> for Counts {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut counts = Counts::new();
        for (k, v) in iter {
            counts.increment(k, v);
        }
        counts
    }
}

/// Outcome of one circuit as seen by the result assembler.
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitOutcome {
    /// Samples are available.
    Finished(RawResult),
    /// The circuit failed.
    Error(String),
    /// No result yet.
    Pending,
}

/// Caller-facing result of one circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    /// Circuit name.
    pub name: String,
    /// Shots executed.
    pub shots: u64,
    /// Whether the circuit produced samples.
    pub success: bool,
    /// Outcome frequencies in the caller's classical-bit ordering.
    pub counts: Counts,
    /// Per-shot outcomes, when memory was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<Vec<String>>,
    /// Register layout, first declared first, used to read the keys.
    pub registers: Vec<ClassicalRegister>,
    /// Failure message of an unsuccessful circuit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Caller-facing result of a whole batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledResult {
    /// Job the results belong to.
    pub job_id: JobId,
    /// True iff every circuit finished.
    pub success: bool,
    /// Per-circuit results in submission order.
    pub results: Vec<ExperimentResult>,
}

impl AssembledResult {
    /// Counts of the circuit at `index`.
    pub fn counts(&self, index: usize) -> Option<&Counts> {
        self.results.get(index).map(|r| &r.counts)
    }

    /// Messages of the circuits that failed, with their index.
    pub fn errors(&self) -> Vec<(usize, &str)> {
        self.results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.error.as_deref().map(|e| (i, e)))
            .collect()
    }
}
