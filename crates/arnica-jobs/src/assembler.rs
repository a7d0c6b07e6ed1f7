//! Result assembler: raw per-circuit samples to caller-facing results.

use arnica_hal::{
    AssembledResult, CircuitOutcome, Counts, ExperimentResult, JobId, JobState, RawResult,
};
use arnica_ir::{CircuitSpec, MAX_CLBITS, ValidationError};
use rustc_hash::FxHashMap;

use crate::error::{JobsError, JobsResult};
use crate::resolver::{BitMapping, resolve};

/// Per-circuit outcomes of a polled state, in submission order.
///
/// `Finished` yields one outcome per circuit (missing indices are `Pending`),
/// `Error` marks every circuit failed with the resource message, and pending
/// states yield only `Pending`. `Cancelled` and `Unknown` carry no outcome.
pub fn outcomes_from_state(state: &JobState, total: usize) -> JobsResult<Vec<CircuitOutcome>> {
    match state {
        JobState::Finished { results } => {
            if let Some(index) = results.keys().find(|&&i| i >= total) {
                return Err(JobsError::Protocol(format!(
                    "result for circuit {index} in a batch of {total}"
                )));
            }
            Ok((0..total)
                .map(|i| match results.get(&i) {
                    Some(raw) => CircuitOutcome::Finished(raw.clone()),
                    None => CircuitOutcome::Pending,
                })
                .collect())
        }
        JobState::Error { message } => Ok(vec![CircuitOutcome::Error(message.clone()); total]),
        JobState::Queued | JobState::Ongoing { .. } => Ok(vec![CircuitOutcome::Pending; total]),
        JobState::Cancelled | JobState::Unknown => Ok(vec![]),
    }
}

/// Build the caller-facing result of a batch.
///
/// Fails with [`JobsError::IncompleteBatch`] when any circuit has no outcome
/// yet. Success is true iff every circuit finished; failed circuits are still
/// listed, without counts.
pub fn assemble(
    job_id: &JobId,
    circuits: &[CircuitSpec],
    outcomes: &[CircuitOutcome],
    memory: bool,
) -> JobsResult<AssembledResult> {
    let total = circuits.len();
    if outcomes.len() > total {
        return Err(JobsError::Protocol(format!(
            "{} outcomes for a batch of {total}",
            outcomes.len()
        )));
    }
    let pending = total - outcomes.len()
        + outcomes
            .iter()
            .filter(|o| matches!(o, CircuitOutcome::Pending))
            .count();
    if pending > 0 {
        return Err(JobsError::IncompleteBatch { pending, total });
    }
    if let Some((index, circuit)) = circuits
        .iter()
        .enumerate()
        .find(|(_, c)| c.num_clbits() > MAX_CLBITS)
    {
        return Err(ValidationError::TooManyClbits {
            count: circuit.num_clbits(),
            max: MAX_CLBITS,
        }
        .in_circuit(index)
        .into());
    }

    let results: Vec<ExperimentResult> = circuits
        .iter()
        .zip(outcomes)
        .map(|(circuit, outcome)| {
            let mapping = resolve(circuit);
            match outcome {
                CircuitOutcome::Finished(raw) => finished(circuit, &mapping, raw, memory),
                CircuitOutcome::Error(message) => failed(circuit, &mapping, message),
                CircuitOutcome::Pending => failed(circuit, &mapping, "pending"),
            }
        })
        .collect();

    Ok(AssembledResult {
        job_id: job_id.clone(),
        success: results.iter().all(|r| r.success),
        results,
    })
}

fn finished(
    circuit: &CircuitSpec,
    mapping: &BitMapping,
    raw: &RawResult,
    memory: bool,
) -> ExperimentResult {
    let packed: Vec<u64> = raw.samples.iter().map(|s| mapping.apply(s)).collect();

    let mut tally: FxHashMap<u64, u64> = FxHashMap::default();
    for &value in &packed {
        *tally.entry(value).or_insert(0) += 1;
    }
    let counts: Counts = tally
        .into_iter()
        .map(|(value, count)| (mapping.format(value), count))
        .collect();

    ExperimentResult {
        name: circuit.name().to_string(),
        shots: raw.shots() as u64,
        success: true,
        counts,
        memory: memory.then(|| packed.iter().map(|&v| mapping.format(v)).collect()),
        registers: mapping.registers().to_vec(),
        error: None,
    }
}

fn failed(circuit: &CircuitSpec, mapping: &BitMapping, message: &str) -> ExperimentResult {
    ExperimentResult {
        name: circuit.name().to_string(),
        shots: 0,
        success: false,
        counts: Counts::new(),
        memory: None,
        registers: mapping.registers().to_vec(),
        error: Some(message.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use arnica_ir::{ClbitId, QubitId};

    fn measured(name: &str, n: u32) -> CircuitSpec {
        let mut circuit = CircuitSpec::new(name, n);
        circuit.measure_all().unwrap();
        circuit
    }

    #[test]
    fn test_counts_and_order() {
        let circuits = vec![measured("first", 2), measured("second", 2)];
        let outcomes = vec![
            CircuitOutcome::Finished(RawResult::new(vec![vec![0, 1], vec![1, 1], vec![0, 0]])),
            CircuitOutcome::Finished(RawResult::new(vec![vec![1, 0]])),
        ];
        let result = assemble(&JobId::new("j"), &circuits, &outcomes, false).unwrap();
        assert!(result.success);
        assert_eq!(result.results[0].name, "first");
        assert_eq!(result.results[1].name, "second");
        let first = result.counts(0).unwrap();
        assert_eq!(first.get("10"), Some(1));
        assert_eq!(first.get("11"), Some(1));
        assert_eq!(first.get("00"), Some(1));
        assert_eq!(result.counts(1).unwrap().get("01"), Some(1));
        assert_eq!(result.results[0].shots, 3);
        assert!(result.results[0].memory.is_none());
    }

    #[test]
    fn test_partial_mapping_merges_counts() {
        let mut circuit = CircuitSpec::new("partial", 2).with_creg("c", 1);
        circuit.measure(QubitId(1), ClbitId(0)).unwrap();
        let outcomes = vec![CircuitOutcome::Finished(RawResult::new(vec![
            vec![0, 1],
            vec![1, 1],
            vec![1, 0],
        ]))];
        let result = assemble(&JobId::new("j"), &[circuit], &outcomes, false).unwrap();
        let counts = result.counts(0).unwrap();
        assert_eq!(counts.get("1"), Some(2));
        assert_eq!(counts.get("0"), Some(1));
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn test_memory_in_shot_order() {
        let outcomes = vec![CircuitOutcome::Finished(RawResult::new(vec![
            vec![1, 0],
            vec![0, 1],
            vec![1, 0],
        ]))];
        let result =
            assemble(&JobId::new("j"), &[measured("m", 2)], &outcomes, true).unwrap();
        assert_eq!(
            result.results[0].memory.as_deref(),
            Some(&["01".to_string(), "10".to_string(), "01".to_string()][..])
        );
    }

    #[test]
    fn test_pending_is_incomplete() {
        let circuits = vec![measured("a", 1), measured("b", 1)];
        let outcomes = vec![
            CircuitOutcome::Finished(RawResult::new(vec![vec![0]])),
            CircuitOutcome::Pending,
        ];
        let err = assemble(&JobId::new("j"), &circuits, &outcomes, false).unwrap_err();
        assert!(matches!(
            err,
            JobsError::IncompleteBatch {
                pending: 1,
                total: 2
            }
        ));

        let err = assemble(&JobId::new("j"), &circuits, &outcomes[..1], false).unwrap_err();
        assert!(matches!(err, JobsError::IncompleteBatch { pending: 1, .. }));
    }

    #[test]
    fn test_wide_classical_memory_is_rejected() {
        let circuit = CircuitSpec::new("wide", 2).with_creg("c", 70);
        let outcomes = vec![CircuitOutcome::Finished(RawResult::new(vec![vec![1, 1]]))];
        let err = assemble(&JobId::new("j"), &[circuit], &outcomes, false).unwrap_err();
        assert!(matches!(err, JobsError::Validation(_)));
    }

    #[test]
    fn test_circuit_error_fails_batch_keeps_data() {
        let circuits = vec![measured("ok", 1), measured("bad", 1)];
        let outcomes = vec![
            CircuitOutcome::Finished(RawResult::new(vec![vec![1]])),
            CircuitOutcome::Error("ion lost".into()),
        ];
        let result = assemble(&JobId::new("j"), &circuits, &outcomes, false).unwrap();
        assert!(!result.success);
        assert!(result.results[0].success);
        assert_eq!(result.counts(0).unwrap().get("1"), Some(1));
        assert_eq!(result.errors(), vec![(1, "ion lost")]);
    }

    #[test]
    fn test_outcomes_from_finished_out_of_order() {
        let mut results = BTreeMap::new();
        results.insert(1, RawResult::new(vec![vec![1]]));
        results.insert(0, RawResult::new(vec![vec![0]]));
        let outcomes = outcomes_from_state(&JobState::Finished { results }, 2).unwrap();
        assert_eq!(
            outcomes[0],
            CircuitOutcome::Finished(RawResult::new(vec![vec![0]]))
        );
        assert_eq!(
            outcomes[1],
            CircuitOutcome::Finished(RawResult::new(vec![vec![1]]))
        );
    }

    #[test]
    fn test_outcomes_from_finished_missing_and_extra() {
        let mut results = BTreeMap::new();
        results.insert(0, RawResult::new(vec![vec![0]]));
        let outcomes = outcomes_from_state(
            &JobState::Finished {
                results: results.clone(),
            },
            2,
        )
        .unwrap();
        assert_eq!(outcomes[1], CircuitOutcome::Pending);

        results.insert(5, RawResult::default());
        assert!(matches!(
            outcomes_from_state(&JobState::Finished { results }, 2),
            Err(JobsError::Protocol(_))
        ));
    }

    #[test]
    fn test_outcomes_from_error() {
        let outcomes = outcomes_from_state(
            &JobState::Error {
                message: "boom".into(),
            },
            2,
        )
        .unwrap();
        assert_eq!(outcomes, vec![CircuitOutcome::Error("boom".into()); 2]);
    }
}
