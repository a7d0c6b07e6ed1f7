//! Submission, polling, cancellation and assembly against scripted and
//! offline resources.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use arnica_adapter_offline::{OfflineResource, SampleSource};
use arnica_hal::{Batch, JobHandle, JobId, JobState, Method, Progress, ResourceIdentity, TransportError};
use arnica_ir::{CircuitSpec, ClbitId, QubitId};
use arnica_jobs::{JobEngine, JobsError, ProgressReporter, RetryPolicy, WaitOptions};
use common::*;
use serde_json::json;

fn resource() -> ResourceIdentity {
    ResourceIdentity::offline_simulator("offline_simulator_no_noise")
}

fn fast() -> WaitOptions {
    WaitOptions::unbounded(Duration::from_millis(1))
}

fn scripted_handle(circuits: usize) -> JobHandle {
    let circuits = (0..circuits).map(|i| bell(&format!("c{i}"))).collect();
    JobHandle::new(JobId::new(JOB_ID), resource(), Batch::new(circuits, 5))
}

#[derive(Default)]
struct Recorder(Mutex<Vec<Progress>>);

impl ProgressReporter for Recorder {
    fn update(&self, progress: Progress) {
        self.0.lock().unwrap().push(progress);
    }
}

#[tokio::test(start_paused = true)]
async fn test_two_circuit_batch_finishes_in_order() {
    let transport = ScriptedTransport::new()
        .reply(200, queued())
        .reply(200, ongoing(1))
        .reply(
            200,
            finished(json!({
                "0": [[0, 1], [1, 1], [0, 0], [1, 1], [1, 1]],
                "1": [[1, 0], [1, 1], [0, 0], [1, 1], [1, 1]]
            })),
        );
    let engine = JobEngine::new(Arc::new(transport));

    let handle = engine
        .submit(vec![bell("first"), bell("second")], 5, &resource())
        .await
        .unwrap();
    assert_eq!(handle.job_id().as_str(), JOB_ID);
    assert_eq!(handle.circuit_count(), 2);

    let result = engine.wait(&handle, fast()).await.unwrap();
    assert!(result.success);
    assert_eq!(result.results.len(), 2);

    let first = &result.results[0];
    assert_eq!(first.name, "first");
    assert_eq!(first.shots, 5);
    assert_eq!(first.counts.get("10"), Some(1));
    assert_eq!(first.counts.get("11"), Some(3));
    assert_eq!(first.counts.get("00"), Some(1));

    let second = &result.results[1];
    assert_eq!(second.name, "second");
    assert_eq!(second.counts.get("01"), Some(1));
    assert_eq!(second.counts.get("11"), Some(3));
}

#[tokio::test]
async fn test_submission_wire_format() {
    let transport = Arc::new(ScriptedTransport::new().reply(200, queued()));
    let engine = JobEngine::new(Arc::clone(&transport));

    engine
        .submit_batch(
            Batch::new(vec![bell("bell")], 100),
            &resource(),
            Some("label".into()),
        )
        .await
        .unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::Post);
    assert_eq!(requests[0].path, "submit/default/offline_simulator_no_noise");

    let body = requests[0].body.as_ref().unwrap();
    assert_eq!(body["job_type"], "quantum_circuit");
    assert_eq!(body["label"], "label");
    let circuit = &body["payload"]["circuits"][0];
    assert_eq!(circuit["repetitions"], 100);
    assert_eq!(circuit["number_of_qubits"], 2);
    let ops = circuit["quantum_circuit"].as_array().unwrap();
    assert_eq!(ops[0]["operation"], "R");
    assert_eq!(ops[0]["theta"], 0.5);
    assert_eq!(ops[1]["operation"], "RXX");
    assert_eq!(ops[1]["qubits"], json!([0, 1]));
    assert_eq!(ops.last().unwrap()["operation"], "MEASURE");
}

#[tokio::test]
async fn test_default_label() {
    let transport = Arc::new(ScriptedTransport::new().reply(200, queued()));
    let engine = JobEngine::new(Arc::clone(&transport));
    engine.submit(vec![bell("b")], 1, &resource()).await.unwrap();

    let label = transport.requests()[0].body.as_ref().unwrap()["label"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(label.starts_with("arnica-"));
}

#[tokio::test]
async fn test_invalid_batch_never_reaches_the_network() {
    let transport = Arc::new(ScriptedTransport::new());
    let engine = JobEngine::new(Arc::clone(&transport));

    let zero_shots = engine.submit(vec![bell("b")], 0, &resource()).await;
    assert!(matches!(zero_shots, Err(JobsError::Validation(_))));

    let too_many = engine
        .submit((0..51).map(|i| bell(&format!("c{i}"))).collect(), 1, &resource())
        .await;
    assert!(matches!(too_many, Err(JobsError::Validation(_))));

    let wide = engine
        .submit(vec![bell("b")], 1, &resource().with_qubits(1))
        .await;
    assert!(matches!(wide, Err(JobsError::Validation(_))));

    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_submission_errors_are_not_retried() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .reply(404, json!({"detail": "Resource not found"}))
            .reply(503, json!({"detail": "Resource offline"}))
            .reply(401, json!({"detail": "Invalid token"}))
            .reply(422, json!({"detail": "Invalid circuit"}))
            .fail(TransportError::Connection("reset".into())),
    );
    let engine = JobEngine::new(Arc::clone(&transport));
    let batch = || vec![bell("b")];

    let err = engine.submit(batch(), 1, &resource()).await.unwrap_err();
    assert!(matches!(err, JobsError::ResourceNotFound(ref m) if m.contains("Resource not found")));

    let err = engine.submit(batch(), 1, &resource()).await.unwrap_err();
    assert!(matches!(err, JobsError::ResourceUnavailable(_)));
    assert!(!err.is_retryable());

    let err = engine.submit(batch(), 1, &resource()).await.unwrap_err();
    assert!(matches!(err, JobsError::Unauthorized(_)));

    let err = engine.submit(batch(), 1, &resource()).await.unwrap_err();
    assert!(matches!(err, JobsError::SubmissionRejected { status: 422, ref message } if message == "Invalid circuit"));

    let err = engine.submit(batch(), 1, &resource()).await.unwrap_err();
    assert!(matches!(err, JobsError::SubmissionTransport(_)));

    assert_eq!(transport.request_count(), 5);
}

#[tokio::test]
async fn test_cancel_ongoing_job() {
    let offline = Arc::new(OfflineResource::new().with_stepwise_progress());
    let engine = JobEngine::new(Arc::clone(&offline));
    let handle = engine
        .submit(vec![bell("a"), bell("b")], 10, &resource())
        .await
        .unwrap();

    assert_eq!(
        engine.poll_once(&handle).await.unwrap(),
        JobState::Ongoing { finished_count: 0 }
    );

    engine.cancel(&handle).await.unwrap();
    assert_eq!(engine.poll_once(&handle).await.unwrap(), JobState::Cancelled);

    let again = engine.cancel(&handle).await.unwrap_err();
    assert!(matches!(again, JobsError::AlreadyCancelled(ref id) if id == handle.job_id().as_str()));

    let waited = engine.wait(&handle, fast()).await.unwrap_err();
    assert!(matches!(waited, JobsError::JobCancelled(_)));
}

#[tokio::test]
async fn test_cancel_finished_job_is_forbidden() {
    let offline = Arc::new(OfflineResource::new());
    let engine = JobEngine::new(Arc::clone(&offline));
    let handle = engine.submit(vec![bell("a")], 1, &resource()).await.unwrap();

    let err = engine.cancel(&handle).await.unwrap_err();
    assert!(matches!(err, JobsError::CancellationForbidden { .. }));
}

#[tokio::test]
async fn test_expired_job_is_unknown_not_an_error() {
    let offline = Arc::new(OfflineResource::new());
    let engine = JobEngine::new(Arc::clone(&offline));
    let handle = engine.submit(vec![bell("a")], 1, &resource()).await.unwrap();
    assert!(offline.expire(handle.job_id()));

    assert_eq!(engine.poll_once(&handle).await.unwrap(), JobState::Unknown);

    let err = engine.wait(&handle, fast()).await.unwrap_err();
    assert!(matches!(err, JobsError::JobNotFound(_)));

    let cancel = engine.cancel(&handle).await.unwrap_err();
    assert!(matches!(cancel, JobsError::JobNotFound(_)));
}

#[tokio::test]
async fn test_gone_result_maps_to_unknown() {
    let transport = ScriptedTransport::new()
        .reply(410, json!({"detail": "Result expired"}))
        .reply(200, unknown_job());
    let engine = JobEngine::new(transport);
    let handle = scripted_handle(1);

    assert_eq!(engine.poll_once(&handle).await.unwrap(), JobState::Unknown);
    assert_eq!(engine.poll_once(&handle).await.unwrap(), JobState::Unknown);
}

#[tokio::test]
async fn test_poll_once_is_idempotent() {
    let offline = Arc::new(OfflineResource::new().with_samples(SampleSource::Zeros));
    let engine = JobEngine::new(Arc::clone(&offline));
    let handle = engine.submit(vec![bell("a")], 3, &resource()).await.unwrap();

    let first = engine.poll_once(&handle).await.unwrap();
    let second = engine.poll_once(&handle).await.unwrap();
    assert!(first.is_terminal());
    assert_eq!(first, second);
}

#[tokio::test(start_paused = true)]
async fn test_wait_query_count_is_bounded() {
    let transport = Arc::new(ScriptedTransport::new());
    for _ in 0..20 {
        transport.push(Ok(arnica_hal::Response::new(200, queued())));
    }
    let engine = JobEngine::new(Arc::clone(&transport));
    let handle = scripted_handle(1);

    let options = WaitOptions::new(Duration::from_millis(1000), Duration::from_millis(300));
    let err = engine.wait(&handle, options).await.unwrap_err();

    let JobsError::Timeout { job_id, elapsed } = err else {
        panic!("expected timeout, got {err:?}");
    };
    assert_eq!(job_id, JOB_ID);
    assert!(elapsed >= Duration::from_millis(1000));
    // ceil(1000 / 300) + 1
    assert_eq!(transport.request_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .fail(TransportError::Connection("reset".into()))
            .reply(503, json!({"detail": "busy"}))
            .fail(TransportError::Timeout("30s".into()))
            .reply(200, finished(json!({"0": [[1, 1]]}))),
    );
    let engine = JobEngine::new(Arc::clone(&transport));
    let handle = scripted_handle(1);

    let result = engine.wait(&handle, fast()).await.unwrap();
    assert!(result.success);
    assert_eq!(result.results[0].counts.get("11"), Some(1));
    assert_eq!(transport.request_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_retry_budget_exhausted() {
    let transport = Arc::new(ScriptedTransport::new());
    for _ in 0..10 {
        transport.push(Err(TransportError::Connection("down".into())));
    }
    let engine = JobEngine::new(Arc::clone(&transport)).with_retry_policy(RetryPolicy {
        max_retries: 2,
        ..RetryPolicy::default()
    });
    let handle = scripted_handle(1);

    let err = engine.poll_once(&handle).await.unwrap_err();
    let JobsError::PollingFailed {
        attempts,
        ref last_error,
    } = err
    else {
        panic!("expected polling failure, got {err:?}");
    };
    assert_eq!(attempts, 3);
    assert!(last_error.contains("down"));
    assert!(err.is_retryable());
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retry_budget_resets_after_success() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .fail(TransportError::Connection("a".into()))
            .reply(200, queued())
            .fail(TransportError::Connection("b".into()))
            .reply(200, finished(json!({"0": [[0, 0]]}))),
    );
    let engine = JobEngine::new(Arc::clone(&transport)).with_retry_policy(RetryPolicy {
        max_retries: 1,
        ..RetryPolicy::default()
    });

    let result = engine.wait(&scripted_handle(1), fast()).await.unwrap();
    assert!(result.success);
    assert_eq!(transport.remaining(), 0);
}

#[tokio::test]
async fn test_non_transient_polling_errors() {
    let transport = ScriptedTransport::new()
        .reply(401, json!({"detail": "Invalid token"}))
        .reply(200, json!({"job": {"job_id": JOB_ID}, "response": {"status": "paused"}}))
        .fail(TransportError::Decode("truncated".into()));
    let engine = JobEngine::new(transport);
    let handle = scripted_handle(1);

    assert!(matches!(
        engine.poll_once(&handle).await,
        Err(JobsError::Unauthorized(_))
    ));
    assert!(matches!(
        engine.poll_once(&handle).await,
        Err(JobsError::Protocol(ref m)) if m.contains("paused")
    ));
    assert!(matches!(
        engine.poll_once(&handle).await,
        Err(JobsError::Protocol(_))
    ));
}

#[tokio::test]
async fn test_job_error_is_terminal_with_message() {
    let transport = ScriptedTransport::new()
        .reply(200, error("ion loss in trap 2"))
        .reply(200, error("ion loss in trap 2"));
    let engine = JobEngine::new(transport);
    let handle = scripted_handle(2);

    let err = engine.wait(&handle, fast()).await.unwrap_err();
    assert!(matches!(err, JobsError::JobFailed { ref message, .. } if message == "ion loss in trap 2"));
    assert!(err.is_terminal());

    let state = engine.poll_once(&handle).await.unwrap();
    let assembled = engine.assemble(&handle, &state).unwrap();
    assert!(!assembled.success);
    assert_eq!(assembled.errors().len(), 2);
}

#[tokio::test]
async fn test_assemble_before_terminal_state() {
    let engine = JobEngine::new(ScriptedTransport::new());
    let handle = scripted_handle(3);

    let err = engine
        .assemble(&handle, &JobState::Ongoing { finished_count: 2 })
        .unwrap_err();
    assert!(matches!(err, JobsError::IncompleteBatch { pending: 3, total: 3 }));
}

#[tokio::test(start_paused = true)]
async fn test_progress_is_monotone() {
    let transport = ScriptedTransport::new()
        .reply(200, queued())
        .reply(200, ongoing(2))
        .reply(200, ongoing(1))
        .reply(
            200,
            finished(json!({"0": [[0, 0]], "1": [[0, 1]], "2": [[1, 1]]})),
        );
    let engine = JobEngine::new(transport);
    let reporter = Recorder::default();

    engine
        .wait_with_progress(&scripted_handle(3), fast(), &reporter)
        .await
        .unwrap();

    let seen: Vec<usize> = reporter.0.lock().unwrap().iter().map(|p| p.finished_count).collect();
    assert_eq!(seen, vec![0, 2, 2, 3]);
}

#[tokio::test]
async fn test_results_keyed_past_nine_stay_in_order() {
    let circuits: Vec<CircuitSpec> = (0..11)
        .map(|i| {
            let mut c = CircuitSpec::new(format!("c{i}"), 1);
            c.measure_all().unwrap();
            c
        })
        .collect();
    let fixed = (0..11).map(|i| vec![vec![1u8]; i + 1]).collect();
    let offline = OfflineResource::new().with_samples(SampleSource::Fixed(fixed));
    let engine = JobEngine::new(offline);

    let handle = engine.submit(circuits, 1, &resource()).await.unwrap();
    let result = engine.wait(&handle, fast()).await.unwrap();

    for (i, experiment) in result.results.iter().enumerate() {
        assert_eq!(experiment.name, format!("c{i}"));
        assert_eq!(experiment.counts.get("1"), Some(i as u64 + 1));
    }
}

#[tokio::test]
async fn test_result_outside_batch_is_a_protocol_error() {
    let transport = ScriptedTransport::new()
        .reply(200, finished(json!({"0": [[0, 0]], "3": [[0, 0]]})));
    let engine = JobEngine::new(transport);

    let err = engine.wait(&scripted_handle(1), fast()).await.unwrap_err();
    assert!(matches!(err, JobsError::Protocol(_)));
}

#[tokio::test]
async fn test_finished_with_missing_circuit_is_a_protocol_error() {
    let transport = ScriptedTransport::new().reply(200, finished(json!({"0": [[0, 0]]})));
    let engine = JobEngine::new(transport);

    let err = engine.wait(&scripted_handle(2), fast()).await.unwrap_err();
    match err {
        JobsError::Protocol(message) => assert!(message.contains("1 of 2")),
        other => panic!("expected a protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_partial_mapping_and_memory() {
    let mut circuit = CircuitSpec::new("partial", 3);
    let bits = circuit.add_creg("c", 2);
    circuit
        .measure(QubitId(2), bits[0])
        .unwrap()
        .measure(QubitId(0), bits[1])
        .unwrap();

    let samples = vec![vec![vec![1, 0, 0], vec![1, 1, 0], vec![0, 0, 1]]];
    let offline = OfflineResource::new().with_samples(SampleSource::Fixed(samples));
    let engine = JobEngine::new(offline);

    let handle = engine
        .submit_batch(Batch::new(vec![circuit], 3).with_memory(true), &resource(), None)
        .await
        .unwrap();
    let result = engine.wait(&handle, fast()).await.unwrap();

    let experiment = &result.results[0];
    // Qubit 1 is not mapped, so the first two shots merge.
    assert_eq!(experiment.counts.get("10"), Some(2));
    assert_eq!(experiment.counts.get("01"), Some(1));
    assert_eq!(
        experiment.memory.as_deref(),
        Some(&["10".to_string(), "10".to_string(), "01".to_string()][..])
    );
    assert_eq!(experiment.registers[0].name, "c");
}

#[tokio::test]
async fn test_registers_render_last_declared_first() {
    let mut circuit = CircuitSpec::new("two_registers", 3);
    circuit.add_creg("a", 1);
    circuit.add_creg("b", 2);
    circuit
        .measure_many(
            [QubitId(0), QubitId(1), QubitId(2)],
            [ClbitId(0), ClbitId(1), ClbitId(2)],
        )
        .unwrap();

    let offline = OfflineResource::new().with_samples(SampleSource::Fixed(vec![vec![vec![1, 0, 1]]]));
    let engine = JobEngine::new(offline);
    let handle = engine.submit(vec![circuit], 1, &resource()).await.unwrap();
    let result = engine.wait(&handle, fast()).await.unwrap();

    assert_eq!(result.results[0].counts.get("10 1"), Some(1));
}

#[tokio::test]
async fn test_wait_all_keeps_input_order() {
    let offline = Arc::new(OfflineResource::new().with_queued_polls(2));
    let engine = JobEngine::new(Arc::clone(&offline));

    let first = engine.submit(vec![bell("one")], 2, &resource()).await.unwrap();
    let second = engine.submit(vec![bell("two")], 2, &resource()).await.unwrap();
    let lost = engine.submit(vec![bell("lost")], 2, &resource()).await.unwrap();
    offline.expire(lost.job_id());

    let outcomes = engine
        .wait_all(&[first, second, lost], fast())
        .await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].as_ref().unwrap().results[0].name, "one");
    assert_eq!(outcomes[1].as_ref().unwrap().results[0].name, "two");
    assert!(matches!(outcomes[2], Err(JobsError::JobNotFound(_))));
}
