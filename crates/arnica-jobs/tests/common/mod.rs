//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use arnica_hal::{Request, Response, Transport, TransportError, TransportResult};
use arnica_ir::{CircuitSpec, QubitId};
use async_trait::async_trait;
use serde_json::{Value, json};

pub const JOB_ID: &str = "ccaa39de-d0f3-4c8b-bdb1-4d74f0c2f450";

/// A transport that replays canned answers and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<TransportResult<Response>>>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, status: u16, body: Value) -> Self {
        self.push(Ok(Response::new(status, body)));
        self
    }

    pub fn fail(self, error: TransportError) -> Self {
        self.push(Err(error));
        self
    }

    pub fn push(&self, reply: TransportResult<Response>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, request: Request) -> TransportResult<Response> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("script exhausted".into())))
    }
}

fn job(response: Value) -> Value {
    json!({
        "job": {
            "job_id": JOB_ID,
            "job_type": "quantum_circuit",
            "label": "Example computation",
            "resource_id": "offline_simulator_no_noise",
            "workspace_id": "default"
        },
        "response": response
    })
}

pub fn queued() -> Value {
    job(json!({"status": "queued"}))
}

pub fn ongoing(finished_count: usize) -> Value {
    job(json!({"status": "ongoing", "finished_count": finished_count}))
}

pub fn finished(result: Value) -> Value {
    job(json!({"status": "finished", "result": result}))
}

pub fn error(message: &str) -> Value {
    job(json!({"status": "error", "message": message}))
}

pub fn cancelled() -> Value {
    job(json!({"status": "cancelled"}))
}

pub fn unknown_job() -> Value {
    json!({"job_id": JOB_ID, "message": "unknown job_id"})
}

/// Two-qubit circuit measured into the implicit register.
pub fn bell(name: &str) -> CircuitSpec {
    let mut circuit = CircuitSpec::new(name, 2);
    circuit
        .r(std::f64::consts::FRAC_PI_2, 0.0, QubitId(0))
        .unwrap()
        .rxx(std::f64::consts::FRAC_PI_2, QubitId(0), QubitId(1))
        .unwrap();
    circuit.measure_all().unwrap();
    circuit
}
