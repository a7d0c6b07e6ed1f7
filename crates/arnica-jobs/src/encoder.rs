//! Circuit encoder: native-gate circuits to the wire format.
//!
//! Angles are converted from radians to units of π and checked against the
//! ranges the resource accepts. Wrapping out-of-range angles is the job of the
//! gate-rewriting passes upstream; here they are rejected.

use std::f64::consts::PI;

use arnica_hal::wire::{WireCircuit, WireOp};
use arnica_hal::{Batch, ResourceIdentity};
use arnica_ir::{CircuitSpec, IrResult, NativeOp, ValidationError};
use serde::{Deserialize, Serialize};

/// Absorbs float noise at the borders of the accepted angle ranges.
const ANGLE_TOLERANCE: f64 = 1e-9;

/// Size limits advertised by the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Circuits per batch.
    #[serde(default = "default_max_circuits")]
    pub max_circuits: usize,
    /// Repetitions per circuit.
    #[serde(default = "default_max_shots")]
    pub max_shots: u32,
    /// Gate operations per circuit.
    #[serde(default = "default_max_operations")]
    pub max_operations: usize,
}

fn default_max_circuits() -> usize {
    50
}

fn default_max_shots() -> u32 {
    2000
}

fn default_max_operations() -> usize {
    2000
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_circuits: default_max_circuits(),
            max_shots: default_max_shots(),
            max_operations: default_max_operations(),
        }
    }
}

/// Encode a whole batch, preserving submission order.
pub fn encode_batch(
    batch: &Batch,
    limits: &Limits,
    resource: &ResourceIdentity,
) -> IrResult<Vec<WireCircuit>> {
    if batch.is_empty() {
        return Err(ValidationError::EmptyBatch);
    }
    if batch.len() > limits.max_circuits {
        return Err(ValidationError::TooManyCircuits {
            count: batch.len(),
            max: limits.max_circuits,
        });
    }
    if batch.shots == 0 || batch.shots > limits.max_shots {
        return Err(ValidationError::InvalidShots {
            shots: batch.shots,
            max: limits.max_shots,
        });
    }

    batch
        .circuits
        .iter()
        .enumerate()
        .map(|(index, circuit)| {
            encode_circuit(circuit, batch.shots, limits, resource).map_err(|e| e.in_circuit(index))
        })
        .collect()
}

/// Encode one circuit.
pub fn encode_circuit(
    circuit: &CircuitSpec,
    shots: u32,
    limits: &Limits,
    resource: &ResourceIdentity,
) -> IrResult<WireCircuit> {
    circuit.validate()?;

    if circuit.num_qubits() > resource.available_qubits {
        return Err(ValidationError::TooManyQubits {
            num_qubits: circuit.num_qubits(),
            max: resource.available_qubits,
        });
    }
    let gates = circuit.gate_count();
    if gates > limits.max_operations {
        return Err(ValidationError::TooManyOperations {
            count: gates,
            max: limits.max_operations,
        });
    }

    let mut ops = circuit
        .operations()
        .iter()
        .map(encode_op)
        .collect::<IrResult<Vec<_>>>()?;
    if !circuit.has_terminal_measure() {
        ops.push(WireOp::Measure);
    }

    Ok(WireCircuit {
        repetitions: shots,
        number_of_qubits: circuit.num_qubits(),
        quantum_circuit: ops,
    })
}

fn encode_op(op: &NativeOp) -> IrResult<WireOp> {
    Ok(match op {
        NativeOp::Rz { qubit, phi } => WireOp::Rz {
            qubit: qubit.0,
            phi: phi / PI,
        },
        NativeOp::R { qubit, theta, phi } => WireOp::R {
            qubit: qubit.0,
            theta: bounded(theta / PI, 0.0, 1.0, "R", "theta")?,
            phi: wrap_phase(phi / PI),
        },
        NativeOp::Rxx { qubits, theta } => WireOp::Rxx {
            qubits: [qubits[0].0, qubits[1].0],
            theta: bounded(theta / PI, 0.0, 0.5, "RXX", "theta")?,
        },
        NativeOp::Measure => WireOp::Measure,
    })
}

/// Check `value` against `[min, max]` and snap values within tolerance of a border.
fn bounded(
    value: f64,
    min: f64,
    max: f64,
    gate: &'static str,
    param: &'static str,
) -> IrResult<f64> {
    if value < min - ANGLE_TOLERANCE || value > max + ANGLE_TOLERANCE {
        return Err(ValidationError::AngleOutOfRange {
            gate,
            param,
            value,
            min,
            max,
        });
    }
    Ok(value.clamp(min, max))
}

/// Map a phase in units of π to `[0, 2)`.
fn wrap_phase(value: f64) -> f64 {
    let wrapped = value.rem_euclid(2.0);
    // rem_euclid may round up to the modulus for tiny negative inputs
    if wrapped >= 2.0 - ANGLE_TOLERANCE {
        0.0
    } else {
        wrapped
    }
}
