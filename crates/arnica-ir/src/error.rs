//! Validation errors for circuits and batches.

use thiserror::Error;

use crate::qubit::{ClbitId, QubitId};

/// Structural or size violation detected before anything is sent to a resource.
///
/// Validation errors are never retried: the caller must fix the batch.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// The batch contains no circuit.
    #[error("Batch contains no circuits")]
    EmptyBatch,

    /// The batch holds more circuits than the resource accepts.
    #[error("Batch has {count} circuits but at most {max} are allowed")]
    TooManyCircuits {
        /// Circuits in the batch.
        count: usize,
        /// Resource maximum.
        max: usize,
    },

    /// Shot count outside `1..=max`.
    #[error("Invalid shots: {shots} (must be between 1 and {max})")]
    InvalidShots {
        /// Requested repetitions.
        shots: u32,
        /// Resource maximum.
        max: u32,
    },

    /// A circuit declares no qubit.
    #[error("Circuit declares no qubits")]
    NoQubits,

    /// A circuit uses more qubits than the resource has.
    #[error("Circuit has {num_qubits} qubits but the resource supports at most {max}")]
    TooManyQubits {
        /// Declared qubits.
        num_qubits: u32,
        /// Resource maximum.
        max: u32,
    },

    /// A circuit holds more gates than the resource accepts.
    #[error("Circuit has {count} operations but at most {max} are allowed")]
    TooManyOperations {
        /// Gate operations, terminal measurement excluded.
        count: usize,
        /// Resource maximum.
        max: usize,
    },

    /// An operation addresses a qubit outside the declared register.
    #[error("Qubit {qubit} is out of range for a {num_qubits}-qubit circuit")]
    QubitOutOfRange {
        /// Offending qubit.
        qubit: QubitId,
        /// Declared qubits.
        num_qubits: u32,
    },

    /// A two-qubit gate acts twice on the same qubit.
    #[error("Duplicate qubit {qubit} in {gate}")]
    DuplicateQubit {
        /// Offending qubit.
        qubit: QubitId,
        /// Gate name.
        gate: &'static str,
    },

    /// A measurement targets a classical bit outside the declared registers.
    #[error("Classical bit {clbit} is out of range for {num_clbits} classical bits")]
    ClbitOutOfRange {
        /// Offending classical bit.
        clbit: ClbitId,
        /// Declared classical bits.
        num_clbits: usize,
    },

    /// Two qubits are measured into the same classical bit.
    #[error("Classical bit {clbit} is assigned by both {first} and {second}")]
    DuplicateClbitTarget {
        /// Contended classical bit.
        clbit: ClbitId,
        /// Qubit declared first.
        first: QubitId,
        /// Qubit declared second.
        second: QubitId,
    },

    /// The classical memory does not fit the packed shot representation.
    #[error("Circuit declares {count} classical bits but at most {max} are supported")]
    TooManyClbits {
        /// Declared classical bits.
        count: usize,
        /// Supported maximum.
        max: usize,
    },

    /// A classical register of size zero.
    #[error("Classical register '{0}' is empty")]
    EmptyRegister(String),

    /// More than one `MEASURE`, or a `MEASURE` that is not the last operation.
    #[error("MEASURE must appear once, as the last operation (found at position {position})")]
    MisplacedMeasure {
        /// Position of the offending `MEASURE`.
        position: usize,
    },

    /// A gate was appended after the terminal measurement.
    #[error("Cannot append {gate} after the terminal measurement")]
    GateAfterMeasure {
        /// Gate name.
        gate: &'static str,
    },

    /// An angle is NaN or infinite.
    #[error("Non-finite angle in {gate}")]
    NonFiniteAngle {
        /// Gate name.
        gate: &'static str,
    },

    /// A normalized angle falls outside the range accepted by the resource.
    #[error("{gate} {param} = {value} (units of π) is outside [{min}, {max}]")]
    AngleOutOfRange {
        /// Gate name.
        gate: &'static str,
        /// Parameter name.
        param: &'static str,
        /// Normalized value.
        value: f64,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },

    /// Wraps an error with the position of the failing circuit in its batch.
    #[error("Circuit {index}: {reason}")]
    InCircuit {
        /// Submission index.
        index: usize,
        /// Underlying violation.
        reason: Box<ValidationError>,
    },
}

impl ValidationError {
    /// Attach the batch position of the circuit that failed.
    pub fn in_circuit(self, index: usize) -> Self {
        ValidationError::InCircuit {
            index,
            reason: Box::new(self),
        }
    }
}

/// Result type for circuit operations.
pub type IrResult<T> = Result<T, ValidationError>;
