//! Native operations accepted by AQT resources.
//!
//! | Operation | Qubits | Parameters (radians) | Meaning                          |
//! |-----------|--------|----------------------|----------------------------------|
//! | `Rz`      | 1      | `phi`                | Z-axis rotation                  |
//! | `R`       | 1      | `theta`, `phi`       | Rotation about an equatorial axis|
//! | `Rxx`     | 2      | `theta`              | Mølmer-Sørensen entangling gate  |
//! | `Measure` | all    | -                    | Terminal full-register readout   |

use serde::{Deserialize, Serialize};

use crate::error::{IrResult, ValidationError};
use crate::qubit::QubitId;

/// A single native operation. Angles are stored in radians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum NativeOp {
    /// Z-axis rotation by `phi`.
    Rz {
        /// Target qubit.
        qubit: QubitId,
        /// Rotation angle.
        phi: f64,
    },
    /// Rotation by `theta` about the equatorial axis at azimuth `phi`.
    R {
        /// Target qubit.
        qubit: QubitId,
        /// Rotation angle.
        theta: f64,
        /// Axis azimuth.
        phi: f64,
    },
    /// Mølmer-Sørensen gate `exp(-i·θ/2·XX)`.
    Rxx {
        /// Target qubit pair; any pair is valid (all-to-all connectivity).
        qubits: [QubitId; 2],
        /// Entangling angle.
        theta: f64,
    },
    /// Projective measurement of every qubit.
    Measure,
}

impl NativeOp {
    /// Operation name as used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            NativeOp::Rz { .. } => "RZ",
            NativeOp::R { .. } => "R",
            NativeOp::Rxx { .. } => "RXX",
            NativeOp::Measure => "MEASURE",
        }
    }

    /// Whether this is the terminal measurement.
    pub fn is_measure(&self) -> bool {
        matches!(self, NativeOp::Measure)
    }

    /// Qubits addressed by this operation (empty for `Measure`).
    pub fn qubits(&self) -> Vec<QubitId> {
        match self {
            NativeOp::Rz { qubit, .. } | NativeOp::R { qubit, .. } => vec![*qubit],
            NativeOp::Rxx { qubits, .. } => qubits.to_vec(),
            NativeOp::Measure => vec![],
        }
    }

    /// Check qubit ranges, operand distinctness and angle finiteness.
    pub fn check(&self, num_qubits: u32) -> IrResult<()> {
        for qubit in self.qubits() {
            if qubit.0 >= num_qubits {
                return Err(ValidationError::QubitOutOfRange { qubit, num_qubits });
            }
        }

        let finite = match self {
            NativeOp::Rz { phi, .. } => phi.is_finite(),
            NativeOp::R { theta, phi, .. } => theta.is_finite() && phi.is_finite(),
            NativeOp::Rxx { qubits, theta } => {
                if qubits[0] == qubits[1] {
                    return Err(ValidationError::DuplicateQubit {
                        qubit: qubits[0],
                        gate: self.name(),
                    });
                }
                theta.is_finite()
            }
            NativeOp::Measure => true,
        };

        if finite {
            Ok(())
        } else {
            Err(ValidationError::NonFiniteAngle { gate: self.name() })
        }
    }
}
