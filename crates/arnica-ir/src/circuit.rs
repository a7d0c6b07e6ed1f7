//! Native-gate circuit specification.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::MAX_CLBITS;
use crate::error::{IrResult, ValidationError};
use crate::operation::NativeOp;
use crate::qubit::{ClbitId, QubitId};

/// Name of the register assumed when a circuit declares no classical register.
pub const IMPLICIT_REGISTER: &str = "meas";

/// A named block of classical bits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassicalRegister {
    /// Register name.
    pub name: String,
    /// Number of bits.
    pub size: u32,
}

impl ClassicalRegister {
    /// Create a register.
    pub fn new(name: impl Into<String>, size: u32) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// Declares that the outcome of `qubit` is copied into `clbit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Measurement {
    /// Measured qubit.
    pub qubit: QubitId,
    /// Destination classical bit (global index).
    pub clbit: ClbitId,
}

/// A circuit expressed in the native instruction set, plus its classical layout.
///
/// The classical layout has two parts:
/// - registers, which fix the width and grouping of the caller's memory;
/// - measurement declarations, mapping qubits to classical bits. An empty
///   declaration list means "no explicit mapping": qubit `i` lands in bit `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitSpec {
    name: String,
    num_qubits: u32,
    operations: Vec<NativeOp>,
    #[serde(default)]
    cregs: Vec<ClassicalRegister>,
    #[serde(default)]
    measurements: Vec<Measurement>,
}

impl CircuitSpec {
    /// Create an empty circuit on `num_qubits` qubits.
    pub fn new(name: impl Into<String>, num_qubits: u32) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            operations: vec![],
            cregs: vec![],
            measurements: vec![],
        }
    }

    /// Assemble a circuit from its parts and validate it.
    pub fn from_parts(
        name: impl Into<String>,
        num_qubits: u32,
        operations: Vec<NativeOp>,
        cregs: Vec<ClassicalRegister>,
        measurements: Vec<Measurement>,
    ) -> IrResult<Self> {
        let circuit = Self {
            name: name.into(),
            num_qubits,
            operations,
            cregs,
            measurements,
        };
        circuit.validate()?;
        Ok(circuit)
    }

    /// Builder-style variant of [`CircuitSpec::add_creg`].
    #[must_use]
    pub fn with_creg(mut self, name: impl Into<String>, size: u32) -> Self {
        self.add_creg(name, size);
        self
    }

    /// Declare a classical register; returns the global ids of its bits.
    pub fn add_creg(&mut self, name: impl Into<String>, size: u32) -> Vec<ClbitId> {
        let offset = self.declared_clbits();
        self.cregs.push(ClassicalRegister::new(name, size));
        (offset..offset + size).map(ClbitId).collect()
    }

    /// Circuit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of qubits.
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Operations in program order.
    pub fn operations(&self) -> &[NativeOp] {
        &self.operations
    }

    /// Explicitly declared classical registers.
    pub fn cregs(&self) -> &[ClassicalRegister] {
        &self.cregs
    }

    /// Effective classical registers: the declared ones, or the implicit
    /// `meas` register of `num_qubits` bits when none is declared.
    pub fn registers(&self) -> Vec<ClassicalRegister> {
        if self.cregs.is_empty() {
            vec![ClassicalRegister::new(IMPLICIT_REGISTER, self.num_qubits)]
        } else {
            self.cregs.clone()
        }
    }

    /// Width of the caller's classical memory.
    pub fn num_clbits(&self) -> usize {
        if self.cregs.is_empty() {
            self.num_qubits as usize
        } else {
            self.declared_clbits() as usize
        }
    }

    fn declared_clbits(&self) -> u32 {
        self.cregs.iter().map(|r| r.size).sum()
    }

    /// Explicit qubit → classical-bit declarations, in declaration order.
    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Number of gate operations (terminal measurement excluded).
    pub fn gate_count(&self) -> usize {
        self.operations.iter().filter(|op| !op.is_measure()).count()
    }

    /// Whether the last operation is the terminal measurement.
    pub fn has_terminal_measure(&self) -> bool {
        self.operations.last().is_some_and(NativeOp::is_measure)
    }

    fn push_gate(&mut self, op: NativeOp) -> IrResult<&mut Self> {
        if self.has_terminal_measure() {
            return Err(ValidationError::GateAfterMeasure { gate: op.name() });
        }
        op.check(self.num_qubits)?;
        self.operations.push(op);
        Ok(self)
    }

    /// Apply `RZ(phi)`.
    pub fn rz(&mut self, phi: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.push_gate(NativeOp::Rz { qubit, phi })
    }

    /// Apply `R(theta, phi)`.
    pub fn r(&mut self, theta: f64, phi: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.push_gate(NativeOp::R { qubit, theta, phi })
    }

    /// Apply `RXX(theta)` on a qubit pair.
    pub fn rxx(&mut self, theta: f64, q0: QubitId, q1: QubitId) -> IrResult<&mut Self> {
        self.push_gate(NativeOp::Rxx {
            qubits: [q0, q1],
            theta,
        })
    }

    fn ensure_terminal_measure(&mut self) {
        if !self.has_terminal_measure() {
            self.operations.push(NativeOp::Measure);
        }
    }

    /// Measure `qubit` into classical bit `clbit`.
    ///
    /// The resource always measures the full register; this records where the
    /// outcome of `qubit` must land in the caller's memory.
    pub fn measure(&mut self, qubit: QubitId, clbit: ClbitId) -> IrResult<&mut Self> {
        if qubit.0 >= self.num_qubits {
            return Err(ValidationError::QubitOutOfRange {
                qubit,
                num_qubits: self.num_qubits,
            });
        }
        let num_clbits = self.num_clbits();
        if clbit.index() >= num_clbits {
            return Err(ValidationError::ClbitOutOfRange { clbit, num_clbits });
        }
        self.measurements.push(Measurement { qubit, clbit });
        self.ensure_terminal_measure();
        Ok(self)
    }

    /// Measure several qubits pairwise into several classical bits.
    pub fn measure_many(
        &mut self,
        qubits: impl IntoIterator<Item = QubitId>,
        clbits: impl IntoIterator<Item = ClbitId>,
    ) -> IrResult<&mut Self> {
        for (qubit, clbit) in qubits.into_iter().zip(clbits) {
            self.measure(qubit, clbit)?;
        }
        Ok(self)
    }

    /// Measure every qubit without an explicit mapping.
    pub fn measure_all(&mut self) -> IrResult<&mut Self> {
        self.ensure_terminal_measure();
        Ok(self)
    }

    /// Check the circuit structure.
    ///
    /// This does not know about resource limits; those are enforced by the
    /// encoder. Duplicate classical-bit targets are reported here.
    pub fn validate(&self) -> IrResult<()> {
        if self.num_qubits == 0 {
            return Err(ValidationError::NoQubits);
        }

        let last = self.operations.len().saturating_sub(1);
        for (position, op) in self.operations.iter().enumerate() {
            if op.is_measure() && position != last {
                return Err(ValidationError::MisplacedMeasure { position });
            }
            op.check(self.num_qubits)?;
        }

        if let Some(empty) = self.cregs.iter().find(|r| r.size == 0) {
            return Err(ValidationError::EmptyRegister(empty.name.clone()));
        }

        let num_clbits = self.num_clbits();
        if num_clbits > MAX_CLBITS {
            return Err(ValidationError::TooManyClbits {
                count: num_clbits,
                max: MAX_CLBITS,
            });
        }

        let mut targets: FxHashMap<ClbitId, QubitId> = FxHashMap::default();
        for m in &self.measurements {
            if m.qubit.0 >= self.num_qubits {
                return Err(ValidationError::QubitOutOfRange {
                    qubit: m.qubit,
                    num_qubits: self.num_qubits,
                });
            }
            if m.clbit.index() >= num_clbits {
                return Err(ValidationError::ClbitOutOfRange {
                    clbit: m.clbit,
                    num_clbits,
                });
            }
            if let Some(&first) = targets.get(&m.clbit) {
                if first != m.qubit {
                    return Err(ValidationError::DuplicateClbitTarget {
                        clbit: m.clbit,
                        first,
                        second: m.qubit,
                    });
                }
            }
            targets.insert(m.clbit, m.qubit);
        }

        Ok(())
    }
}
