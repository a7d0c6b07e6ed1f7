//! Bit permutation resolver.
//!
//! The resource measures every qubit and reports one state per qubit and shot.
//! The caller expects outcomes in its own classical-bit layout, so each circuit
//! gets a [`BitMapping`] from physical qubit index to classical bit index:
//!
//! - explicit `(qubit, clbit)` declarations are used as given, including
//!   partial ones (unmapped qubits are dropped);
//! - without declarations, qubit `i` lands in bit `i`, for
//!   `i < min(num_qubits, num_clbits)`.
//!
//! Classical bit 0 is the least significant bit of the formatted key.

use arnica_ir::{CircuitSpec, ClassicalRegister};

/// Qubit → classical-bit mapping of one circuit, plus its register layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMapping {
    /// `(qubit, clbit)` pairs, in declaration order.
    entries: Vec<(usize, usize)>,
    num_clbits: usize,
    registers: Vec<ClassicalRegister>,
}

/// Compute the mapping of `circuit`.
///
/// Pure and deterministic. Duplicate classical-bit targets are rejected at
/// encode time; if present anyway, the last declaration wins.
pub fn resolve(circuit: &CircuitSpec) -> BitMapping {
    let num_clbits = circuit.num_clbits();
    let entries = if circuit.measurements().is_empty() {
        let width = (circuit.num_qubits() as usize).min(num_clbits);
        (0..width).map(|i| (i, i)).collect()
    } else {
        let mut entries: Vec<(usize, usize)> = Vec::with_capacity(circuit.measurements().len());
        for m in circuit.measurements() {
            let entry = (m.qubit.index(), m.clbit.index());
            if !entries.contains(&entry) {
                entries.push(entry);
            }
        }
        entries
    };

    BitMapping {
        entries,
        num_clbits,
        registers: circuit.registers(),
    }
}

impl BitMapping {
    /// `(qubit, clbit)` pairs.
    pub fn entries(&self) -> &[(usize, usize)] {
        &self.entries
    }

    /// Width of the classical memory.
    pub fn num_clbits(&self) -> usize {
        self.num_clbits
    }

    /// Register layout, first declared first.
    pub fn registers(&self) -> &[ClassicalRegister] {
        &self.registers
    }

    /// Qubit copied into `clbit`, if any.
    pub fn qubit_for(&self, clbit: usize) -> Option<usize> {
        self.entries
            .iter()
            .rev()
            .find(|(_, c)| *c == clbit)
            .map(|(q, _)| *q)
    }

    /// Pack one shot into an integer, classical bit `i` at position `i`.
    ///
    /// Entries whose qubit is beyond the sample length are ignored; any
    /// non-zero state counts as 1. Classical bits past [`arnica_ir::MAX_CLBITS`] do not
    /// fit and read as 0; [`crate::assembler::assemble`] rejects such circuits.
    pub fn apply(&self, sample: &[u8]) -> u64 {
        let mut memory = vec![0u8; self.num_clbits];
        for &(qubit, clbit) in &self.entries {
            if let (Some(&state), Some(slot)) = (sample.get(qubit), memory.get_mut(clbit)) {
                *slot = state;
            }
        }
        memory
            .iter()
            .enumerate()
            .filter(|(_, state)| **state != 0)
            .fold(0u64, |acc, (bit, _)| {
                acc | u32::try_from(bit)
                    .ok()
                    .and_then(|b| 1u64.checked_shl(b))
                    .unwrap_or(0)
            })
    }

    /// Render a packed value as register-separated bit strings.
    ///
    /// Each register is written most significant bit first and the last
    /// declared register comes first, e.g. `"bbb aa"`.
    pub fn format(&self, value: u64) -> String {
        let mut offset = 0usize;
        let mut parts = Vec::with_capacity(self.registers.len());
        for register in &self.registers {
            let size = register.size as usize;
            let bits: String = (0..size)
                .rev()
                .map(|i| {
                    let bit = u32::try_from(offset + i)
                        .ok()
                        .and_then(|shift| value.checked_shr(shift))
                        .unwrap_or(0);
                    if bit & 1 == 1 {
                        '1'
                    } else {
                        '0'
                    }
                })
                .collect();
            parts.push(bits);
            offset += size;
        }
        parts.reverse();
        parts.join(" ")
    }

    /// Format one raw shot.
    pub fn format_sample(&self, sample: &[u8]) -> String {
        self.format(self.apply(sample))
    }
}
