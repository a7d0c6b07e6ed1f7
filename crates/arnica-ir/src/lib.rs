//! Arnica circuit specifications
//!
//! This crate holds the data model for circuits that are already expressed in
//! the native instruction set of AQT ion-trap resources. Circuits arrive here
//! finalized: gate rewriting and angle wrapping happen upstream, and this crate
//! only performs structural checks.
//!
//! # Core Components
//!
//! - **Bits**: [`QubitId`] and [`ClbitId`] address physical qubits and the
//!   caller's classical bits
//! - **Operations**: [`NativeOp`] covers `RZ`, `R`, `RXX` and the terminal `MEASURE`
//! - **Layout**: [`ClassicalRegister`] and [`Measurement`] describe where each
//!   measured qubit lands in the caller's classical memory
//! - **Circuit**: [`CircuitSpec`] combines all of the above
//!
//! # Example: Bell state on two ions
//!
//! ```rust
//! use arnica_ir::{CircuitSpec, QubitId};
//! use std::f64::consts::PI;
//!
//! let mut circuit = CircuitSpec::new("bell", 2);
//! circuit.r(PI / 2.0, -PI / 2.0, QubitId(0)).unwrap();
//! circuit.rxx(PI / 2.0, QubitId(0), QubitId(1)).unwrap();
//! circuit.measure_all().unwrap();
//!
//! assert_eq!(circuit.num_qubits(), 2);
//! assert_eq!(circuit.num_clbits(), 2);
//! assert!(circuit.validate().is_ok());
//! ```

pub mod circuit;
pub mod error;
pub mod operation;
pub mod qubit;

pub use circuit::{CircuitSpec, ClassicalRegister, Measurement, IMPLICIT_REGISTER};
pub use error::{IrResult, ValidationError};
pub use operation::NativeOp;
pub use qubit::{ClbitId, QubitId};

/// Upper bound on the classical memory of one circuit, in bits.
///
/// Shot outcomes are packed into a `u64` when re-keyed into classical-bit order.
pub const MAX_CLBITS: usize = 64;
