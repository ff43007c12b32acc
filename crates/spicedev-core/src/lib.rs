//! Simulator-side collaborators for the spicedev device engine.
//!
//! Device models never own the system they are solved in. This crate defines
//! what they see of it:
//! - Node identifiers and internal-node allocation
//! - Sparse-matrix element handles, with a reference MNA matrix
//! - The flat per-device state history and its slot allocator
//! - Analysis-mode flags and tolerances ([`CircuitContext`])
//! - Charge integration, truncation-error sinks, and noise bookkeeping

pub mod constants;
pub mod context;
pub mod error;
pub mod integrate;
pub mod matrix;
pub mod node;
pub mod noise;
pub mod state;
pub mod truncation;

pub use context::{AnalysisMode, CircuitContext, InitPhase};
pub use error::{Error, Result};
pub use integrate::{Integrated, IntegrationMethod, Integrator};
pub use matrix::{ElementHandle, MnaMatrix, SparseMatrix, stamp_rhs};
pub use node::{NodeAllocator, NodeId, NodeTable};
pub use noise::{N_MINLOG, NoiseContext};
pub use state::{StateAllocator, StateHistory};
pub use truncation::{LteEstimator, SlotRecorder, TruncationSink};
