//! The interface every device family presents to the simulator.

use nalgebra::DVector;
use spicedev_core::{
    CircuitContext, NodeAllocator, NoiseContext, SparseMatrix, StateAllocator, StateHistory,
    TruncationSink,
};

use crate::error::Result;

/// Outcome of one load pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Number of instances whose voltages were limited on this iteration.
    /// Any nonzero count forces another Newton iteration.
    pub noncon: usize,
}

impl LoadOutcome {
    pub fn limited() -> Self {
        Self { noncon: 1 }
    }

    pub fn merge(self, other: LoadOutcome) -> Self {
        Self {
            noncon: self.noncon + other.noncon,
        }
    }

    pub fn converged(self) -> bool {
        self.noncon == 0
    }
}

/// The instance that failed a convergence check, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offender {
    pub model: String,
    pub instance: String,
}

/// Verdict of a convergence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceResult {
    Converged,
    /// The first instance found out of tolerance; later instances were not checked.
    NotConverged(Offender),
}

impl ConvergenceResult {
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceResult::Converged)
    }

    pub fn offender(&self) -> Option<&Offender> {
        match self {
            ConvergenceResult::Converged => None,
            ConvergenceResult::NotConverged(offender) => Some(offender),
        }
    }
}

/// Trait for device models that can be set up, evaluated and stamped.
///
/// One call covers every instance of the model, in instance-list order.
pub trait Stamp {
    /// Apply defaults, create internal nodes and reserve state slots.
    fn setup(&mut self, nodes: &mut dyn NodeAllocator, states: &mut StateAllocator) -> Result<()>;

    /// Forget internal nodes, state slots and matrix handles.
    fn unsetup(&mut self);

    /// Resolve matrix element handles. Idempotent; call again after any reordering.
    fn bind<M: SparseMatrix>(&mut self, matrix: &mut M) -> Result<()>;

    /// Recompute temperature-dependent parameters.
    fn temperature(&mut self, ctx: &CircuitContext);

    /// Evaluate at the present solution and stamp the linearized model.
    fn load<M: SparseMatrix>(
        &mut self,
        ctx: &CircuitContext,
        states: &mut StateHistory,
        matrix: &mut M,
        rhs: &mut DVector<f64>,
    ) -> Result<LoadOutcome>;

    /// Check the present solution against the linearization of the last load.
    fn check_convergence(&self, ctx: &CircuitContext, states: &StateHistory) -> ConvergenceResult;

    /// Stamp small-signal admittances at `ctx.omega`.
    fn ac_load<M: SparseMatrix>(
        &self,
        ctx: &CircuitContext,
        states: &StateHistory,
        matrix: &mut M,
    ) -> Result<()>;

    /// Register charge slots with a truncation-error sink.
    fn truncate(&self, states: &StateHistory, sink: &mut dyn TruncationSink);

    /// Evaluate noise sources at the present frequency and integrate them.
    fn noise(&mut self, ctx: &CircuitContext, noise: &mut NoiseContext) -> Result<()>;
}
