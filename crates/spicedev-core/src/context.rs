//! Simulation-level settings and the analysis-mode flags read by devices.

use nalgebra::DVector;

use crate::constants::REFTEMP;
use crate::integrate::Integrator;
use crate::node::NodeId;

/// The analysis being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisMode {
    /// DC operating point.
    #[default]
    DcOp,
    /// Operating point computed as the initial condition of a transient run.
    TransientOp,
    /// DC transfer curve.
    DcSweep,
    /// Time-domain integration.
    Transient,
    /// Small-signal frequency sweep.
    Ac,
    /// Small-signal noise sweep.
    Noise,
}

/// Where the Newton iteration is within its initialization sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitPhase {
    /// Normal iteration from the present solution.
    #[default]
    Float,
    /// First iteration: junction voltages are seeded from initial conditions.
    Junction,
    /// Devices marked `off` keep their seeded voltages.
    Fix,
    /// Compute small-signal quantities at the converged operating point.
    SmallSignal,
    /// First iteration of the first timestep.
    Transient,
    /// First iteration of a later timestep; voltages are extrapolated.
    Predict,
}

/// Everything a device needs to know about the surrounding simulation.
#[derive(Debug, Clone)]
pub struct CircuitContext {
    /// Circuit temperature (K).
    pub temp: f64,
    /// Default nominal (parameter extraction) temperature (K).
    pub nominal_temp: f64,
    pub reltol: f64,
    pub abstol: f64,
    pub vntol: f64,
    pub chgtol: f64,
    pub trtol: f64,
    /// Minimum conductance added across junctions.
    pub gmin: f64,
    pub mode: AnalysisMode,
    pub init: InitPhase,
    /// Use initial conditions instead of solving an operating point.
    pub uic: bool,
    /// Charge integration coefficients for the present timestep.
    pub integrator: Integrator,
    /// Previous timestep, used for predictor extrapolation.
    pub delta_old: f64,
    /// Angular frequency for AC and noise (rad/s).
    pub omega: f64,
    /// Present solution estimate, indexed by node id (slot 0 is ground).
    pub solution: DVector<f64>,
}

impl CircuitContext {
    /// Create a context for a circuit with `num_nodes` non-ground nodes.
    pub fn new(num_nodes: usize) -> Self {
        Self {
            temp: REFTEMP,
            nominal_temp: REFTEMP,
            reltol: 1e-3,
            abstol: 1e-12,
            vntol: 1e-6,
            chgtol: 1e-14,
            trtol: 7.0,
            gmin: 1e-12,
            mode: AnalysisMode::DcOp,
            init: InitPhase::Float,
            uic: false,
            integrator: Integrator::dc(),
            delta_old: 0.0,
            omega: 0.0,
            solution: DVector::zeros(num_nodes + 1),
        }
    }

    /// Number of non-ground nodes the solution vector covers.
    pub fn num_nodes(&self) -> usize {
        self.solution.len().saturating_sub(1)
    }

    /// Grow the solution vector after internal nodes were added.
    pub fn resize(&mut self, num_nodes: usize) {
        let old = std::mem::replace(&mut self.solution, DVector::zeros(0));
        self.solution = old.resize_vertically(num_nodes + 1, 0.0);
    }

    /// Voltage of a node in the present solution; ground is always zero.
    #[inline]
    pub fn voltage(&self, node: NodeId) -> f64 {
        if node.is_ground() {
            0.0
        } else {
            self.solution[node.index()]
        }
    }

    /// Set a node voltage in the present solution.
    pub fn set_voltage(&mut self, node: NodeId, value: f64) {
        if !node.is_ground() {
            self.solution[node.index()] = value;
        }
    }

    pub fn doing_ac(&self) -> bool {
        matches!(self.mode, AnalysisMode::Ac | AnalysisMode::Noise)
    }

    pub fn doing_dc_op(&self) -> bool {
        self.mode == AnalysisMode::DcOp
    }

    pub fn doing_tran_op(&self) -> bool {
        self.mode == AnalysisMode::TransientOp
    }

    pub fn doing_dc_sweep(&self) -> bool {
        self.mode == AnalysisMode::DcSweep
    }

    /// True during time-domain integration (not its operating point).
    pub fn is_transient(&self) -> bool {
        self.mode == AnalysisMode::Transient
    }

    /// Charges and capacitances must be evaluated on this iteration.
    pub fn needs_charges(&self) -> bool {
        self.is_transient() || self.doing_tran_op() || self.init == InitPhase::SmallSignal
    }

    /// Charges are integrated into companion conductances on this iteration.
    pub fn integrates_charges(&self) -> bool {
        self.is_transient() || (self.init == InitPhase::Transient && !self.uic)
    }

    /// Terminal voltages are extrapolated from history on this iteration.
    pub fn predicting(&self) -> bool {
        matches!(self.init, InitPhase::Predict | InitPhase::Transient)
    }

    /// Ratio of the present to the previous timestep for extrapolation.
    pub fn extrapolation_factor(&self) -> f64 {
        if self.delta_old > 0.0 {
            self.integrator.delta() / self.delta_old
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ctx = CircuitContext::new(3);
        assert_eq!(ctx.reltol, 1e-3);
        assert_eq!(ctx.abstol, 1e-12);
        assert_eq!(ctx.gmin, 1e-12);
        assert_eq!(ctx.temp, 300.15);
        assert_eq!(ctx.num_nodes(), 3);
        assert!(ctx.doing_dc_op());
        assert!(!ctx.needs_charges());
    }

    #[test]
    fn test_ground_voltage_is_zero() {
        let mut ctx = CircuitContext::new(2);
        ctx.set_voltage(NodeId::GROUND, 5.0);
        ctx.set_voltage(NodeId::new(2), 1.5);
        assert_eq!(ctx.voltage(NodeId::GROUND), 0.0);
        assert_eq!(ctx.voltage(NodeId::new(2)), 1.5);
    }

    #[test]
    fn test_mode_queries() {
        let mut ctx = CircuitContext::new(1);
        ctx.mode = AnalysisMode::Noise;
        assert!(ctx.doing_ac());

        ctx.mode = AnalysisMode::TransientOp;
        assert!(ctx.needs_charges());
        assert!(!ctx.integrates_charges());

        ctx.mode = AnalysisMode::Transient;
        assert!(ctx.integrates_charges());

        ctx.mode = AnalysisMode::DcOp;
        ctx.init = InitPhase::SmallSignal;
        assert!(ctx.needs_charges());
        assert!(!ctx.integrates_charges());
    }

    #[test]
    fn test_resize_keeps_values() {
        let mut ctx = CircuitContext::new(2);
        ctx.set_voltage(NodeId::new(1), 0.7);
        ctx.resize(4);
        assert_eq!(ctx.num_nodes(), 4);
        assert_eq!(ctx.voltage(NodeId::new(1)), 0.7);
        assert_eq!(ctx.voltage(NodeId::new(4)), 0.0);
    }
}
