//! EKV 2.6 MOSFET model.
//!
//! A charge-based compact model built on a single interpolation function
//! that covers weak, moderate and strong inversion without region switches.
//! This implementation includes:
//! - Reverse short-channel effect and short/narrow-channel body factor
//! - Velocity saturation and channel length modulation
//! - Mobility reduction through THETA
//! - Charge-based gate capacitances projected onto a two-terminal form
//! - Bulk junction diodes with depletion and sidewall capacitance
//! - Drain/source series resistances through internal "prime" nodes
//! - Thermal, flicker and junction shot noise
//!
//! # Usage
//!
//! ```text
//! .MODEL NCH NMOS LEVEL=44 VTO=0.5 KP=100u GAMMA=0.7 PHI=0.8
//! M1 d g s b NCH W=10u L=1u
//! ```
//!
//! # References
//!
//! - M. Bucher, C. Lallement, C. Enz, F. Theodoloz, F. Krummenacher,
//!   "The EPFL-EKV MOSFET Model Equations for Simulation", version 2.6.

pub mod ac;
pub mod ask;
mod convergence;
pub mod evaluate;
pub mod handles;
pub mod junction;
pub mod load;
pub mod noise;
pub mod params;
mod sens;
pub mod state;
pub mod temperature;
mod truncation;

pub use ask::{EkvInstanceParam, EkvModelParam};
pub use convergence::CurrentMismatch;
pub use evaluate::{EkvEval, evaluate};
pub use handles::{EkvHandles, EkvNodes};
pub use load::{Bias, DcPoint};
pub use noise::{EkvNoiseSource, NoiseMemory};
pub use params::{EkvInstanceParams, EkvInstanceValues, EkvModelParams, EkvModelValues, MosfetType};
pub use state::EkvState;
pub use temperature::EkvDerived;

use nalgebra::DVector;
use spicedev_core::constants::REFTEMP;
use spicedev_core::{
    CircuitContext, NodeAllocator, NodeId, NoiseContext, SparseMatrix, StateAllocator,
    StateHistory, TruncationSink,
};

use crate::error::{Error, Result};
use crate::stamp::{ConvergenceResult, LoadOutcome, Offender, Stamp};

/// Conduction direction of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Drain above source: the drain terminal acts as drain.
    #[default]
    Normal,
    /// Source above drain: roles are swapped before evaluation.
    Inverse,
}

impl Mode {
    /// +1 for normal, -1 for inverse.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Mode::Normal => 1.0,
            Mode::Inverse => -1.0,
        }
    }

    #[inline]
    pub fn from_vds(vds: f64) -> Self {
        if vds >= 0.0 { Mode::Normal } else { Mode::Inverse }
    }
}

/// Linearization of an instance at its last load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperatingPoint {
    /// Terminal voltages used by the load, in the device's own polarity.
    pub bias: Bias,
    /// DC evaluation at `bias`.
    pub dc: DcPoint,
    /// Current into the drain-prime node, charge currents included (A).
    pub cd: f64,
    /// Bulk-drain junction current including its charge current (A).
    pub cbd: f64,
    pub cbs: f64,
    /// Bulk-drain conductance including the charge companion (S).
    pub gbd: f64,
    pub gbs: f64,
    /// Bulk-drain depletion capacitance (F).
    pub capbd: f64,
    pub capbs: f64,
}

impl OperatingPoint {
    #[inline]
    pub fn mode(&self) -> Mode {
        self.dc.mode
    }

    #[inline]
    pub fn gm(&self) -> f64 {
        self.dc.eval.gm
    }

    #[inline]
    pub fn gds(&self) -> f64 {
        self.dc.eval.gds
    }

    #[inline]
    pub fn gmbs(&self) -> f64 {
        self.dc.eval.gmbs
    }
}

/// One placed EKV transistor.
#[derive(Debug, Clone)]
pub struct EkvInstance {
    pub name: String,
    pub nodes: EkvNodes,
    pub params: EkvInstanceParams,
    values: Option<EkvInstanceValues>,
    derived: Option<EkvDerived>,
    state_base: Option<usize>,
    handles: Option<EkvHandles>,
    op: Option<OperatingPoint>,
    noise: NoiseMemory,
}

impl EkvInstance {
    pub fn new(
        name: impl Into<String>,
        drain: NodeId,
        gate: NodeId,
        source: NodeId,
        bulk: NodeId,
        params: EkvInstanceParams,
    ) -> Self {
        Self {
            name: name.into(),
            nodes: EkvNodes::new(drain, gate, source, bulk),
            params,
            values: None,
            derived: None,
            state_base: None,
            handles: None,
            op: None,
            noise: NoiseMemory::default(),
        }
    }

    /// Resolved instance parameters at the last temperature update.
    pub fn values(&self) -> Option<&EkvInstanceValues> {
        self.values.as_ref()
    }

    /// Temperature-corrected parameters, once [`Stamp::temperature`] has run.
    pub fn derived(&self) -> Option<&EkvDerived> {
        self.derived.as_ref()
    }

    /// Linearization at the last load.
    pub fn operating_point(&self) -> Option<&OperatingPoint> {
        self.op.as_ref()
    }

    /// First of this instance's [`EkvState::NUM_SLOTS`] state slots.
    pub fn state_base(&self) -> Option<usize> {
        self.state_base
    }

    pub fn handles(&self) -> Option<&EkvHandles> {
        self.handles.as_ref()
    }

    pub fn noise_memory(&self) -> &NoiseMemory {
        &self.noise
    }

    fn setup(
        &mut self,
        model: &EkvModelValues,
        nodes: &mut dyn NodeAllocator,
        states: &mut StateAllocator,
    ) {
        let inst = self.params.resolve(REFTEMP);
        let has_rd = (model.rd_given && model.rd != 0.0) || (model.rsh != 0.0 && inst.nrd != 0.0);
        let has_rs = (model.rs_given && model.rs != 0.0) || (model.rsh != 0.0 && inst.nrs != 0.0);

        self.nodes.drain_prime = if has_rd && !self.nodes.drain.is_ground() {
            nodes.internal_node(&self.name, "drain")
        } else {
            self.nodes.drain
        };
        self.nodes.source_prime = if has_rs && !self.nodes.source.is_ground() {
            nodes.internal_node(&self.name, "source")
        } else {
            self.nodes.source
        };

        if self.state_base.is_none() {
            self.state_base = Some(states.reserve(EkvState::NUM_SLOTS));
        }
    }

    fn unsetup(&mut self) {
        self.nodes.drain_prime = self.nodes.drain;
        self.nodes.source_prime = self.nodes.source;
        self.state_base = None;
        self.handles = None;
        self.op = None;
    }

    fn bind<M: SparseMatrix>(&mut self, matrix: &mut M) -> Result<()> {
        self.handles = Some(EkvHandles::resolve(matrix, &self.nodes)?);
        Ok(())
    }

    /// Recompute derived parameters. Pure in its inputs; calling it twice is a no-op.
    pub fn temperature(&mut self, model: &EkvModelValues, ctx: &CircuitContext) {
        let values = self.params.resolve(ctx.temp);
        self.derived = Some(EkvDerived::compute(&self.name, model, &values));
        self.values = Some(values);
    }

    fn not_prepared(&self, step: &'static str) -> Error {
        Error::NotPrepared {
            device: self.name.clone(),
            step,
        }
    }

    fn state_slot_base(&self) -> Result<usize> {
        self.state_base.ok_or_else(|| self.not_prepared("setup"))
    }

    fn prepared(&self) -> Result<(&EkvInstanceValues, &EkvDerived)> {
        match (&self.values, &self.derived) {
            (Some(values), Some(derived)) => Ok((values, derived)),
            _ => Err(self.not_prepared("temperature")),
        }
    }
}

/// An EKV model card and the instances that use it.
#[derive(Debug, Clone)]
pub struct EkvModel {
    pub name: String,
    pub params: EkvModelParams,
    values: Option<EkvModelValues>,
    pub instances: Vec<EkvInstance>,
}

impl EkvModel {
    pub fn new(name: impl Into<String>, params: EkvModelParams) -> Self {
        Self {
            name: name.into(),
            params,
            values: None,
            instances: Vec::new(),
        }
    }

    pub fn add_instance(&mut self, instance: EkvInstance) -> &mut EkvInstance {
        self.instances.push(instance);
        let last = self.instances.len() - 1;
        &mut self.instances[last]
    }

    pub fn instance(&self, name: &str) -> Option<&EkvInstance> {
        self.instances.iter().find(|i| i.name == name)
    }

    pub fn instance_mut(&mut self, name: &str) -> Option<&mut EkvInstance> {
        self.instances.iter_mut().find(|i| i.name == name)
    }

    /// Model parameters with defaults applied at the last temperature update.
    pub fn values(&self) -> Option<&EkvModelValues> {
        self.values.as_ref()
    }

    fn resolved(&self) -> Result<&EkvModelValues> {
        self.values.as_ref().ok_or_else(|| Error::NotPrepared {
            device: self.name.clone(),
            step: "setup",
        })
    }
}

impl Stamp for EkvModel {
    fn setup(&mut self, nodes: &mut dyn NodeAllocator, states: &mut StateAllocator) -> Result<()> {
        let values = self.params.resolve(REFTEMP);
        for inst in &mut self.instances {
            inst.setup(&values, nodes, states);
        }
        self.values = Some(values);
        Ok(())
    }

    fn unsetup(&mut self) {
        for inst in &mut self.instances {
            inst.unsetup();
        }
    }

    fn bind<M: SparseMatrix>(&mut self, matrix: &mut M) -> Result<()> {
        for inst in &mut self.instances {
            inst.bind(matrix)?;
        }
        log::debug!(
            "{}: bound {} handles for {} instances",
            self.name,
            EkvHandles::COUNT * self.instances.len(),
            self.instances.len()
        );
        Ok(())
    }

    fn temperature(&mut self, ctx: &CircuitContext) {
        let values = self.params.resolve(ctx.nominal_temp);
        for inst in &mut self.instances {
            inst.temperature(&values, ctx);
        }
        self.values = Some(values);
    }

    fn load<M: SparseMatrix>(
        &mut self,
        ctx: &CircuitContext,
        states: &mut StateHistory,
        matrix: &mut M,
        rhs: &mut DVector<f64>,
    ) -> Result<LoadOutcome> {
        let model = self.values.as_ref().ok_or_else(|| Error::NotPrepared {
            device: self.name.clone(),
            step: "setup",
        })?;
        let mut outcome = LoadOutcome::default();
        for inst in &mut self.instances {
            outcome = outcome.merge(inst.load(model, ctx, states, matrix, rhs)?);
        }
        Ok(outcome)
    }

    fn check_convergence(&self, ctx: &CircuitContext, states: &StateHistory) -> ConvergenceResult {
        let Ok(model) = self.resolved() else {
            return ConvergenceResult::NotConverged(Offender {
                model: self.name.clone(),
                instance: self
                    .instances
                    .first()
                    .map(|inst| inst.name.clone())
                    .unwrap_or_default(),
            });
        };
        for inst in &self.instances {
            if !inst.converged(model, ctx, states) {
                log::debug!("{}: instance {} has not converged", self.name, inst.name);
                return ConvergenceResult::NotConverged(Offender {
                    model: self.name.clone(),
                    instance: inst.name.clone(),
                });
            }
        }
        ConvergenceResult::Converged
    }

    fn ac_load<M: SparseMatrix>(
        &self,
        ctx: &CircuitContext,
        states: &StateHistory,
        matrix: &mut M,
    ) -> Result<()> {
        for inst in &self.instances {
            inst.ac_load(ctx, states, matrix)?;
        }
        Ok(())
    }

    fn truncate(&self, states: &StateHistory, sink: &mut dyn TruncationSink) {
        for inst in &self.instances {
            inst.truncate(states, sink);
        }
    }

    fn noise(&mut self, _ctx: &CircuitContext, noise: &mut NoiseContext) -> Result<()> {
        let model = self.values.as_ref().ok_or_else(|| Error::NotPrepared {
            device: self.name.clone(),
            step: "setup",
        })?;
        for inst in &mut self.instances {
            inst.noise(model, noise)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::Given;
    use spicedev_core::{MnaMatrix, NodeTable};

    fn circuit(rd: Option<f64>) -> (EkvModel, NodeTable) {
        let mut table = NodeTable::new();
        let d = table.add("d");
        let g = table.add("g");
        let s = table.add("s");
        let mut params = EkvModelParams::nmos();
        if let Some(rd) = rd {
            params.rd = Given::new(rd);
        }
        let mut model = EkvModel::new("nch", params);
        model.add_instance(EkvInstance::new(
            "M1",
            d,
            g,
            s,
            NodeId::GROUND,
            EkvInstanceParams::with_geometry(10e-6, 1e-6),
        ));
        (model, table)
    }

    #[test]
    fn test_setup_creates_prime_node_only_with_resistance() {
        let (mut model, mut table) = circuit(None);
        let mut states = StateAllocator::new();
        model.setup(&mut table, &mut states).unwrap();
        assert_eq!(table.num_nodes(), 3);
        let inst = &model.instances[0];
        assert_eq!(inst.nodes.drain_prime, inst.nodes.drain);
        assert_eq!(inst.state_base(), Some(0));
        assert_eq!(states.len(), EkvState::NUM_SLOTS);

        let (mut model, mut table) = circuit(Some(10.0));
        let mut states = StateAllocator::new();
        model.setup(&mut table, &mut states).unwrap();
        assert_eq!(table.num_nodes(), 4);
        let inst = &model.instances[0];
        assert_eq!(inst.nodes.drain_prime, NodeId::new(4));
        assert_eq!(inst.nodes.source_prime, inst.nodes.source);
        assert_eq!(table.name(NodeId::new(4)), Some("M1#drain"));
    }

    #[test]
    fn test_bind_is_idempotent() {
        let (mut model, mut table) = circuit(Some(10.0));
        let mut states = StateAllocator::new();
        model.setup(&mut table, &mut states).unwrap();
        let mut m = MnaMatrix::new(table.num_nodes());
        model.bind(&mut m).unwrap();
        let first = *model.instances[0].handles().unwrap();
        let count = m.num_elements();
        model.bind(&mut m).unwrap();
        assert_eq!(*model.instances[0].handles().unwrap(), first);
        assert_eq!(m.num_elements(), count);
    }

    #[test]
    fn test_load_before_setup_fails() {
        let (mut model, table) = circuit(None);
        let ctx = CircuitContext::new(table.num_nodes());
        let mut states = StateHistory::new(EkvState::NUM_SLOTS, 3);
        let mut m = MnaMatrix::new(table.num_nodes());
        let mut rhs = DVector::zeros(table.num_nodes() + 1);
        assert!(matches!(
            model.load(&ctx, &mut states, &mut m, &mut rhs),
            Err(Error::NotPrepared { .. })
        ));
    }

    #[test]
    fn test_unresolved_model_is_not_converged() {
        let (model, table) = circuit(None);
        let ctx = CircuitContext::new(table.num_nodes());
        let states = StateHistory::new(EkvState::NUM_SLOTS, 3);
        let result = model.check_convergence(&ctx, &states);
        assert!(!result.is_converged());
        let offender = result.offender().unwrap();
        assert_eq!(offender.model, "nch");
        assert_eq!(offender.instance, "M1");
    }

    #[test]
    fn test_unsetup_forgets_topology() {
        let (mut model, mut table) = circuit(Some(10.0));
        let mut states = StateAllocator::new();
        model.setup(&mut table, &mut states).unwrap();
        model.unsetup();
        let inst = &model.instances[0];
        assert_eq!(inst.nodes.drain_prime, inst.nodes.drain);
        assert!(inst.state_base().is_none());
        assert!(inst.handles().is_none());
    }
}
