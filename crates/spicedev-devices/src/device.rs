//! Family dispatch.
//!
//! Device families form a closed set, so dispatch is an enum rather than a
//! trait object; adding a family means adding a variant here.

use nalgebra::DVector;
use spicedev_core::{
    CircuitContext, NodeAllocator, NoiseContext, SparseMatrix, StateAllocator, StateHistory,
    TruncationSink,
};

use crate::ekv::EkvModel;
use crate::error::Result;
use crate::stamp::{ConvergenceResult, LoadOutcome, Stamp};

/// One model card of any supported family, with its instances.
#[derive(Debug, Clone)]
pub enum DeviceModel {
    Ekv(EkvModel),
}

impl DeviceModel {
    pub fn name(&self) -> &str {
        match self {
            DeviceModel::Ekv(m) => &m.name,
        }
    }

    pub fn num_instances(&self) -> usize {
        match self {
            DeviceModel::Ekv(m) => m.instances.len(),
        }
    }
}

impl From<EkvModel> for DeviceModel {
    fn from(model: EkvModel) -> Self {
        DeviceModel::Ekv(model)
    }
}

impl Stamp for DeviceModel {
    fn setup(&mut self, nodes: &mut dyn NodeAllocator, states: &mut StateAllocator) -> Result<()> {
        match self {
            DeviceModel::Ekv(m) => m.setup(nodes, states),
        }
    }

    fn unsetup(&mut self) {
        match self {
            DeviceModel::Ekv(m) => m.unsetup(),
        }
    }

    fn bind<M: SparseMatrix>(&mut self, matrix: &mut M) -> Result<()> {
        match self {
            DeviceModel::Ekv(m) => m.bind(matrix),
        }
    }

    fn temperature(&mut self, ctx: &CircuitContext) {
        match self {
            DeviceModel::Ekv(m) => m.temperature(ctx),
        }
    }

    fn load<M: SparseMatrix>(
        &mut self,
        ctx: &CircuitContext,
        states: &mut StateHistory,
        matrix: &mut M,
        rhs: &mut DVector<f64>,
    ) -> Result<LoadOutcome> {
        match self {
            DeviceModel::Ekv(m) => m.load(ctx, states, matrix, rhs),
        }
    }

    fn check_convergence(&self, ctx: &CircuitContext, states: &StateHistory) -> ConvergenceResult {
        match self {
            DeviceModel::Ekv(m) => m.check_convergence(ctx, states),
        }
    }

    fn ac_load<M: SparseMatrix>(
        &self,
        ctx: &CircuitContext,
        states: &StateHistory,
        matrix: &mut M,
    ) -> Result<()> {
        match self {
            DeviceModel::Ekv(m) => m.ac_load(ctx, states, matrix),
        }
    }

    fn truncate(&self, states: &StateHistory, sink: &mut dyn TruncationSink) {
        match self {
            DeviceModel::Ekv(m) => m.truncate(states, sink),
        }
    }

    fn noise(&mut self, ctx: &CircuitContext, noise: &mut NoiseContext) -> Result<()> {
        match self {
            DeviceModel::Ekv(m) => m.noise(ctx, noise),
        }
    }
}

/// Every model in a circuit, processed in insertion order.
#[derive(Debug, Clone, Default)]
pub struct DeviceLibrary {
    models: Vec<DeviceModel>,
}

impl DeviceLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, model: impl Into<DeviceModel>) {
        self.models.push(model.into());
    }

    pub fn models(&self) -> &[DeviceModel] {
        &self.models
    }

    pub fn models_mut(&mut self) -> &mut [DeviceModel] {
        &mut self.models
    }

    pub fn model(&self, name: &str) -> Option<&DeviceModel> {
        self.models.iter().find(|m| m.name() == name)
    }

    pub fn num_instances(&self) -> usize {
        self.models.iter().map(DeviceModel::num_instances).sum()
    }
}

impl Stamp for DeviceLibrary {
    fn setup(&mut self, nodes: &mut dyn NodeAllocator, states: &mut StateAllocator) -> Result<()> {
        for m in &mut self.models {
            m.setup(nodes, states)?;
        }
        log::info!(
            "device setup: {} models, {} instances, {} state slots",
            self.models.len(),
            self.num_instances(),
            states.len()
        );
        Ok(())
    }

    fn unsetup(&mut self) {
        for m in &mut self.models {
            m.unsetup();
        }
    }

    fn bind<M: SparseMatrix>(&mut self, matrix: &mut M) -> Result<()> {
        for m in &mut self.models {
            m.bind(matrix)?;
        }
        Ok(())
    }

    fn temperature(&mut self, ctx: &CircuitContext) {
        for m in &mut self.models {
            m.temperature(ctx);
        }
    }

    fn load<M: SparseMatrix>(
        &mut self,
        ctx: &CircuitContext,
        states: &mut StateHistory,
        matrix: &mut M,
        rhs: &mut DVector<f64>,
    ) -> Result<LoadOutcome> {
        let mut outcome = LoadOutcome::default();
        for m in &mut self.models {
            outcome = outcome.merge(m.load(ctx, states, matrix, rhs)?);
        }
        Ok(outcome)
    }

    fn check_convergence(&self, ctx: &CircuitContext, states: &StateHistory) -> ConvergenceResult {
        for m in &self.models {
            let result = m.check_convergence(ctx, states);
            if !result.is_converged() {
                return result;
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
        for m in &self.models {
            m.ac_load(ctx, states, matrix)?;
        }
        Ok(())
    }

    fn truncate(&self, states: &StateHistory, sink: &mut dyn TruncationSink) {
        for m in &self.models {
            m.truncate(states, sink);
        }
    }

    fn noise(&mut self, ctx: &CircuitContext, noise: &mut NoiseContext) -> Result<()> {
        for m in &mut self.models {
            m.noise(ctx, noise)?;
        }
        Ok(())
    }
}
