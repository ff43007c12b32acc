//! Newton convergence test.
//!
//! The drain and bulk currents predicted by the last linearization are
//! compared against a fresh evaluation at the voltages in the new solution.

use spicedev_core::{CircuitContext, InitPhase, StateHistory};

use super::load::{Bias, DcPoint};
use super::params::EkvModelValues;
use super::state::EkvState;
use super::{EkvInstance, Mode};

/// Difference between predicted and re-evaluated terminal currents.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CurrentMismatch {
    pub drain_predicted: f64,
    pub drain_actual: f64,
    pub bulk_predicted: f64,
    pub bulk_actual: f64,
}

impl CurrentMismatch {
    /// Largest absolute deviation of the two currents (A).
    pub fn max_error(&self) -> f64 {
        (self.drain_predicted - self.drain_actual)
            .abs()
            .max((self.bulk_predicted - self.bulk_actual).abs())
    }

    fn within(&self, ctx: &CircuitContext) -> bool {
        let tol = |a: f64, b: f64| ctx.reltol * a.abs().max(b.abs()) + ctx.abstol;
        (self.drain_predicted - self.drain_actual).abs()
            < tol(self.drain_predicted, self.drain_actual)
            && (self.bulk_predicted - self.bulk_actual).abs()
                <= tol(self.bulk_predicted, self.bulk_actual)
    }
}

impl EkvInstance {
    /// Predicted versus re-evaluated currents at the present solution.
    ///
    /// `None` until the instance has been loaded.
    pub fn convergence_mismatch(
        &self,
        model: &EkvModelValues,
        ctx: &CircuitContext,
        states: &StateHistory,
    ) -> Option<CurrentMismatch> {
        let op = self.op.as_ref()?;
        let (_, derived) = self.prepared().ok()?;
        let base = self.state_base?;
        let last = Bias::from_state(&EkvState::read(states, 0, base).ok()?);

        let now = Bias::from_solution(ctx, &self.nodes, model.sign());
        let delvbs = now.vbs - last.vbs;
        let delvbd = now.vbd - last.vbd;
        let delvgs = now.vgs - last.vgs;
        let delvds = now.vds - last.vds;
        let delvgd = now.vgd - last.vgd;

        let dc = &op.dc;
        let (gm, gds, gmbs) = (dc.eval.gm, dc.eval.gds, dc.eval.gmbs);
        let (gbd, gbs) = (dc.bd.conductance, dc.bs.conductance);
        let cd = dc.drain_current();

        let drain_predicted = match dc.mode {
            Mode::Normal => cd - gbd * delvbd + gmbs * delvbs + gm * delvgs + gds * delvds,
            Mode::Inverse => cd - (gbd + gmbs) * delvbd - gm * delvgd + gds * delvds,
        };
        let bulk_predicted = dc.bulk_current() + gbd * delvbd + gbs * delvbs;

        let fresh = DcPoint::compute(model, derived, ctx.gmin, &now);
        Some(CurrentMismatch {
            drain_predicted,
            drain_actual: fresh.drain_current(),
            bulk_predicted,
            bulk_actual: fresh.bulk_current(),
        })
    }

    pub(crate) fn converged(
        &self,
        model: &EkvModelValues,
        ctx: &CircuitContext,
        states: &StateHistory,
    ) -> bool {
        let off = self.values.as_ref().is_some_and(|v| v.off);
        if off && ctx.init == InitPhase::Fix {
            return true;
        }
        match self.convergence_mismatch(model, ctx, states) {
            Some(mismatch) => mismatch.within(ctx),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ekv::{EkvInstanceParams, EkvModel, EkvModelParams};
    use crate::param::Given;
    use crate::stamp::Stamp;
    use nalgebra::DVector;
    use spicedev_core::{MnaMatrix, NodeId, NodeTable, StateAllocator};

    fn loaded(vd: f64, vg: f64) -> (EkvModel, CircuitContext, StateHistory) {
        let mut table = NodeTable::new();
        let d = table.add("d");
        let g = table.add("g");
        let mut params = EkvModelParams::nmos();
        params.vto = Given::new(0.5);
        params.kp = Given::new(1e-4);
        let mut model = EkvModel::new("nch", params);
        model.add_instance(EkvInstance::new(
            "M1",
            d,
            g,
            NodeId::GROUND,
            NodeId::GROUND,
            EkvInstanceParams::with_geometry(10e-6, 1e-6),
        ));
        let mut alloc = StateAllocator::new();
        model.setup(&mut table, &mut alloc).unwrap();
        let mut m = MnaMatrix::new(table.num_nodes());
        model.bind(&mut m).unwrap();
        let mut ctx = CircuitContext::new(table.num_nodes());
        model.temperature(&ctx);
        let mut states = alloc.into_history(3);
        ctx.set_voltage(d, vd);
        ctx.set_voltage(g, vg);
        let mut rhs = DVector::zeros(table.num_nodes() + 1);
        for _ in 0..50 {
            m.clear();
            if model.load(&ctx, &mut states, &mut m, &mut rhs).unwrap().converged() {
                break;
            }
        }
        (model, ctx, states)
    }

    #[test]
    fn test_unchanged_solution_converges() {
        let (model, ctx, states) = loaded(1.0, 1.0);
        assert!(model.check_convergence(&ctx, &states).is_converged());
    }

    #[test]
    fn test_moved_solution_reports_offender() {
        let (model, mut ctx, states) = loaded(1.0, 1.0);
        ctx.set_voltage(NodeId::new(2), 1.5);
        let result = model.check_convergence(&ctx, &states);
        let offender = result.offender().unwrap();
        assert_eq!(offender.model, "nch");
        assert_eq!(offender.instance, "M1");
    }

    #[test]
    fn test_never_loaded_is_not_converged() {
        let mut table = NodeTable::new();
        let d = table.add("d");
        let mut model = EkvModel::new("nch", EkvModelParams::nmos());
        model.add_instance(EkvInstance::new(
            "M1",
            d,
            d,
            NodeId::GROUND,
            NodeId::GROUND,
            EkvInstanceParams::default(),
        ));
        let mut alloc = StateAllocator::new();
        model.setup(&mut table, &mut alloc).unwrap();
        let ctx = CircuitContext::new(1);
        model.temperature(&ctx);
        let states = alloc.into_history(3);
        assert!(!model.check_convergence(&ctx, &states).is_converged());
    }
}
