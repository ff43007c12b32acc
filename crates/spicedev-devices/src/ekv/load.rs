//! Newton-iteration load: bias selection, limiting, evaluation and stamping.
//!
//! All voltages here are in the device's own polarity: the model type sign
//! is applied once when reading node voltages and once when stamping, so a
//! PMOS evaluates exactly like an NMOS with mirrored terminals.

use nalgebra::DVector;
use spicedev_core::{CircuitContext, InitPhase, SparseMatrix, StateHistory, stamp_rhs};

use super::evaluate::{EkvEval, evaluate};
use super::handles::EkvNodes;
use super::junction::{JunctionCurrent, depletion_charge, junction_current};
use super::params::EkvModelValues;
use super::state::EkvState;
use super::temperature::EkvDerived;
use super::{EkvInstance, Mode, OperatingPoint};
use crate::error::Result;
use crate::limit::{fetlim, limvds, pnjlim};
use crate::stamp::LoadOutcome;

/// Terminal voltages of one instance, in the device's own polarity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bias {
    pub vgs: f64,
    pub vds: f64,
    pub vbs: f64,
    pub vbd: f64,
    pub vgd: f64,
}

impl Bias {
    /// Bias from three independent voltages.
    pub fn new(vgs: f64, vds: f64, vbs: f64) -> Self {
        Self {
            vgs,
            vds,
            vbs,
            vbd: vbs - vds,
            vgd: vgs - vds,
        }
    }

    /// Bias read from the present solution.
    ///
    /// Drain-referred voltages are taken directly from node differences so
    /// that swapping drain and source reproduces the mirrored bias exactly.
    pub fn from_solution(ctx: &CircuitContext, nodes: &EkvNodes, sign: f64) -> Self {
        let vg = ctx.voltage(nodes.gate);
        let vb = ctx.voltage(nodes.bulk);
        let vdp = ctx.voltage(nodes.drain_prime);
        let vsp = ctx.voltage(nodes.source_prime);
        Self {
            vgs: sign * (vg - vsp),
            vds: sign * (vdp - vsp),
            vbs: sign * (vb - vsp),
            vbd: sign * (vb - vdp),
            vgd: sign * (vg - vdp),
        }
    }

    /// Bias stored in a state generation.
    pub fn from_state(state: &EkvState) -> Self {
        Self {
            vgs: state.vgs,
            vds: state.vds,
            vbs: state.vbs,
            vbd: state.vbd,
            vgd: state.vgs - state.vds,
        }
    }

    #[inline]
    pub fn vgb(&self) -> f64 {
        self.vgs - self.vbs
    }
}

/// DC channel and junction evaluation at one bias.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DcPoint {
    pub mode: Mode,
    /// Channel evaluation in the frame selected by `mode`.
    pub eval: EkvEval,
    pub bd: JunctionCurrent,
    pub bs: JunctionCurrent,
}

impl DcPoint {
    pub fn compute(
        model: &EkvModelValues,
        derived: &EkvDerived,
        gmin: f64,
        bias: &Bias,
    ) -> Self {
        let vt = derived.vt;
        let bs = junction_current(bias.vbs, derived.source_sat_cur, vt, gmin);
        let bd = junction_current(bias.vbd, derived.drain_sat_cur, vt, gmin);
        let mode = Mode::from_vds(bias.vds);
        let eval = match mode {
            Mode::Normal => evaluate(model, derived, bias.vgs, bias.vds, bias.vbs),
            Mode::Inverse => evaluate(model, derived, bias.vgd, -bias.vds, bias.vbd),
        };
        Self { mode, eval, bd, bs }
    }

    /// Channel current flowing from drain to source.
    #[inline]
    pub fn cdrain(&self) -> f64 {
        self.mode.sign() * self.eval.ids
    }

    /// Current into the drain-prime node.
    #[inline]
    pub fn drain_current(&self) -> f64 {
        self.cdrain() - self.bd.current
    }

    /// Current out of the bulk node through both junctions.
    #[inline]
    pub fn bulk_current(&self) -> f64 {
        self.bd.current + self.bs.current
    }
}

/// Apply the channel and junction limiters against the previous iterate.
///
/// Voltages are reassigned only when a limiter actually moved them.
fn limit(bias: &mut Bias, old: &Bias, von: f64, derived: &EkvDerived) -> bool {
    let mut limited = false;
    let mut channel = false;

    if old.vds >= 0.0 {
        let vgs = fetlim(bias.vgs, old.vgs, von);
        if vgs != bias.vgs {
            bias.vgs = vgs;
            bias.vds = vgs - bias.vgd;
            channel = true;
        }
        let vds = limvds(bias.vds, old.vds);
        if vds != bias.vds {
            bias.vds = vds;
            channel = true;
        }
        if channel {
            bias.vgd = bias.vgs - bias.vds;
        }
    } else {
        let vgd = fetlim(bias.vgd, old.vgd, von);
        if vgd != bias.vgd {
            bias.vgd = vgd;
            bias.vds = bias.vgs - vgd;
            channel = true;
        }
        let vds = -limvds(-bias.vds, -old.vds);
        if vds != bias.vds {
            bias.vds = vds;
            channel = true;
        }
        if channel {
            bias.vgs = bias.vgd + bias.vds;
        }
    }
    if channel {
        bias.vbd = bias.vbs - bias.vds;
        limited = true;
    }

    if bias.vds >= 0.0 {
        let (vbs, hit) = pnjlim(bias.vbs, old.vbs, derived.vt, derived.source_vcrit);
        if hit {
            bias.vbs = vbs;
            bias.vbd = vbs - bias.vds;
            limited = true;
        }
    } else {
        let (vbd, hit) = pnjlim(bias.vbd, old.vbd, derived.vt, derived.drain_vcrit);
        if hit {
            bias.vbd = vbd;
            bias.vbs = vbd + bias.vds;
            limited = true;
        }
    }
    limited
}

/// Extrapolate `x` one step ahead from two history values.
#[inline]
fn extrapolate(x1: f64, x2: f64, xfact: f64) -> f64 {
    (1.0 + xfact) * x1 - xfact * x2
}

impl EkvInstance {
    /// Pick the bias for this iteration. Returns the bias and whether it was limited.
    fn select_bias(
        &self,
        ctx: &CircuitContext,
        derived: &EkvDerived,
        sign: f64,
        history: [&EkvState; 3],
    ) -> (Bias, bool) {
        let off = self.values.as_ref().is_some_and(|v| v.off);
        let [s0, s1, s2] = history;

        let from_solution = match ctx.init {
            InitPhase::Float | InitPhase::SmallSignal | InitPhase::Predict | InitPhase::Transient => {
                true
            }
            InitPhase::Fix => !off,
            InitPhase::Junction => false,
        };

        if from_solution {
            let (mut bias, old) = if ctx.predicting() {
                let xfact = ctx.extrapolation_factor();
                let bias = Bias::new(
                    extrapolate(s1.vgs, s2.vgs, xfact),
                    extrapolate(s1.vds, s2.vds, xfact),
                    extrapolate(s1.vbs, s2.vbs, xfact),
                );
                (bias, Bias::from_state(s1))
            } else {
                (Bias::from_solution(ctx, &self.nodes, sign), Bias::from_state(s0))
            };
            let von = self.op.map_or(derived.vto, |op| op.dc.eval.von);
            let limited = limit(&mut bias, &old, von, derived);
            return (bias, limited);
        }

        if ctx.init == InitPhase::Junction && !off {
            let (vds, vgs, vbs) = match &self.values {
                Some(v) => (sign * v.icvds, sign * v.icvgs, sign * v.icvbs),
                None => (0.0, 0.0, 0.0),
            };
            let no_ic = vds == 0.0 && vgs == 0.0 && vbs == 0.0;
            if no_ic
                && (ctx.is_transient() || ctx.doing_dc_op() || ctx.doing_dc_sweep() || !ctx.uic)
            {
                return (Bias::new(derived.vto, 0.0, -1.0), false);
            }
            return (Bias::new(vgs, vds, vbs), false);
        }

        (Bias::default(), false)
    }

    /// Evaluate at the present solution and stamp the linearized model.
    pub(crate) fn load<M: SparseMatrix>(
        &mut self,
        model: &EkvModelValues,
        ctx: &CircuitContext,
        states: &mut StateHistory,
        matrix: &mut M,
        rhs: &mut DVector<f64>,
    ) -> Result<LoadOutcome> {
        let base = self.state_slot_base()?;
        let handles = self.handles.ok_or_else(|| self.not_prepared("bind"))?;
        let (values, derived) = self.prepared()?;
        let off = values.off;
        let sign = model.sign();

        let s0 = EkvState::read(states, 0, base)?;
        let s1 = EkvState::read(states, 1, base)?;
        let s2 = EkvState::read(states, 2, base)?;

        let (bias, limited) = self.select_bias(ctx, derived, sign, [&s0, &s1, &s2]);
        let dc = DcPoint::compute(model, derived, ctx.gmin, &bias);
        let eval = dc.eval;

        let mut gbd = dc.bd.conductance;
        let mut cbd = dc.bd.current;
        let mut gbs = dc.bs.conductance;
        let mut cbs = dc.bs.current;
        let mut cd = dc.drain_current();

        let mut next = s0;
        next.vbs = bias.vbs;
        next.vbd = bias.vbd;
        next.vgs = bias.vgs;
        next.vds = bias.vds;

        let mut capbd = 0.0;
        let mut capbs = 0.0;
        let mut gate = GateCompanion::default();

        if ctx.needs_charges() {
            // Bulk junction depletion charges
            let (qbd, cbd_cap) = depletion_charge(bias.vbd, &derived.drain_caps(), model, derived);
            let (qbs, cbs_cap) =
                depletion_charge(bias.vbs, &derived.source_caps(), model, derived);
            capbd = cbd_cap;
            capbs = cbs_cap;
            next.qbd = qbd;
            next.qbs = qbs;

            if ctx.integrates_charges() {
                let bd = ctx.integrator.integrate(qbd, s1.qbd, s1.cqbd, capbd);
                next.cqbd = bd.current;
                gbd += bd.geq;
                cbd += bd.current;
                cd -= bd.current;

                let bs = ctx.integrator.integrate(qbs, s1.qbs, s1.cqbs, capbs);
                next.cqbs = bs.current;
                gbs += bs.geq;
                cbs += bs.current;
            }

            // Gate capacitances: half of the intrinsic value per generation
            let (cgs, cgd) = match dc.mode {
                Mode::Normal => (eval.cgs, eval.cgd),
                Mode::Inverse => (eval.cgd, eval.cgs),
            };
            next.capgs = 0.5 * cgs;
            next.capgd = 0.5 * cgd;
            next.capgb = 0.5 * eval.cgb;

            let (capgs, capgd, capgb) = if ctx.doing_tran_op() || ctx.init == InitPhase::SmallSignal
            {
                (
                    2.0 * next.capgs + derived.cgs_overlap,
                    2.0 * next.capgd + derived.cgd_overlap,
                    2.0 * next.capgb + derived.cgb_overlap,
                )
            } else {
                (
                    next.capgs + s1.capgs + derived.cgs_overlap,
                    next.capgd + s1.capgd + derived.cgd_overlap,
                    next.capgb + s1.capgb + derived.cgb_overlap,
                )
            };

            let old = Bias::from_state(&s1);
            if ctx.predicting() {
                let xfact = ctx.extrapolation_factor();
                next.qgs = extrapolate(s1.qgs, s2.qgs, xfact);
                next.qgd = extrapolate(s1.qgd, s2.qgd, xfact);
                next.qgb = extrapolate(s1.qgb, s2.qgb, xfact);
            } else if ctx.is_transient() {
                next.qgs = (bias.vgs - old.vgs) * capgs + s1.qgs;
                next.qgd = (bias.vgd - old.vgd) * capgd + s1.qgd;
                next.qgb = (bias.vgb() - old.vgb()) * capgb + s1.qgb;
            } else {
                next.qgs = bias.vgs * capgs;
                next.qgd = bias.vgd * capgd;
                next.qgb = bias.vgb() * capgb;
            }

            if ctx.is_transient() && ctx.init != InitPhase::Transient {
                let gs = ctx.integrator.integrate(next.qgs, s1.qgs, s1.cqgs, capgs);
                let gd = ctx.integrator.integrate(next.qgd, s1.qgd, s1.cqgd, capgd);
                let gb = ctx.integrator.integrate(next.qgb, s1.qgb, s1.cqgb, capgb);
                next.cqgs = gs.current;
                next.cqgd = gd.current;
                next.cqgb = gb.current;
                gate = GateCompanion {
                    gcgs: gs.geq,
                    ceqgs: gs.current - gs.geq * bias.vgs,
                    gcgd: gd.geq,
                    ceqgd: gd.current - gd.geq * bias.vgd,
                    gcgb: gb.geq,
                    ceqgb: gb.current - gb.geq * bias.vgb(),
                };
            }
        }

        next.write(states, base)?;

        let outcome = if limited
            && !(off && matches!(ctx.init, InitPhase::Fix | InitPhase::SmallSignal))
        {
            LoadOutcome::limited()
        } else {
            LoadOutcome::default()
        };

        let op = OperatingPoint {
            bias,
            dc,
            cd,
            cbd,
            cbs,
            gbd,
            gbs,
            capbd,
            capbs,
        };
        stamp(
            matrix,
            rhs,
            &self.nodes,
            &handles,
            derived,
            sign,
            &op,
            &gate,
        );
        self.op = Some(op);
        Ok(outcome)
    }
}

/// Companion model of the three gate capacitances.
#[derive(Debug, Clone, Copy, Default)]
struct GateCompanion {
    gcgs: f64,
    ceqgs: f64,
    gcgd: f64,
    ceqgd: f64,
    gcgb: f64,
    ceqgb: f64,
}

#[allow(clippy::too_many_arguments)]
fn stamp<M: SparseMatrix>(
    matrix: &mut M,
    rhs: &mut DVector<f64>,
    nodes: &EkvNodes,
    h: &super::handles::EkvHandles,
    derived: &EkvDerived,
    sign: f64,
    op: &OperatingPoint,
    gate: &GateCompanion,
) {
    let bias = &op.bias;
    let eval = &op.dc.eval;
    let (gm, gds, gmbs) = (eval.gm, eval.gds, eval.gmbs);
    let (gbd, gbs) = (op.gbd, op.gbs);
    let GateCompanion {
        gcgs,
        ceqgs,
        gcgd,
        ceqgd,
        gcgb,
        ceqgb,
    } = *gate;

    // Equivalent current sources
    let ceqbs = sign * (op.cbs - gbs * bias.vbs);
    let ceqbd = sign * (op.cbd - gbd * bias.vbd);
    let (xnrm, xrev, cdreq) = match op.dc.mode {
        Mode::Normal => (
            1.0,
            0.0,
            sign * (eval.ids - gds * bias.vds - gm * bias.vgs - gmbs * bias.vbs),
        ),
        Mode::Inverse => (
            0.0,
            1.0,
            -sign * (eval.ids - gds * (-bias.vds) - gm * bias.vgd - gmbs * bias.vbd),
        ),
    };

    stamp_rhs(rhs, nodes.gate, -(sign * (ceqgs + ceqgb + ceqgd)));
    stamp_rhs(rhs, nodes.bulk, -(ceqbs + ceqbd - sign * ceqgb));
    stamp_rhs(rhs, nodes.drain_prime, ceqbd - cdreq + sign * ceqgd);
    stamp_rhs(rhs, nodes.source_prime, cdreq + ceqbs + sign * ceqgs);

    let gdpr = derived.drain_conductance;
    let gspr = derived.source_conductance;

    matrix.add(h.dd, gdpr);
    matrix.add(h.gg, gcgd + gcgs + gcgb);
    matrix.add(h.ss, gspr);
    matrix.add(h.bb, gbd + gbs + gcgb);
    matrix.add(h.dpdp, gdpr + gds + gbd + xrev * (gm + gmbs) + gcgd);
    matrix.add(h.spsp, gspr + gds + gbs + xnrm * (gm + gmbs) + gcgs);
    matrix.add(h.ddp, -gdpr);
    matrix.add(h.gb, -gcgb);
    matrix.add(h.gdp, -gcgd);
    matrix.add(h.gsp, -gcgs);
    matrix.add(h.ssp, -gspr);
    matrix.add(h.bg, -gcgb);
    matrix.add(h.bdp, -gbd);
    matrix.add(h.bsp, -gbs);
    matrix.add(h.dpd, -gdpr);
    matrix.add(h.dpg, (xnrm - xrev) * gm - gcgd);
    matrix.add(h.dpb, -gbd + (xnrm - xrev) * gmbs);
    matrix.add(h.dpsp, -gds - xnrm * (gm + gmbs));
    matrix.add(h.spg, -(xnrm - xrev) * gm - gcgs);
    matrix.add(h.sps, -gspr);
    matrix.add(h.spb, -gbs - (xnrm - xrev) * gmbs);
    matrix.add(h.spdp, -gds - xrev * (gm + gmbs));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ekv::params::{EkvInstanceParams, EkvModelParams};
    use crate::param::Given;
    use crate::stamp::Stamp;
    use crate::ekv::EkvModel;
    use spicedev_core::{MnaMatrix, NodeId, NodeTable, StateAllocator};

    struct Bench {
        model: EkvModel,
        ctx: CircuitContext,
        states: StateHistory,
        matrix: MnaMatrix,
        rhs: DVector<f64>,
    }

    fn bench(params: EkvModelParams, bulk_grounded: bool) -> Bench {
        let mut table = NodeTable::new();
        let d = table.add("d");
        let g = table.add("g");
        let s = table.add("s");
        let b = if bulk_grounded {
            NodeId::GROUND
        } else {
            table.add("b")
        };
        let mut model = EkvModel::new("nch", params);
        model.add_instance(EkvInstance::new(
            "M1",
            d,
            g,
            s,
            b,
            EkvInstanceParams::with_geometry(10e-6, 1e-6),
        ));
        let mut alloc = StateAllocator::new();
        model.setup(&mut table, &mut alloc).unwrap();
        let mut matrix = MnaMatrix::new(table.num_nodes());
        model.bind(&mut matrix).unwrap();
        let ctx = CircuitContext::new(table.num_nodes());
        model.temperature(&ctx);
        Bench {
            model,
            ctx,
            states: alloc.into_history(3),
            rhs: DVector::zeros(table.num_nodes() + 1),
            matrix,
        }
    }

    fn nmos() -> EkvModelParams {
        let mut p = EkvModelParams::nmos();
        p.vto = Given::new(0.5);
        p.kp = Given::new(1e-4);
        p
    }

    impl Bench {
        fn load(&mut self) -> LoadOutcome {
            self.matrix.clear();
            self.rhs.fill(0.0);
            self.model
                .load(&self.ctx, &mut self.states, &mut self.matrix, &mut self.rhs)
                .unwrap()
        }

        fn settle(&mut self) -> OperatingPoint {
            for _ in 0..50 {
                if self.load().converged() {
                    break;
                }
            }
            *self.model.instances[0].operating_point().unwrap()
        }
    }

    #[test]
    fn test_bias_from_solution_is_consistent() {
        let mut ctx = CircuitContext::new(4);
        let nodes = EkvNodes::new(NodeId::new(1), NodeId::new(2), NodeId::new(3), NodeId::new(4));
        ctx.set_voltage(NodeId::new(1), 1.2);
        ctx.set_voltage(NodeId::new(2), 0.9);
        ctx.set_voltage(NodeId::new(3), 0.1);
        ctx.set_voltage(NodeId::new(4), -0.3);
        let b = Bias::from_solution(&ctx, &nodes, 1.0);
        assert!((b.vbd - (b.vbs - b.vds)).abs() < 1e-15);
        assert!((b.vgd - (b.vgs - b.vds)).abs() < 1e-15);
        let p = Bias::from_solution(&ctx, &nodes, -1.0);
        assert_eq!(p.vgs, -b.vgs);
    }

    #[test]
    fn test_junction_init_without_ic() {
        let mut b = bench(nmos(), true);
        b.ctx.init = InitPhase::Junction;
        let outcome = b.load();
        assert!(outcome.converged());
        let op = b.model.instances[0].operating_point().unwrap();
        assert_eq!(op.bias.vbs, -1.0);
        assert_eq!(op.bias.vds, 0.0);
        assert!((op.bias.vgs - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_saturated_device_stamps_kcl_consistent_rhs() {
        let mut b = bench(nmos(), false);
        b.ctx.set_voltage(NodeId::new(1), 1.0);
        b.ctx.set_voltage(NodeId::new(2), 1.0);
        let op = b.settle();
        assert_eq!(op.mode(), Mode::Normal);
        assert!(op.cd > 0.0);
        assert!(op.gm() > 0.0);
        let total: f64 = b.rhs.iter().sum();
        assert!(total.abs() < 1e-15, "rhs sum = {}", total);
    }

    #[test]
    fn test_large_step_is_limited() {
        let mut b = bench(nmos(), true);
        b.load();
        b.ctx.set_voltage(NodeId::new(1), 5.0);
        b.ctx.set_voltage(NodeId::new(2), 10.0);
        let outcome = b.load();
        assert_eq!(outcome.noncon, 1);
        let op = b.model.instances[0].operating_point().unwrap();
        assert!(op.bias.vgs < 10.0);
    }

    #[test]
    fn test_off_device_in_fix_phase_is_quiet() {
        let mut params = EkvInstanceParams::with_geometry(10e-6, 1e-6);
        params.off = true;
        let mut b = bench(nmos(), true);
        b.model.instances[0].params = params;
        b.model.temperature(&b.ctx);
        b.ctx.init = InitPhase::Fix;
        b.ctx.set_voltage(NodeId::new(2), 3.0);
        assert!(b.load().converged());
        let op = b.model.instances[0].operating_point().unwrap();
        assert_eq!(op.bias, Bias::default());
    }

    #[test]
    fn test_pmos_mirrors_nmos() {
        let mut p = EkvModelParams::pmos();
        p.vto = Given::new(-0.5);
        p.kp = Given::new(1e-4);
        let mut n = bench(nmos(), true);
        let mut pm = bench(p, true);
        n.ctx.set_voltage(NodeId::new(1), 1.0);
        n.ctx.set_voltage(NodeId::new(2), 1.0);
        pm.ctx.set_voltage(NodeId::new(1), -1.0);
        pm.ctx.set_voltage(NodeId::new(2), -1.0);
        let on = n.settle();
        let op = pm.settle();
        assert!((on.cd - op.cd).abs() < 1e-12 * on.cd.abs());
        assert!((n.rhs[1] + pm.rhs[1]).abs() < 1e-15);
    }

    #[test]
    fn test_load_requires_bind() {
        let mut b = bench(nmos(), true);
        b.model.unsetup();
        let err = b
            .model
            .load(&b.ctx, &mut b.states, &mut b.matrix, &mut b.rhs)
            .unwrap_err();
        assert!(matches!(err, crate::Error::NotPrepared { .. }));
    }
}
