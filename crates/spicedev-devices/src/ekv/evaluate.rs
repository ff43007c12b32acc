//! EKV 2.6 intrinsic channel evaluation.
//!
//! Evaluates drain current, its derivatives and the gate charge partition at
//! one bias point given in the normal-mode frame (`vds >= 0`). Inverse-mode
//! operation is handled by the caller by swapping the drain and source roles
//! before calling [`evaluate`].
//!
//! Internally every voltage is referred to the bulk, as in the EKV
//! formulation: `VG = vgs - vbs`, `VS = -vbs`, `VD = vds - vbs`.

use super::params::EkvModelValues;
use super::sens::{D, G, S, Sens};
use super::temperature::EkvDerived;

/// Offset keeping the charge-model square roots away from zero (V).
const CHARGE_EPS: f64 = 1e-6;

/// Intrinsic channel quantities at one bias point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EkvEval {
    /// Drain-to-source channel current (A).
    pub ids: f64,
    /// d(ids)/d(vgs).
    pub gm: f64,
    /// d(ids)/d(vds).
    pub gds: f64,
    /// d(ids)/d(vbs).
    pub gmbs: f64,
    /// Threshold voltage seen from the source (V).
    pub von: f64,
    /// Saturation voltage (V).
    pub vdsat: f64,
    /// Pinch-off voltage (V).
    pub vp: f64,
    /// Slope factor.
    pub n: f64,
    /// Forward normalized current.
    pub if_: f64,
    /// Reverse normalized current.
    pub ir: f64,
    /// Current factor including mobility reduction and length modulation (A/V^2).
    pub beta: f64,
    /// Normalized inversion charge.
    pub qi: f64,
    /// Gate charge (C).
    pub qg: f64,
    /// Intrinsic gate-source capacitance (F).
    pub cgs: f64,
    /// Intrinsic gate-drain capacitance (F).
    pub cgd: f64,
    /// Intrinsic gate-bulk capacitance (F).
    pub cgb: f64,
}

/// Pinch-off voltage for an effective body factor `gamma`.
fn pinch_off(vgp: Sens, phi: f64, gamma: Sens) -> Sens {
    if vgp.v > 0.0 {
        let half = gamma * 0.5;
        vgp - phi - gamma * ((vgp + half.square()).sqrt() - half)
    } else {
        Sens::constant(-phi)
    }
}

/// Evaluate the intrinsic channel at `(vgs, vds, vbs)`.
pub fn evaluate(
    model: &EkvModelValues,
    derived: &EkvDerived,
    vgs: f64,
    vds: f64,
    vbs: f64,
) -> EkvEval {
    let vt = derived.vt;
    let phi = derived.phi;
    let gamma = model.gamma;
    let vto = derived.vto + derived.dv_rsce;

    let vg = Sens::var(vgs - vbs, G);
    let vs = Sens::var(-vbs, S);
    let vd = Sens::var(vds - vbs, D);

    // Effective gate voltage and long-channel pinch-off
    let vgp = vg - vto + phi + gamma * phi.sqrt();
    let vp0 = pinch_off(vgp, phi, Sens::constant(gamma));

    // Short- and narrow-channel body factor
    let four_vt_sq = 16.0 * vt * vt;
    let vsp = ((vs + phi) + ((vs + phi).square() + four_vt_sq).sqrt()) * 0.5;
    let vdp = ((vd + phi) + ((vd + phi).square() + four_vt_sq).sqrt()) * 0.5;
    let gamma0 = gamma
        - derived.eps_cox
            * (model.leta / derived.leff * (vsp.sqrt() + vdp.sqrt())
                - 3.0 * model.weta / derived.weff * (vp0 + phi).sqrt());
    let gammap = (gamma0 + (gamma0.square() + 0.1 * vt).sqrt()) * 0.5;

    let vp = pinch_off(vgp, phi, gammap);
    let n = 1.0 + gamma / (2.0 * (vp + phi + 4.0 * vt).sqrt());

    // Forward current and velocity saturation
    let if_ = ((vp - vs) / vt).ekv_interp();
    let vc = derived.vc;
    let sqrt_if = if_.sqrt();
    let vdss = vc * ((0.25 + vt / vc * sqrt_if).sqrt() - 0.5);
    let vdssp = vc * ((0.25 + vt / vc * (sqrt_if - 0.75 * if_.ln())).sqrt() - 0.5)
        + vt * ((vc / (2.0 * vt)).ln() - 0.6);

    // Channel length modulation
    let dv = 4.0 * vt * (model.lambda * (sqrt_if - vdss / vt) + 1.0 / 64.0).sqrt();
    let vds_half = (vd - vs) * 0.5;
    let dv_sq = dv.square();
    let vip = (vdss.square() + dv_sq).sqrt() - ((vds_half - vdss).square() + dv_sq).sqrt();
    let lc_ucrit = derived.lc * derived.ucrit;
    let delta_l = model.lambda * derived.lc * (1.0 + (vds_half - vip) / lc_ucrit).ln();
    let lprime = derived.leff - delta_l + (vds_half + vip) / derived.ucrit;
    let lmin = derived.leff / 10.0;
    let leq = (lprime + (lprime.square() + lmin * lmin).sqrt()) * 0.5;

    // Reverse currents: saturated for the drain current, plain for the charges
    let irp = ((vp - vds_half - vs - (vdssp.square() + dv_sq).sqrt()
        + ((vds_half - vdssp).square() + dv_sq).sqrt())
        / vt)
        .ekv_interp();
    let ir = ((vp - vd) / vt).ekv_interp();

    // Mobility reduction and drain current
    let beta = (derived.kp * derived.m * derived.weff) / leq / (1.0 + model.theta * vp);
    let ispec = 2.0 * n * beta * (vt * vt);
    let ids = ispec * (if_ - irp);

    // Node charges, normalized to COX * vt
    let root = (vp + phi + CHARGE_EPS).sqrt();
    let nq = 1.0 + gamma / (2.0 * root);
    let xf = (0.25 + if_).sqrt();
    let xr = (0.25 + ir).sqrt();
    let qi = -nq * ((xf.square() + xf * xr + xr.square()) / (xf + xr) * (4.0 / 3.0) - 1.0);
    let qb = if vgp.v > 0.0 {
        -gamma * root / vt - (nq - 1.0) / nq * qi
    } else {
        -vgp / vt
    };
    let qg = (-qi - qb) * (derived.cox_total * vt);

    let cgs = -qg.partial(S);
    let cgd = -qg.partial(D);

    let vs_phi = (phi - vbs).max(0.0);
    EkvEval {
        ids: ids.v,
        gm: ids.partial(G),
        gds: ids.partial(D),
        gmbs: -(ids.partial(G) + ids.partial(S) + ids.partial(D)),
        von: vto + gamma * (vs_phi.sqrt() - phi.sqrt()),
        vdsat: 2.0 * vdss.v,
        vp: vp.v,
        n: n.v,
        if_: if_.v,
        ir: ir.v,
        beta: beta.v,
        qi: qi.v,
        qg: qg.v,
        cgs,
        cgd,
        cgb: qg.partial(G) - cgs - cgd,
    }
}
