//! Temperature-corrected EKV instance parameters.
//!
//! Everything here is a pure function of the resolved model and instance
//! parameters; the instance temperature is already folded into
//! [`EkvInstanceValues::temp`].

use spicedev_core::constants::{
    BOLTZMANN, CHARGE, EG_REF_NUMERATOR, EPS_SI, REFTEMP, energy_gap, thermal_voltage,
};

use super::params::{EkvInstanceValues, EkvModelValues};

/// Reverse short-channel effect shape constants.
const RSCE_CA: f64 = 0.028;
const RSCE_CEPS: f64 = 4.0 * 22e-3 * 22e-3;

/// Derived parameters for one EKV instance at its operating temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct EkvDerived {
    /// Operating temperature (K).
    pub temp: f64,
    /// Thermal voltage at `temp` (V).
    pub vt: f64,
    /// Effective channel length (m).
    pub leff: f64,
    /// Effective channel width (m).
    pub weff: f64,
    /// Effective length or width came out non-positive.
    pub geometry_warning: bool,
    /// Parallel multiplier.
    pub m: f64,

    // ========================================
    // Intrinsic Core
    // ========================================
    /// Threshold voltage in the device's own polarity (V).
    pub vto: f64,
    pub kp: f64,
    pub ucrit: f64,
    pub phi: f64,
    /// Velocity saturation voltage UCRIT * Leff (V).
    pub vc: f64,
    /// Characteristic length sqrt(eps_si / COX * XJ) (m).
    pub lc: f64,
    /// Threshold shift from the reverse short-channel effect (V).
    pub dv_rsce: f64,
    /// eps_si / COX (m).
    pub eps_cox: f64,
    /// Total gate oxide capacitance COX * Weff * Leff * M (F).
    pub cox_total: f64,

    // ========================================
    // Series Resistance
    // ========================================
    pub drain_conductance: f64,
    pub source_conductance: f64,

    // ========================================
    // Bulk Junctions
    // ========================================
    pub sat_cur: f64,
    pub sat_cur_dens: f64,
    /// Saturation current of the bulk-drain junction, multiplier applied (A).
    pub drain_sat_cur: f64,
    pub source_sat_cur: f64,
    pub bulk_pot: f64,
    /// Forward bias above which depletion capacitance is linearized (V).
    pub dep_cap: f64,
    pub drain_vcrit: f64,
    pub source_vcrit: f64,
    pub czbd: f64,
    pub czbdsw: f64,
    pub czbs: f64,
    pub czbssw: f64,
    pub f2d: f64,
    pub f3d: f64,
    pub f4d: f64,
    pub f2s: f64,
    pub f3s: f64,
    pub f4s: f64,

    // ========================================
    // Overlap Capacitances (F)
    // ========================================
    pub cgs_overlap: f64,
    pub cgd_overlap: f64,
    pub cgb_overlap: f64,
}

/// Forward-bias depletion coefficients `(f2, f3, f4)` for one junction.
fn depletion_coefficients(
    czb: f64,
    czbsw: f64,
    model: &EkvModelValues,
    bulk_pot: f64,
    dep_cap: f64,
) -> (f64, f64, f64) {
    let arg = 1.0 - model.fc;
    let sarg = (-model.mj * arg.ln()).exp();
    let sargsw = (-model.mjsw * arg.ln()).exp();
    let f2 = czb * (1.0 - model.fc * (1.0 + model.mj)) * sarg / arg
        + czbsw * (1.0 - model.fc * (1.0 + model.mjsw)) * sargsw / arg;
    let f3 = czb * model.mj * sarg / arg / bulk_pot + czbsw * model.mjsw * sargsw / arg / bulk_pot;
    let f4 = czb * bulk_pot * (1.0 - arg * sarg) / (1.0 - model.mj)
        + czbsw * bulk_pot * (1.0 - arg * sargsw) / (1.0 - model.mjsw)
        - f3 / 2.0 * (dep_cap * dep_cap)
        - dep_cap * f2;
    (f2, f3, f4)
}

/// Series conductance from an explicit resistance or sheet resistance.
fn series_conductance(r: f64, r_given: bool, rsh: f64, squares: f64, m: f64, tfactor: f64) -> f64 {
    if r_given && r != 0.0 {
        m / (r * tfactor)
    } else if rsh != 0.0 && squares != 0.0 {
        m / (rsh * squares * tfactor)
    } else {
        0.0
    }
}

fn critical_voltage(vt: f64, m: f64, sat_cur: f64, sat_cur_dens: f64, area: f64) -> f64 {
    let is = if sat_cur_dens == 0.0 || area == 0.0 {
        sat_cur
    } else {
        sat_cur_dens * area
    };
    let total = std::f64::consts::SQRT_2 * m * is;
    if total > 0.0 {
        vt * (vt / total).ln()
    } else {
        f64::MAX
    }
}

impl EkvDerived {
    /// Compute derived parameters for the instance called `name`.
    ///
    /// A non-positive effective length or width is logged and kept as is.
    pub fn compute(name: &str, model: &EkvModelValues, inst: &EkvInstanceValues) -> Self {
        let temp = inst.temp;
        let tnom = model.tnom;
        let vt = thermal_voltage(temp);
        let vtnom = thermal_voltage(tnom);
        let ratio = temp / tnom;
        let dt = temp - tnom;
        let m = inst.m;

        // Geometry
        let leff = inst.l + model.dl;
        let weff = inst.w + model.dw;
        let mut geometry_warning = false;
        if leff <= 0.0 {
            log::warn!("{}: effective channel length {:e} m is not positive", name, leff);
            geometry_warning = true;
        }
        if weff <= 0.0 {
            log::warn!("{}: effective channel width {:e} m is not positive", name, weff);
            geometry_warning = true;
        }

        // Intrinsic parameters
        let eg_nom = energy_gap(tnom);
        let eg = energy_gap(temp);
        let vto = model.sign() * model.vto - model.tcv * dt;
        let kp = model.kp * ratio.powf(model.bex);
        let ucrit = model.ucrit * ratio.powf(model.ucex);
        let phi = model.phi * ratio - 3.0 * vt * ratio.ln() - eg_nom * ratio + eg;
        let eps_cox = EPS_SI / model.cox;
        let lc = (eps_cox * model.xj).sqrt();
        let vc = ucrit * leff;
        let xi = RSCE_CA * (10.0 * leff / model.lk - 1.0);
        let rsce_den = 1.0 + 0.5 * (xi + (xi * xi + RSCE_CEPS).sqrt());
        let dv_rsce = 2.0 * model.q0 / model.cox / (rsce_den * rsce_den);
        let cox_total = model.cox * weff * leff * m;

        // Series resistances
        let rfactor = 1.0 + model.tr1 * dt + model.tr2 * dt * dt;
        let drain_conductance =
            series_conductance(model.rd, model.rd_given, model.rsh, inst.nrd, m, rfactor);
        let source_conductance =
            series_conductance(model.rs, model.rs_given, model.rsh, inst.nrs, m, rfactor);

        // Junction saturation currents and built-in potential
        let fact1 = tnom / REFTEMP;
        let fact2 = temp / REFTEMP;
        let kt1 = BOLTZMANN * tnom;
        let kt = BOLTZMANN * temp;
        let ref_term = EG_REF_NUMERATOR / (BOLTZMANN * (REFTEMP + REFTEMP));
        let arg1 = -eg_nom / (kt1 + kt1) + ref_term;
        let pbfact1 = -2.0 * vtnom * (1.5 * fact1.ln() + CHARGE * arg1);
        let arg = -eg / (kt + kt) + ref_term;
        let pbfact = -2.0 * vt * (1.5 * fact2.ln() + CHARGE * arg);

        let arrhenius = (-eg / vt + eg_nom / vtnom).exp();
        let sat_cur = model.is * arrhenius;
        let sat_cur_dens = model.js * arrhenius;

        let pbo = (model.pb - pbfact1) / fact1;
        let gmaold = (model.pb - pbo) / pbo;
        let capfact = 1.0 / (1.0 + model.mj * (4e-4 * (tnom - REFTEMP) - gmaold));
        let mut tcbd = model.cbd * capfact;
        let mut tcbs = model.cbs * capfact;
        let mut tcj = model.cj * capfact;
        let capfact = 1.0 / (1.0 + model.mjsw * (4e-4 * (tnom - REFTEMP) - gmaold));
        let mut tcjsw = model.cjsw * capfact;

        let bulk_pot = fact2 * pbo + pbfact;
        let gmanew = (bulk_pot - pbo) / pbo;
        let capfact = 1.0 + model.mj * (4e-4 * (temp - REFTEMP) - gmanew);
        tcbd *= capfact;
        tcbs *= capfact;
        tcj *= capfact;
        let capfact = 1.0 + model.mjsw * (4e-4 * (temp - REFTEMP) - gmanew);
        tcjsw *= capfact;
        let dep_cap = model.fc * bulk_pot;

        let drain_vcrit = critical_voltage(vt, m, sat_cur, sat_cur_dens, inst.ad);
        let source_vcrit = critical_voltage(vt, m, sat_cur, sat_cur_dens, inst.as_);
        let drain_sat_cur = if sat_cur_dens == 0.0 || inst.ad == 0.0 {
            m * sat_cur
        } else {
            m * sat_cur_dens * inst.ad
        };
        let source_sat_cur = if sat_cur_dens == 0.0 || inst.as_ == 0.0 {
            m * sat_cur
        } else {
            m * sat_cur_dens * inst.as_
        };

        // Zero-bias junction capacitances
        let czbd = if model.cbd_given {
            tcbd * m
        } else {
            tcj * inst.ad * m
        };
        let czbs = if model.cbs_given {
            tcbs * m
        } else {
            tcj * inst.as_ * m
        };
        let czbdsw = tcjsw * inst.pd * m;
        let czbssw = tcjsw * inst.ps * m;
        let (f2d, f3d, f4d) = depletion_coefficients(czbd, czbdsw, model, bulk_pot, dep_cap);
        let (f2s, f3s, f4s) = depletion_coefficients(czbs, czbssw, model, bulk_pot, dep_cap);

        Self {
            temp,
            vt,
            leff,
            weff,
            geometry_warning,
            m,
            vto,
            kp,
            ucrit,
            phi,
            vc,
            lc,
            dv_rsce,
            eps_cox,
            cox_total,
            drain_conductance,
            source_conductance,
            sat_cur,
            sat_cur_dens,
            drain_sat_cur,
            source_sat_cur,
            bulk_pot,
            dep_cap,
            drain_vcrit,
            source_vcrit,
            czbd,
            czbdsw,
            czbs,
            czbssw,
            f2d,
            f3d,
            f4d,
            f2s,
            f3s,
            f4s,
            cgs_overlap: model.cgso * weff * m,
            cgd_overlap: model.cgdo * weff * m,
            cgb_overlap: model.cgbo * leff * m,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ekv::params::{EkvInstanceParams, EkvModelParams};
    use crate::param::Given;

    fn derive_at(model: &EkvModelParams, temp: f64) -> EkvDerived {
        let mv = model.resolve(REFTEMP);
        let mut inst = EkvInstanceParams::with_geometry(10e-6, 1e-6);
        inst.temp = Given::new(temp);
        EkvDerived::compute("M1", &mv, &inst.resolve(REFTEMP))
    }

    #[test]
    fn test_nominal_temperature_is_identity() {
        let mut model = EkvModelParams::nmos();
        model.vto = Given::new(0.5);
        model.kp = Given::new(1e-4);
        let d = derive_at(&model, REFTEMP);

        assert_eq!(d.vto, 0.5);
        assert_eq!(d.kp, 1e-4);
        assert_eq!(d.ucrit, 2.0e6);
        assert!((d.phi - 0.7).abs() < 1e-12, "phi = {}", d.phi);
        assert!((d.sat_cur - 1e-14).abs() < 1e-26);
        assert!((d.bulk_pot - 0.8).abs() < 1e-12, "pb = {}", d.bulk_pot);
        assert!(!d.geometry_warning);
    }

    #[test]
    fn test_hot_device() {
        let model = EkvModelParams::nmos();
        let cold = derive_at(&model, REFTEMP);
        let hot = derive_at(&model, REFTEMP + 50.0);

        // Threshold and mobility drop, leakage rises, built-in potential falls.
        assert!((hot.vto - (cold.vto - 50.0 * 1e-3)).abs() < 1e-12);
        assert!(hot.kp < cold.kp);
        assert!(hot.sat_cur > 10.0 * cold.sat_cur);
        assert!(hot.bulk_pot < cold.bulk_pot);
        assert!(hot.phi < cold.phi);
    }

    #[test]
    fn test_pmos_threshold_in_own_polarity() {
        let mut model = EkvModelParams::pmos();
        model.vto = Given::new(-0.6);
        let d = derive_at(&model, REFTEMP);
        assert_eq!(d.vto, 0.6);
    }

    #[test]
    fn test_series_resistance() {
        let mut model = EkvModelParams::nmos();
        model.rd = Given::new(50.0);
        model.rsh = Given::new(10.0);
        let mut inst = EkvInstanceParams::with_geometry(10e-6, 1e-6);
        inst.nrs = Given::new(2.0);
        inst.m = Given::new(2.0);
        let d = EkvDerived::compute("M1", &model.resolve(REFTEMP), &inst.resolve(REFTEMP));
        assert!((d.drain_conductance - 2.0 / 50.0).abs() < 1e-15);
        assert!((d.source_conductance - 2.0 / 20.0).abs() < 1e-15);
    }

    #[test]
    fn test_critical_voltage_fallback() {
        let mut model = EkvModelParams::nmos();
        model.js = Given::new(1e-4);
        let mut inst = EkvInstanceParams::with_geometry(10e-6, 1e-6);
        inst.ad = Given::new(1e-11);
        let d = EkvDerived::compute("M1", &model.resolve(REFTEMP), &inst.resolve(REFTEMP));
        // Drain uses density * area, source (no area) falls back to IS.
        let vt = d.vt;
        let expect_d = vt * (vt / (std::f64::consts::SQRT_2 * 1e-4 * 1e-11)).ln();
        let expect_s = vt * (vt / (std::f64::consts::SQRT_2 * 1e-14)).ln();
        assert!((d.drain_vcrit - expect_d).abs() < 1e-9);
        assert!((d.source_vcrit - expect_s).abs() < 1e-9);
        assert!((d.drain_sat_cur - 1e-15).abs() < 1e-27);
        assert!((d.source_sat_cur - 1e-14).abs() < 1e-26);
    }

    #[test]
    fn test_negative_length_is_flagged_not_clamped() {
        let mut model = EkvModelParams::nmos();
        model.dl = Given::new(-2e-6);
        let d = derive_at(&model, REFTEMP);
        assert!(d.geometry_warning);
        assert!((d.leff - (-1e-6)).abs() < 1e-18);
    }

    #[test]
    fn test_junction_capacitance_from_area() {
        let mut model = EkvModelParams::nmos();
        model.cj = Given::new(1e-3);
        model.cjsw = Given::new(1e-9);
        let mut inst = EkvInstanceParams::with_geometry(10e-6, 1e-6);
        inst.ad = Given::new(2e-11);
        inst.pd = Given::new(2e-5);
        let d = EkvDerived::compute("M1", &model.resolve(REFTEMP), &inst.resolve(REFTEMP));
        assert!((d.czbd - 2e-14).abs() < 1e-20, "czbd = {}", d.czbd);
        assert!((d.czbdsw - 2e-14).abs() < 1e-20);
        assert_eq!(d.czbs, 0.0);
        // The linearized capacitance meets the depletion formula at the knee.
        let knee = (d.czbd + d.czbdsw) * (0.5f64).powf(-0.5);
        let linear = d.f2d + d.f3d * d.dep_cap;
        assert!((linear - knee).abs() / knee < 1e-12, "{} vs {}", linear, knee);
    }
}
