//! EKV model and instance parameters.
//!
//! User-facing parameter sets hold [`Given`] values. [`EkvModelParams::resolve`]
//! and [`EkvInstanceParams::resolve`] substitute documented defaults and return
//! dense structs so the evaluation path never looks at presence flags.

use crate::param::Given;

/// MOSFET conduction type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MosfetType {
    #[default]
    Nmos,
    Pmos,
}

impl MosfetType {
    /// +1 for NMOS, -1 for PMOS.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            MosfetType::Nmos => 1.0,
            MosfetType::Pmos => -1.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MosfetType::Nmos => "nmos",
            MosfetType::Pmos => "pmos",
        }
    }
}

/// EKV model parameters as supplied by the user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EkvModelParams {
    pub mos_type: MosfetType,
    /// Nominal temperature (K). Default: circuit nominal temperature.
    pub tnom: Given<f64>,

    // ========================================
    // Process Parameters
    // ========================================
    /// Gate oxide capacitance per unit area (F/m^2). Default: 0.7e-3
    pub cox: Given<f64>,
    /// Junction depth (m). Default: 0.1e-6
    pub xj: Given<f64>,
    /// Channel width correction (m). Default: 0.0
    pub dw: Given<f64>,
    /// Channel length correction (m). Default: 0.0
    pub dl: Given<f64>,

    // ========================================
    // Intrinsic Model Parameters
    // ========================================
    /// Long-channel threshold voltage (V). Default: 0.5 (NMOS), -0.5 (PMOS)
    pub vto: Given<f64>,
    /// Body effect parameter (V^0.5). Default: 1.0
    pub gamma: Given<f64>,
    /// Bulk Fermi potential, twice (V). Default: 0.7
    pub phi: Given<f64>,
    /// Transconductance parameter (A/V^2). Default: 50e-6
    pub kp: Given<f64>,
    /// Mobility reduction coefficient (1/V). Default: 0.0
    pub theta: Given<f64>,
    /// Longitudinal critical field (V/m). Default: 2.0e6
    pub ucrit: Given<f64>,
    /// Depletion length coefficient (channel length modulation). Default: 0.5
    pub lambda: Given<f64>,
    /// Narrow-channel effect coefficient. Default: 0.25
    pub weta: Given<f64>,
    /// Short-channel effect coefficient. Default: 0.1
    pub leta: Given<f64>,
    /// Reverse short-channel effect peak charge density (A s/m^2). Default: 0.0
    pub q0: Given<f64>,
    /// Reverse short-channel effect characteristic length (m). Default: 0.29e-6
    pub lk: Given<f64>,

    // ========================================
    // Temperature Parameters
    // ========================================
    /// Threshold voltage temperature coefficient (V/K). Default: 1e-3
    pub tcv: Given<f64>,
    /// Mobility temperature exponent. Default: -1.5
    pub bex: Given<f64>,
    /// Critical field temperature exponent. Default: 0.8
    pub ucex: Given<f64>,
    /// First-order resistance temperature coefficient (1/K). Default: 0.0
    pub tr1: Given<f64>,
    /// Second-order resistance temperature coefficient (1/K^2). Default: 0.0
    pub tr2: Given<f64>,

    // ========================================
    // Series Resistance
    // ========================================
    /// Drain ohmic resistance (ohm). Default: 0.0
    pub rd: Given<f64>,
    /// Source ohmic resistance (ohm). Default: 0.0
    pub rs: Given<f64>,
    /// Drain/source diffusion sheet resistance (ohm/sq). Default: 0.0
    pub rsh: Given<f64>,

    // ========================================
    // Bulk Junctions
    // ========================================
    /// Zero-bias bulk-drain capacitance (F). Default: 0.0
    pub cbd: Given<f64>,
    /// Zero-bias bulk-source capacitance (F). Default: 0.0
    pub cbs: Given<f64>,
    /// Junction saturation current (A). Default: 1e-14
    pub is: Given<f64>,
    /// Junction saturation current density (A/m^2). Default: 0.0
    pub js: Given<f64>,
    /// Junction built-in potential (V). Default: 0.8
    pub pb: Given<f64>,
    /// Bottom junction capacitance per area (F/m^2). Default: 0.0
    pub cj: Given<f64>,
    /// Bottom grading coefficient. Default: 0.5
    pub mj: Given<f64>,
    /// Sidewall junction capacitance per length (F/m). Default: 0.0
    pub cjsw: Given<f64>,
    /// Sidewall grading coefficient. Default: 0.5
    pub mjsw: Given<f64>,
    /// Forward-bias depletion capacitance coefficient. Default: 0.5
    pub fc: Given<f64>,

    // ========================================
    // Overlap Capacitances
    // ========================================
    /// Gate-source overlap capacitance per width (F/m). Default: 0.0
    pub cgso: Given<f64>,
    /// Gate-drain overlap capacitance per width (F/m). Default: 0.0
    pub cgdo: Given<f64>,
    /// Gate-bulk overlap capacitance per length (F/m). Default: 0.0
    pub cgbo: Given<f64>,

    // ========================================
    // Noise
    // ========================================
    /// Flicker noise coefficient. Default: 0.0
    pub kf: Given<f64>,
    /// Flicker noise exponent. Default: 1.0
    pub af: Given<f64>,
    /// Channel thermal noise level (1 or 2). Default: 2
    pub nlev: Given<i64>,
}

impl EkvModelParams {
    /// Parameters for an NMOS model with every value at its default.
    pub fn nmos() -> Self {
        Self::default()
    }

    /// Parameters for a PMOS model with every value at its default.
    pub fn pmos() -> Self {
        Self {
            mos_type: MosfetType::Pmos,
            ..Self::default()
        }
    }

    /// Substitute defaults for every parameter that was not given.
    pub fn resolve(&self, default_tnom: f64) -> EkvModelValues {
        let sign = self.mos_type.sign();
        EkvModelValues {
            mos_type: self.mos_type,
            tnom: self.tnom.or(default_tnom),
            cox: self.cox.or(0.7e-3),
            xj: self.xj.or(0.1e-6),
            dw: self.dw.or(0.0),
            dl: self.dl.or(0.0),
            vto: self.vto.or(0.5 * sign),
            gamma: self.gamma.or(1.0),
            phi: self.phi.or(0.7),
            kp: self.kp.or(50e-6),
            theta: self.theta.or(0.0),
            ucrit: self.ucrit.or(2.0e6),
            lambda: self.lambda.or(0.5),
            weta: self.weta.or(0.25),
            leta: self.leta.or(0.1),
            q0: self.q0.or(0.0),
            lk: self.lk.or(0.29e-6),
            tcv: self.tcv.or(1e-3),
            bex: self.bex.or(-1.5),
            ucex: self.ucex.or(0.8),
            tr1: self.tr1.or(0.0),
            tr2: self.tr2.or(0.0),
            rd: self.rd.or(0.0),
            rs: self.rs.or(0.0),
            rsh: self.rsh.or(0.0),
            cbd: self.cbd.or(0.0),
            cbs: self.cbs.or(0.0),
            is: self.is.or(1e-14),
            js: self.js.or(0.0),
            pb: self.pb.or(0.8),
            cj: self.cj.or(0.0),
            mj: self.mj.or(0.5),
            cjsw: self.cjsw.or(0.0),
            mjsw: self.mjsw.or(0.5),
            fc: self.fc.or(0.5),
            cgso: self.cgso.or(0.0),
            cgdo: self.cgdo.or(0.0),
            cgbo: self.cgbo.or(0.0),
            kf: self.kf.or(0.0),
            af: self.af.or(1.0),
            nlev: self.nlev.or(2),
            rd_given: self.rd.is_given(),
            rs_given: self.rs.is_given(),
            cbd_given: self.cbd.is_given(),
            cbs_given: self.cbs.is_given(),
        }
    }
}

/// EKV model parameters with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct EkvModelValues {
    pub mos_type: MosfetType,
    pub tnom: f64,
    pub cox: f64,
    pub xj: f64,
    pub dw: f64,
    pub dl: f64,
    pub vto: f64,
    pub gamma: f64,
    pub phi: f64,
    pub kp: f64,
    pub theta: f64,
    pub ucrit: f64,
    pub lambda: f64,
    pub weta: f64,
    pub leta: f64,
    pub q0: f64,
    pub lk: f64,
    pub tcv: f64,
    pub bex: f64,
    pub ucex: f64,
    pub tr1: f64,
    pub tr2: f64,
    pub rd: f64,
    pub rs: f64,
    pub rsh: f64,
    pub cbd: f64,
    pub cbs: f64,
    pub is: f64,
    pub js: f64,
    pub pb: f64,
    pub cj: f64,
    pub mj: f64,
    pub cjsw: f64,
    pub mjsw: f64,
    pub fc: f64,
    pub cgso: f64,
    pub cgdo: f64,
    pub cgbo: f64,
    pub kf: f64,
    pub af: f64,
    pub nlev: i64,
    pub rd_given: bool,
    pub rs_given: bool,
    pub cbd_given: bool,
    pub cbs_given: bool,
}

impl EkvModelValues {
    #[inline]
    pub fn sign(&self) -> f64 {
        self.mos_type.sign()
    }
}

/// EKV instance parameters as supplied by the user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EkvInstanceParams {
    /// Drawn channel length (m). Default: 1e-6
    pub l: Given<f64>,
    /// Drawn channel width (m). Default: 1e-6
    pub w: Given<f64>,
    /// Drain diffusion area (m^2). Default: 0.0
    pub ad: Given<f64>,
    /// Source diffusion area (m^2). Default: 0.0
    pub as_: Given<f64>,
    /// Drain diffusion perimeter (m). Default: 0.0
    pub pd: Given<f64>,
    /// Source diffusion perimeter (m). Default: 0.0
    pub ps: Given<f64>,
    /// Drain squares for sheet resistance. Default: 1.0
    pub nrd: Given<f64>,
    /// Source squares for sheet resistance. Default: 1.0
    pub nrs: Given<f64>,
    /// Parallel multiplier. Default: 1.0
    pub m: Given<f64>,
    /// Instance temperature (K). Default: circuit temperature.
    pub temp: Given<f64>,
    /// Start the operating point with the device off.
    pub off: bool,
    /// Initial drain-source voltage (V).
    pub icvds: Given<f64>,
    /// Initial gate-source voltage (V).
    pub icvgs: Given<f64>,
    /// Initial bulk-source voltage (V).
    pub icvbs: Given<f64>,
}

impl EkvInstanceParams {
    /// Instance with the given drawn geometry.
    pub fn with_geometry(w: f64, l: f64) -> Self {
        Self {
            w: Given::new(w),
            l: Given::new(l),
            ..Self::default()
        }
    }

    pub fn resolve(&self, circuit_temp: f64) -> EkvInstanceValues {
        EkvInstanceValues {
            l: self.l.or(1e-6),
            w: self.w.or(1e-6),
            ad: self.ad.or(0.0),
            as_: self.as_.or(0.0),
            pd: self.pd.or(0.0),
            ps: self.ps.or(0.0),
            nrd: self.nrd.or(1.0),
            nrs: self.nrs.or(1.0),
            m: self.m.or(1.0),
            temp: self.temp.or(circuit_temp),
            off: self.off,
            icvds: self.icvds.or(0.0),
            icvgs: self.icvgs.or(0.0),
            icvbs: self.icvbs.or(0.0),
        }
    }
}

/// EKV instance parameters with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct EkvInstanceValues {
    pub l: f64,
    pub w: f64,
    pub ad: f64,
    pub as_: f64,
    pub pd: f64,
    pub ps: f64,
    pub nrd: f64,
    pub nrs: f64,
    pub m: f64,
    pub temp: f64,
    pub off: bool,
    pub icvds: f64,
    pub icvgs: f64,
    pub icvbs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pmos_default_threshold_is_negative() {
        let n = EkvModelParams::nmos().resolve(300.15);
        let p = EkvModelParams::pmos().resolve(300.15);
        assert_eq!(n.vto, 0.5);
        assert_eq!(p.vto, -0.5);
        assert_eq!(p.sign(), -1.0);
    }

    #[test]
    fn test_given_value_overrides_default() {
        let mut params = EkvModelParams::nmos();
        params.kp = Given::new(1e-4);
        params.tnom = Given::new(310.0);
        let v = params.resolve(300.15);
        assert_eq!(v.kp, 1e-4);
        assert_eq!(v.tnom, 310.0);
        assert_eq!(v.gamma, 1.0);
        assert!(!v.cbd_given);
    }

    #[test]
    fn test_given_zero_is_kept() {
        let mut params = EkvModelParams::nmos();
        params.cbd = Given::new(0.0);
        let v = params.resolve(300.15);
        assert!(v.cbd_given);
        assert_eq!(v.cbd, 0.0);
    }

    #[test]
    fn test_instance_defaults() {
        let inst = EkvInstanceParams::with_geometry(10e-6, 1e-6).resolve(320.0);
        assert_eq!(inst.w, 10e-6);
        assert_eq!(inst.l, 1e-6);
        assert_eq!(inst.m, 1.0);
        assert_eq!(inst.nrd, 1.0);
        assert_eq!(inst.temp, 320.0);
        assert!(!inst.off);
    }
}
