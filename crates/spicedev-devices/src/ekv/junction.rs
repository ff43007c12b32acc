//! Bulk-drain and bulk-source junction diodes.

use super::params::EkvModelValues;
use super::temperature::EkvDerived;

/// Largest exponent evaluated before the diode current is clamped.
const MAX_EXP_ARG: f64 = 709.0;

/// Current and small-signal conductance of a junction.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JunctionCurrent {
    pub current: f64,
    pub conductance: f64,
}

/// Junction current at forward voltage `v`, with a `gmin` shunt.
///
/// Reverse bias is linear in `v` so the junction never turns into a pure
/// open circuit.
pub fn junction_current(v: f64, sat_cur: f64, vt: f64, gmin: f64) -> JunctionCurrent {
    if v <= 0.0 {
        let g = sat_cur / vt;
        JunctionCurrent {
            current: g * v + gmin * v,
            conductance: g + gmin,
        }
    } else {
        let ev = (v / vt).min(MAX_EXP_ARG).exp();
        JunctionCurrent {
            current: sat_cur * (ev - 1.0) + gmin * v,
            conductance: sat_cur * ev / vt + gmin,
        }
    }
}

/// Zero-bias capacitances and forward-bias coefficients of one junction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JunctionCaps {
    pub czb: f64,
    pub czbsw: f64,
    pub f2: f64,
    pub f3: f64,
    pub f4: f64,
}

impl EkvDerived {
    pub fn drain_caps(&self) -> JunctionCaps {
        JunctionCaps {
            czb: self.czbd,
            czbsw: self.czbdsw,
            f2: self.f2d,
            f3: self.f3d,
            f4: self.f4d,
        }
    }

    pub fn source_caps(&self) -> JunctionCaps {
        JunctionCaps {
            czb: self.czbs,
            czbsw: self.czbssw,
            f2: self.f2s,
            f3: self.f3s,
            f4: self.f4s,
        }
    }
}

/// Depletion charge and capacitance `(q, c)` at forward voltage `v`.
///
/// Above `fc * pb` the capacitance is continued linearly.
pub fn depletion_charge(
    v: f64,
    caps: &JunctionCaps,
    model: &EkvModelValues,
    derived: &EkvDerived,
) -> (f64, f64) {
    if caps.czb == 0.0 && caps.czbsw == 0.0 {
        return (0.0, 0.0);
    }
    let pb = derived.bulk_pot;
    if v < derived.dep_cap {
        let arg = 1.0 - v / pb;
        let (sarg, sargsw) = if model.mj == model.mjsw {
            let s = if model.mj == 0.5 {
                1.0 / arg.sqrt()
            } else {
                (-model.mj * arg.ln()).exp()
            };
            (s, s)
        } else {
            (
                (-model.mj * arg.ln()).exp(),
                (-model.mjsw * arg.ln()).exp(),
            )
        };
        let q = pb
            * (caps.czb * (1.0 - arg * sarg) / (1.0 - model.mj)
                + caps.czbsw * (1.0 - arg * sargsw) / (1.0 - model.mjsw));
        let c = caps.czb * sarg + caps.czbsw * sargsw;
        (q, c)
    } else {
        let q = caps.f4 + v * (caps.f2 + v * (caps.f3 / 2.0));
        let c = caps.f2 + caps.f3 * v;
        (q, c)
    }
}
