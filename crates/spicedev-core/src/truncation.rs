//! Local truncation error control.
//!
//! Devices do not estimate their own time-discretisation error. At the end of
//! each accepted timestep they hand every charge-type state slot to a
//! [`TruncationSink`]; the slot immediately after a charge holds its current.

use crate::integrate::IntegrationMethod;
use crate::state::StateHistory;

/// Receives charge slots for truncation-error estimation.
pub trait TruncationSink {
    /// Register the charge stored at `q_slot` (its current is at `q_slot + 1`).
    fn register_charge(&mut self, states: &StateHistory, q_slot: usize);
}

/// Collects registered slots without estimating anything.
#[derive(Debug, Clone, Default)]
pub struct SlotRecorder {
    pub slots: Vec<usize>,
}

impl TruncationSink for SlotRecorder {
    fn register_charge(&mut self, _states: &StateHistory, q_slot: usize) {
        self.slots.push(q_slot);
    }
}

const TRAP_COEFF: [f64; 2] = [0.5, 0.083_333_333_333_333_33];
const BE_COEFF: [f64; 1] = [0.5];

/// Divided-difference estimator of the largest admissible next timestep.
#[derive(Debug, Clone)]
pub struct LteEstimator {
    pub method: IntegrationMethod,
    /// Recent timesteps, most recent first.
    pub delta_old: Vec<f64>,
    pub reltol: f64,
    pub abstol: f64,
    pub chgtol: f64,
    pub trtol: f64,
    timestep: f64,
}

impl LteEstimator {
    /// Create an estimator; the proposed timestep starts unbounded.
    pub fn new(method: IntegrationMethod, delta_old: Vec<f64>) -> Self {
        Self {
            method,
            delta_old,
            reltol: 1e-3,
            abstol: 1e-12,
            chgtol: 1e-14,
            trtol: 7.0,
            timestep: f64::INFINITY,
        }
    }

    /// Smallest timestep proposed by any registered charge.
    pub fn timestep(&self) -> f64 {
        self.timestep
    }

    fn estimate(&self, states: &StateHistory, q_slot: usize) -> Option<f64> {
        let order = self.method.order();
        if states.depth() < order + 2 || self.delta_old.len() < order + 1 {
            return None;
        }
        let delta = self.delta_old[0];
        if delta <= 0.0 {
            return None;
        }

        let ccap = q_slot + 1;
        let volttol = self.abstol
            + self.reltol * states.get(0, ccap).abs().max(states.get(1, ccap).abs());
        let chargetol = states.get(0, q_slot).abs().max(states.get(1, q_slot).abs());
        let chargetol = self.reltol * chargetol.max(self.chgtol) / delta;
        let tol = volttol.max(chargetol);

        let mut diff: Vec<f64> = (0..order + 2).map(|i| states.get(i, q_slot)).collect();
        let mut deltmp: Vec<f64> = self.delta_old[..=order].to_vec();
        let mut j = order as isize;
        loop {
            for i in 0..=(j as usize) {
                diff[i] = (diff[i] - diff[i + 1]) / deltmp[i];
            }
            j -= 1;
            if j < 0 {
                break;
            }
            for i in 0..=(j as usize) {
                deltmp[i] = deltmp[i + 1] + self.delta_old[i];
            }
        }

        let factor = match self.method {
            IntegrationMethod::BackwardEuler => BE_COEFF[0],
            IntegrationMethod::Trapezoidal => TRAP_COEFF[order - 1],
        };
        let del = self.trtol * tol / self.abstol.max(factor * diff[0].abs());
        Some(match order {
            1 => del,
            2 => del.sqrt(),
            n => (del.ln() / n as f64).exp(),
        })
    }
}

impl TruncationSink for LteEstimator {
    fn register_charge(&mut self, states: &StateHistory, q_slot: usize) {
        if let Some(del) = self.estimate(states, q_slot) {
            self.timestep = self.timestep.min(del);
        }
    }
}
