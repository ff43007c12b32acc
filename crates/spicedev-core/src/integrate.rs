//! Charge integration for reactive device elements.
//!
//! A charge `q` stored in a device becomes, after discretising `i = dq/dt`,
//! an equivalent conductance `geq` in parallel with a current source `ceq`:
//!
//! ```text
//! i(n) = geq * v(n) + ceq
//! ```
//!
//! Devices call [`Integrator::integrate`] once per charge per load and stamp
//! the result like any other conductance.

/// Numerical integration method for charge storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrationMethod {
    /// First-order, L-stable.
    BackwardEuler,
    /// Second-order, A-stable.
    #[default]
    Trapezoidal,
}

impl IntegrationMethod {
    /// Order of accuracy.
    pub fn order(self) -> usize {
        match self {
            IntegrationMethod::BackwardEuler => 1,
            IntegrationMethod::Trapezoidal => 2,
        }
    }
}

/// Result of integrating one charge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Integrated {
    /// Charge current `dq/dt` at the present timepoint.
    pub current: f64,
    /// Equivalent companion conductance.
    pub geq: f64,
    /// Equivalent companion current source.
    pub ceq: f64,
}

/// Integration coefficients for the present timestep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Integrator {
    method: IntegrationMethod,
    delta: f64,
    ag0: f64,
    ag1: f64,
}

impl Integrator {
    /// Coefficients for a timestep of `delta` seconds.
    pub fn new(method: IntegrationMethod, delta: f64) -> Self {
        let (ag0, ag1) = if delta > 0.0 {
            match method {
                IntegrationMethod::BackwardEuler => (1.0 / delta, -1.0 / delta),
                IntegrationMethod::Trapezoidal => (2.0 / delta, 1.0),
            }
        } else {
            (0.0, 0.0)
        };
        Self {
            method,
            delta,
            ag0,
            ag1,
        }
    }

    /// Coefficients for DC analyses; every charge current integrates to zero.
    pub fn dc() -> Self {
        Self::new(IntegrationMethod::Trapezoidal, 0.0)
    }

    pub fn method(&self) -> IntegrationMethod {
        self.method
    }

    /// Present timestep (s).
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Leading coefficient: `d(dq/dt)/dq`.
    pub fn ag0(&self) -> f64 {
        self.ag0
    }

    /// Integrate one charge.
    ///
    /// `q` is the charge at the present timepoint, `q_prev` and `cq_prev` the
    /// charge and charge current at the last accepted timepoint, and `cap`
    /// the present incremental capacitance.
    pub fn integrate(&self, q: f64, q_prev: f64, cq_prev: f64, cap: f64) -> Integrated {
        let current = match self.method {
            IntegrationMethod::BackwardEuler => self.ag0 * q + self.ag1 * q_prev,
            IntegrationMethod::Trapezoidal => -cq_prev * self.ag1 + self.ag0 * (q - q_prev),
        };
        Integrated {
            current,
            geq: self.ag0 * cap,
            ceq: current - self.ag0 * q,
        }
    }
}

impl Default for Integrator {
    fn default() -> Self {
        Self::dc()
    }
}
