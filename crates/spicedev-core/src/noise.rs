//! Noise analysis bookkeeping shared between the analysis and devices.
//!
//! The analysis solves the adjoint system once per frequency and hands the
//! result to every device through a [`NoiseContext`]. Devices evaluate their
//! source densities, add them to the running output density and, past the
//! first frequency point, integrate each source across the last interval with
//! [`integrate_log_interval`].

use nalgebra::DVector;
use num_complex::Complex64;

use crate::node::NodeId;

/// Floor applied to densities before taking logarithms.
pub const N_MINLOG: f64 = 1e-38;

/// Below this log-slope the density is treated as flat over the interval.
const N_INTFTHRESH: f64 = 1e-10;

/// Below this exponent the integral of `f^-1` is taken as a logarithm.
const N_INTUSELOG: f64 = 1e-10;

/// Clamp a density to the floor and return it with its natural log.
#[inline]
pub fn floor_density(density: f64) -> (f64, f64) {
    let clamped = density.max(N_MINLOG);
    (clamped, clamped.ln())
}

/// Per-frequency data and running sums for one noise sweep.
#[derive(Debug, Clone)]
pub struct NoiseContext {
    /// Present frequency (Hz).
    pub freq: f64,
    /// Frequency of the previous point (Hz).
    pub last_freq: f64,
    /// Adjoint solution: transfer from each node to the output, indexed by node id.
    pub adjoint: DVector<Complex64>,
    /// Inverse squared gain from the input source to the output.
    pub gain_sq_inv: f64,
    /// Output noise density accumulated at this frequency (V^2/Hz).
    pub out_density: f64,
    /// Integrated output noise (V^2).
    pub out_noise: f64,
    /// Integrated input-referred noise.
    pub in_noise: f64,
}

impl NoiseContext {
    /// Create a context for a circuit with `num_nodes` non-ground nodes.
    pub fn new(num_nodes: usize) -> Self {
        Self {
            freq: 0.0,
            last_freq: 0.0,
            adjoint: DVector::from_element(num_nodes + 1, Complex64::new(0.0, 0.0)),
            gain_sq_inv: 1.0,
            out_density: 0.0,
            out_noise: 0.0,
            in_noise: 0.0,
        }
    }

    /// Move to a new frequency point; the density accumulator restarts.
    pub fn advance(&mut self, freq: f64) {
        self.last_freq = self.freq;
        self.freq = freq;
        self.out_density = 0.0;
    }

    /// True on the first frequency point, where nothing is integrated yet.
    pub fn is_first_point(&self) -> bool {
        self.last_freq <= 0.0 || self.freq <= self.last_freq
    }

    pub fn ln_freq(&self) -> f64 {
        self.freq.ln()
    }

    pub fn ln_last_freq(&self) -> f64 {
        self.last_freq.ln()
    }

    pub fn del_freq(&self) -> f64 {
        self.freq - self.last_freq
    }

    pub fn del_ln_freq(&self) -> f64 {
        self.ln_freq() - self.ln_last_freq()
    }

    pub fn ln_gain_inv(&self) -> f64 {
        self.gain_sq_inv.ln()
    }

    /// Squared magnitude of the transfer from the branch `pos -> neg` to the output.
    pub fn transfer_gain(&self, pos: NodeId, neg: NodeId) -> f64 {
        let at = |node: NodeId| {
            if node.is_ground() {
                Complex64::new(0.0, 0.0)
            } else {
                self.adjoint[node.index()]
            }
        };
        (at(pos) - at(neg)).norm_sqr()
    }

    /// Integrate one source over the last interval and add it to the sums.
    ///
    /// Returns the output-referred contribution.
    pub fn integrate_source(&mut self, density: f64, ln_density: f64, ln_last_density: f64) -> f64 {
        let out = integrate_log_interval(self, density, ln_density, ln_last_density);
        let ln_gain_inv = self.ln_gain_inv();
        let inp = integrate_log_interval(
            self,
            density * self.gain_sq_inv,
            ln_density + ln_gain_inv,
            ln_last_density + ln_gain_inv,
        );
        self.out_noise += out;
        self.in_noise += inp;
        out
    }
}

/// Integrate a density across `[last_freq, freq]` assuming it follows a power
/// law between the two endpoints (trapezoidal in log-log space).
pub fn integrate_log_interval(
    ctx: &NoiseContext,
    density: f64,
    ln_density: f64,
    ln_last_density: f64,
) -> f64 {
    let del_ln_freq = ctx.del_ln_freq();
    if del_ln_freq == 0.0 {
        return 0.0;
    }
    let mut exponent = (ln_density - ln_last_density) / del_ln_freq;
    if exponent.abs() < N_INTFTHRESH {
        return density * ctx.del_freq();
    }
    let a = (ln_density - exponent * ctx.ln_freq()).exp();
    exponent += 1.0;
    if exponent.abs() < N_INTUSELOG {
        a * (ctx.ln_freq() - ctx.ln_last_freq())
    } else {
        a * (((exponent * ctx.ln_freq()).exp() - (exponent * ctx.ln_last_freq()).exp()) / exponent)
    }
}
