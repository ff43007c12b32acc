//! Noise sources of an EKV instance.
//!
//! Every source produces a density at the present frequency, already
//! multiplied by the squared transfer gain of its branch to the output.
//! Densities are floored at [`N_MINLOG`] so their logarithm stays finite.

use spicedev_core::constants::{BOLTZMANN, CHARGE};
use spicedev_core::noise::{floor_density, integrate_log_interval};
use spicedev_core::{N_MINLOG, NodeId, NoiseContext};

use super::evaluate::EkvEval;
use super::handles::EkvNodes;
use super::params::EkvModelValues;
use super::temperature::EkvDerived;
use super::{EkvInstance, OperatingPoint};
use crate::error::{Error, Result};

/// Named noise sources, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EkvNoiseSource {
    /// Thermal noise of the drain series resistance.
    Rd,
    /// Thermal noise of the source series resistance.
    Rs,
    /// Channel thermal noise.
    Id,
    /// Flicker noise.
    Flicker,
    /// Shot noise of the bulk-drain junction.
    Ibd,
    /// Shot noise of the bulk-source junction.
    Ibs,
}

impl EkvNoiseSource {
    pub const ALL: [EkvNoiseSource; 6] = [
        EkvNoiseSource::Rd,
        EkvNoiseSource::Rs,
        EkvNoiseSource::Id,
        EkvNoiseSource::Flicker,
        EkvNoiseSource::Ibd,
        EkvNoiseSource::Ibs,
    ];

    /// Sources summed into the instance total.
    pub const TOTAL_SOURCES: [EkvNoiseSource; 4] = [
        EkvNoiseSource::Rd,
        EkvNoiseSource::Rs,
        EkvNoiseSource::Id,
        EkvNoiseSource::Flicker,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EkvNoiseSource::Rd => "rd",
            EkvNoiseSource::Rs => "rs",
            EkvNoiseSource::Id => "id",
            EkvNoiseSource::Flicker => "1overf",
            EkvNoiseSource::Ibd => "ibd",
            EkvNoiseSource::Ibs => "ibs",
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn in_total(self) -> bool {
        Self::TOTAL_SOURCES.contains(&self)
    }
}

const NUM_SOURCES: usize = EkvNoiseSource::ALL.len();

/// Per-instance noise results and integration memory.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseMemory {
    /// Density of each source at the present frequency (V^2/Hz), floored.
    pub density: [f64; NUM_SOURCES],
    pub ln_density: [f64; NUM_SOURCES],
    /// Output noise of each source integrated so far (V^2).
    pub out_noise: [f64; NUM_SOURCES],
    /// Sum of the `TOTAL_SOURCES` densities at the present frequency.
    pub total_density: f64,
    /// Integrated output noise of the `TOTAL_SOURCES`.
    pub total_out_noise: f64,
    last_ln_density: [f64; NUM_SOURCES],
}

impl Default for NoiseMemory {
    fn default() -> Self {
        let floor = N_MINLOG.ln();
        Self {
            density: [0.0; NUM_SOURCES],
            ln_density: [floor; NUM_SOURCES],
            out_noise: [0.0; NUM_SOURCES],
            total_density: 0.0,
            total_out_noise: 0.0,
            last_ln_density: [floor; NUM_SOURCES],
        }
    }
}

impl NoiseMemory {
    pub fn density_of(&self, source: EkvNoiseSource) -> f64 {
        self.density[source.index()]
    }

    pub fn ln_density_of(&self, source: EkvNoiseSource) -> f64 {
        self.ln_density[source.index()]
    }

    pub fn out_noise_of(&self, source: EkvNoiseSource) -> f64 {
        self.out_noise[source.index()]
    }
}

fn thermal(temp: f64, conductance: f64, gain: f64) -> f64 {
    4.0 * BOLTZMANN * temp * conductance * gain
}

fn shot(current: f64, gain: f64) -> f64 {
    2.0 * CHARGE * current.abs() * gain
}

/// Equivalent conductance of the channel thermal noise.
///
/// `nlev = 1` uses the long-channel saturation value; any other level follows
/// the inversion charge.
fn channel_conductance(model: &EkvModelValues, derived: &EkvDerived, eval: &EkvEval) -> f64 {
    if model.nlev == 1 {
        2.0 / 3.0 * eval.gm.abs()
    } else {
        eval.beta * derived.vt * eval.qi.abs()
    }
}

/// Unfloored density of every source at the present frequency.
fn densities(
    model: &EkvModelValues,
    derived: &EkvDerived,
    op: &OperatingPoint,
    nodes: &EkvNodes,
    noise: &NoiseContext,
) -> [f64; NUM_SOURCES] {
    let gain = |pos: NodeId, neg: NodeId| noise.transfer_gain(pos, neg);
    let temp = derived.temp;
    let eval = &op.dc.eval;
    let channel = gain(nodes.drain_prime, nodes.source_prime);

    let channel_conductance = channel_conductance(model, derived, eval);
    let flicker_area = derived.weff * derived.leff * model.cox * noise.freq.powf(model.af);
    let flicker = if flicker_area > 0.0 {
        model.kf * eval.gm * eval.gm / flicker_area * channel
    } else {
        0.0
    };

    let mut out = [0.0; NUM_SOURCES];
    out[EkvNoiseSource::Rd.index()] =
        thermal(temp, derived.drain_conductance, gain(nodes.drain_prime, nodes.drain));
    out[EkvNoiseSource::Rs.index()] =
        thermal(temp, derived.source_conductance, gain(nodes.source_prime, nodes.source));
    out[EkvNoiseSource::Id.index()] = thermal(temp, channel_conductance, channel);
    out[EkvNoiseSource::Flicker.index()] = flicker;
    out[EkvNoiseSource::Ibd.index()] = shot(op.dc.bd.current, gain(nodes.bulk, nodes.drain_prime));
    out[EkvNoiseSource::Ibs.index()] = shot(op.dc.bs.current, gain(nodes.bulk, nodes.source_prime));
    out
}

impl EkvInstance {
    /// Evaluate every source at `noise.freq` and integrate since the last point.
    pub(crate) fn noise(
        &mut self,
        model: &EkvModelValues,
        noise: &mut NoiseContext,
    ) -> Result<()> {
        let op = self.op.ok_or_else(|| Error::NotLoaded {
            device: self.name.clone(),
        })?;
        let (_, derived) = self.prepared()?;
        let raw = densities(model, derived, &op, &self.nodes, noise);

        let first = noise.is_first_point();
        let mem = &mut self.noise;
        if first {
            mem.out_noise = [0.0; NUM_SOURCES];
            mem.total_out_noise = 0.0;
        }

        let mut total = 0.0;
        for source in EkvNoiseSource::ALL {
            let i = source.index();
            let (density, ln_density) = floor_density(raw[i]);
            mem.density[i] = density;
            mem.ln_density[i] = ln_density;
            if source.in_total() {
                total += density;
            }
            if !first {
                let last = mem.last_ln_density[i];
                let out = if source.in_total() {
                    let out = noise.integrate_source(density, ln_density, last);
                    mem.total_out_noise += out;
                    out
                } else {
                    integrate_log_interval(noise, density, ln_density, last)
                };
                mem.out_noise[i] += out;
            }
            mem.last_ln_density[i] = ln_density;
        }
        mem.total_density = total;
        noise.out_density += total;
        Ok(())
    }
}
