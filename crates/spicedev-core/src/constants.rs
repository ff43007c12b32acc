//! Physical constants shared by the device models.

/// Elementary charge (C).
pub const CHARGE: f64 = 1.602176634e-19;

/// Boltzmann constant (J/K).
pub const BOLTZMANN: f64 = 1.380649e-23;

/// Boltzmann constant over elementary charge (V/K).
pub const K_OVER_Q: f64 = BOLTZMANN / CHARGE;

/// Reference temperature for parameter extraction (K), 27 degC.
pub const REFTEMP: f64 = 300.15;

/// Offset between Celsius and Kelvin.
pub const CELSIUS_TO_KELVIN: f64 = 273.15;

/// Permittivity of silicon (F/m).
pub const EPS_SI: f64 = 1.03594e-10;

/// Permittivity of silicon dioxide (F/m).
pub const EPS_OX: f64 = 3.45314e-11;

/// Energy gap of silicon at 0 K (eV), numerator of the reference-temperature term.
pub const EG_REF_NUMERATOR: f64 = 1.1150877;

/// Energy gap of silicon (eV) from the empirical quadratic fit.
#[inline]
pub fn energy_gap(temp: f64) -> f64 {
    1.16 - (7.02e-4 * temp * temp) / (temp + 1108.0)
}

/// Thermal voltage kT/q (V).
#[inline]
pub fn thermal_voltage(temp: f64) -> f64 {
    K_OVER_Q * temp
}
