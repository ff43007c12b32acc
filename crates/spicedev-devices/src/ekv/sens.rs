//! Values carried together with their sensitivities to the bulk-referenced
//! terminal voltages `(VG, VS, VD)`.
//!
//! The EKV equations are a long chain of smooth functions; propagating the
//! three partial derivatives alongside each intermediate keeps the
//! conductances and capacitances exactly consistent with the current and
//! charges they linearize.

use std::ops::{Add, Div, Mul, Neg, Sub};

/// Index of the gate partial.
pub const G: usize = 0;
/// Index of the source partial.
pub const S: usize = 1;
/// Index of the drain partial.
pub const D: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sens {
    pub v: f64,
    pub d: [f64; 3],
}

impl Sens {
    #[inline]
    pub const fn constant(v: f64) -> Self {
        Self { v, d: [0.0; 3] }
    }

    /// An independent variable: unit sensitivity to partial `index`.
    #[inline]
    pub fn var(v: f64, index: usize) -> Self {
        let mut d = [0.0; 3];
        d[index] = 1.0;
        Self { v, d }
    }

    /// Apply a scalar function given its value and derivative at `self.v`.
    #[inline]
    fn chain(self, value: f64, slope: f64) -> Self {
        Self {
            v: value,
            d: [self.d[0] * slope, self.d[1] * slope, self.d[2] * slope],
        }
    }

    /// Square root; non-positive arguments give zero with zero slope.
    #[inline]
    pub fn sqrt(self) -> Self {
        if self.v <= 0.0 {
            return Self::constant(0.0);
        }
        let r = self.v.sqrt();
        self.chain(r, 0.5 / r)
    }

    /// Natural log; the argument is floored at the smallest positive double.
    #[inline]
    pub fn ln(self) -> Self {
        let x = self.v.max(f64::MIN_POSITIVE);
        self.chain(x.ln(), 1.0 / x)
    }

    #[inline]
    pub fn square(self) -> Self {
        self * self
    }

    /// EKV interpolation function `F(x) = ln^2(1 + exp(x / 2))`.
    pub fn ekv_interp(self) -> Self {
        let u = 0.5 * self.v;
        let e = (-u.abs()).exp();
        let softplus = u.max(0.0) + e.ln_1p();
        let sigmoid = if u >= 0.0 { 1.0 / (1.0 + e) } else { e / (1.0 + e) };
        // dF/dx = 2 softplus * sigmoid * 1/2
        self.chain(softplus * softplus, softplus * sigmoid)
    }

    #[inline]
    pub fn partial(&self, index: usize) -> f64 {
        self.d[index]
    }
}

impl Add for Sens {
    type Output = Sens;
    #[inline]
    fn add(self, rhs: Sens) -> Sens {
        Sens {
            v: self.v + rhs.v,
            d: [self.d[0] + rhs.d[0], self.d[1] + rhs.d[1], self.d[2] + rhs.d[2]],
        }
    }
}

impl Sub for Sens {
    type Output = Sens;
    #[inline]
    fn sub(self, rhs: Sens) -> Sens {
        Sens {
            v: self.v - rhs.v,
            d: [self.d[0] - rhs.d[0], self.d[1] - rhs.d[1], self.d[2] - rhs.d[2]],
        }
    }
}

impl Mul for Sens {
    type Output = Sens;
    #[inline]
    fn mul(self, rhs: Sens) -> Sens {
        Sens {
            v: self.v * rhs.v,
            d: [
                self.d[0] * rhs.v + self.v * rhs.d[0],
                self.d[1] * rhs.v + self.v * rhs.d[1],
                self.d[2] * rhs.v + self.v * rhs.d[2],
            ],
        }
    }
}

impl Div for Sens {
    type Output = Sens;
    #[inline]
    fn div(self, rhs: Sens) -> Sens {
        let inv = 1.0 / rhs.v;
        let q = self.v * inv;
        Sens {
            v: q,
            d: [
                (self.d[0] - q * rhs.d[0]) * inv,
                (self.d[1] - q * rhs.d[1]) * inv,
                (self.d[2] - q * rhs.d[2]) * inv,
            ],
        }
    }
}

impl Neg for Sens {
    type Output = Sens;
    #[inline]
    fn neg(self) -> Sens {
        Sens {
            v: -self.v,
            d: [-self.d[0], -self.d[1], -self.d[2]],
        }
    }
}

impl Add<f64> for Sens {
    type Output = Sens;
    #[inline]
    fn add(self, rhs: f64) -> Sens {
        Sens { v: self.v + rhs, d: self.d }
    }
}

impl Sub<f64> for Sens {
    type Output = Sens;
    #[inline]
    fn sub(self, rhs: f64) -> Sens {
        Sens { v: self.v - rhs, d: self.d }
    }
}

impl Mul<f64> for Sens {
    type Output = Sens;
    #[inline]
    fn mul(self, rhs: f64) -> Sens {
        Sens {
            v: self.v * rhs,
            d: [self.d[0] * rhs, self.d[1] * rhs, self.d[2] * rhs],
        }
    }
}

impl Div<f64> for Sens {
    type Output = Sens;
    #[inline]
    fn div(self, rhs: f64) -> Sens {
        self * (1.0 / rhs)
    }
}

impl Add<Sens> for f64 {
    type Output = Sens;
    #[inline]
    fn add(self, rhs: Sens) -> Sens {
        rhs + self
    }
}

impl Sub<Sens> for f64 {
    type Output = Sens;
    #[inline]
    fn sub(self, rhs: Sens) -> Sens {
        -rhs + self
    }
}

impl Mul<Sens> for f64 {
    type Output = Sens;
    #[inline]
    fn mul(self, rhs: Sens) -> Sens {
        rhs * self
    }
}

impl Div<Sens> for f64 {
    type Output = Sens;
    #[inline]
    fn div(self, rhs: Sens) -> Sens {
        Sens::constant(self) / rhs
    }
}
