//! Newton step limiting for junction and channel voltages.
//!
//! Each limiter compares the voltage proposed by the solver with the value
//! used on the previous iteration and pulls large steps back into a region
//! where the linearization is still meaningful.

/// Limit the step of a forward-biased pn junction voltage.
///
/// Returns the limited voltage and whether it differs from `v_new`.
pub fn pnjlim(v_new: f64, v_old: f64, vt: f64, v_crit: f64) -> (f64, bool) {
    if v_new > v_crit && (v_new - v_old).abs() > vt + vt {
        let limited = if v_old > 0.0 {
            let arg = 1.0 + (v_new - v_old) / vt;
            if arg > 0.0 {
                v_old + vt * arg.ln()
            } else {
                v_crit
            }
        } else {
            vt * (v_new / vt).ln()
        };
        (limited, true)
    } else if v_new < 0.0 {
        let floor = if v_old > 0.0 {
            -v_old - 1.0
        } else {
            2.0 * v_old - 1.0
        };
        if v_new < floor {
            (floor, true)
        } else {
            (v_new, false)
        }
    } else {
        (v_new, false)
    }
}

/// Limit the step of a gate-source (or gate-drain) voltage around threshold.
pub fn fetlim(v_new: f64, v_old: f64, vto: f64) -> f64 {
    let vtsthi = (2.0 * (v_old - vto)).abs() + 2.0;
    let vtstlo = (v_old - vto).abs() + 1.0;
    let vtox = vto + 3.5;
    let delv = v_new - v_old;

    if v_old >= vto {
        if v_old >= vtox {
            if delv <= 0.0 {
                // going off
                if v_new >= vtox {
                    if -delv > vtstlo {
                        return v_old - vtstlo;
                    }
                    v_new
                } else {
                    v_new.max(vto + 2.0)
                }
            } else if delv >= vtsthi {
                v_old + vtsthi
            } else {
                v_new
            }
        } else if delv <= 0.0 {
            v_new.max(vto - 0.5)
        } else {
            v_new.min(vto + 4.0)
        }
    } else if delv <= 0.0 {
        if -delv > vtsthi {
            v_old - vtsthi
        } else {
            v_new
        }
    } else {
        let vtemp = vto + 0.5;
        if v_new <= vtemp {
            if delv > vtstlo { v_old + vtstlo } else { v_new }
        } else {
            vtemp
        }
    }
}

/// Limit the step of a drain-source voltage.
pub fn limvds(v_new: f64, v_old: f64) -> f64 {
    if v_old >= 3.5 {
        if v_new > v_old {
            v_new.min(3.0 * v_old + 2.0)
        } else if v_new < 3.5 {
            v_new.max(2.0)
        } else {
            v_new
        }
    } else if v_new > v_old {
        v_new.min(4.0)
    } else {
        v_new.max(-0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VT: f64 = 0.025865;

    #[test]
    fn test_pnjlim_small_step_unchanged() {
        let (v, limited) = pnjlim(0.61, 0.6, VT, 0.6);
        assert_eq!(v, 0.61);
        assert!(!limited);
    }

    #[test]
    fn test_pnjlim_large_forward_step() {
        let (v, limited) = pnjlim(5.0, 0.6, VT, 0.6);
        assert!(limited);
        assert!(v < 1.0 && v > 0.6, "v = {}", v);
    }

    #[test]
    fn test_pnjlim_from_reverse() {
        let (v, limited) = pnjlim(2.0, -1.0, VT, 0.6);
        assert!(limited);
        assert!((v - VT * (2.0 / VT).ln()).abs() < 1e-15);
    }

    #[test]
    fn test_pnjlim_reverse_floor() {
        let (v, limited) = pnjlim(-10.0, 0.0, VT, 0.6);
        assert!(limited);
        assert_eq!(v, -1.0);
        let (v, limited) = pnjlim(-1.0, 0.0, VT, 0.6);
        assert!(!limited);
        assert_eq!(v, -1.0);
    }

    #[test]
    fn test_fetlim_off_to_on() {
        // Turning on from off is capped just above threshold.
        assert_eq!(fetlim(3.0, 0.0, 0.5), 1.0);
        assert_eq!(fetlim(1.0, 0.0, 0.5), 1.0);
    }

    #[test]
    fn test_fetlim_strong_inversion() {
        // Large increase in strong inversion is capped by vtsthi.
        let vold = 5.0;
        let v = fetlim(20.0, vold, 0.5);
        assert_eq!(v, vold + (2.0 * (vold - 0.5)).abs() + 2.0);
        // Small changes pass through.
        assert_eq!(fetlim(5.1, vold, 0.5), 5.1);
    }

    #[test]
    fn test_limvds() {
        assert_eq!(limvds(10.0, 0.0), 4.0);
        assert_eq!(limvds(-1.0, 0.0), -0.5);
        assert_eq!(limvds(1.0, 0.5), 1.0);
        assert_eq!(limvds(20.0, 4.0), 14.0);
        assert_eq!(limvds(0.0, 4.0), 2.0);
    }
}
