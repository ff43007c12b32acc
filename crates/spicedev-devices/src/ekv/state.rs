//! Per-instance state slots.
//!
//! The simulator owns the flat state history; an instance only knows its
//! base offset. [`EkvState`] is the typed view of one generation of those
//! slots, and the associated constants are the slot offsets.

use spicedev_core::StateHistory;

use crate::error::Result;

/// One generation of an EKV instance's state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EkvState {
    pub vbd: f64,
    pub vbs: f64,
    pub vgs: f64,
    pub vds: f64,
    /// Half the gate-source capacitance (trapezoidal convention).
    pub capgs: f64,
    pub qgs: f64,
    pub cqgs: f64,
    pub capgd: f64,
    pub qgd: f64,
    pub cqgd: f64,
    pub capgb: f64,
    pub qgb: f64,
    pub cqgb: f64,
    pub qbd: f64,
    pub cqbd: f64,
    pub qbs: f64,
    pub cqbs: f64,
}

impl EkvState {
    pub const VBD: usize = 0;
    pub const VBS: usize = 1;
    pub const VGS: usize = 2;
    pub const VDS: usize = 3;
    pub const CAPGS: usize = 4;
    pub const QGS: usize = 5;
    pub const CQGS: usize = 6;
    pub const CAPGD: usize = 7;
    pub const QGD: usize = 8;
    pub const CQGD: usize = 9;
    pub const CAPGB: usize = 10;
    pub const QGB: usize = 11;
    pub const CQGB: usize = 12;
    pub const QBD: usize = 13;
    pub const CQBD: usize = 14;
    pub const QBS: usize = 15;
    pub const CQBS: usize = 16;

    /// Number of slots every EKV instance reserves.
    pub const NUM_SLOTS: usize = 17;

    /// Charge slots, each followed by its current slot.
    pub const CHARGES: [usize; 5] = [Self::QGS, Self::QGD, Self::QGB, Self::QBD, Self::QBS];

    /// Read generation `generation` of the block starting at `base`.
    pub fn read(states: &StateHistory, generation: usize, base: usize) -> Result<Self> {
        let s = states.slots(generation, base, Self::NUM_SLOTS)?;
        Ok(Self {
            vbd: s[Self::VBD],
            vbs: s[Self::VBS],
            vgs: s[Self::VGS],
            vds: s[Self::VDS],
            capgs: s[Self::CAPGS],
            qgs: s[Self::QGS],
            cqgs: s[Self::CQGS],
            capgd: s[Self::CAPGD],
            qgd: s[Self::QGD],
            cqgd: s[Self::CQGD],
            capgb: s[Self::CAPGB],
            qgb: s[Self::QGB],
            cqgb: s[Self::CQGB],
            qbd: s[Self::QBD],
            cqbd: s[Self::CQBD],
            qbs: s[Self::QBS],
            cqbs: s[Self::CQBS],
        })
    }

    /// Write this state into generation 0 of the block starting at `base`.
    pub fn write(&self, states: &mut StateHistory, base: usize) -> Result<()> {
        let s = states.slots_mut(0, base, Self::NUM_SLOTS)?;
        s[Self::VBD] = self.vbd;
        s[Self::VBS] = self.vbs;
        s[Self::VGS] = self.vgs;
        s[Self::VDS] = self.vds;
        s[Self::CAPGS] = self.capgs;
        s[Self::QGS] = self.qgs;
        s[Self::CQGS] = self.cqgs;
        s[Self::CAPGD] = self.capgd;
        s[Self::QGD] = self.qgd;
        s[Self::CQGD] = self.cqgd;
        s[Self::CAPGB] = self.capgb;
        s[Self::QGB] = self.qgb;
        s[Self::CQGB] = self.cqgb;
        s[Self::QBD] = self.qbd;
        s[Self::CQBD] = self.cqbd;
        s[Self::QBS] = self.qbs;
        s[Self::CQBS] = self.cqbs;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spicedev_core::StateAllocator;

    #[test]
    fn test_round_trip_at_offset() {
        let mut alloc = StateAllocator::new();
        alloc.reserve(3);
        let base = alloc.reserve(EkvState::NUM_SLOTS);
        let mut history = alloc.into_history(3);

        let state = EkvState {
            vgs: 1.0,
            qbs: 2e-15,
            cqbs: -1e-6,
            ..EkvState::default()
        };
        state.write(&mut history, base).unwrap();

        assert_eq!(history.get(0, base + EkvState::VGS), 1.0);
        assert_eq!(history.get(0, base + EkvState::CQBS), -1e-6);
        assert_eq!(EkvState::read(&history, 0, base).unwrap(), state);
        assert_eq!(EkvState::read(&history, 1, base).unwrap(), EkvState::default());
    }

    #[test]
    fn test_charge_currents_follow_charges() {
        for q in EkvState::CHARGES {
            assert!(q + 1 < EkvState::NUM_SLOTS);
        }
        assert_eq!(EkvState::CQGS, EkvState::QGS + 1);
        assert_eq!(EkvState::CQBD, EkvState::QBD + 1);
    }

    #[test]
    fn test_short_history_fails() {
        let history = StateHistory::new(EkvState::NUM_SLOTS - 1, 3);
        assert!(EkvState::read(&history, 0, 0).is_err());
    }
}
