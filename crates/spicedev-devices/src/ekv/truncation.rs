use spicedev_core::{StateHistory, TruncationSink};

use super::EkvInstance;
use super::state::EkvState;

impl EkvInstance {
    /// Hand every charge slot to the truncation-error estimator.
    pub(crate) fn truncate(&self, states: &StateHistory, sink: &mut dyn TruncationSink) {
        let Some(base) = self.state_base else {
            return;
        };
        for q in EkvState::CHARGES {
            sink.register_charge(states, base + q);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ekv::{EkvInstance, EkvInstanceParams, EkvModel, EkvModelParams, EkvState};
    use crate::stamp::Stamp;
    use spicedev_core::{NodeId, NodeTable, SlotRecorder, StateAllocator};

    #[test]
    fn test_registers_all_charges_at_offset() {
        let mut table = NodeTable::new();
        let d = table.add("d");
        let mut model = EkvModel::new("nch", EkvModelParams::nmos());
        for name in ["M1", "M2"] {
            model.add_instance(EkvInstance::new(
                name,
                d,
                d,
                NodeId::GROUND,
                NodeId::GROUND,
                EkvInstanceParams::default(),
            ));
        }
        let mut alloc = StateAllocator::new();
        model.setup(&mut table, &mut alloc).unwrap();
        let states = alloc.into_history(3);

        let mut sink = SlotRecorder::default();
        model.truncate(&states, &mut sink);
        assert_eq!(sink.slots.len(), 10);
        assert_eq!(sink.slots[0], EkvState::QGS);
        assert_eq!(sink.slots[5], EkvState::NUM_SLOTS + EkvState::QGS);
        assert_eq!(sink.slots[9], EkvState::NUM_SLOTS + EkvState::QBS);
    }
}
