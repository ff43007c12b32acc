//! Small-signal stamp at angular frequency `ctx.omega`.

use num_complex::Complex64;
use spicedev_core::{CircuitContext, SparseMatrix, StateHistory};

use super::state::EkvState;
use super::{EkvInstance, Mode};
use crate::error::{Error, Result};

impl EkvInstance {
    /// Stamp conductances and capacitive susceptances around the last DC load.
    pub(crate) fn ac_load<M: SparseMatrix>(
        &self,
        ctx: &CircuitContext,
        states: &StateHistory,
        matrix: &mut M,
    ) -> Result<()> {
        let op = self.op.as_ref().ok_or_else(|| Error::NotLoaded {
            device: self.name.clone(),
        })?;
        let base = self.state_slot_base()?;
        let h = self.handles.as_ref().ok_or_else(|| self.not_prepared("bind"))?;
        let (_, derived) = self.prepared()?;
        let s0 = EkvState::read(states, 0, base)?;

        let (xnrm, xrev) = match op.mode() {
            Mode::Normal => (1.0, 0.0),
            Mode::Inverse => (0.0, 1.0),
        };

        let omega = ctx.omega;
        let capgs = 2.0 * s0.capgs + derived.cgs_overlap;
        let capgd = 2.0 * s0.capgd + derived.cgd_overlap;
        let capgb = 2.0 * s0.capgb + derived.cgb_overlap;
        let xgs = capgs * omega;
        let xgd = capgd * omega;
        let xgb = capgb * omega;
        let xbd = op.capbd * omega;
        let xbs = op.capbs * omega;

        let (gm, gds, gmbs) = (op.gm(), op.gds(), op.gmbs());
        let (gbd, gbs) = (op.gbd, op.gbs);
        let gdpr = derived.drain_conductance;
        let gspr = derived.source_conductance;
        let c = Complex64::new;

        matrix.add_complex(h.gg, c(0.0, xgd + xgs + xgb));
        matrix.add_complex(h.bb, c(gbd + gbs, xgb + xbd + xbs));
        matrix.add_complex(
            h.dpdp,
            c(gdpr + gds + gbd + xrev * (gm + gmbs), xgd + xbd),
        );
        matrix.add_complex(
            h.spsp,
            c(gspr + gds + gbs + xnrm * (gm + gmbs), xgs + xbs),
        );
        matrix.add_complex(h.gb, c(0.0, -xgb));
        matrix.add_complex(h.gdp, c(0.0, -xgd));
        matrix.add_complex(h.gsp, c(0.0, -xgs));
        matrix.add_complex(h.bg, c(0.0, -xgb));
        matrix.add_complex(h.bdp, c(-gbd, -xbd));
        matrix.add_complex(h.bsp, c(-gbs, -xbs));
        matrix.add_complex(h.dpg, c((xnrm - xrev) * gm, -xgd));
        matrix.add_complex(h.dpb, c(-gbd + (xnrm - xrev) * gmbs, -xbd));
        matrix.add_complex(h.spg, c(-(xnrm - xrev) * gm, -xgs));
        matrix.add_complex(h.spb, c(-gbs - (xnrm - xrev) * gmbs, -xbs));

        matrix.add(h.dd, gdpr);
        matrix.add(h.ss, gspr);
        matrix.add(h.ddp, -gdpr);
        matrix.add(h.ssp, -gspr);
        matrix.add(h.dpd, -gdpr);
        matrix.add(h.dpsp, -gds - xnrm * (gm + gmbs));
        matrix.add(h.sps, -gspr);
        matrix.add(h.spdp, -gds - xrev * (gm + gmbs));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ekv::{EkvInstanceParams, EkvModel, EkvModelParams};
    use crate::stamp::Stamp;
    use spicedev_core::{MnaMatrix, NodeId, NodeTable, StateAllocator};

    #[test]
    fn test_ac_before_load_fails() {
        let mut table = NodeTable::new();
        let d = table.add("d");
        let g = table.add("g");
        let mut model = EkvModel::new("nch", EkvModelParams::nmos());
        model.add_instance(EkvInstance::new(
            "M1",
            d,
            g,
            NodeId::GROUND,
            NodeId::GROUND,
            EkvInstanceParams::default(),
        ));
        let mut alloc = StateAllocator::new();
        model.setup(&mut table, &mut alloc).unwrap();
        let mut m = MnaMatrix::new(table.num_nodes());
        model.bind(&mut m).unwrap();
        let ctx = CircuitContext::new(table.num_nodes());
        model.temperature(&ctx);
        let states = alloc.into_history(3);
        let err = model.ac_load(&ctx, &states, &mut m).unwrap_err();
        assert!(matches!(err, Error::NotLoaded { .. }));
    }
}
