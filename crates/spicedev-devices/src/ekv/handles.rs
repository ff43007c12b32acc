//! Matrix element handles of the four-terminal MOSFET stamp.

use spicedev_core::{ElementHandle, NodeId, SparseMatrix};

use crate::error::Result;

/// Terminal nodes of one instance, internal nodes included.
///
/// Without series resistance the prime node is the external node itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EkvNodes {
    pub drain: NodeId,
    pub gate: NodeId,
    pub source: NodeId,
    pub bulk: NodeId,
    pub drain_prime: NodeId,
    pub source_prime: NodeId,
}

impl EkvNodes {
    pub fn new(drain: NodeId, gate: NodeId, source: NodeId, bulk: NodeId) -> Self {
        Self {
            drain,
            gate,
            source,
            bulk,
            drain_prime: drain,
            source_prime: source,
        }
    }
}

/// One handle per matrix entry the instance touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EkvHandles {
    pub dd: ElementHandle,
    pub gg: ElementHandle,
    pub ss: ElementHandle,
    pub bb: ElementHandle,
    pub dpdp: ElementHandle,
    pub spsp: ElementHandle,
    pub ddp: ElementHandle,
    pub gb: ElementHandle,
    pub gdp: ElementHandle,
    pub gsp: ElementHandle,
    pub ssp: ElementHandle,
    pub bdp: ElementHandle,
    pub bsp: ElementHandle,
    pub dpsp: ElementHandle,
    pub dpd: ElementHandle,
    pub bg: ElementHandle,
    pub dpg: ElementHandle,
    pub spg: ElementHandle,
    pub sps: ElementHandle,
    pub dpb: ElementHandle,
    pub spb: ElementHandle,
    pub spdp: ElementHandle,
}

impl EkvHandles {
    pub const COUNT: usize = 22;

    /// Resolve every handle for `nodes`. Fails only on allocation failure.
    pub fn resolve<M: SparseMatrix>(matrix: &mut M, nodes: &EkvNodes) -> Result<Self> {
        let EkvNodes {
            drain: d,
            gate: g,
            source: s,
            bulk: b,
            drain_prime: dp,
            source_prime: sp,
        } = *nodes;
        Ok(Self {
            dd: matrix.element(d, d)?,
            gg: matrix.element(g, g)?,
            ss: matrix.element(s, s)?,
            bb: matrix.element(b, b)?,
            dpdp: matrix.element(dp, dp)?,
            spsp: matrix.element(sp, sp)?,
            ddp: matrix.element(d, dp)?,
            gb: matrix.element(g, b)?,
            gdp: matrix.element(g, dp)?,
            gsp: matrix.element(g, sp)?,
            ssp: matrix.element(s, sp)?,
            bdp: matrix.element(b, dp)?,
            bsp: matrix.element(b, sp)?,
            dpsp: matrix.element(dp, sp)?,
            dpd: matrix.element(dp, d)?,
            bg: matrix.element(b, g)?,
            dpg: matrix.element(dp, g)?,
            spg: matrix.element(sp, g)?,
            sps: matrix.element(sp, s)?,
            dpb: matrix.element(dp, b)?,
            spb: matrix.element(sp, b)?,
            spdp: matrix.element(sp, dp)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spicedev_core::{Error as CoreError, MnaMatrix};

    fn nodes() -> EkvNodes {
        let mut n = EkvNodes::new(NodeId::new(1), NodeId::new(2), NodeId::new(3), NodeId::new(4));
        n.drain_prime = NodeId::new(5);
        n.source_prime = NodeId::new(6);
        n
    }

    #[test]
    fn test_distinct_entries() {
        let mut m = MnaMatrix::new(6);
        let h = EkvHandles::resolve(&mut m, &nodes()).unwrap();
        assert_eq!(m.num_elements(), EkvHandles::COUNT);
        assert!(!h.spdp.is_void());
    }

    #[test]
    fn test_without_series_resistance_entries_merge() {
        let mut m = MnaMatrix::new(4);
        let n = EkvNodes::new(NodeId::new(1), NodeId::new(2), NodeId::new(3), NodeId::new(4));
        let h = EkvHandles::resolve(&mut m, &n).unwrap();
        assert_eq!(h.dd, h.dpdp);
        assert_eq!(h.ddp, h.dd);
        assert!(m.num_elements() < EkvHandles::COUNT);
    }

    #[test]
    fn test_grounded_bulk_is_void() {
        let mut m = MnaMatrix::new(3);
        let n = EkvNodes::new(NodeId::new(1), NodeId::new(2), NodeId::new(3), NodeId::GROUND);
        let h = EkvHandles::resolve(&mut m, &n).unwrap();
        assert!(h.bb.is_void());
        assert!(h.dpb.is_void());
        assert!(!h.gg.is_void());
    }

    #[test]
    fn test_allocation_failure_propagates() {
        let mut m = MnaMatrix::with_capacity_limit(6, 10);
        let err = EkvHandles::resolve(&mut m, &nodes()).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Core(CoreError::OutOfMemory { .. })
        ));
    }
}
