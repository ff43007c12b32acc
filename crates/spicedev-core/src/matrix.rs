//! Sparse-matrix element handles and a reference MNA matrix.
//!
//! Devices never index the system matrix directly. During setup each device
//! asks the matrix for one [`ElementHandle`] per `(row, column)` pair it will
//! ever touch; afterwards every write is an additive update through that
//! handle. Handles must be re-acquired after the matrix reorders its
//! unknowns.

use indexmap::IndexMap;
use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use num_traits::Zero;

use crate::error::{Error, Result};
use crate::node::NodeId;

/// Opaque reference to one matrix entry.
///
/// Entries in the ground row or column resolve to [`ElementHandle::VOID`];
/// writes through a void handle are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHandle {
    slot: Option<usize>,
    generation: u32,
}

impl ElementHandle {
    /// Handle for an entry in the ground row or column.
    pub const VOID: ElementHandle = ElementHandle {
        slot: None,
        generation: 0,
    };

    /// True if writes through this handle are discarded.
    pub fn is_void(self) -> bool {
        self.slot.is_none()
    }
}

/// The externally owned system matrix, as seen by a device.
pub trait SparseMatrix {
    /// Resolve (allocating if needed) the entry at `(row, col)`.
    ///
    /// Fails only when the allocator cannot create a new entry.
    fn element(&mut self, row: NodeId, col: NodeId) -> Result<ElementHandle>;

    /// Add a real value to an entry.
    fn add(&mut self, handle: ElementHandle, value: f64);

    /// Add a complex value to an entry (AC analysis).
    fn add_complex(&mut self, handle: ElementHandle, value: Complex64);
}

/// Add `value` to the RHS entry of `node`; ground is discarded.
#[inline]
pub fn stamp_rhs(rhs: &mut DVector<f64>, node: NodeId, value: f64) {
    if !node.is_ground() {
        rhs[node.index()] += value;
    }
}

/// Sparse MNA matrix with complex entries, keyed by node pair.
///
/// Entries live in a flat value array addressed by handle slots. An optional
/// capacity limit makes allocation failure reproducible in tests.
#[derive(Debug, Clone)]
pub struct MnaMatrix {
    size: usize,
    slots: IndexMap<(NodeId, NodeId), usize>,
    values: Vec<Complex64>,
    capacity: Option<usize>,
    generation: u32,
}

impl MnaMatrix {
    /// Create an empty matrix for `size` non-ground unknowns.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            slots: IndexMap::new(),
            values: Vec::new(),
            capacity: None,
            generation: 0,
        }
    }

    /// Create a matrix that refuses to allocate more than `capacity` entries.
    pub fn with_capacity_limit(size: usize, capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new(size)
        }
    }

    /// Number of non-ground unknowns.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of allocated (structurally nonzero) entries.
    pub fn num_elements(&self) -> usize {
        self.values.len()
    }

    /// Zero every entry, keeping the structure and outstanding handles.
    pub fn clear(&mut self) {
        self.values.iter_mut().for_each(|v| *v = Complex64::zero());
    }

    /// Reorder the internal storage.
    ///
    /// Entry values are preserved, but every previously issued handle is
    /// invalidated and must be re-acquired with [`SparseMatrix::element`].
    pub fn reorder(&mut self) {
        let mut entries: Vec<((NodeId, NodeId), Complex64)> = self
            .slots
            .iter()
            .map(|(&key, &slot)| (key, self.values[slot]))
            .collect();
        // Column-major order, the opposite of the natural allocation order.
        entries.sort_by_key(|&((row, col), _)| (col, row));

        self.slots.clear();
        self.values.clear();
        for (slot, (key, value)) in entries.into_iter().enumerate() {
            self.slots.insert(key, slot);
            self.values.push(value);
        }
        self.generation += 1;
        log::debug!(
            "matrix reordered: {} entries, handle generation {}",
            self.values.len(),
            self.generation
        );
    }

    /// Value of the entry at `(row, col)` (zero if never allocated).
    pub fn get(&self, row: NodeId, col: NodeId) -> Complex64 {
        self.slots
            .get(&(row, col))
            .map(|&slot| self.values[slot])
            .unwrap_or_else(Complex64::zero)
    }

    /// Real part of the entry at `(row, col)`.
    pub fn get_real(&self, row: NodeId, col: NodeId) -> f64 {
        self.get(row, col).re
    }

    /// Dense copy of the matrix; row/column `i` is node `i + 1`.
    pub fn to_dense(&self) -> DMatrix<Complex64> {
        let mut dense = DMatrix::from_element(self.size, self.size, Complex64::zero());
        for (&(row, col), &slot) in &self.slots {
            dense[(row.index() - 1, col.index() - 1)] += self.values[slot];
        }
        dense
    }

    /// Dense copy of the real part.
    pub fn to_dense_real(&self) -> DMatrix<f64> {
        self.to_dense().map(|v| v.re)
    }

    fn check_node(&self, node: NodeId) -> Result<()> {
        if node.index() > self.size {
            Err(Error::UnknownNode(node.as_u32()))
        } else {
            Ok(())
        }
    }

    #[inline]
    fn slot_of(&self, handle: ElementHandle) -> Option<usize> {
        debug_assert!(
            handle.is_void() || handle.generation == self.generation,
            "stale matrix handle used after reorder"
        );
        handle.slot
    }
}

impl SparseMatrix for MnaMatrix {
    fn element(&mut self, row: NodeId, col: NodeId) -> Result<ElementHandle> {
        if row.is_ground() || col.is_ground() {
            return Ok(ElementHandle::VOID);
        }
        self.check_node(row)?;
        self.check_node(col)?;

        if let Some(&slot) = self.slots.get(&(row, col)) {
            return Ok(ElementHandle {
                slot: Some(slot),
                generation: self.generation,
            });
        }

        let requested = self.values.len() + 1;
        if let Some(capacity) = self.capacity {
            if requested > capacity {
                return Err(Error::OutOfMemory {
                    requested,
                    capacity,
                });
            }
        }

        let slot = self.values.len();
        self.values.push(Complex64::zero());
        self.slots.insert((row, col), slot);
        Ok(ElementHandle {
            slot: Some(slot),
            generation: self.generation,
        })
    }

    #[inline]
    fn add(&mut self, handle: ElementHandle, value: f64) {
        if let Some(slot) = self.slot_of(handle) {
            self.values[slot].re += value;
        }
    }

    #[inline]
    fn add_complex(&mut self, handle: ElementHandle, value: Complex64) {
        if let Some(slot) = self.slot_of(handle) {
            self.values[slot] += value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(i: u32) -> NodeId {
        NodeId::new(i)
    }

    #[test]
    fn test_ground_handles_are_void() {
        let mut m = MnaMatrix::new(2);
        let h = m.element(NodeId::GROUND, n(1)).unwrap();
        assert!(h.is_void());
        m.add(h, 5.0);
        assert_eq!(m.num_elements(), 0);
    }

    #[test]
    fn test_additive_writes() {
        let mut m = MnaMatrix::new(2);
        let h = m.element(n(1), n(2)).unwrap();
        m.add(h, 1.5);
        m.add(h, 2.0);
        m.add_complex(h, Complex64::new(0.0, 3.0));
        assert_eq!(m.get(n(1), n(2)), Complex64::new(3.5, 3.0));
        assert_eq!(m.get(n(2), n(1)), Complex64::zero());
    }

    #[test]
    fn test_same_pair_same_handle() {
        let mut m = MnaMatrix::new(3);
        let a = m.element(n(2), n(3)).unwrap();
        let b = m.element(n(2), n(3)).unwrap();
        assert_eq!(a, b);
        assert_eq!(m.num_elements(), 1);
    }

    #[test]
    fn test_capacity_limit_reports_out_of_memory() {
        let mut m = MnaMatrix::with_capacity_limit(3, 2);
        m.element(n(1), n(1)).unwrap();
        m.element(n(2), n(2)).unwrap();
        // Existing entries still resolve.
        assert!(m.element(n(1), n(1)).is_ok());
        match m.element(n(3), n(3)) {
            Err(Error::OutOfMemory {
                requested,
                capacity,
            }) => {
                assert_eq!(requested, 3);
                assert_eq!(capacity, 2);
            }
            other => panic!("expected OutOfMemory, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_node() {
        let mut m = MnaMatrix::new(2);
        assert!(matches!(
            m.element(n(3), n(1)),
            Err(Error::UnknownNode(3))
        ));
    }

    #[test]
    fn test_reorder_preserves_values() {
        let mut m = MnaMatrix::new(2);
        let a = m.element(n(1), n(2)).unwrap();
        let b = m.element(n(2), n(1)).unwrap();
        m.add(a, 1.0);
        m.add(b, 2.0);
        m.reorder();

        assert_eq!(m.get_real(n(1), n(2)), 1.0);
        assert_eq!(m.get_real(n(2), n(1)), 2.0);

        let a2 = m.element(n(1), n(2)).unwrap();
        m.add(a2, 1.0);
        assert_eq!(m.get_real(n(1), n(2)), 2.0);
        assert_eq!(m.num_elements(), 2);
    }

    #[test]
    fn test_dense_layout() {
        let mut m = MnaMatrix::new(2);
        let h = m.element(n(2), n(1)).unwrap();
        m.add(h, 4.0);
        let d = m.to_dense_real();
        assert_eq!(d[(1, 0)], 4.0);
        assert_eq!(d[(0, 1)], 0.0);
    }

    #[test]
    fn test_stamp_rhs_skips_ground() {
        let mut rhs = DVector::zeros(3);
        stamp_rhs(&mut rhs, NodeId::GROUND, 1.0);
        stamp_rhs(&mut rhs, n(2), 2.0);
        assert_eq!(rhs[0], 0.0);
        assert_eq!(rhs[2], 2.0);
    }
}
