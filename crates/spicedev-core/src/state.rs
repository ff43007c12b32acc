//! Per-device state history.
//!
//! Devices keep terminal voltages, charges and charge currents in a flat
//! array of doubles owned by the simulator. Each device reserves a fixed
//! number of contiguous slots during setup and afterwards addresses them as
//! `base + offset`. The simulator keeps several generations of that array:
//! generation 0 is the iterate being computed, generation 1 the last
//! accepted timestep, and so on.

use nalgebra::DVector;

use crate::error::{Error, Result};

/// Hands out contiguous slot ranges during setup.
#[derive(Debug, Clone, Default)]
pub struct StateAllocator {
    next: usize,
}

impl StateAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `count` contiguous slots and return the base offset.
    pub fn reserve(&mut self, count: usize) -> usize {
        let base = self.next;
        self.next += count;
        base
    }

    /// Total number of slots reserved so far.
    pub fn len(&self) -> usize {
        self.next
    }

    pub fn is_empty(&self) -> bool {
        self.next == 0
    }

    /// Build a zeroed history holding `depth` generations of the reserved slots.
    pub fn into_history(self, depth: usize) -> StateHistory {
        StateHistory::new(self.next, depth)
    }
}

/// Several generations of the flat state array.
#[derive(Debug, Clone)]
pub struct StateHistory {
    generations: Vec<DVector<f64>>,
}

impl StateHistory {
    /// Minimum depth: current, previous, and the one before for prediction.
    pub const MIN_DEPTH: usize = 3;

    /// Create a zeroed history of `len` slots and `depth` generations.
    pub fn new(len: usize, depth: usize) -> Self {
        let depth = depth.max(Self::MIN_DEPTH);
        Self {
            generations: (0..depth).map(|_| DVector::zeros(len)).collect(),
        }
    }

    /// Number of slots per generation.
    pub fn len(&self) -> usize {
        self.generations[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of generations kept.
    pub fn depth(&self) -> usize {
        self.generations.len()
    }

    /// Read one slot of one generation.
    #[inline]
    pub fn get(&self, generation: usize, slot: usize) -> f64 {
        self.generations[generation][slot]
    }

    /// Write one slot of one generation.
    #[inline]
    pub fn set(&mut self, generation: usize, slot: usize, value: f64) {
        self.generations[generation][slot] = value;
    }

    /// Borrow `count` slots starting at `base` from one generation.
    pub fn slots(&self, generation: usize, base: usize, count: usize) -> Result<&[f64]> {
        let len = self.len();
        let end = base + count;
        if end > len {
            return Err(Error::StateOverflow { base, end, len });
        }
        Ok(&self.generations[generation].as_slice()[base..end])
    }

    /// Mutably borrow `count` slots starting at `base` from one generation.
    pub fn slots_mut(&mut self, generation: usize, base: usize, count: usize) -> Result<&mut [f64]> {
        let len = self.len();
        let end = base + count;
        if end > len {
            return Err(Error::StateOverflow { base, end, len });
        }
        Ok(&mut self.generations[generation].as_mut_slice()[base..end])
    }

    /// Advance one accepted timestep.
    ///
    /// Every generation moves one step older; the new generation 0 starts
    /// as a copy of the just-accepted values.
    pub fn rotate(&mut self) {
        self.generations.rotate_right(1);
        let (current, older) = self.generations.split_at_mut(1);
        current[0].copy_from(&older[0]);
    }

    /// Copy generation 0 into generation 1 (end of an operating point).
    pub fn commit_current(&mut self) {
        let (current, older) = self.generations.split_at_mut(1);
        older[0].copy_from(&current[0]);
    }
}
