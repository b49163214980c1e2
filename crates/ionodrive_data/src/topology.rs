//! Grid extents and the subdomain owned by one worker.

use serde::{Deserialize, Serialize};

/// Cell counts along the three grid dimensions.
///
/// `lx1` runs along the magnetic field and is never split across workers.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridExtents {
    pub lx1: usize,
    pub lx2: usize,
    pub lx3: usize,
}

impl GridExtents {
    #[must_use]
    pub fn new(lx1: usize, lx2: usize, lx3: usize) -> Self {
        Self { lx1, lx2, lx3 }
    }

    #[must_use]
    pub fn cells(&self) -> usize {
        self.lx1 * self.lx2 * self.lx3
    }

    /// Cell count, or `None` if it does not fit in `usize`.
    #[must_use]
    pub fn checked_cells(&self) -> Option<usize> {
        self.lx1.checked_mul(self.lx2)?.checked_mul(self.lx3)
    }
}

/// Workers along x2 and x3.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessGrid {
    pub lid2: usize,
    pub lid3: usize,
}

impl ProcessGrid {
    /// Worker count, or `None` if `lid2 * lid3` overflows.
    #[must_use]
    pub fn workers(&self) -> Option<usize> {
        self.lid2.checked_mul(self.lid3)
    }
}

/// Placement of one worker in the process grid.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTopology {
    pub rank: usize,
    pub workers: usize,
    pub process_grid: ProcessGrid,
    pub global: GridExtents,
    pub local: GridExtents,
    /// Position of this worker along x2 in the process grid.
    pub id2: usize,
    /// Position of this worker along x3 in the process grid.
    pub id3: usize,
    /// Global x2 index of the first local cell.
    pub offset2: usize,
    /// Global x3 index of the first local cell.
    pub offset3: usize,
}

impl LocalTopology {
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.rank == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workers_overflow_is_none() {
        let grid = ProcessGrid {
            lid2: usize::MAX / 2,
            lid3: 3,
        };
        assert_eq!(grid.workers(), None);
        assert_eq!(ProcessGrid { lid2: 2, lid3: 3 }.workers(), Some(6));
    }

    #[test]
    fn test_checked_cells() {
        assert_eq!(GridExtents::new(8, 4, 4).checked_cells(), Some(128));
        assert_eq!(GridExtents::new(usize::MAX, 2, 1).checked_cells(), None);
    }
}
