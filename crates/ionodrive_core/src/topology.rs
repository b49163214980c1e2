//! Process-grid resolution and per-worker subdomains.
//!
//! x1 is never decomposed. x2 and x3 are split into `lid2 x lid3` equal
//! blocks; a split is only accepted when it divides the global extents
//! exactly, so the subdomains tile the grid with no gaps and no overlap.

use crate::error::{DriverError, DriverResult};
use ionodrive_data::{GridExtents, LocalTopology, ManualGrid, ProcessGrid};

/// Chooses a process grid when none was forced on the command line.
pub trait ProcessGridPlanner: Send + Sync {
    fn plan(&self, global: GridExtents, workers: usize) -> DriverResult<ProcessGrid>;
}

/// Picks the exact split whose subdomains are closest to square in x2/x3,
/// preferring more workers along x3 on ties.
#[derive(Debug, Default, Clone, Copy)]
pub struct BalancedPlanner;

impl ProcessGridPlanner for BalancedPlanner {
    fn plan(&self, global: GridExtents, workers: usize) -> DriverResult<ProcessGrid> {
        if workers == 0 {
            return Err(DriverError::topology("process grid needs at least one worker"));
        }

        let mut best: Option<(f64, ProcessGrid)> = None;
        for lid2 in (1..=workers).filter(|d| workers % d == 0) {
            let grid = ProcessGrid {
                lid2,
                lid3: workers / lid2,
            };
            if !divides(global, grid) {
                continue;
            }
            let aspect = ((global.lx2 / grid.lid2) as f64 / (global.lx3 / grid.lid3) as f64)
                .ln()
                .abs();
            let better = match best {
                None => true,
                Some((score, current)) => {
                    aspect < score - 1e-12
                        || ((aspect - score).abs() <= 1e-12 && grid.lid3 > current.lid3)
                }
            };
            if better {
                best = Some((aspect, grid));
            }
        }

        best.map(|(_, grid)| grid).ok_or_else(|| {
            DriverError::topology(format!(
                "no process grid of {workers} workers divides x2 = {} and x3 = {}",
                global.lx2, global.lx3
            ))
        })
    }
}

fn divides(global: GridExtents, grid: ProcessGrid) -> bool {
    grid.lid2 > 0
        && grid.lid3 > 0
        && global.lx2 % grid.lid2 == 0
        && global.lx3 % grid.lid3 == 0
}

/// Resolves the subdomain owned by `rank`.
///
/// A manual override is used verbatim and must satisfy
/// `lid2 * lid3 == workers`.
pub fn resolve(
    global: GridExtents,
    manual: Option<ManualGrid>,
    workers: usize,
    rank: usize,
    planner: &dyn ProcessGridPlanner,
) -> DriverResult<LocalTopology> {
    if global.lx1 == 0 || global.lx2 == 0 || global.lx3 == 0 {
        return Err(DriverError::topology(format!(
            "grid extents must be positive, got {} x {} x {}",
            global.lx1, global.lx2, global.lx3
        )));
    }
    if global.checked_cells().is_none() {
        return Err(DriverError::topology(format!(
            "grid extents {} x {} x {} are too large",
            global.lx1, global.lx2, global.lx3
        )));
    }
    if rank >= workers {
        return Err(DriverError::topology(format!(
            "rank {rank} outside a group of {workers} workers"
        )));
    }

    let process_grid = match manual {
        Some(manual) => {
            let grid = ProcessGrid {
                lid2: manual.lid2,
                lid3: manual.lid3,
            };
            if grid.workers() != Some(workers) {
                return Err(DriverError::topology(format!(
                    "manual process grid {} x {} does not match {workers} workers",
                    grid.lid2, grid.lid3
                )));
            }
            if !divides(global, grid) {
                return Err(DriverError::topology(format!(
                    "manual process grid {} x {} does not divide x2 = {} and x3 = {}",
                    grid.lid2, grid.lid3, global.lx2, global.lx3
                )));
            }
            grid
        }
        None => planner.plan(global, workers)?,
    };

    Ok(place(global, process_grid, workers, rank))
}

/// Subdomains of every rank, in rank order.
pub fn decompose_all(
    global: GridExtents,
    process_grid: ProcessGrid,
) -> DriverResult<Vec<LocalTopology>> {
    if !divides(global, process_grid) {
        return Err(DriverError::topology(format!(
            "process grid {} x {} does not divide x2 = {} and x3 = {}",
            process_grid.lid2, process_grid.lid3, global.lx2, global.lx3
        )));
    }
    let workers = process_grid.workers().ok_or_else(|| {
        DriverError::topology(format!(
            "process grid {} x {} is too large",
            process_grid.lid2, process_grid.lid3
        ))
    })?;
    Ok((0..workers)
        .map(|rank| place(global, process_grid, workers, rank))
        .collect())
}

fn place(
    global: GridExtents,
    process_grid: ProcessGrid,
    workers: usize,
    rank: usize,
) -> LocalTopology {
    let local = GridExtents::new(
        global.lx1,
        global.lx2 / process_grid.lid2,
        global.lx3 / process_grid.lid3,
    );
    let id2 = rank % process_grid.lid2;
    let id3 = rank / process_grid.lid2;
    LocalTopology {
        rank,
        workers,
        process_grid,
        global,
        local,
        id2,
        id3,
        offset2: id2 * local.lx2,
        offset3: id3 * local.lx3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global() -> GridExtents {
        GridExtents::new(64, 32, 32)
    }

    #[test]
    fn test_manual_grid_matching_workers_accepted() {
        let topo = resolve(
            global(),
            Some(ManualGrid { lid2: 2, lid3: 2 }),
            4,
            3,
            &BalancedPlanner,
        )
        .unwrap();
        assert_eq!(topo.process_grid, ProcessGrid { lid2: 2, lid3: 2 });
        assert_eq!(topo.local, GridExtents::new(64, 16, 16));
        assert_eq!((topo.id2, topo.id3), (1, 1));
        assert_eq!((topo.offset2, topo.offset3), (16, 16));
    }

    #[test]
    fn test_manual_grid_wrong_product_rejected() {
        let err = resolve(
            global(),
            Some(ManualGrid { lid2: 3, lid3: 2 }),
            4,
            0,
            &BalancedPlanner,
        )
        .unwrap_err();
        assert!(matches!(err, DriverError::Topology(_)));
    }

    #[test]
    fn test_manual_grid_must_divide_extents() {
        let err = resolve(
            GridExtents::new(8, 10, 8),
            Some(ManualGrid { lid2: 4, lid3: 1 }),
            4,
            0,
            &BalancedPlanner,
        )
        .unwrap_err();
        assert!(matches!(err, DriverError::Topology(_)));
    }

    #[test]
    fn test_manual_grid_overflowing_product_rejected() {
        let err = resolve(
            GridExtents::new(8, 4, 4),
            Some(ManualGrid {
                lid2: 1 << 32,
                lid3: 1 << 32,
            }),
            4,
            0,
            &BalancedPlanner,
        )
        .unwrap_err();
        assert!(matches!(err, DriverError::Topology(_)));
        assert!(err.is_startup());
    }

    #[test]
    fn test_oversized_extents_rejected() {
        let err = resolve(
            GridExtents::new(usize::MAX, 2, 2),
            None,
            1,
            0,
            &BalancedPlanner,
        )
        .unwrap_err();
        assert!(matches!(err, DriverError::Topology(_)));
    }

    #[test]
    fn test_planner_prefers_square_subdomains() {
        let grid = BalancedPlanner.plan(global(), 4).unwrap();
        assert_eq!(grid, ProcessGrid { lid2: 2, lid3: 2 });
    }

    #[test]
    fn test_planner_two_dimensional_run() {
        let grid = BalancedPlanner.plan(GridExtents::new(64, 48, 1), 8).unwrap();
        assert_eq!(grid, ProcessGrid { lid2: 8, lid3: 1 });
    }

    #[test]
    fn test_planner_no_exact_split() {
        let err = BalancedPlanner.plan(GridExtents::new(8, 7, 7), 4).unwrap_err();
        assert!(matches!(err, DriverError::Topology(_)));
    }

    #[test]
    fn test_single_worker_owns_everything() {
        let topo = resolve(global(), None, 1, 0, &BalancedPlanner).unwrap();
        assert_eq!(topo.local, global());
        assert!(topo.is_root());
    }

    #[test]
    fn test_rank_out_of_range() {
        assert!(resolve(global(), None, 2, 2, &BalancedPlanner).is_err());
    }

    #[test]
    fn test_decompose_all_tiles_grid() {
        let parts = decompose_all(global(), ProcessGrid { lid2: 4, lid3: 2 }).unwrap();
        let cells: usize = parts.iter().map(|p| p.local.cells()).sum();
        assert_eq!(cells, global().cells());
    }
}
