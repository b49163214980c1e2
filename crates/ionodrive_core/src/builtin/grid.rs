//! Uniform grid described by the `[grid]` section.

use crate::collaborators::GridService;
use anyhow::{ensure, Result};
use ionodrive_data::{GridExtents, GridSettings, LocalTopology};

/// Cell-centre altitudes along x1, km.
#[must_use]
pub fn altitude_profile(settings: &GridSettings) -> Vec<f64> {
    let lx1 = settings.lx1.max(1);
    let spacing = (settings.alt_max_km - settings.alt_min_km) / lx1 as f64;
    (0..lx1)
        .map(|i| settings.alt_min_km + (i as f64 + 0.5) * spacing)
        .collect()
}

pub struct BuiltinGrid {
    settings: GridSettings,
    altitudes: Vec<f64>,
    topology: Option<LocalTopology>,
}

impl BuiltinGrid {
    #[must_use]
    pub fn new(settings: GridSettings) -> Self {
        Self {
            settings,
            altitudes: Vec::new(),
            topology: None,
        }
    }

    /// Altitudes of the local x1 cells; empty until the grid is read.
    #[must_use]
    pub fn altitudes(&self) -> &[f64] {
        &self.altitudes
    }

    #[must_use]
    pub fn topology(&self) -> Option<&LocalTopology> {
        self.topology.as_ref()
    }
}

impl GridService for BuiltinGrid {
    fn full_grid_size(&mut self) -> Result<GridExtents> {
        let s = &self.settings;
        ensure!(
            s.lx1 > 0 && s.lx2all > 0 && s.lx3all > 0,
            "grid extents must be positive, got {} x {} x {}",
            s.lx1,
            s.lx2all,
            s.lx3all
        );
        ensure!(
            s.alt_max_km > s.alt_min_km,
            "grid altitude range [{}, {}] km is empty",
            s.alt_min_km,
            s.alt_max_km
        );
        Ok(GridExtents::new(s.lx1, s.lx2all, s.lx3all))
    }

    fn read_grid(&mut self, topology: &LocalTopology) -> Result<()> {
        let s = &self.settings;
        let expected = GridExtents::new(s.lx1, s.lx2all, s.lx3all);
        ensure!(
            topology.global == expected,
            "topology was resolved for a different grid"
        );
        self.altitudes = altitude_profile(&self.settings);
        self.topology = Some(*topology);
        Ok(())
    }

    fn species_count(&self) -> usize {
        self.settings.lsp
    }
}
