//! Field buffers for one worker's subdomain.
//!
//! Each buffer is a single contiguous `Vec<f64>` laid out as
//! `[variable][species][cell]`, where cells include [`GHOST`] layers on each
//! side of every dimension and run fastest along x1.

use crate::topology::GridExtents;
use serde::{Deserialize, Serialize};

/// Ghost layers on each side of every dimension.
pub const GHOST: usize = 2;
/// Density, three velocity components, temperature.
pub const FLUID_VARS_PER_SPECIES: usize = 5;
/// Parallel momentum density and energy density.
pub const AUX_VARS_PER_SPECIES: usize = 2;
/// Perpendicular momentum (2), magnetic field (3), bulk velocity (3), mass density.
pub const AUX_SHARED_VARS: usize = 9;
/// E1, E2, E3, J1, J2, J3, potential.
pub const ELECTRO_VARS: usize = 7;

/// Per-species fluid variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FluidVar {
    Density,
    V1,
    V2,
    V3,
    Temperature,
}

impl FluidVar {
    pub const ALL: [FluidVar; FLUID_VARS_PER_SPECIES] = [
        FluidVar::Density,
        FluidVar::V1,
        FluidVar::V2,
        FluidVar::V3,
        FluidVar::Temperature,
    ];

    #[must_use]
    pub fn slot(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            FluidVar::Density => "ns",
            FluidVar::V1 => "vs1",
            FluidVar::V2 => "vs2",
            FluidVar::V3 => "vs3",
            FluidVar::Temperature => "Ts",
        }
    }
}

/// Electrodynamic variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElectroVar {
    E1,
    E2,
    E3,
    J1,
    J2,
    J3,
    Potential,
}

impl ElectroVar {
    pub const ALL: [ElectroVar; ELECTRO_VARS] = [
        ElectroVar::E1,
        ElectroVar::E2,
        ElectroVar::E3,
        ElectroVar::J1,
        ElectroVar::J2,
        ElectroVar::J3,
        ElectroVar::Potential,
    ];

    #[must_use]
    pub fn slot(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ElectroVar::E1 => "E1",
            ElectroVar::E2 => "E2",
            ElectroVar::E3 => "E3",
            ElectroVar::J1 => "J1",
            ElectroVar::J2 => "J2",
            ElectroVar::J3 => "J3",
            ElectroVar::Potential => "Phi",
        }
    }
}

/// Which of the three buffers.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Fluid,
    FluidAux,
    Electro,
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldKind::Fluid => "fluid",
            FieldKind::FluidAux => "fluid auxiliary",
            FieldKind::Electro => "electrodynamic",
        };
        f.write_str(name)
    }
}

/// Sizes of the local subdomain and species set.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLayout {
    pub local: GridExtents,
    pub lsp: usize,
}

impl BufferLayout {
    #[must_use]
    pub fn new(local: GridExtents, lsp: usize) -> Self {
        Self { local, lsp }
    }

    /// Cells in one block, ghost layers included.
    #[must_use]
    pub fn ghosted_cells(&self) -> usize {
        let GridExtents { lx1, lx2, lx3 } = self.local;
        (lx1 + 2 * GHOST) * (lx2 + 2 * GHOST) * (lx3 + 2 * GHOST)
    }

    /// Total length of the three buffers, or `None` if any size overflows.
    #[must_use]
    pub fn checked_total_len(&self) -> Option<usize> {
        let GridExtents { lx1, lx2, lx3 } = self.local;
        let ghosted = lx1
            .checked_add(2 * GHOST)?
            .checked_mul(lx2.checked_add(2 * GHOST)?)?
            .checked_mul(lx3.checked_add(2 * GHOST)?)?;
        let fluid = FLUID_VARS_PER_SPECIES
            .checked_mul(self.lsp)?
            .checked_mul(ghosted)?;
        let aux = AUX_VARS_PER_SPECIES
            .checked_mul(self.lsp)?
            .checked_add(AUX_SHARED_VARS)?
            .checked_mul(ghosted)?;
        let electro = ELECTRO_VARS.checked_mul(ghosted)?;
        fluid.checked_add(aux)?.checked_add(electro)
    }

    /// Interior cells in one block.
    #[must_use]
    pub fn interior_cells(&self) -> usize {
        self.local.cells()
    }

    #[must_use]
    pub fn fluid_len(&self) -> usize {
        FLUID_VARS_PER_SPECIES * self.lsp * self.ghosted_cells()
    }

    #[must_use]
    pub fn aux_len(&self) -> usize {
        (AUX_VARS_PER_SPECIES * self.lsp + AUX_SHARED_VARS) * self.ghosted_cells()
    }

    #[must_use]
    pub fn electro_len(&self) -> usize {
        ELECTRO_VARS * self.ghosted_cells()
    }

    /// Offset of a cell within a block; indices are ghosted (0 is the
    /// outermost ghost layer, `GHOST` the first interior cell).
    #[must_use]
    pub fn cell_index(&self, i1: usize, i2: usize, i3: usize) -> usize {
        let n1 = self.local.lx1 + 2 * GHOST;
        let n2 = self.local.lx2 + 2 * GHOST;
        i1 + n1 * (i2 + n2 * i3)
    }

    /// Block offsets of the interior cells, x1 fastest.
    pub fn interior_indices(&self) -> impl Iterator<Item = usize> + '_ {
        let GridExtents { lx1, lx2, lx3 } = self.local;
        (GHOST..GHOST + lx3).flat_map(move |i3| {
            (GHOST..GHOST + lx2).flat_map(move |i2| {
                (GHOST..GHOST + lx1).map(move |i1| self.cell_index(i1, i2, i3))
            })
        })
    }

    /// Start of a per-species fluid block.
    #[must_use]
    pub fn fluid_block(&self, var: FluidVar, species: usize) -> usize {
        (var.slot() * self.lsp + species) * self.ghosted_cells()
    }

    /// Start of an electrodynamic block.
    #[must_use]
    pub fn electro_block(&self, var: ElectroVar) -> usize {
        var.slot() * self.ghosted_cells()
    }
}

/// The fluid, auxiliary and electrodynamic buffers of one worker.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBuffers {
    layout: BufferLayout,
    fluid: Vec<f64>,
    fluid_aux: Vec<f64>,
    electro: Vec<f64>,
}

impl FieldBuffers {
    /// Zero-filled buffers sized for `layout`.
    #[must_use]
    pub fn zeroed(layout: BufferLayout) -> Self {
        Self {
            layout,
            fluid: vec![0.0; layout.fluid_len()],
            fluid_aux: vec![0.0; layout.aux_len()],
            electro: vec![0.0; layout.electro_len()],
        }
    }

    #[must_use]
    pub fn layout(&self) -> &BufferLayout {
        &self.layout
    }

    /// True when every buffer has the length its layout implies.
    #[must_use]
    pub fn matches_layout(&self) -> bool {
        self.fluid.len() == self.layout.fluid_len()
            && self.fluid_aux.len() == self.layout.aux_len()
            && self.electro.len() == self.layout.electro_len()
    }

    #[must_use]
    pub fn get(&self, kind: FieldKind) -> &[f64] {
        match kind {
            FieldKind::Fluid => &self.fluid,
            FieldKind::FluidAux => &self.fluid_aux,
            FieldKind::Electro => &self.electro,
        }
    }

    pub fn get_mut(&mut self, kind: FieldKind) -> &mut [f64] {
        match kind {
            FieldKind::Fluid => &mut self.fluid,
            FieldKind::FluidAux => &mut self.fluid_aux,
            FieldKind::Electro => &mut self.electro,
        }
    }

    #[must_use]
    pub fn fluid(&self) -> &[f64] {
        &self.fluid
    }

    pub fn fluid_mut(&mut self) -> &mut [f64] {
        &mut self.fluid
    }

    #[must_use]
    pub fn fluid_aux(&self) -> &[f64] {
        &self.fluid_aux
    }

    pub fn fluid_aux_mut(&mut self) -> &mut [f64] {
        &mut self.fluid_aux
    }

    #[must_use]
    pub fn electro(&self) -> &[f64] {
        &self.electro
    }

    pub fn electro_mut(&mut self) -> &mut [f64] {
        &mut self.electro
    }

    /// One species' block of a fluid variable.
    #[must_use]
    pub fn species(&self, var: FluidVar, species: usize) -> &[f64] {
        let start = self.layout.fluid_block(var, species);
        &self.fluid[start..start + self.layout.ghosted_cells()]
    }

    pub fn species_mut(&mut self, var: FluidVar, species: usize) -> &mut [f64] {
        let start = self.layout.fluid_block(var, species);
        let len = self.layout.ghosted_cells();
        &mut self.fluid[start..start + len]
    }

    #[must_use]
    pub fn electro_var(&self, var: ElectroVar) -> &[f64] {
        let start = self.layout.electro_block(var);
        &self.electro[start..start + self.layout.ghosted_cells()]
    }

    pub fn electro_var_mut(&mut self, var: ElectroVar) -> &mut [f64] {
        let start = self.layout.electro_block(var);
        let len = self.layout.ghosted_cells();
        &mut self.electro[start..start + len]
    }
}
