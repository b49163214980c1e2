//! Step selection, electrodynamics and fluid advance for the reference run.
//!
//! These keep the state finite and evolving so the control loop has
//! something to drive. They are not transport or potential solvers.

use crate::collaborators::{
    ElectrodynamicsSolver, FluidSolver, FluidStep, StepContext, StepRequest, StepSelection,
    StepSelector,
};
use anyhow::{anyhow, ensure, Result};
use ionodrive_data::clock::SECONDS_PER_DAY;
use ionodrive_data::{
    EfieldSettings, ElectroVar, FieldBuffers, FluidVar, GridSettings, SolverSettings,
};
use rayon::prelude::*;
use std::f64::consts::TAU;

const BOLTZMANN: f64 = 1.380_649e-23;
/// Mass of atomic oxygen, kg.
const OXYGEN_MASS: f64 = 2.656e-26;
/// Minimum distance from the next output time worth landing on, s.
const LANDING_SLACK: f64 = 1.0e-6;
/// Pedersen conductivity per unit electron density, S m^2.
const PEDERSEN_PER_DENSITY: f64 = 1.0e-16;
/// e-folding time of the density relaxation, s.
const RELAXATION_TIME: f64 = 600.0;
/// Day/night density contrast of the relaxation target.
const DIURNAL_CONTRAST: f64 = 0.2;

fn max_abs(values: &[f64]) -> f64 {
    values.par_iter().map(|v| v.abs()).reduce(|| 0.0, f64::max)
}

/// CFL step selection with landing on output times.
pub struct BuiltinStepSelector {
    settings: SolverSettings,
    dx_min: f64,
}

impl BuiltinStepSelector {
    #[must_use]
    pub fn new(settings: SolverSettings, grid: &GridSettings) -> Self {
        Self {
            settings,
            dx_min: grid.dx2_m.min(grid.dx3_m),
        }
    }

    fn max_speed(&self, buffers: &FieldBuffers) -> f64 {
        (0..buffers.layout().lsp)
            .map(|species| {
                let drift = max_abs(buffers.species(FluidVar::V2, species))
                    .max(max_abs(buffers.species(FluidVar::V3, species)));
                let temperature = max_abs(buffers.species(FluidVar::Temperature, species));
                drift + (BOLTZMANN * temperature / OXYGEN_MASS).sqrt()
            })
            .fold(0.0, f64::max)
    }
}

impl StepSelector for BuiltinStepSelector {
    fn select(&mut self, request: &StepRequest, buffers: &FieldBuffers) -> Result<StepSelection> {
        let SolverSettings { dtmin, dtmax, .. } = self.settings;
        ensure!(
            dtmin > 0.0 && dtmax >= dtmin,
            "step bounds [{dtmin}, {dtmax}] are not usable"
        );

        let vmax = self.max_speed(buffers);
        let cfl_dt = request.tcfl * self.dx_min / vmax;
        let mut dt = if cfl_dt.is_finite() { cfl_dt } else { dtmax };
        dt = dt.max(dtmin).min(dtmax);

        if request.it > 1 {
            for next in [request.next_field_output, request.next_aux_output]
                .into_iter()
                .flatten()
            {
                if request.t + dt > next && next - request.t > LANDING_SLACK {
                    dt = next - request.t;
                }
            }
        }

        Ok(StepSelection { dt })
    }
}

/// Uniform-field electrodynamics: Pedersen current and E x B drifts.
pub struct BuiltinElectrodynamics {
    efield: EfieldSettings,
}

impl BuiltinElectrodynamics {
    #[must_use]
    pub fn new(efield: EfieldSettings) -> Self {
        Self { efield }
    }

    fn exb_drifts(&self, buffers: &mut FieldBuffers) -> Result<()> {
        ensure!(self.efield.b0 > 0.0, "magnetic field magnitude must be positive");
        let b0 = self.efield.b0;
        let e2 = buffers.electro_var(ElectroVar::E2).to_vec();
        let e3 = buffers.electro_var(ElectroVar::E3).to_vec();
        for species in 0..buffers.layout().lsp {
            buffers
                .species_mut(FluidVar::V2, species)
                .par_iter_mut()
                .zip(e3.par_iter())
                .for_each(|(v, e)| *v = e / b0);
            buffers
                .species_mut(FluidVar::V3, species)
                .par_iter_mut()
                .zip(e2.par_iter())
                .for_each(|(v, e)| *v = -e / b0);
        }
        Ok(())
    }
}

impl ElectrodynamicsSolver for BuiltinElectrodynamics {
    fn initial_drifts(&mut self, buffers: &mut FieldBuffers) -> Result<()> {
        self.exb_drifts(buffers)
    }

    fn solve(&mut self, _ctx: &StepContext, buffers: &mut FieldBuffers) -> Result<()> {
        let electrons = buffers.layout().lsp - 1;
        let density = buffers.species(FluidVar::Density, electrons).to_vec();

        buffers.electro_var_mut(ElectroVar::E2).fill(self.efield.e2_bg);
        buffers.electro_var_mut(ElectroVar::E3).fill(self.efield.e3_bg);
        buffers.electro_var_mut(ElectroVar::E1).fill(0.0);
        buffers.electro_var_mut(ElectroVar::J1).fill(0.0);

        for (var, field) in [
            (ElectroVar::J2, self.efield.e2_bg),
            (ElectroVar::J3, self.efield.e3_bg),
        ] {
            buffers
                .electro_var_mut(var)
                .par_iter_mut()
                .zip(density.par_iter())
                .for_each(|(j, n)| *j = PEDERSEN_PER_DENSITY * n * field);
        }

        self.exb_drifts(buffers)
    }
}

/// Relaxes densities toward a diurnally modulated copy of the first state.
#[derive(Default)]
pub struct BuiltinFluidSolver {
    reference: Option<Vec<f64>>,
}

impl BuiltinFluidSolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn has_reference(&self) -> bool {
        self.reference.is_some()
    }
}

impl FluidSolver for BuiltinFluidSolver {
    fn advance(&mut self, step: &FluidStep, buffers: &mut FieldBuffers) -> Result<()> {
        let layout = *buffers.layout();
        ensure!(
            step.species == layout.lsp,
            "asked to advance {} species, buffers hold {}",
            step.species,
            layout.lsp
        );
        if step.first || self.reference.is_none() {
            self.reference = Some(buffers.fluid().to_vec());
        }
        let reference = self
            .reference
            .as_deref()
            .ok_or_else(|| anyhow!("fluid reference state missing"))?;
        ensure!(
            reference.len() == layout.fluid_len(),
            "fluid reference state has the wrong size"
        );

        let cells = layout.ghosted_cells();
        let lsp = layout.lsp;
        let decay = (-step.ctx.dt / RELAXATION_TIME).exp();
        let phase = TAU * step.ctx.time.ut_sec() / SECONDS_PER_DAY;
        let target_scale = 1.0 + DIURNAL_CONTRAST * phase.cos();

        buffers
            .fluid_mut()
            .par_chunks_mut(cells)
            .zip(reference.par_chunks(cells))
            .enumerate()
            .for_each(|(block, (current, initial))| {
                let slot = block / lsp;
                if slot == FluidVar::Density.slot() {
                    for (n, n0) in current.iter_mut().zip(initial) {
                        let target = n0 * target_scale;
                        *n = target + (*n - target) * decay;
                    }
                } else if slot == FluidVar::Temperature.slot() {
                    for (temp, temp0) in current.iter_mut().zip(initial) {
                        *temp = temp0 + (*temp - temp0) * decay;
                    }
                } else if slot == FluidVar::V1.slot() {
                    current.iter_mut().for_each(|v| *v *= decay);
                }
            });

        let electrons = lsp - 1;
        let mut electron_density = vec![0.0; cells];
        for species in 0..electrons {
            for (sum, n) in electron_density
                .iter_mut()
                .zip(buffers.species(FluidVar::Density, species))
            {
                *sum += n;
            }
        }
        buffers
            .species_mut(FluidVar::Density, electrons)
            .copy_from_slice(&electron_density);

        Ok(())
    }
}
