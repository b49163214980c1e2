//! Chapman-layer initial state.
//!
//! Ion densities follow a Chapman profile split across species by fixed
//! weights, with a small seeded noise term so every worker's state is
//! reproducible. Electrons carry the summed ion density.

use super::grid::altitude_profile;
use crate::collaborators::InitialStateLoader;
use anyhow::{ensure, Result};
use ionodrive_data::buffers::GHOST;
use ionodrive_data::{
    BaseConfig, CalendarTime, FieldBuffers, FluidVar, GridSettings, InitialConditions,
    LocalTopology,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const PEAK_ALTITUDE_KM: f64 = 300.0;
const SCALE_HEIGHT_KM: f64 = 50.0;
/// Peak electron density, m^-3.
const PEAK_DENSITY: f64 = 1.0e12;
const DENSITY_FLOOR: f64 = 1.0e6;
const NOISE: f64 = 0.01;
const BASE_TEMPERATURE: f64 = 200.0;
const TOP_TEMPERATURE: f64 = 1500.0;
const TEMPERATURE_SCALE_KM: f64 = 100.0;

#[must_use]
pub fn chapman_density(z_km: f64) -> f64 {
    let y = (z_km - PEAK_ALTITUDE_KM) / SCALE_HEIGHT_KM;
    PEAK_DENSITY * (0.5 * (1.0 - y - (-y).exp())).exp()
}

#[must_use]
pub fn plasma_temperature(z_km: f64) -> f64 {
    let rise = (z_km - 80.0).max(0.0) / TEMPERATURE_SCALE_KM;
    TOP_TEMPERATURE - (TOP_TEMPERATURE - BASE_TEMPERATURE) * (-rise).exp()
}

pub struct BuiltinInitialState {
    base: BaseConfig,
    grid: GridSettings,
    seed: u64,
}

impl BuiltinInitialState {
    #[must_use]
    pub fn new(base: BaseConfig, grid: GridSettings, seed: u64) -> Self {
        Self { base, grid, seed }
    }
}

impl InitialStateLoader for BuiltinInitialState {
    fn load(
        &mut self,
        topology: &LocalTopology,
        buffers: &mut FieldBuffers,
    ) -> Result<InitialConditions> {
        let layout = *buffers.layout();
        ensure!(
            layout.local == topology.local,
            "buffers sized for {:?}, subdomain is {:?}",
            layout.local,
            topology.local
        );
        ensure!(
            layout.lsp >= 2,
            "need at least one ion species plus electrons, got {}",
            layout.lsp
        );

        let altitudes = altitude_profile(&self.grid);
        ensure!(
            altitudes.len() == layout.local.lx1,
            "altitude profile has {} cells, subdomain has {}",
            altitudes.len(),
            layout.local.lx1
        );
        let lx1 = layout.local.lx1;
        let n1 = lx1 + 2 * GHOST;
        let altitude_at = |idx: usize| altitudes[(idx % n1).saturating_sub(GHOST).min(lx1 - 1)];

        let ions = layout.lsp - 1;
        let electrons = layout.lsp - 1;
        let weights: Vec<f64> = (0..ions).map(|s| 0.5_f64.powi(s as i32)).collect();
        let total: f64 = weights.iter().sum();

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(topology.rank as u64));
        let mut electron_density = vec![0.0; layout.ghosted_cells()];

        for (species, weight) in weights.iter().enumerate() {
            let fraction = weight / total;
            let density = buffers.species_mut(FluidVar::Density, species);
            for (idx, n) in density.iter_mut().enumerate() {
                let noise = 1.0 + NOISE * rng.gen_range(-1.0..1.0);
                *n = (chapman_density(altitude_at(idx)) * fraction * noise).max(DENSITY_FLOOR);
                electron_density[idx] += *n;
            }
        }
        buffers
            .species_mut(FluidVar::Density, electrons)
            .copy_from_slice(&electron_density);

        for species in 0..layout.lsp {
            for var in [FluidVar::V1, FluidVar::V2, FluidVar::V3] {
                buffers.species_mut(var, species).fill(0.0);
            }
            for (idx, temp) in buffers
                .species_mut(FluidVar::Temperature, species)
                .iter_mut()
                .enumerate()
            {
                *temp = plasma_temperature(altitude_at(idx));
            }
        }
        buffers.fluid_aux_mut().fill(0.0);
        buffers.electro_mut().fill(0.0);

        let time = CalendarTime::from_ymd(self.base.ymd, self.base.ut_sec0)?;
        Ok(InitialConditions {
            time,
            tdur: self.base.tdur,
        })
    }
}
