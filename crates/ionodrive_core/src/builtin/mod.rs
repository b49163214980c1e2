//! Reference collaborators.
//!
//! Small, self-contained implementations of every collaborator seam so a
//! run can execute end to end from a configuration file alone.

pub mod grid;
pub mod inputs;
pub mod neutral;
pub mod solver;
pub mod state;

pub use grid::BuiltinGrid;
pub use inputs::{BuiltinElectricField, BuiltinPrecipitation};
pub use neutral::BuiltinNeutralAtmosphere;
pub use solver::{BuiltinElectrodynamics, BuiltinFluidSolver, BuiltinStepSelector};
pub use state::BuiltinInitialState;

use crate::collaborators::{OutputRecord, OutputSink, Subsystems};
use crate::store::HeapAllocator;
use ionodrive_data::{FieldBuffers, LocalTopology, SimulationConfig};

/// Output sink that only counts writes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NullOutput {
    pub fields: u64,
    pub aux: u64,
    pub milestones: u64,
}

impl OutputSink for NullOutput {
    fn prepare(&mut self, _topology: &LocalTopology) -> anyhow::Result<()> {
        Ok(())
    }

    fn write_field(&mut self, _record: &OutputRecord, _buffers: &FieldBuffers) -> anyhow::Result<()> {
        self.fields += 1;
        Ok(())
    }

    fn write_aux(&mut self, _record: &OutputRecord, _buffers: &FieldBuffers) -> anyhow::Result<()> {
        self.aux += 1;
        Ok(())
    }

    fn write_milestone(
        &mut self,
        _record: &OutputRecord,
        _buffers: &FieldBuffers,
    ) -> anyhow::Result<()> {
        self.milestones += 1;
        Ok(())
    }
}

impl Subsystems {
    /// Reference collaborators configured from `config`, writing through
    /// `output`.
    #[must_use]
    pub fn builtin(config: &SimulationConfig, output: Box<dyn OutputSink>) -> Self {
        Self {
            grid: Box::new(BuiltinGrid::new(config.grid.clone())),
            allocator: Box::new(HeapAllocator),
            initial_state: Box::new(BuiltinInitialState::new(
                config.base.clone(),
                config.grid.clone(),
                config.solver.seed,
            )),
            efield: Box::new(BuiltinElectricField::new(config.efield.clone())),
            precipitation: Box::new(BuiltinPrecipitation::new(config.precip.clone())),
            neutrals: Box::new(BuiltinNeutralAtmosphere::new(
                config.neutral.clone(),
                config.base.activ,
            )),
            selector: Box::new(BuiltinStepSelector::new(
                config.solver.clone(),
                &config.grid,
            )),
            electrodynamics: Box::new(BuiltinElectrodynamics::new(config.efield.clone())),
            fluid: Box::new(BuiltinFluidSolver::new()),
            output,
        }
    }
}
