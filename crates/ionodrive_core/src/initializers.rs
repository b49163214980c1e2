//! One-time initialization of the input subsystems.
//!
//! The order is fixed and the dependencies are carried by values: the
//! electric-field inputs feed the perpendicular-field conversion, that field
//! feeds the background drift, and the drift and atmosphere model feed the
//! neutral initializers.

use crate::collaborators::{StepContext, Subsystems};
use crate::error::{DriverError, DriverResult};
use ionodrive_data::{DriftField, FieldBuffers};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitStep {
    ElectricFieldInput,
    PerpendicularField,
    BackgroundDrift,
    PrecipitationInput,
    AtmosphereModel,
    NeutralBackground,
    NeutralPerturbations,
}

impl InitStep {
    pub const ORDER: [InitStep; 7] = [
        InitStep::ElectricFieldInput,
        InitStep::PerpendicularField,
        InitStep::BackgroundDrift,
        InitStep::PrecipitationInput,
        InitStep::AtmosphereModel,
        InitStep::NeutralBackground,
        InitStep::NeutralPerturbations,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            InitStep::ElectricFieldInput => "electric field input",
            InitStep::PerpendicularField => "perpendicular field conversion",
            InitStep::BackgroundDrift => "background drift",
            InitStep::PrecipitationInput => "precipitation input",
            InitStep::AtmosphereModel => "atmosphere model",
            InitStep::NeutralBackground => "neutral background",
            InitStep::NeutralPerturbations => "neutral perturbations",
        }
    }
}

/// What the rest of the run needs from initialization.
#[derive(Debug, Clone, PartialEq)]
pub struct InitializedInputs {
    pub drift: DriftField,
    /// Steps in the order they completed.
    pub completed: Vec<InitStep>,
}

fn step<T>(
    completed: &mut Vec<InitStep>,
    rank: usize,
    which: InitStep,
    call: impl FnOnce() -> anyhow::Result<T>,
) -> DriverResult<T> {
    let value = call().map_err(|source| DriverError::input(which.label(), source))?;
    completed.push(which);
    tracing::debug!(rank, step = which.label(), "Initialized");
    Ok(value)
}

/// Runs every initializer once, in [`InitStep::ORDER`].
pub fn initialize_inputs(
    ctx: &StepContext,
    rank: usize,
    subsystems: &mut Subsystems,
    buffers: &mut FieldBuffers,
) -> DriverResult<InitializedInputs> {
    let mut completed = Vec::with_capacity(InitStep::ORDER.len());
    let root = rank == 0;

    if root {
        tracing::info!("Initializing electric field input data...");
    }
    let efield = step(&mut completed, rank, InitStep::ElectricFieldInput, || {
        subsystems.efield.initialize(ctx)
    })?;
    let perp = step(&mut completed, rank, InitStep::PerpendicularField, || {
        subsystems.efield.potential_to_perp_field(&efield, buffers)
    })?;
    let drift = step(&mut completed, rank, InitStep::BackgroundDrift, || {
        subsystems.efield.background_drift(&perp)
    })?;

    if root {
        tracing::info!("Initializing precipitation input data...");
    }
    step(&mut completed, rank, InitStep::PrecipitationInput, || {
        subsystems.precipitation.initialize(ctx)
    })?;

    if root {
        tracing::info!("Initializing neutral background and input files...");
    }
    let model = step(&mut completed, rank, InitStep::AtmosphereModel, || {
        subsystems.neutrals.init_model(ctx)
    })?;
    step(&mut completed, rank, InitStep::NeutralBackground, || {
        subsystems.neutrals.init_background(ctx, &model, &drift)
    })?;
    step(&mut completed, rank, InitStep::NeutralPerturbations, || {
        subsystems.neutrals.init_perturbations(ctx, &model)
    })?;

    Ok(InitializedInputs { drift, completed })
}
