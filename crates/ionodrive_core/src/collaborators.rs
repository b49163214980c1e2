//! Seams between the driver and the subsystems it invokes.
//!
//! The driver never computes physics itself. It calls each collaborator at a
//! fixed point of the run, passes it exactly the state it needs, and treats any
//! error it returns as fatal.

use anyhow::Result;
use ionodrive_data::{
    BufferLayout, CalendarTime, DriftField, FieldBuffers, GridExtents, InitialConditions,
    LocalTopology, OutputMode,
};

/// Time and date handed to a collaborator call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepContext {
    pub it: u64,
    pub t: f64,
    pub dt: f64,
    pub time: CalendarTime,
}

/// Inputs to step-size selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepRequest {
    pub it: u64,
    pub t: f64,
    /// Step size of the previous iteration.
    pub previous_dt: f64,
    pub tcfl: f64,
    pub next_field_output: Option<f64>,
    pub next_aux_output: Option<f64>,
}

/// Step size proposed by this worker, before the group minimum is taken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepSelection {
    pub dt: f64,
}

/// Arguments of one fluid advance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluidStep {
    pub ctx: StepContext,
    /// True only on the bootstrap iteration.
    pub first: bool,
    pub species: usize,
    pub rank: usize,
}

/// What an output writer is asked to persist.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputRecord {
    pub it: u64,
    pub t: f64,
    pub time: CalendarTime,
    pub mode: OutputMode,
    pub rank: usize,
}

/// Electric-field input, ready for conversion to a perpendicular field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EfieldInputs {
    pub e2: f64,
    pub e3: f64,
    pub time: CalendarTime,
}

/// Perpendicular field written into the electrodynamic buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerpendicularField {
    pub e2: f64,
    pub e3: f64,
}

/// Handle to an initialized atmosphere model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtmosphereModel {
    /// Exospheric temperature, K.
    pub exospheric_temperature: f64,
    pub activ: [f64; 3],
}

/// Grid size query and grid input.
pub trait GridService: Send {
    fn full_grid_size(&mut self) -> Result<GridExtents>;
    fn read_grid(&mut self, topology: &LocalTopology) -> Result<()>;
    fn species_count(&self) -> usize;
}

/// Owns allocation of the three field buffers.
pub trait BufferAllocator: Send {
    fn allocate(&mut self, layout: BufferLayout) -> Result<FieldBuffers>;
    fn deallocate(&mut self, buffers: FieldBuffers);
}

/// Loads the starting plasma state and the run's start time.
pub trait InitialStateLoader: Send {
    fn load(
        &mut self,
        topology: &LocalTopology,
        buffers: &mut FieldBuffers,
    ) -> Result<InitialConditions>;
}

pub trait ElectricFieldInput: Send {
    fn initialize(&mut self, ctx: &StepContext) -> Result<EfieldInputs>;
    fn potential_to_perp_field(
        &mut self,
        inputs: &EfieldInputs,
        buffers: &mut FieldBuffers,
    ) -> Result<PerpendicularField>;
    /// Drift of the grid frame implied by the background field.
    fn background_drift(&mut self, field: &PerpendicularField) -> Result<DriftField>;
}

pub trait PrecipitationInput: Send {
    fn initialize(&mut self, ctx: &StepContext) -> Result<()>;
}

/// Neutral atmosphere model, background winds and perturbations.
pub trait NeutralAtmosphere: Send {
    fn init_model(&mut self, ctx: &StepContext) -> Result<AtmosphereModel>;
    fn init_background(
        &mut self,
        ctx: &StepContext,
        model: &AtmosphereModel,
        drift: &DriftField,
    ) -> Result<()>;
    fn init_perturbations(&mut self, ctx: &StepContext, model: &AtmosphereModel) -> Result<()>;
    /// Recomputes background winds for `time`.
    fn background_winds(&mut self, time: &CalendarTime) -> Result<()>;
    /// Moves the recomputed winds into the grid frame.
    fn apply_winds(&mut self, drift: &DriftField) -> Result<()>;
    fn perturb(&mut self, ctx: &StepContext, drift: &DriftField) -> Result<()>;
    fn clear_background(&mut self);
    fn clear_perturbations(&mut self);
}

pub trait StepSelector: Send {
    fn select(&mut self, request: &StepRequest, buffers: &FieldBuffers) -> Result<StepSelection>;
}

pub trait ElectrodynamicsSolver: Send {
    /// Drifts consistent with the initial potential, before the first step.
    fn initial_drifts(&mut self, buffers: &mut FieldBuffers) -> Result<()>;
    fn solve(&mut self, ctx: &StepContext, buffers: &mut FieldBuffers) -> Result<()>;
}

pub trait FluidSolver: Send {
    fn advance(&mut self, step: &FluidStep, buffers: &mut FieldBuffers) -> Result<()>;
}

pub trait OutputSink: Send {
    /// Called once after allocation, before any write.
    fn prepare(&mut self, topology: &LocalTopology) -> Result<()>;
    fn write_field(&mut self, record: &OutputRecord, buffers: &FieldBuffers) -> Result<()>;
    fn write_aux(&mut self, record: &OutputRecord, buffers: &FieldBuffers) -> Result<()>;
    fn write_milestone(&mut self, record: &OutputRecord, buffers: &FieldBuffers) -> Result<()>;
}

/// Every collaborator one worker needs.
pub struct Subsystems {
    pub grid: Box<dyn GridService>,
    pub allocator: Box<dyn BufferAllocator>,
    pub initial_state: Box<dyn InitialStateLoader>,
    pub efield: Box<dyn ElectricFieldInput>,
    pub precipitation: Box<dyn PrecipitationInput>,
    pub neutrals: Box<dyn NeutralAtmosphere>,
    pub selector: Box<dyn StepSelector>,
    pub electrodynamics: Box<dyn ElectrodynamicsSolver>,
    pub fluid: Box<dyn FluidSolver>,
    pub output: Box<dyn OutputSink>,
}
