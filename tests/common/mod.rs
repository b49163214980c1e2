use anyhow::{bail, Result};
use ionodrive_core::collaborators::{
    AtmosphereModel, BufferAllocator, EfieldInputs, ElectricFieldInput, ElectrodynamicsSolver,
    FluidSolver, FluidStep, GridService, InitialStateLoader, NeutralAtmosphere, OutputRecord,
    OutputSink, PerpendicularField, PrecipitationInput, StepContext, StepRequest, StepSelection,
    StepSelector,
};
use ionodrive_core::{
    run_worker, Communicator, DriverResult, RunSummary, SerialComm, Subsystems,
};
use ionodrive_data::{
    BaseConfig, BufferLayout, CalendarTime, DriftField, FieldBuffers, GridExtents,
    InitialConditions, LaunchOptions, LocalTopology, ManualGrid, SimulationConfig,
};
use std::sync::{Arc, Mutex};

/// One collaborator call, as seen by the recording mocks.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FullGridSize,
    ReadGrid,
    Allocate,
    Deallocate,
    Prepare,
    LoadInitial,
    EfieldInit,
    PerpField,
    BackgroundDrift,
    PrecipInit,
    InitModel,
    InitBackground,
    InitPerturbations,
    InitialDrifts,
    Select { it: u64, t: f64, previous_dt: f64 },
    BackgroundWinds,
    ApplyWinds,
    Perturb { it: u64 },
    Solve { it: u64 },
    Advance { it: u64, first: bool },
    WriteField { it: u64, t: f64 },
    WriteAux { it: u64, t: f64 },
    WriteMilestone { it: u64, t: f64 },
    ClearBackground,
    ClearPerturbations,
    Barrier,
}

/// Where an injected failure happens.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Failure {
    GridSize,
    ReadGrid,
    Allocate,
    Prepare,
    LoadInitial,
    PrecipInit,
    InitialDrifts,
    Select { it: u64 },
    Perturb { it: u64 },
    Solve { it: u64 },
    WriteField,
}

#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

#[allow(dead_code)]
impl CallLog {
    pub fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().into_iter().filter(|c| pred(c)).count()
    }

    pub fn contains(&self, call: &Call) -> bool {
        self.calls().contains(call)
    }

    pub fn position(&self, call: &Call) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    pub fn field_writes(&self) -> Vec<(u64, f64)> {
        self.calls()
            .iter()
            .filter_map(|c| match c {
                Call::WriteField { it, t } => Some((*it, *t)),
                _ => None,
            })
            .collect()
    }
}

/// Behaviour of the recording mocks.
#[derive(Debug, Clone)]
pub struct MockPlan {
    pub global: GridExtents,
    pub lsp: usize,
    pub dt: f64,
    pub tdur: f64,
    pub start: [i32; 3],
    pub ut_sec0: f64,
    pub failure: Option<Failure>,
    /// Iteration whose fluid advance writes a NaN.
    pub nan_at: Option<u64>,
}

impl Default for MockPlan {
    fn default() -> Self {
        Self {
            global: GridExtents::new(8, 4, 4),
            lsp: 3,
            dt: 10.0,
            tdur: 60.0,
            start: [2023, 5, 1],
            ut_sec0: 36_000.0,
            failure: None,
            nan_at: None,
        }
    }
}

impl MockPlan {
    fn fails(&self, failure: Failure) -> bool {
        self.failure == Some(failure)
    }
}

struct Mock {
    plan: MockPlan,
    log: CallLog,
}

impl Mock {
    fn boxed(plan: &MockPlan, log: &CallLog) -> Box<Self> {
        Box::new(Self {
            plan: plan.clone(),
            log: log.clone(),
        })
    }

    fn record(&self, call: Call) {
        self.log.push(call);
    }
}

impl GridService for Mock {
    fn full_grid_size(&mut self) -> Result<GridExtents> {
        self.record(Call::FullGridSize);
        if self.plan.fails(Failure::GridSize) {
            bail!("grid file missing");
        }
        Ok(self.plan.global)
    }

    fn read_grid(&mut self, _topology: &LocalTopology) -> Result<()> {
        self.record(Call::ReadGrid);
        if self.plan.fails(Failure::ReadGrid) {
            bail!("grid file truncated");
        }
        Ok(())
    }

    fn species_count(&self) -> usize {
        self.plan.lsp
    }
}

impl BufferAllocator for Mock {
    fn allocate(&mut self, layout: BufferLayout) -> Result<FieldBuffers> {
        self.record(Call::Allocate);
        if self.plan.fails(Failure::Allocate) {
            bail!("out of memory");
        }
        Ok(FieldBuffers::zeroed(layout))
    }

    fn deallocate(&mut self, buffers: FieldBuffers) {
        self.record(Call::Deallocate);
        drop(buffers);
    }
}

impl InitialStateLoader for Mock {
    fn load(
        &mut self,
        _topology: &LocalTopology,
        _buffers: &mut FieldBuffers,
    ) -> Result<InitialConditions> {
        self.record(Call::LoadInitial);
        if self.plan.fails(Failure::LoadInitial) {
            bail!("initial condition file unreadable");
        }
        Ok(InitialConditions {
            time: CalendarTime::from_ymd(self.plan.start, self.plan.ut_sec0)?,
            tdur: self.plan.tdur,
        })
    }
}

impl ElectricFieldInput for Mock {
    fn initialize(&mut self, ctx: &StepContext) -> Result<EfieldInputs> {
        self.record(Call::EfieldInit);
        Ok(EfieldInputs {
            e2: 0.0,
            e3: 0.0,
            time: ctx.time,
        })
    }

    fn potential_to_perp_field(
        &mut self,
        inputs: &EfieldInputs,
        _buffers: &mut FieldBuffers,
    ) -> Result<PerpendicularField> {
        self.record(Call::PerpField);
        Ok(PerpendicularField {
            e2: inputs.e2,
            e3: inputs.e3,
        })
    }

    fn background_drift(&mut self, _field: &PerpendicularField) -> Result<DriftField> {
        self.record(Call::BackgroundDrift);
        Ok(DriftField::default())
    }
}

impl PrecipitationInput for Mock {
    fn initialize(&mut self, _ctx: &StepContext) -> Result<()> {
        self.record(Call::PrecipInit);
        if self.plan.fails(Failure::PrecipInit) {
            bail!("precipitation files missing");
        }
        Ok(())
    }
}

impl NeutralAtmosphere for Mock {
    fn init_model(&mut self, _ctx: &StepContext) -> Result<AtmosphereModel> {
        self.record(Call::InitModel);
        Ok(AtmosphereModel {
            exospheric_temperature: 1000.0,
            activ: BaseConfig::DEFAULT_ACTIV,
        })
    }

    fn init_background(
        &mut self,
        _ctx: &StepContext,
        _model: &AtmosphereModel,
        _drift: &DriftField,
    ) -> Result<()> {
        self.record(Call::InitBackground);
        Ok(())
    }

    fn init_perturbations(&mut self, _ctx: &StepContext, _model: &AtmosphereModel) -> Result<()> {
        self.record(Call::InitPerturbations);
        Ok(())
    }

    fn background_winds(&mut self, _time: &CalendarTime) -> Result<()> {
        self.record(Call::BackgroundWinds);
        Ok(())
    }

    fn apply_winds(&mut self, _drift: &DriftField) -> Result<()> {
        self.record(Call::ApplyWinds);
        Ok(())
    }

    fn perturb(&mut self, ctx: &StepContext, _drift: &DriftField) -> Result<()> {
        self.record(Call::Perturb { it: ctx.it });
        if self.plan.fails(Failure::Perturb { it: ctx.it }) {
            bail!("perturbation grid does not cover the domain");
        }
        Ok(())
    }

    fn clear_background(&mut self) {
        self.record(Call::ClearBackground);
    }

    fn clear_perturbations(&mut self) {
        self.record(Call::ClearPerturbations);
    }
}

impl StepSelector for Mock {
    fn select(&mut self, request: &StepRequest, _buffers: &FieldBuffers) -> Result<StepSelection> {
        self.record(Call::Select {
            it: request.it,
            t: request.t,
            previous_dt: request.previous_dt,
        });
        if self.plan.fails(Failure::Select { it: request.it }) {
            return Ok(StepSelection { dt: 0.0 });
        }
        Ok(StepSelection { dt: self.plan.dt })
    }
}

impl ElectrodynamicsSolver for Mock {
    fn initial_drifts(&mut self, _buffers: &mut FieldBuffers) -> Result<()> {
        self.record(Call::InitialDrifts);
        if self.plan.fails(Failure::InitialDrifts) {
            bail!("potential solve did not converge");
        }
        Ok(())
    }

    fn solve(&mut self, ctx: &StepContext, _buffers: &mut FieldBuffers) -> Result<()> {
        self.record(Call::Solve { it: ctx.it });
        if self.plan.fails(Failure::Solve { it: ctx.it }) {
            bail!("potential solve did not converge");
        }
        Ok(())
    }
}

impl FluidSolver for Mock {
    fn advance(&mut self, step: &FluidStep, buffers: &mut FieldBuffers) -> Result<()> {
        self.record(Call::Advance {
            it: step.ctx.it,
            first: step.first,
        });
        if self.plan.nan_at == Some(step.ctx.it) {
            let layout = *buffers.layout();
            let cell = layout.interior_indices().next().unwrap_or(0);
            buffers.fluid_mut()[cell] = f64::NAN;
        }
        Ok(())
    }
}

impl OutputSink for Mock {
    fn prepare(&mut self, _topology: &LocalTopology) -> Result<()> {
        self.record(Call::Prepare);
        if self.plan.fails(Failure::Prepare) {
            bail!("output directory is read-only");
        }
        Ok(())
    }

    fn write_field(&mut self, record: &OutputRecord, _buffers: &FieldBuffers) -> Result<()> {
        self.record(Call::WriteField {
            it: record.it,
            t: record.t,
        });
        if self.plan.fails(Failure::WriteField) {
            bail!("disk full");
        }
        Ok(())
    }

    fn write_aux(&mut self, record: &OutputRecord, _buffers: &FieldBuffers) -> Result<()> {
        self.record(Call::WriteAux {
            it: record.it,
            t: record.t,
        });
        Ok(())
    }

    fn write_milestone(&mut self, record: &OutputRecord, _buffers: &FieldBuffers) -> Result<()> {
        self.record(Call::WriteMilestone {
            it: record.it,
            t: record.t,
        });
        Ok(())
    }
}

/// A group of one that records barriers.
pub struct RecordingComm {
    inner: SerialComm,
    log: CallLog,
}

impl RecordingComm {
    pub fn new(log: &CallLog) -> Self {
        Self {
            inner: SerialComm,
            log: log.clone(),
        }
    }
}

impl Communicator for RecordingComm {
    fn rank(&self) -> usize {
        self.inner.rank()
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn all_reduce_min(&mut self, value: f64) -> DriverResult<f64> {
        self.inner.all_reduce_min(value)
    }

    fn all_reduce_any(&mut self, flag: bool) -> DriverResult<bool> {
        self.inner.all_reduce_any(flag)
    }

    fn barrier(&mut self) -> DriverResult<()> {
        self.log.push(Call::Barrier);
        self.inner.barrier()
    }
}

/// Subsystems whose every collaborator records into `log`.
pub fn mock_subsystems(plan: &MockPlan, log: &CallLog) -> Subsystems {
    Subsystems {
        grid: Mock::boxed(plan, log),
        allocator: Mock::boxed(plan, log),
        initial_state: Mock::boxed(plan, log),
        efield: Mock::boxed(plan, log),
        precipitation: Mock::boxed(plan, log),
        neutrals: Mock::boxed(plan, log),
        selector: Mock::boxed(plan, log),
        electrodynamics: Mock::boxed(plan, log),
        fluid: Mock::boxed(plan, log),
        output: Mock::boxed(plan, log),
    }
}

/// Small valid run configuration.
pub fn base_config(tdur: f64, dtout: f64) -> SimulationConfig {
    let mut config = SimulationConfig::new(
        LaunchOptions::default(),
        BaseConfig::new([2023, 5, 1], 36_000.0, tdur, dtout),
    );
    config.grid.lx1 = 8;
    config.grid.lx2all = 4;
    config.grid.lx3all = 4;
    config.grid.lsp = 3;
    config
}

#[allow(dead_code)]
pub struct RunBuilder {
    config: SimulationConfig,
    plan: MockPlan,
}

#[allow(dead_code)]
impl RunBuilder {
    pub fn new() -> Self {
        Self {
            config: base_config(60.0, 20.0),
            plan: MockPlan::default(),
        }
    }

    /// Duration reported by the initial-state loader and the config.
    pub fn with_duration(mut self, tdur: f64) -> Self {
        self.config.base.tdur = tdur;
        self.plan.tdur = tdur;
        self
    }

    pub fn with_dtout(mut self, dtout: f64) -> Self {
        self.config.base.dtout = dtout;
        self
    }

    pub fn with_step(mut self, dt: f64) -> Self {
        self.plan.dt = dt;
        self
    }

    pub fn with_failure(mut self, failure: Failure) -> Self {
        self.plan.failure = Some(failure);
        self
    }

    pub fn with_nan_at(mut self, it: u64) -> Self {
        self.plan.nan_at = Some(it);
        self
    }

    pub fn with_manual_grid(mut self, lid2: usize, lid3: usize) -> Self {
        self.config.manual_grid = Some(ManualGrid { lid2, lid3 });
        self
    }

    pub fn with_plan<F>(mut self, modifier: F) -> Self
    where
        F: FnOnce(&mut MockPlan),
    {
        modifier(&mut self.plan);
        self
    }

    pub fn with_config<F>(mut self, modifier: F) -> Self
    where
        F: FnOnce(&mut SimulationConfig),
    {
        modifier(&mut self.config);
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn plan(&self) -> &MockPlan {
        &self.plan
    }

    /// Runs a single worker and returns its result with the call log.
    pub fn run(self) -> (DriverResult<RunSummary>, CallLog) {
        let log = CallLog::default();
        let mut subsystems = mock_subsystems(&self.plan, &log);
        let mut comm = RecordingComm::new(&log);
        let result = run_worker(&self.config, &mut comm, &mut subsystems);
        (result, log)
    }
}
