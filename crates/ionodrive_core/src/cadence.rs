//! Cadence gates for optional, expensive actions.
//!
//! Each gate tracks the next simulated time its action is due. A gate fires at
//! most once per iteration and then moves its due time forward by exactly one
//! interval, so a gate that has fallen several intervals behind catches up one
//! interval per iteration instead of firing repeatedly.

use ionodrive_data::{CadenceState, SimulationConfig};

/// Slack when comparing simulated time against an output time.
pub const OUTPUT_TOLERANCE: f64 = 1.0e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CadenceKind {
    NeutralBackground,
    FieldOutput,
    AuxOutput,
    Milestone,
}

impl CadenceKind {
    pub const ALL: [CadenceKind; 4] = [
        CadenceKind::NeutralBackground,
        CadenceKind::FieldOutput,
        CadenceKind::AuxOutput,
        CadenceKind::Milestone,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            CadenceKind::NeutralBackground => "neutral background",
            CadenceKind::FieldOutput => "field output",
            CadenceKind::AuxOutput => "aux output",
            CadenceKind::Milestone => "milestone",
        }
    }
}

/// How simulated time is compared against the due time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Due once `t` is strictly past the due time.
    After,
    /// Due once `t` has reached the due time, within [`OUTPUT_TOLERANCE`].
    Reached,
}

impl Trigger {
    #[must_use]
    pub fn is_due(self, t: f64, next_due: f64) -> bool {
        match self {
            Trigger::After => t > next_due,
            Trigger::Reached => t >= next_due - OUTPUT_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CadenceGate {
    kind: CadenceKind,
    trigger: Trigger,
    interval: f64,
    next_due: f64,
    enabled: bool,
}

impl CadenceGate {
    /// A gate first due at `first_due`; non-positive intervals disable it.
    #[must_use]
    pub fn new(kind: CadenceKind, trigger: Trigger, first_due: f64, interval: f64) -> Self {
        Self {
            kind,
            trigger,
            interval,
            next_due: first_due,
            enabled: interval.is_finite() && interval > 0.0,
        }
    }

    #[must_use]
    pub fn disabled(kind: CadenceKind) -> Self {
        Self {
            kind,
            trigger: Trigger::Reached,
            interval: 0.0,
            next_due: f64::INFINITY,
            enabled: false,
        }
    }

    #[must_use]
    pub fn kind(&self) -> CadenceKind {
        self.kind
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn interval(&self) -> f64 {
        self.interval
    }

    #[must_use]
    pub fn next_due(&self) -> Option<f64> {
        self.enabled.then_some(self.next_due)
    }

    #[must_use]
    pub fn is_due(&self, t: f64) -> bool {
        self.enabled && self.trigger.is_due(t, self.next_due)
    }

    /// Due time after one firing.
    #[must_use]
    pub fn advance(next_due: f64, interval: f64) -> f64 {
        next_due + interval
    }

    /// Moves the due time forward by one interval. Call only after the
    /// gated action succeeded.
    pub fn mark_fired(&mut self) {
        self.next_due = Self::advance(self.next_due, self.interval);
    }
}

/// The four gates of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct CadenceSchedule {
    pub neutral_background: CadenceGate,
    pub field_output: CadenceGate,
    pub aux_output: CadenceGate,
    pub milestone: CadenceGate,
}

impl CadenceSchedule {
    /// Start values for a run beginning at simulated time `t0`.
    ///
    /// The neutral background is due immediately (its gate also refuses the
    /// first iteration); outputs are first due one interval after `t0`.
    #[must_use]
    pub fn from_config(config: &SimulationConfig, t0: f64) -> Self {
        let neutral_background = if config.neutral.background {
            CadenceGate::new(
                CadenceKind::NeutralBackground,
                Trigger::After,
                t0,
                config.neutral.dt_background,
            )
        } else {
            CadenceGate::disabled(CadenceKind::NeutralBackground)
        };

        let dtout = config.base.dtout;
        let field_output =
            CadenceGate::new(CadenceKind::FieldOutput, Trigger::Reached, t0 + dtout, dtout);

        let aux_output = if config.output.glow {
            let dt = config.output.dtglowout;
            CadenceGate::new(CadenceKind::AuxOutput, Trigger::Reached, t0 + dt, dt)
        } else {
            CadenceGate::disabled(CadenceKind::AuxOutput)
        };

        let milestone = match config.output.milestone_interval(dtout) {
            Some(dt) => CadenceGate::new(CadenceKind::Milestone, Trigger::Reached, t0 + dt, dt),
            None => CadenceGate::disabled(CadenceKind::Milestone),
        };

        Self {
            neutral_background,
            field_output,
            aux_output,
            milestone,
        }
    }

    #[must_use]
    pub fn gate(&self, kind: CadenceKind) -> &CadenceGate {
        match kind {
            CadenceKind::NeutralBackground => &self.neutral_background,
            CadenceKind::FieldOutput => &self.field_output,
            CadenceKind::AuxOutput => &self.aux_output,
            CadenceKind::Milestone => &self.milestone,
        }
    }

    #[must_use]
    pub fn state(&self) -> CadenceState {
        CadenceState {
            neutral_background: self.neutral_background.next_due(),
            field_output: self.field_output.next_due(),
            aux_output: self.aux_output.next_due(),
            milestone: self.milestone.next_due(),
        }
    }
}
