//! Neutral atmosphere parameterised by the activity indices.
//!
//! The exospheric temperature follows a Jacchia-type fit to F10.7 and Ap.
//! Background winds are a diurnal tide; perturbations are a sinusoid with
//! the period of the perturbation input cadence.

use crate::collaborators::{AtmosphereModel, NeutralAtmosphere, StepContext};
use anyhow::{anyhow, ensure, Result};
use ionodrive_data::clock::SECONDS_PER_DAY;
use ionodrive_data::{CalendarTime, DriftField, NeutralConfig};
use std::f64::consts::TAU;

/// Tidal wind amplitude at Ap = 0, m/s.
const BASE_WIND: f64 = 40.0;
/// Perturbation amplitude, fraction of the background wind.
const PERTURBATION_FRACTION: f64 = 0.1;

/// Horizontal neutral wind, m/s.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NeutralWinds {
    pub v2: f64,
    pub v3: f64,
}

#[must_use]
pub fn exospheric_temperature(activ: [f64; 3]) -> f64 {
    let [f107a, f107, ap] = activ;
    379.0 + 3.24 * f107a + 1.3 * (f107 - f107a) + 28.0 * ap.powf(0.4)
}

fn tidal_winds(time: &CalendarTime, ap: f64) -> NeutralWinds {
    let amplitude = BASE_WIND * (1.0 + 0.05 * ap);
    let phase = TAU * time.ut_sec() / SECONDS_PER_DAY;
    NeutralWinds {
        v2: amplitude * phase.cos(),
        v3: 0.5 * amplitude * phase.sin(),
    }
}

pub struct BuiltinNeutralAtmosphere {
    settings: NeutralConfig,
    activ: [f64; 3],
    model: Option<AtmosphereModel>,
    winds: Option<NeutralWinds>,
    frame_winds: Option<NeutralWinds>,
    perturbation_period: Option<f64>,
    perturbation: Option<NeutralWinds>,
}

impl BuiltinNeutralAtmosphere {
    #[must_use]
    pub fn new(settings: NeutralConfig, activ: [f64; 3]) -> Self {
        Self {
            settings,
            activ,
            model: None,
            winds: None,
            frame_winds: None,
            perturbation_period: None,
            perturbation: None,
        }
    }

    #[must_use]
    pub fn model(&self) -> Option<&AtmosphereModel> {
        self.model.as_ref()
    }

    /// Background winds in the earth frame.
    #[must_use]
    pub fn winds(&self) -> Option<NeutralWinds> {
        self.winds
    }

    /// Background winds relative to the moving grid.
    #[must_use]
    pub fn frame_winds(&self) -> Option<NeutralWinds> {
        self.frame_winds
    }

    #[must_use]
    pub fn perturbation(&self) -> Option<NeutralWinds> {
        self.perturbation
    }

    fn ap(&self) -> f64 {
        self.activ[2]
    }
}

impl NeutralAtmosphere for BuiltinNeutralAtmosphere {
    fn init_model(&mut self, _ctx: &StepContext) -> Result<AtmosphereModel> {
        ensure!(
            self.activ.iter().all(|a| a.is_finite() && *a >= 0.0),
            "activity indices must be non-negative, got {:?}",
            self.activ
        );
        let model = AtmosphereModel {
            exospheric_temperature: exospheric_temperature(self.activ),
            activ: self.activ,
        };
        self.model = Some(model);
        Ok(model)
    }

    fn init_background(
        &mut self,
        ctx: &StepContext,
        model: &AtmosphereModel,
        drift: &DriftField,
    ) -> Result<()> {
        ensure!(
            model.exospheric_temperature > 0.0,
            "exospheric temperature must be positive"
        );
        self.background_winds(&ctx.time)?;
        self.apply_winds(drift)
    }

    fn init_perturbations(&mut self, _ctx: &StepContext, _model: &AtmosphereModel) -> Result<()> {
        if !self.settings.perturb {
            return Ok(());
        }
        ensure!(
            self.settings.dt_perturb > 0.0,
            "perturbation cadence must be positive, got {}",
            self.settings.dt_perturb
        );
        self.perturbation_period = Some(self.settings.dt_perturb);
        self.perturbation = Some(NeutralWinds::default());
        Ok(())
    }

    fn background_winds(&mut self, time: &CalendarTime) -> Result<()> {
        if self.model.is_none() {
            return Err(anyhow!("atmosphere model not initialized"));
        }
        self.winds = Some(tidal_winds(time, self.ap()));
        Ok(())
    }

    fn apply_winds(&mut self, drift: &DriftField) -> Result<()> {
        let winds = self
            .winds
            .ok_or_else(|| anyhow!("background winds not computed"))?;
        self.frame_winds = Some(NeutralWinds {
            v2: winds.v2 - drift.v2,
            v3: winds.v3 - drift.v3,
        });
        Ok(())
    }

    fn perturb(&mut self, ctx: &StepContext, drift: &DriftField) -> Result<()> {
        let period = self
            .perturbation_period
            .ok_or_else(|| anyhow!("neutral perturbations not initialized"))?;
        let amplitude = PERTURBATION_FRACTION * BASE_WIND;
        let phase = TAU * ctx.t / period;
        self.perturbation = Some(NeutralWinds {
            v2: amplitude * phase.sin() - drift.v2 * PERTURBATION_FRACTION,
            v3: amplitude * phase.cos() - drift.v3 * PERTURBATION_FRACTION,
        });
        Ok(())
    }

    fn clear_background(&mut self) {
        self.model = None;
        self.winds = None;
        self.frame_winds = None;
    }

    fn clear_perturbations(&mut self) {
        self.perturbation_period = None;
        self.perturbation = None;
    }
}
