//! Uniform background electric field and fixed precipitation parameters.

use crate::collaborators::{
    EfieldInputs, ElectricFieldInput, PerpendicularField, PrecipitationInput, StepContext,
};
use anyhow::{ensure, Result};
use ionodrive_data::{DriftField, EfieldSettings, ElectroVar, FieldBuffers, PrecipSettings};

pub struct BuiltinElectricField {
    settings: EfieldSettings,
}

impl BuiltinElectricField {
    #[must_use]
    pub fn new(settings: EfieldSettings) -> Self {
        Self { settings }
    }
}

impl ElectricFieldInput for BuiltinElectricField {
    fn initialize(&mut self, ctx: &StepContext) -> Result<EfieldInputs> {
        let s = &self.settings;
        ensure!(
            s.e2_bg.is_finite() && s.e3_bg.is_finite(),
            "background electric field must be finite"
        );
        ensure!(s.b0 > 0.0, "magnetic field magnitude must be positive");
        Ok(EfieldInputs {
            e2: s.e2_bg,
            e3: s.e3_bg,
            time: ctx.time,
        })
    }

    fn potential_to_perp_field(
        &mut self,
        inputs: &EfieldInputs,
        buffers: &mut FieldBuffers,
    ) -> Result<PerpendicularField> {
        buffers.electro_var_mut(ElectroVar::E2).fill(inputs.e2);
        buffers.electro_var_mut(ElectroVar::E3).fill(inputs.e3);
        Ok(PerpendicularField {
            e2: inputs.e2,
            e3: inputs.e3,
        })
    }

    /// E x B drift of the grid, or zero for a fixed grid.
    fn background_drift(&mut self, field: &PerpendicularField) -> Result<DriftField> {
        if !self.settings.lagrangian {
            return Ok(DriftField::default());
        }
        let b0 = self.settings.b0;
        Ok(DriftField {
            v2: field.e3 / b0,
            v3: -field.e2 / b0,
        })
    }
}

pub struct BuiltinPrecipitation {
    settings: PrecipSettings,
    ready: bool,
}

impl BuiltinPrecipitation {
    #[must_use]
    pub fn new(settings: PrecipSettings) -> Self {
        Self {
            settings,
            ready: false,
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready
    }
}

impl PrecipitationInput for BuiltinPrecipitation {
    fn initialize(&mut self, _ctx: &StepContext) -> Result<()> {
        ensure!(
            self.settings.q >= 0.0,
            "precipitation energy flux must be non-negative, got {}",
            self.settings.q
        );
        ensure!(
            self.settings.e0 > 0.0,
            "precipitation characteristic energy must be positive, got {}",
            self.settings.e0
        );
        self.ready = true;
        Ok(())
    }
}
