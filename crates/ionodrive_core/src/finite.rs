//! Finiteness scan of the field buffers.

use ionodrive_data::{FieldBuffers, FieldKind};
use rayon::prelude::*;

/// First non-finite value found in a buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NonFinite {
    pub kind: FieldKind,
    pub index: usize,
    pub value: f64,
}

impl std::fmt::Display for NonFinite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buffer holds {} at offset {}",
            self.kind, self.value, self.index
        )
    }
}

/// Scans fluid, auxiliary and electrodynamic buffers in that order.
#[must_use]
pub fn first_non_finite(buffers: &FieldBuffers) -> Option<NonFinite> {
    [FieldKind::Fluid, FieldKind::FluidAux, FieldKind::Electro]
        .into_iter()
        .find_map(|kind| {
            let data = buffers.get(kind);
            data.par_iter()
                .position_first(|v| !v.is_finite())
                .map(|index| NonFinite {
                    kind,
                    index,
                    value: data[index],
                })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ionodrive_data::{BufferLayout, GridExtents};

    fn buffers() -> FieldBuffers {
        FieldBuffers::zeroed(BufferLayout::new(GridExtents::new(4, 2, 2), 2))
    }

    #[test]
    fn test_clean_buffers() {
        assert_eq!(first_non_finite(&buffers()), None);
    }

    #[test]
    fn test_reports_first_offender() {
        let mut b = buffers();
        b.fluid_aux_mut()[17] = f64::INFINITY;
        b.fluid_aux_mut()[3] = f64::NAN;
        let found = first_non_finite(&b).unwrap();
        assert_eq!(found.kind, FieldKind::FluidAux);
        assert_eq!(found.index, 3);
        assert!(found.value.is_nan());
    }

    #[test]
    fn test_fluid_checked_before_electro() {
        let mut b = buffers();
        b.electro_mut()[0] = f64::NAN;
        b.fluid_mut()[9] = f64::NEG_INFINITY;
        assert_eq!(first_non_finite(&b).unwrap().kind, FieldKind::Fluid);
    }
}
