//! Ownership of the field buffers.
//!
//! A [`StateStore`] exists only between a successful allocation and its
//! release. Release consumes the store, so buffers cannot be handed back
//! twice.

use crate::collaborators::BufferAllocator;
use crate::error::{DriverError, DriverResult};
use ionodrive_data::{BufferLayout, FieldBuffers};

pub struct StateStore {
    buffers: FieldBuffers,
}

impl StateStore {
    pub fn allocate(
        layout: BufferLayout,
        allocator: &mut dyn BufferAllocator,
    ) -> DriverResult<Self> {
        let buffers = allocator
            .allocate(layout)
            .map_err(|source| DriverError::Allocation { source })?;

        if *buffers.layout() != layout || !buffers.matches_layout() {
            allocator.deallocate(buffers);
            return Err(DriverError::Allocation {
                source: anyhow::anyhow!("allocator returned buffers that do not match {layout:?}"),
            });
        }

        tracing::debug!(
            fluid = layout.fluid_len(),
            aux = layout.aux_len(),
            electro = layout.electro_len(),
            "Allocated field buffers"
        );
        Ok(Self { buffers })
    }

    #[must_use]
    pub fn buffers(&self) -> &FieldBuffers {
        &self.buffers
    }

    pub fn buffers_mut(&mut self) -> &mut FieldBuffers {
        &mut self.buffers
    }

    /// Hands the buffers back to the allocator.
    pub fn release(self, allocator: &mut dyn BufferAllocator) {
        allocator.deallocate(self.buffers);
        tracing::debug!("Released field buffers");
    }
}

/// Plain heap allocation.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl BufferAllocator for HeapAllocator {
    fn allocate(&mut self, layout: BufferLayout) -> anyhow::Result<FieldBuffers> {
        Ok(FieldBuffers::zeroed(layout))
    }

    fn deallocate(&mut self, buffers: FieldBuffers) {
        drop(buffers);
    }
}
