//! Shared GPU context: device, command queue, buffer allocation.
//!
//! `SortContext` owns a Metal device and command queue. Sessions created
//! from one context submit to the same queue.

use objc2::rc::Retained;
use objc2::runtime::ProtocolObject;
use objc2_metal::{MTLBuffer, MTLCommandQueue, MTLCreateSystemDefaultDevice, MTLDevice};

use crate::error::{Result, SortError};
use crate::metal_helpers::{alloc_buffer, alloc_buffer_with_data};
use crate::planner::DeviceLimits;

pub struct SortContext {
    device: Retained<ProtocolObject<dyn MTLDevice>>,
    queue: Retained<ProtocolObject<dyn MTLCommandQueue>>,
}

impl SortContext {
    /// Acquire the system default device and create a command queue.
    pub fn new() -> Result<Self> {
        let device = MTLCreateSystemDefaultDevice().ok_or(SortError::DeviceNotFound)?;
        let queue = device.newCommandQueue().ok_or_else(|| {
            SortError::GpuExecution("failed to create command queue".to_string())
        })?;
        tracing::debug!(device = %device.name(), "created sort context");
        Ok(Self { device, queue })
    }

    /// Share an existing device and queue.
    pub fn with_context(
        device: Retained<ProtocolObject<dyn MTLDevice>>,
        queue: Retained<ProtocolObject<dyn MTLCommandQueue>>,
    ) -> Self {
        Self { device, queue }
    }

    /// Threadgroup limits reported by the device.
    pub fn limits(&self) -> DeviceLimits {
        DeviceLimits::from_device(&self.device)
    }

    /// Allocate a zeroed `StorageModeShared` buffer of `size` bytes.
    pub fn alloc_buffer(&self, size: usize) -> Result<Retained<ProtocolObject<dyn MTLBuffer>>> {
        alloc_buffer(&self.device, size)
    }

    /// Allocate a `StorageModeShared` buffer holding a copy of `data`.
    pub fn alloc_buffer_with_data<T: Copy>(
        &self,
        data: &[T],
    ) -> Result<Retained<ProtocolObject<dyn MTLBuffer>>> {
        alloc_buffer_with_data(&self.device, data)
    }

    /// Clone of the underlying Metal device.
    pub fn device(&self) -> Retained<ProtocolObject<dyn MTLDevice>> {
        self.device.clone()
    }

    /// Clone of the underlying command queue.
    pub fn queue(&self) -> Retained<ProtocolObject<dyn MTLCommandQueue>> {
        self.queue.clone()
    }
}
