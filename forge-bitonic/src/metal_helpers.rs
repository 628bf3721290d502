//! Metal plumbing: runtime pipeline compilation, buffer allocation,
//! dispatch and readback.

use std::ptr::NonNull;

use objc2::rc::Retained;
use objc2::runtime::ProtocolObject;
use objc2_foundation::NSString;
use objc2_metal::{
    MTLBuffer, MTLComputeCommandEncoder, MTLComputePipelineDescriptor, MTLComputePipelineState,
    MTLDevice, MTLLibrary, MTLPipelineOption, MTLResourceOptions, MTLSize,
};

use crate::error::{Result, SortError};
use crate::kernel::KernelSource;
use crate::planner::DeviceLimits;

/// Threads per threadgroup for the one-invocation-per-element kernels.
const ELEMENTWISE_THREADS: usize = 256;

impl DeviceLimits {
    /// Read the threadgroup limits of `device`.
    pub fn from_device(device: &ProtocolObject<dyn MTLDevice>) -> Self {
        Self {
            max_threads_per_threadgroup: device.maxThreadsPerThreadgroup().width,
            max_threadgroup_memory: device.maxThreadgroupMemoryLength(),
        }
    }
}

/// Compile generated source and build a compute pipeline for its entry point.
///
/// `max_threads` is passed as the occupancy hint when the caller knows the
/// threadgroup size it will dispatch with.
pub fn compile_pipeline(
    device: &ProtocolObject<dyn MTLDevice>,
    kernel: &KernelSource,
    max_threads: Option<usize>,
) -> Result<Retained<ProtocolObject<dyn MTLComputePipelineState>>> {
    let ns_source = NSString::from_str(&kernel.source);
    let library = device
        .newLibraryWithSource_options_error(&ns_source, None)
        .map_err(|e| SortError::ShaderCompilation(format!("{}: {}", kernel.entry_point, e)))?;

    let fn_name = NSString::from_str(kernel.entry_point);
    let function = library.newFunctionWithName(&fn_name).ok_or_else(|| {
        SortError::ShaderCompilation(format!(
            "function '{}' not found in generated library",
            kernel.entry_point
        ))
    })?;

    let descriptor = MTLComputePipelineDescriptor::new();
    descriptor.setComputeFunction(Some(&function));
    if let Some(max_threads) = max_threads {
        descriptor.setMaxTotalThreadsPerThreadgroup(max_threads);
    }

    let pso = device
        .newComputePipelineStateWithDescriptor_options_reflection_error(
            &descriptor,
            MTLPipelineOption::None,
            None,
        )
        .map_err(|e| {
            SortError::ShaderCompilation(format!(
                "pipeline creation for '{}' failed: {}",
                kernel.entry_point, e
            ))
        })?;

    tracing::trace!(
        entry_point = kernel.entry_point,
        source_len = kernel.source.len(),
        max_threads = pso.maxTotalThreadsPerThreadgroup(),
        "compiled pipeline"
    );
    Ok(pso)
}

/// Allocate a zeroed `StorageModeShared` buffer. Zero-sized requests get one
/// byte so every session buffer is a real Metal object.
pub fn alloc_buffer(
    device: &ProtocolObject<dyn MTLDevice>,
    size: usize,
) -> Result<Retained<ProtocolObject<dyn MTLBuffer>>> {
    device
        .newBufferWithLength_options(size.max(1), MTLResourceOptions::StorageModeShared)
        .ok_or_else(|| SortError::GpuExecution(format!("failed to allocate {} byte buffer", size)))
}

/// Allocate a `StorageModeShared` buffer initialized with `data`.
pub fn alloc_buffer_with_data<T: Copy>(
    device: &ProtocolObject<dyn MTLDevice>,
    data: &[T],
) -> Result<Retained<ProtocolObject<dyn MTLBuffer>>> {
    let size = std::mem::size_of_val(data);
    if size == 0 {
        return alloc_buffer(device, 0);
    }
    let ptr = NonNull::from(data).cast::<std::ffi::c_void>();
    // SAFETY: `ptr` covers exactly `size` readable bytes; Metal copies them.
    unsafe {
        device.newBufferWithBytes_length_options(ptr, size, MTLResourceOptions::StorageModeShared)
    }
    .ok_or_else(|| SortError::GpuExecution(format!("failed to allocate {} byte buffer", size)))
}

/// Read back `count` values of `T` from the start of a buffer.
///
/// # Safety
/// The buffer must hold at least `count * size_of::<T>()` bytes laid out as
/// `T`, and no GPU work may be writing it concurrently.
pub unsafe fn read_buffer_slice<T: Copy>(
    buffer: &ProtocolObject<dyn MTLBuffer>,
    count: usize,
) -> Vec<T> {
    let ptr = buffer.contents().as_ptr() as *const T;
    std::slice::from_raw_parts(ptr, count).to_vec()
}

/// Overwrite the start of a buffer with `data`.
///
/// # Safety
/// The buffer must hold at least `size_of_val(data)` bytes and must not be in
/// use by the GPU.
pub unsafe fn write_buffer<T: Copy>(buffer: &ProtocolObject<dyn MTLBuffer>, data: &[T]) {
    let ptr = buffer.contents().as_ptr() as *mut T;
    std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, data.len());
}

/// Bind `buffers` and dispatch exactly `total_threads` invocations.
pub fn dispatch_threads_1d(
    encoder: &ProtocolObject<dyn MTLComputeCommandEncoder>,
    pipeline: &ProtocolObject<dyn MTLComputePipelineState>,
    buffers: &[(&ProtocolObject<dyn MTLBuffer>, usize)],
    total_threads: usize,
) {
    encoder.setComputePipelineState(pipeline);

    unsafe {
        for (buffer, index) in buffers {
            encoder.setBuffer_offset_atIndex(Some(*buffer), 0, *index);
        }
    }

    let threads_per_tg = pipeline
        .maxTotalThreadsPerThreadgroup()
        .min(ELEMENTWISE_THREADS);

    let grid_size = MTLSize {
        width: total_threads,
        height: 1,
        depth: 1,
    };
    let tg_size = MTLSize {
        width: threads_per_tg,
        height: 1,
        depth: 1,
    };

    encoder.dispatchThreads_threadsPerThreadgroup(grid_size, tg_size);
}
