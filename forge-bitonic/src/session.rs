//! Sort sessions: in-place and index (indirect) sorting of Metal buffers.
//!
//! A session is built once from a [`SortConfig`]. Construction reifies the
//! element type, plans resources, schedules passes, generates and compiles
//! kernels, and allocates session-owned buffers. After that, `encode` and
//! `sort` replay the same dispatch sequence on every call.

use std::collections::BTreeMap;
use std::ptr::NonNull;

use objc2::rc::Retained;
use objc2::runtime::ProtocolObject;
use objc2_metal::{
    MTLBuffer, MTLCommandBuffer, MTLCommandBufferStatus, MTLCommandEncoder, MTLCommandQueue,
    MTLComputeCommandEncoder, MTLComputePipelineState, MTLSize,
};

use crate::context::SortContext;
use crate::error::{ConfigError, Result, SortError};
use crate::kernel::{
    self, PayloadLayout, SortOrder, DISTANCE_DATA_SLOT, DISTANCE_INDICES_SLOT, DISTANCE_KEYS_SLOT,
    INIT_INDICES_SLOT, SORT_KEYS_SLOT, SORT_PARAMS_SLOT, SORT_PAYLOAD_SLOT,
};
use crate::layout::{MslLayout, Scalar};
use crate::metal_helpers::{alloc_buffer, compile_pipeline, dispatch_threads_1d};
use crate::planner::{self, SortPlan};
use crate::schedule::{PassParams, PassPlan};
use crate::types::{reify, ElementType, ReifiedElement, ReifiedType, TypeDescriptor};

type Buffer = Retained<ProtocolObject<dyn MTLBuffer>>;
type Pipeline = Retained<ProtocolObject<dyn MTLComputePipelineState>>;

const INDEX_BYTES: usize = std::mem::size_of::<u32>();

/// Everything needed to build a sort session.
pub struct SortConfig {
    element_type: TypeDescriptor,
    n: usize,
    order: SortOrder,
    data: Buffer,
    indices: Option<Buffer>,
    auxiliary: BTreeMap<u32, Buffer>,
    max_workgroup_size: Option<usize>,
}

impl SortConfig {
    /// Sort the first `n` elements of `data`, ascending by default.
    pub fn new(element_type: TypeDescriptor, n: usize, data: Buffer) -> Self {
        Self {
            element_type,
            n,
            order: SortOrder::Ascending,
            data,
            indices: None,
            auxiliary: BTreeMap::new(),
            max_workgroup_size: None,
        }
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Index sorts write into this buffer instead of allocating one.
    pub fn index_buffer(mut self, indices: Buffer) -> Self {
        self.indices = Some(indices);
        self
    }

    /// Buffer for the distance function's auxiliary binding `group`.
    pub fn auxiliary_buffer(mut self, group: u32, buffer: Buffer) -> Self {
        self.auxiliary.insert(group, buffer);
        self
    }

    /// Cap the workgroup size below the device limit.
    pub fn max_workgroup_size(mut self, max: usize) -> Self {
        self.max_workgroup_size = Some(max);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    InPlace,
    Index,
}

/// Dispatch recorded before the sort passes.
enum Prelude {
    DistanceMap {
        pipeline: Pipeline,
        data: Buffer,
        keys: Buffer,
        indices: Option<Buffer>,
        /// (buffer, slot) in group order.
        auxiliary: Vec<(Buffer, usize)>,
    },
    InitIndices {
        pipeline: Pipeline,
        indices: Buffer,
    },
}

/// Immutable state of a constructed session.
struct SessionCore {
    queue: Retained<ProtocolObject<dyn MTLCommandQueue>>,
    plan: SortPlan,
    passes: PassPlan,
    params: Vec<PassParams>,
    sort_pipeline: Option<Pipeline>,
    prelude: Option<Prelude>,
    keys: Buffer,
    payload: Option<Buffer>,
    owned_buffers: usize,
}

impl SessionCore {
    /// Returns the core and, for index sessions, the index buffer.
    fn build(ctx: &SortContext, config: SortConfig, mode: Mode) -> Result<(Self, Option<Buffer>)> {
        let device = ctx.device();
        let reified = reify(&config.element_type, &MslLayout)?;
        let n = config.n;
        planner::check_element_count(n)?;

        let element_bytes = reified.element().byte_size;
        check_buffer("data", &config.data, planner::byte_len(n, element_bytes)?)?;
        if let Some(indices) = &config.indices {
            check_buffer("index", indices, planner::byte_len(n, INDEX_BYTES)?)?;
        }

        let bindings = reified.auxiliary_bindings();
        for binding in bindings {
            if !config.auxiliary.contains_key(&binding.group) {
                return Err(ConfigError::MissingAuxiliaryBuffer(binding.group).into());
            }
        }
        if let Some(&group) = config
            .auxiliary
            .keys()
            .find(|g| !bindings.iter().any(|b| b.group == **g))
        {
            return Err(ConfigError::UnexpectedAuxiliaryBuffer(group).into());
        }

        let payload_layout = match (mode, &reified) {
            (Mode::InPlace, ReifiedType::Comparable(_)) => PayloadLayout::Direct,
            (Mode::InPlace, ReifiedType::Distance(d)) => PayloadLayout::KeyValue(d.element.clone()),
            (Mode::Index, ReifiedType::Comparable(_)) => PayloadLayout::Indirect,
            (Mode::Index, ReifiedType::Distance(_)) => PayloadLayout::KeyValue(index_element()),
        };

        let key = reified.key();
        let limits = ctx.limits().capped(config.max_workgroup_size);
        let plan = planner::plan(n, payload_layout.per_item_bytes(key.element.byte_size), limits)?;
        let passes = PassPlan::from_plan(&plan);
        tracing::debug!(
            n,
            padded_n = plan.padded_n,
            workgroup_size = plan.workgroup_size,
            workgroup_count = plan.workgroup_count,
            per_item_bytes = plan.per_item_bytes,
            passes = passes.len(),
            local_passes = passes.iter().filter(|p| p.phase.is_local()).count(),
            ?mode,
            "planned sort session"
        );

        let sort_pipeline = if plan.is_trivial() {
            None
        } else {
            let source = kernel::sort_kernel(key, &payload_layout, config.order, &plan);
            let pipeline = compile_pipeline(&device, &source, Some(plan.workgroup_size))?;
            if pipeline.maxTotalThreadsPerThreadgroup() < plan.workgroup_size {
                return Err(SortError::ResourceExhausted {
                    per_item_bytes: plan.per_item_bytes,
                    max_threads: pipeline.maxTotalThreadsPerThreadgroup(),
                    max_memory: limits.max_threadgroup_memory,
                });
            }
            Some(pipeline)
        };

        let mut owned_buffers = 0;
        let indices = match mode {
            Mode::InPlace => None,
            Mode::Index => Some(match config.indices {
                Some(indices) => indices,
                None => {
                    owned_buffers += 1;
                    alloc_buffer(&device, planner::byte_len(n, INDEX_BYTES)?)?
                }
            }),
        };

        let (keys, payload, prelude) = match &reified {
            ReifiedType::Comparable(_) => {
                let prelude = match &indices {
                    Some(indices) if n > 0 => {
                        let source = kernel::init_indices_kernel(n);
                        Some(Prelude::InitIndices {
                            pipeline: compile_pipeline(&device, &source, None)?,
                            indices: indices.clone(),
                        })
                    }
                    _ => None,
                };
                (config.data.clone(), indices.clone(), prelude)
            }
            ReifiedType::Distance(distance) => {
                owned_buffers += 1;
                let keys = alloc_buffer(&device, planner::byte_len(n, distance.key.element.byte_size)?)?;
                let prelude = if n > 0 {
                    let source = kernel::distance_kernel(distance, indices.is_some(), n);
                    let auxiliary = distance
                        .auxiliary_bindings
                        .iter()
                        .filter_map(|b| {
                            config
                                .auxiliary
                                .get(&b.group)
                                .map(|buf| (buf.clone(), DISTANCE_INDICES_SLOT + b.group as usize))
                        })
                        .collect();
                    Some(Prelude::DistanceMap {
                        pipeline: compile_pipeline(&device, &source, None)?,
                        data: config.data.clone(),
                        keys: keys.clone(),
                        indices: indices.clone(),
                        auxiliary,
                    })
                } else {
                    None
                };
                let payload = match mode {
                    Mode::InPlace => Some(config.data.clone()),
                    Mode::Index => indices.clone(),
                };
                (keys, payload, prelude)
            }
        };

        let params = passes.iter().map(|p| p.params()).collect();

        let core = Self {
            queue: ctx.queue(),
            plan,
            passes,
            params,
            sort_pipeline,
            prelude,
            keys,
            payload,
            owned_buffers,
        };
        Ok((core, indices))
    }

    fn encode(&self, encoder: &ProtocolObject<dyn MTLComputeCommandEncoder>) {
        let n = self.plan.n;
        if n == 0 {
            return;
        }

        match &self.prelude {
            Some(Prelude::DistanceMap {
                pipeline,
                data,
                keys,
                indices,
                auxiliary,
            }) => {
                let mut buffers: Vec<(&ProtocolObject<dyn MTLBuffer>, usize)> = vec![
                    (&**data, DISTANCE_DATA_SLOT),
                    (&**keys, DISTANCE_KEYS_SLOT),
                ];
                if let Some(indices) = indices {
                    buffers.push((&**indices, DISTANCE_INDICES_SLOT));
                }
                buffers.extend(auxiliary.iter().map(|(buf, slot)| (&**buf, *slot)));
                dispatch_threads_1d(encoder, pipeline, &buffers, n);
                tracing::trace!(n, "encoded distance map");
            }
            Some(Prelude::InitIndices { pipeline, indices }) => {
                dispatch_threads_1d(encoder, pipeline, &[(&**indices, INIT_INDICES_SLOT)], n);
                tracing::trace!(n, "encoded index init");
            }
            None => {}
        }

        let Some(pipeline) = &self.sort_pipeline else {
            return;
        };

        encoder.setComputePipelineState(pipeline);
        unsafe {
            encoder.setBuffer_offset_atIndex(Some(&self.keys), 0, SORT_KEYS_SLOT);
            if let Some(payload) = &self.payload {
                encoder.setBuffer_offset_atIndex(Some(payload), 0, SORT_PAYLOAD_SLOT);
            }
        }

        let grid = MTLSize {
            width: self.plan.workgroup_count,
            height: 1,
            depth: 1,
        };
        let tg_size = MTLSize {
            width: self.plan.workgroup_size,
            height: 1,
            depth: 1,
        };

        for (pass, params) in self.passes.iter().zip(&self.params) {
            unsafe {
                encoder.setBytes_length_atIndex(
                    NonNull::from(params).cast(),
                    std::mem::size_of::<PassParams>(),
                    SORT_PARAMS_SLOT,
                );
            }
            encoder.dispatchThreadgroups_threadsPerThreadgroup(grid, tg_size);
            tracing::trace!(phase = ?pass.phase, h = pass.h, "encoded pass");
        }
    }

    fn submit(&self) -> Result<Retained<ProtocolObject<dyn MTLCommandBuffer>>> {
        let cmd = self.queue.commandBuffer().ok_or_else(|| {
            SortError::GpuExecution("failed to create command buffer".to_string())
        })?;
        let encoder = cmd.computeCommandEncoder().ok_or_else(|| {
            SortError::GpuExecution("failed to create compute encoder".to_string())
        })?;
        self.encode(&encoder);
        encoder.endEncoding();
        cmd.commit();
        Ok(cmd)
    }

    fn submit_and_wait(&self) -> Result<()> {
        let cmd = self.submit()?;
        cmd.waitUntilCompleted();

        if cmd.status() == MTLCommandBufferStatus::Error {
            return Err(SortError::GpuExecution(format!(
                "command buffer error: {:?}",
                cmd.error()
            )));
        }
        Ok(())
    }

    fn destroy(self, kind: &str) {
        tracing::debug!(
            kind,
            n = self.plan.n,
            owned_buffers = self.owned_buffers,
            "destroyed sort session"
        );
    }
}

fn index_element() -> ReifiedElement {
    ReifiedElement {
        element: ElementType::scalar(Scalar::UInt),
        byte_size: INDEX_BYTES,
        align: INDEX_BYTES,
    }
}

fn check_buffer(name: &'static str, buffer: &ProtocolObject<dyn MTLBuffer>, required: usize) -> Result<()> {
    let actual = buffer.length();
    if actual < required {
        return Err(ConfigError::BufferTooSmall {
            buffer: name,
            required,
            actual,
        }
        .into());
    }
    Ok(())
}

/// Sorts the data buffer itself.
///
/// Comparable elements are sorted directly. Distance-typed elements are
/// mapped to keys in a session-owned buffer first, and the data rides along
/// with every key swap.
pub struct InPlaceSorter {
    core: SessionCore,
}

impl InPlaceSorter {
    pub fn plan(&self) -> &SortPlan {
        &self.core.plan
    }

    pub fn passes(&self) -> &PassPlan {
        &self.core.passes
    }

    /// Append all dispatches to `encoder` without ending or submitting it.
    pub fn encode(&self, encoder: &ProtocolObject<dyn MTLComputeCommandEncoder>) {
        self.core.encode(encoder);
    }

    /// Encode into a fresh command buffer and commit it. Does not wait.
    pub fn sort(&self) -> Result<()> {
        self.core.submit().map(|_| ())
    }

    /// Like [`sort`](Self::sort), then block until the GPU finishes.
    pub fn sort_and_wait(&self) -> Result<()> {
        self.core.submit_and_wait()
    }

    /// Release session-owned buffers and pipelines.
    pub fn destroy(self) {
        self.core.destroy("in-place");
    }
}

/// Produces a permutation `indices` such that `data[indices[i]]` is sorted.
/// The data buffer is never written.
pub struct IndexSorter {
    core: SessionCore,
    indices: Buffer,
}

impl IndexSorter {
    pub fn plan(&self) -> &SortPlan {
        &self.core.plan
    }

    pub fn passes(&self) -> &PassPlan {
        &self.core.passes
    }

    /// The buffer the permutation is written to.
    pub fn index_buffer(&self) -> Buffer {
        self.indices.clone()
    }

    /// Append all dispatches to `encoder` without ending or submitting it.
    pub fn encode(&self, encoder: &ProtocolObject<dyn MTLComputeCommandEncoder>) {
        self.core.encode(encoder);
    }

    /// Encode into a fresh command buffer and commit it. Does not wait; the
    /// returned index buffer is valid once the GPU completes.
    pub fn sort(&self) -> Result<Buffer> {
        self.core.submit()?;
        Ok(self.index_buffer())
    }

    /// Like [`sort`](Self::sort), then block until the GPU finishes.
    pub fn sort_and_wait(&self) -> Result<Buffer> {
        self.core.submit_and_wait()?;
        Ok(self.index_buffer())
    }

    /// Release session-owned buffers and pipelines. A caller-supplied index
    /// buffer stays valid.
    pub fn destroy(self) {
        self.core.destroy("index");
    }
}

impl SortContext {
    /// Build a session that sorts `config`'s data buffer in place.
    pub fn create_in_place_sorter(&self, config: SortConfig) -> Result<InPlaceSorter> {
        let (core, _) = SessionCore::build(self, config, Mode::InPlace)?;
        Ok(InPlaceSorter { core })
    }

    /// Build a session that writes a sorting permutation of `config`'s data.
    pub fn create_index_sorter(&self, config: SortConfig) -> Result<IndexSorter> {
        let (core, indices) = SessionCore::build(self, config, Mode::Index)?;
        let indices = indices.ok_or_else(|| {
            SortError::GpuExecution("index session was built without an index buffer".to_string())
        })?;
        Ok(IndexSorter { core, indices })
    }
}
