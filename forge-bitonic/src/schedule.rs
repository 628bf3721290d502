//! Bitonic pass scheduling.
//!
//! The network is expressed as a flat list of [`Pass`]es, each one dispatch
//! of the sort kernel. [`compute_schedule`] is pure so the schedule can be
//! checked without a device.

use crate::planner::SortPlan;

/// Network stage executed by one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Sort each block of `h` elements completely in threadgroup memory.
    LocalBms,
    /// One disperse stage at distance `h`, staged in threadgroup memory.
    LocalDisperse,
    /// One flip stage over windows of `h`, directly on the buffer.
    GlobalFlip,
    /// One disperse stage at distance `h`, directly on the buffer.
    GlobalDisperse,
}

impl Phase {
    /// Selector value read by the kernel.
    pub fn id(self) -> u32 {
        match self {
            Phase::LocalBms => 0,
            Phase::LocalDisperse => 1,
            Phase::GlobalFlip => 2,
            Phase::GlobalDisperse => 3,
        }
    }

    pub fn is_local(self) -> bool {
        matches!(self, Phase::LocalBms | Phase::LocalDisperse)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pass {
    pub phase: Phase,
    /// Window size; pairs are `h / 2` apart at most.
    pub h: usize,
}

impl Pass {
    pub fn new(phase: Phase, h: usize) -> Self {
        Self { phase, h }
    }

    pub fn params(&self) -> PassParams {
        PassParams {
            h: self.h as u32,
            phase: self.phase.id(),
            _pad: [0; 2],
        }
    }
}

/// Per-dispatch parameter block, matches `PassParams` in the kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassParams {
    pub h: u32,
    pub phase: u32,
    pub _pad: [u32; 2],
}

/// Ordered list of passes that sorts `padded_n` elements.
pub fn compute_schedule(padded_n: usize, workgroup_size: usize, workgroup_count: usize) -> Vec<Pass> {
    let mut passes = Vec::new();
    if padded_n < 2 || workgroup_size == 0 {
        return passes;
    }

    let block = workgroup_size * 2;
    passes.push(Pass::new(Phase::LocalBms, block));

    let mut h = block * 2;
    while h <= padded_n {
        passes.push(Pass::new(Phase::GlobalFlip, h));
        let mut hh = h / 2;
        while hh > 1 {
            // Local stages must stay inside the block held in threadgroup memory.
            if hh <= workgroup_count && hh <= block {
                passes.push(Pass::new(Phase::LocalDisperse, hh));
            } else {
                passes.push(Pass::new(Phase::GlobalDisperse, hh));
            }
            hh /= 2;
        }
        h *= 2;
    }
    passes
}

/// Indices compared by invocation `t` in a flip stage over windows of `h`.
pub fn flip_pair(h: usize, t: usize) -> (usize, usize) {
    let half = h / 2;
    let q = (2 * t / h) * h;
    (q + t % half, q + h - t % half - 1)
}

/// Indices compared by invocation `t` in a disperse stage over windows of `h`.
pub fn disperse_pair(h: usize, t: usize) -> (usize, usize) {
    let half = h / 2;
    let q = (2 * t / h) * h;
    let x = q + t % half;
    (x, x + half)
}

/// The schedule of one session, computed once and replayed on every encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassPlan {
    passes: Vec<Pass>,
}

impl PassPlan {
    pub fn from_plan(plan: &SortPlan) -> Self {
        Self {
            passes: compute_schedule(plan.padded_n, plan.workgroup_size, plan.workgroup_count),
        }
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Pass> {
        self.passes.iter()
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}

impl<'a> IntoIterator for &'a PassPlan {
    type Item = &'a Pass;
    type IntoIter = std::slice::Iter<'a, Pass>;

    fn into_iter(self) -> Self::IntoIter {
        self.passes.iter()
    }
}
