//! Resource planning: padded size, workgroup size and workgroup count.

use crate::error::{ConfigError, SortError};

/// Largest element count a session accepts. The padded count and every pass
/// distance must fit the kernel's 32-bit `uint` parameters.
pub const MAX_ELEMENT_COUNT: usize = 1 << 31;

/// The two device limits the planner budgets against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Maximum invocations per threadgroup.
    pub max_threads_per_threadgroup: usize,
    /// Maximum threadgroup memory in bytes.
    pub max_threadgroup_memory: usize,
}

impl DeviceLimits {
    pub fn new(max_threads_per_threadgroup: usize, max_threadgroup_memory: usize) -> Self {
        Self {
            max_threads_per_threadgroup,
            max_threadgroup_memory,
        }
    }

    /// Lower the invocation limit to `max` (never raises it).
    pub fn capped(self, max: Option<usize>) -> Self {
        match max {
            Some(max) => Self {
                max_threads_per_threadgroup: self.max_threads_per_threadgroup.min(max),
                ..self
            },
            None => self,
        }
    }
}

/// Sizing of one sort session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortPlan {
    pub n: usize,
    pub padded_n: usize,
    pub workgroup_size: usize,
    pub workgroup_count: usize,
    pub per_item_bytes: usize,
}

impl SortPlan {
    /// No passes are needed (`n <= 1`).
    pub fn is_trivial(&self) -> bool {
        self.padded_n < 2
    }

    /// Elements sorted per workgroup block.
    pub fn block_size(&self) -> usize {
        self.workgroup_size * 2
    }
}

/// Compute the sizing for `n` items of `per_item_bytes` each.
///
/// Every item needs its key (plus payload) staged twice in threadgroup memory,
/// so one invocation costs `2 * next_pow2(per_item_bytes)` bytes.
pub fn plan(n: usize, per_item_bytes: usize, limits: DeviceLimits) -> Result<SortPlan, SortError> {
    check_element_count(n)?;

    let exhausted = SortError::ResourceExhausted {
        per_item_bytes,
        max_threads: limits.max_threads_per_threadgroup,
        max_memory: limits.max_threadgroup_memory,
    };
    let Some(item_cost) = per_item_bytes
        .max(1)
        .checked_next_power_of_two()
        .and_then(|bytes| bytes.checked_mul(2))
    else {
        return Err(exhausted);
    };
    let capacity = limits
        .max_threads_per_threadgroup
        .min(limits.max_threadgroup_memory / item_cost);
    if capacity == 0 {
        return Err(exhausted);
    }

    if n <= 1 {
        return Ok(SortPlan {
            n,
            padded_n: 1,
            workgroup_size: 0,
            workgroup_count: 0,
            per_item_bytes,
        });
    }

    let padded_n = n.next_power_of_two();
    let workgroup_size = prev_power_of_two(capacity.min(padded_n / 2));
    let workgroup_count = padded_n / (workgroup_size * 2);

    Ok(SortPlan {
        n,
        padded_n,
        workgroup_size,
        workgroup_count,
        per_item_bytes,
    })
}

/// Reject counts above [`MAX_ELEMENT_COUNT`].
pub fn check_element_count(n: usize) -> Result<(), ConfigError> {
    if n > MAX_ELEMENT_COUNT {
        return Err(ConfigError::ElementCountTooLarge(n));
    }
    Ok(())
}

/// `n * item_bytes`, or `ElementCountTooLarge` when it overflows.
pub fn byte_len(n: usize, item_bytes: usize) -> Result<usize, ConfigError> {
    n.checked_mul(item_bytes)
        .ok_or(ConfigError::ElementCountTooLarge(n))
}

fn prev_power_of_two(x: usize) -> usize {
    debug_assert!(x > 0);
    1 << (usize::BITS - 1 - x.leading_zeros())
}
