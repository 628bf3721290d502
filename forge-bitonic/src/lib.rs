//! forge-bitonic: GPU bitonic sorting of device-resident buffers on Metal.
//!
//! The sort-plan engine ([`types`], [`layout`], [`planner`], [`schedule`],
//! [`kernel`]) is plain Rust and builds on every target. Sort sessions,
//! which compile the generated kernels and record dispatches, are available
//! on macOS.
//!
//! ```ignore
//! use forge_bitonic::{SortConfig, SortContext, SortOrder, TypeDescriptor, Scalar};
//!
//! let ctx = SortContext::new()?;
//! let data = ctx.alloc_buffer_with_data(&[5u32, 3, 9, 1])?;
//! let config = SortConfig::new(TypeDescriptor::natural(Scalar::UInt), 4, data.clone())
//!     .order(SortOrder::Descending);
//! let sorter = ctx.create_in_place_sorter(config)?;
//! sorter.sort_and_wait()?;
//! ```

pub mod error;
pub mod kernel;
pub mod layout;
pub mod planner;
pub mod schedule;
pub mod types;

#[cfg(target_os = "macos")]
pub mod context;
#[cfg(target_os = "macos")]
pub mod metal_helpers;
#[cfg(target_os = "macos")]
pub mod session;

pub use error::{ConfigError, Result, SortError};
pub use kernel::{KernelSource, PayloadLayout, SortOrder};
pub use layout::{Field, LayoutOracle, MslLayout, Scalar, Shape, TypeLayout};
pub use planner::{plan, DeviceLimits, SortPlan, MAX_ELEMENT_COUNT};
pub use schedule::{compute_schedule, Pass, PassParams, PassPlan, Phase};
pub use types::{
    reify, AuxiliaryBinding, DistanceFunction, ElementType, ReifiedType, ShaderFunction,
    TypeDescriptor,
};

#[cfg(target_os = "macos")]
pub use context::SortContext;
#[cfg(target_os = "macos")]
pub use session::{IndexSorter, InPlaceSorter, SortConfig};
