//! Error taxonomy for sort sessions.
//!
//! Configuration and resource errors are raised while a session is being
//! built and are fatal to that construction. Device-layer failures are
//! passed through as strings from the Metal API.

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SortError>;

#[derive(Debug, thiserror::Error)]
pub enum SortError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error(
        "resource exhausted: {per_item_bytes} bytes per item does not fit \
         (max threads per threadgroup {max_threads}, threadgroup memory {max_memory} bytes)"
    )]
    ResourceExhausted {
        per_item_bytes: usize,
        max_threads: usize,
        max_memory: usize,
    },
    #[error("no Metal GPU device found")]
    DeviceNotFound,
    #[error("shader compilation failed: {0}")]
    ShaderCompilation(String),
    #[error("GPU execution failed: {0}")]
    GpuExecution(String),
}

/// Malformed element-type descriptors and session configs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("type '{0}' has neither a less-than predicate nor a distance function")]
    NoOrdering(String),
    #[error("type '{0}' has both a less-than predicate and a distance function")]
    AmbiguousOrdering(String),
    #[error("distance function of '{0}' must map into a comparable type")]
    DistanceResultNotComparable(String),
    #[error("'{0}' is not a valid MSL identifier")]
    InvalidIdentifier(String),
    #[error("auxiliary binding group 0 is reserved for the sort kernel's own bindings")]
    AuxiliaryGroupZero,
    #[error("auxiliary binding group {0} is declared more than once")]
    AuxiliaryGroupDuplicate(u32),
    #[error("auxiliary binding groups must be contiguous from 1: expected {expected}, found {found}")]
    AuxiliaryGroupGap { expected: u32, found: u32 },
    #[error("no buffer supplied for auxiliary binding group {0}")]
    MissingAuxiliaryBuffer(u32),
    #[error("buffer supplied for undeclared auxiliary binding group {0}")]
    UnexpectedAuxiliaryBuffer(u32),
    #[error("invalid layout for '{name}': {reason}")]
    InvalidLayout { name: String, reason: String },
    #[error("element count {0} exceeds the supported maximum of 2^31 elements")]
    ElementCountTooLarge(usize),
    #[error("{buffer} buffer holds {actual} bytes, needs {required}")]
    BufferTooSmall {
        buffer: &'static str,
        required: usize,
        actual: usize,
    },
}
