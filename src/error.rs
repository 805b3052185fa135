//! Error types shared by every component.

use thiserror::Error;

/// Errors produced while allocating grids, stepping kernels or driving a
/// compute backend. Every variant is fatal to the run that raised it.
#[derive(Error, Debug)]
pub enum LifeError {
    /// Grid dimensions are zero, overflow, or the buffer could not be reserved.
    #[error("cannot allocate {rows}x{cols} grid: {reason}")]
    Allocation {
        rows: usize,
        cols: usize,
        reason: &'static str,
    },

    /// Input and output grids (or a session and a grid) disagree on shape.
    #[error("grid shape mismatch: expected {expected:?}, found {found:?}")]
    Shape {
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// A cell buffer holds something other than 0 or 1.
    #[error("cell {index} holds invalid value {value}")]
    CorruptCells { index: usize, value: u8 },

    /// Device, queue, transfer or dispatch failure reported by a backend.
    #[error("backend error during {op}: status {code}")]
    Backend { op: &'static str, code: i32 },

    /// Kernel source was rejected by the backend compiler.
    #[error("failed to compile `{entry_point}`: {reason}")]
    Compile { entry_point: String, reason: String },

    /// A run setting outside its valid range.
    #[error("invalid configuration: {0}")]
    Config(&'static str),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type LifeResult<T> = Result<T, LifeError>;

impl LifeError {
    pub fn allocation(rows: usize, cols: usize, reason: &'static str) -> Self {
        Self::Allocation { rows, cols, reason }
    }

    pub fn backend(op: &'static str, code: i32) -> Self {
        Self::Backend { op, code }
    }

    pub fn compile(entry_point: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Compile {
            entry_point: entry_point.into(),
            reason: reason.into(),
        }
    }

    /// True for errors raised by a compute backend mid-run.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }
}
