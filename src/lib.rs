//! Toroidal Game of Life stepping engine.
//!
//! A [`Grid`] is advanced by any [`Transition`]: the sequential
//! [`ReferenceKernel`], the rayon-backed [`ParallelKernel`], or an
//! [`ExecutionSession`] driving a [`ComputeBackend`]. All three agree bit for
//! bit. [`Simulation`] owns the double buffer and times runs.

pub mod backend;
pub mod config;
pub mod driver;
pub mod error;
pub mod grid;
pub mod kernel;
pub mod pool;
pub mod render;
pub mod session;

pub use backend::{ComputeBackend, HostBackend};
pub use config::{KernelStrategy, LifeConfig};
pub use driver::{RunReport, Simulation};
pub use error::{LifeError, LifeResult};
pub use grid::Grid;
pub use kernel::{ParallelKernel, ReferenceKernel, Transition};
pub use render::{Glyphs, render};
pub use session::ExecutionSession;
