//! Device execution session.
//!
//! A session owns every backend resource a run needs: device, queue, compiled
//! routine and the input/output buffer pair sized to the grid. The
//! constructor acquires them in order and gives back whatever it already holds
//! if a later step fails; `Drop` releases them in reverse order.

use crate::backend::{
    AccessMode, BufferHandle, ComputeBackend, Handle, LIFE_ENTRY_POINT,
    LIFE_KERNEL_SOURCE, QueueHandle, RoutineHandle, WorkShape,
};
use crate::error::{LifeError, LifeResult};
use crate::grid::{Grid, cell_count};
use crate::kernel::Transition;

#[derive(Clone, Copy, Debug)]
struct Resources {
    queue: QueueHandle,
    routine: RoutineHandle,
    input: BufferHandle,
    output: BufferHandle,
}

pub struct ExecutionSession<B: ComputeBackend> {
    backend: B,
    resources: Resources,
    /// Acquisition order; released back to front.
    handles: Vec<Handle>,
    rows: usize,
    cols: usize,
    /// `rows`, `cols` as bound to the routine.
    scalars: [u32; 2],
}

fn device_dim(rows: usize, cols: usize, dim: usize) -> LifeResult<u32> {
    u32::try_from(dim)
        .map_err(|_| LifeError::allocation(rows, cols, "dimension exceeds 32-bit device parameter"))
}

fn release_all<B: ComputeBackend>(backend: &mut B, handles: &mut Vec<Handle>) {
    while let Some(handle) = handles.pop() {
        match backend.release(handle) {
            Ok(()) => tracing::debug!(?handle, "released"),
            Err(err) => tracing::warn!(?handle, %err, "failed to release backend handle"),
        }
    }
}

fn acquire<B: ComputeBackend>(
    backend: &mut B,
    handles: &mut Vec<Handle>,
    len: usize,
    source: &str,
    entry_point: &str,
) -> LifeResult<Resources> {
    let device = backend.acquire_device()?;
    handles.push(device.into());
    let queue = backend.create_queue(device)?;
    handles.push(queue.into());
    let routine = backend.compile(device, source, entry_point)?;
    handles.push(routine.into());
    let input = backend.allocate_buffer(device, len, AccessMode::ReadOnly)?;
    handles.push(input.into());
    let output = backend.allocate_buffer(device, len, AccessMode::WriteOnly)?;
    handles.push(output.into());
    Ok(Resources {
        queue,
        routine,
        input,
        output,
    })
}

impl<B: ComputeBackend> ExecutionSession<B> {
    /// Session running the built-in Life program on a `rows x cols` board.
    pub fn new(backend: B, rows: usize, cols: usize) -> LifeResult<Self> {
        Self::with_program(backend, rows, cols, LIFE_KERNEL_SOURCE, LIFE_ENTRY_POINT)
    }

    pub fn with_program(
        mut backend: B,
        rows: usize,
        cols: usize,
        source: &str,
        entry_point: &str,
    ) -> LifeResult<Self> {
        let len = cell_count(rows, cols)?;
        let scalars = [device_dim(rows, cols, rows)?, device_dim(rows, cols, cols)?];

        let mut handles = Vec::with_capacity(5);
        let resources = match acquire(&mut backend, &mut handles, len, source, entry_point) {
            Ok(resources) => resources,
            Err(err) => {
                release_all(&mut backend, &mut handles);
                return Err(err);
            }
        };
        tracing::debug!(
            backend = backend.name(),
            rows,
            cols,
            entry_point,
            "execution session ready"
        );

        Ok(Self {
            backend,
            resources,
            handles,
            rows,
            cols,
            scalars,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

impl<B: ComputeBackend> Transition for ExecutionSession<B> {
    fn name(&self) -> &'static str {
        "accelerator"
    }

    /// Upload, dispatch, then blocking download; the three never overlap.
    fn step(&mut self, current: &Grid, next: &mut Grid) -> LifeResult<()> {
        current.ensure_shape(self.rows, self.cols)?;
        next.ensure_shape(self.rows, self.cols)?;
        let r = self.resources;

        self.backend
            .enqueue_upload(r.queue, r.input, current.cells())?;
        self.backend.enqueue_dispatch(
            r.queue,
            r.routine,
            &self.scalars,
            &[r.input, r.output],
            WorkShape {
                rows: self.rows,
                cols: self.cols,
            },
        )?;
        self.backend
            .enqueue_download(r.queue, r.output, next.cells_mut())?;
        next.validate()
    }
}

impl<B: ComputeBackend> Drop for ExecutionSession<B> {
    fn drop(&mut self) {
        release_all(&mut self.backend, &mut self.handles);
    }
}

#[cfg(test)]
mod tests {
    use super::ExecutionSession;
    use crate::backend::{HostBackend, LIFE_KERNEL_SOURCE};
    use crate::error::LifeError;
    use crate::grid::Grid;
    use crate::kernel::{Transition, reference};

    #[test]
    fn drop_releases_every_handle() {
        let mut backend = HostBackend::with_threads(1).unwrap();
        {
            let session = ExecutionSession::new(&mut backend, 8, 8).unwrap();
            assert_eq!(session.backend().live_objects(), 5);
        }
        assert_eq!(backend.live_objects(), 0);
    }

    #[test]
    fn failed_compile_releases_partial_acquisition() {
        let mut backend = HostBackend::with_threads(1).unwrap();
        let err = ExecutionSession::with_program(&mut backend, 8, 8, LIFE_KERNEL_SOURCE, "nope")
            .err()
            .unwrap();
        assert!(matches!(err, LifeError::Compile { .. }));
        assert_eq!(backend.live_objects(), 0);
    }

    #[test]
    fn rejects_dimensions_beyond_device_parameters() {
        let backend = HostBackend::with_threads(1).unwrap();
        let err = ExecutionSession::new(backend, 1, u32::MAX as usize + 1)
            .err()
            .unwrap();
        assert!(matches!(err, LifeError::Allocation { .. }));
    }

    #[test]
    fn step_matches_reference_and_checks_shape() {
        let backend = HostBackend::with_threads(2).unwrap();
        let mut session = ExecutionSession::new(backend, 6, 7).unwrap();
        let mut grid = Grid::new(6, 7).unwrap();
        grid.set_alive([(0, 0), (0, 1), (0, 2), (5, 6), (3, 3), (3, 4), (4, 3)]);

        let got = session.next_generation(&grid).unwrap();
        assert_eq!(got, reference::next_generation(&grid).unwrap());
        assert_eq!(session.backend().dispatch_count(), 1);

        let other = Grid::new(7, 6).unwrap();
        assert!(matches!(
            session.next_generation(&other),
            Err(LifeError::Shape { .. })
        ));
    }
}
