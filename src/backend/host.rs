//! In-process software device.
//!
//! Implements the full backend surface on the host: buffers are plain byte
//! vectors, the queue executes each command as it is enqueued (so ordering is
//! trivially preserved), and dispatch runs the compiled routine's work-items
//! across a rayon pool.

use std::collections::HashMap;

use rayon::prelude::*;

use super::{
    AccessMode, BufferHandle, ComputeBackend, DeviceHandle, Handle, QueueHandle, RoutineHandle,
    WorkShape, status,
};
use crate::error::{LifeError, LifeResult};
use crate::kernel::parallel::{cell_next, row_band};
use crate::pool::build_pool;

/// Routines the host device knows how to execute, keyed by entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HostRoutine {
    LifeNextState,
}

impl HostRoutine {
    fn lookup(entry_point: &str) -> Option<Self> {
        match entry_point {
            super::LIFE_ENTRY_POINT => Some(Self::LifeNextState),
            _ => None,
        }
    }

    /// (scalar count, buffer count)
    fn arity(self) -> (usize, usize) {
        match self {
            Self::LifeNextState => (2, 2),
        }
    }
}

enum HostObject {
    Device,
    Queue {
        device: u64,
    },
    Routine {
        device: u64,
        routine: HostRoutine,
    },
    Buffer {
        device: u64,
        access: AccessMode,
        data: Vec<u8>,
    },
}

impl HostObject {
    fn owner(&self) -> Option<u64> {
        match self {
            Self::Device => None,
            Self::Queue { device } | Self::Routine { device, .. } | Self::Buffer { device, .. } => {
                Some(*device)
            }
        }
    }
}

/// Kernel names declared as `__kernel void <name>(` in `source`.
fn declared_kernels(source: &str) -> impl Iterator<Item = &str> {
    source.split("__kernel").skip(1).filter_map(|rest| {
        let rest = rest.trim_start().strip_prefix("void")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let rest = rest.trim_start();
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let (name, tail) = rest.split_at(end);
        (!name.is_empty() && tail.trim_start().starts_with('(')).then_some(name)
    })
}

fn braces_balanced(source: &str) -> bool {
    let mut depth = 0i64;
    for c in source.chars() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

pub struct HostBackend {
    pool: rayon::ThreadPool,
    next_id: u64,
    objects: HashMap<u64, HostObject>,
    /// Dispatches left before an injected failure; `None` never fails.
    dispatch_budget: Option<u64>,
    dispatches: u64,
}

impl HostBackend {
    pub fn with_threads(threads: usize) -> LifeResult<Self> {
        Ok(Self {
            pool: build_pool(threads, "life-dev")?,
            next_id: 1,
            objects: HashMap::new(),
            dispatch_budget: None,
            dispatches: 0,
        })
    }

    /// Make every dispatch after the first `n` fail with `OUT_OF_RESOURCES`.
    pub fn fail_dispatch_after(mut self, n: u64) -> Self {
        self.dispatch_budget = Some(n);
        self
    }

    /// Handles currently held by callers.
    pub fn live_objects(&self) -> usize {
        self.objects.len()
    }

    pub fn dispatch_count(&self) -> u64 {
        self.dispatches
    }

    fn insert(&mut self, object: HostObject) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(id, object);
        id
    }

    fn check_device(&self, device: DeviceHandle, op: &'static str) -> LifeResult<()> {
        match self.objects.get(&device.0) {
            Some(HostObject::Device) => Ok(()),
            _ => Err(LifeError::backend(op, status::INVALID_DEVICE)),
        }
    }

    fn check_queue(&self, queue: QueueHandle, op: &'static str) -> LifeResult<()> {
        match self.objects.get(&queue.0) {
            Some(HostObject::Queue { .. }) => Ok(()),
            _ => Err(LifeError::backend(op, status::INVALID_COMMAND_QUEUE)),
        }
    }

    fn buffer(&self, buffer: BufferHandle, op: &'static str) -> LifeResult<(AccessMode, &[u8])> {
        match self.objects.get(&buffer.0) {
            Some(HostObject::Buffer { access, data, .. }) => Ok((*access, data.as_slice())),
            _ => Err(LifeError::backend(op, status::INVALID_MEM_OBJECT)),
        }
    }

    fn buffer_mut(&mut self, buffer: BufferHandle, op: &'static str) -> LifeResult<&mut Vec<u8>> {
        match self.objects.get_mut(&buffer.0) {
            Some(HostObject::Buffer { data, .. }) => Ok(data),
            _ => Err(LifeError::backend(op, status::INVALID_MEM_OBJECT)),
        }
    }

    fn run_life_next_state(
        &mut self,
        scalars: &[u32],
        buffers: &[BufferHandle],
        shape: WorkShape,
    ) -> LifeResult<()> {
        const OP: &str = "dispatch";
        let (rows, cols) = (scalars[0] as usize, scalars[1] as usize);
        if rows == 0 || cols == 0 {
            return Err(LifeError::backend(OP, status::INVALID_KERNEL_ARGS));
        }
        if shape.rows != rows || shape.cols != cols {
            return Err(LifeError::backend(OP, status::INVALID_GLOBAL_WORK_SIZE));
        }
        let (input, output) = (buffers[0], buffers[1]);
        if input == output {
            return Err(LifeError::backend(OP, status::INVALID_KERNEL_ARGS));
        }
        let len = shape.items();
        let (in_access, in_data) = self.buffer(input, OP)?;
        if !in_access.device_readable() || in_data.len() < len {
            return Err(LifeError::backend(OP, status::INVALID_KERNEL_ARGS));
        }
        // Cells must be 0/1; anything else would index past the rule table.
        if in_data[..len].iter().any(|&cell| cell > 1) {
            return Err(LifeError::backend(OP, status::INVALID_VALUE));
        }
        let (out_access, out_data) = self.buffer(output, OP)?;
        if !out_access.device_writable() || out_data.len() < len {
            return Err(LifeError::backend(OP, status::INVALID_KERNEL_ARGS));
        }

        let mut out = std::mem::take(self.buffer_mut(output, OP)?);
        let (_, src) = self.buffer(input, OP)?;
        let src = &src[..len];
        self.pool.install(|| {
            out[..len]
                .par_chunks_mut(cols)
                .enumerate()
                .for_each(|(row, dst)| {
                    let (above, here, below) = row_band(src, rows, cols, row);
                    for (col, slot) in dst.iter_mut().enumerate() {
                        *slot = cell_next(above, here, below, col);
                    }
                });
        });
        *self.buffer_mut(output, OP)? = out;
        Ok(())
    }
}

impl ComputeBackend for HostBackend {
    fn name(&self) -> &'static str {
        "host"
    }

    fn acquire_device(&mut self) -> LifeResult<DeviceHandle> {
        Ok(DeviceHandle(self.insert(HostObject::Device)))
    }

    fn create_queue(&mut self, device: DeviceHandle) -> LifeResult<QueueHandle> {
        self.check_device(device, "create_queue")?;
        Ok(QueueHandle(self.insert(HostObject::Queue { device: device.0 })))
    }

    fn compile(
        &mut self,
        device: DeviceHandle,
        source: &str,
        entry_point: &str,
    ) -> LifeResult<RoutineHandle> {
        self.check_device(device, "compile")?;
        if source.trim().is_empty() {
            return Err(LifeError::compile(entry_point, "empty program source"));
        }
        if !braces_balanced(source) {
            return Err(LifeError::compile(entry_point, "unbalanced braces"));
        }
        if !declared_kernels(source).any(|name| name == entry_point) {
            return Err(LifeError::compile(
                entry_point,
                "entry point is not declared as a __kernel in the source",
            ));
        }
        let routine = HostRoutine::lookup(entry_point).ok_or_else(|| {
            LifeError::compile(entry_point, "no host implementation for this entry point")
        })?;
        Ok(RoutineHandle(self.insert(HostObject::Routine {
            device: device.0,
            routine,
        })))
    }

    fn allocate_buffer(
        &mut self,
        device: DeviceHandle,
        size: usize,
        access: AccessMode,
    ) -> LifeResult<BufferHandle> {
        const OP: &str = "allocate_buffer";
        self.check_device(device, OP)?;
        if size == 0 {
            return Err(LifeError::backend(OP, status::INVALID_VALUE));
        }
        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| LifeError::backend(OP, status::MEM_OBJECT_ALLOCATION_FAILURE))?;
        data.resize(size, 0);
        Ok(BufferHandle(self.insert(HostObject::Buffer {
            device: device.0,
            access,
            data,
        })))
    }

    fn enqueue_upload(
        &mut self,
        queue: QueueHandle,
        buffer: BufferHandle,
        bytes: &[u8],
    ) -> LifeResult<()> {
        const OP: &str = "upload";
        self.check_queue(queue, OP)?;
        let data = self.buffer_mut(buffer, OP)?;
        if data.len() != bytes.len() {
            return Err(LifeError::backend(OP, status::INVALID_VALUE));
        }
        data.copy_from_slice(bytes);
        Ok(())
    }

    fn enqueue_dispatch(
        &mut self,
        queue: QueueHandle,
        routine: RoutineHandle,
        scalars: &[u32],
        buffers: &[BufferHandle],
        shape: WorkShape,
    ) -> LifeResult<()> {
        const OP: &str = "dispatch";
        self.check_queue(queue, OP)?;
        let routine = match self.objects.get(&routine.0) {
            Some(HostObject::Routine { routine, .. }) => *routine,
            _ => return Err(LifeError::backend(OP, status::INVALID_KERNEL)),
        };
        if (scalars.len(), buffers.len()) != routine.arity() {
            return Err(LifeError::backend(OP, status::INVALID_KERNEL_ARGS));
        }
        if let Some(budget) = self.dispatch_budget.as_mut() {
            if *budget == 0 {
                return Err(LifeError::backend(OP, status::OUT_OF_RESOURCES));
            }
            *budget -= 1;
        }
        match routine {
            HostRoutine::LifeNextState => self.run_life_next_state(scalars, buffers, shape)?,
        }
        self.dispatches += 1;
        Ok(())
    }

    fn enqueue_download(
        &mut self,
        queue: QueueHandle,
        buffer: BufferHandle,
        out: &mut [u8],
    ) -> LifeResult<()> {
        const OP: &str = "download";
        self.check_queue(queue, OP)?;
        let (_, data) = self.buffer(buffer, OP)?;
        if data.len() != out.len() {
            return Err(LifeError::backend(OP, status::INVALID_VALUE));
        }
        out.copy_from_slice(data);
        Ok(())
    }

    fn release(&mut self, handle: Handle) -> LifeResult<()> {
        const OP: &str = "release";
        let (id, code) = match handle {
            Handle::Device(h) => (h.0, status::INVALID_DEVICE),
            Handle::Queue(h) => (h.0, status::INVALID_COMMAND_QUEUE),
            Handle::Routine(h) => (h.0, status::INVALID_KERNEL),
            Handle::Buffer(h) => (h.0, status::INVALID_MEM_OBJECT),
        };
        let kind_matches = matches!(
            (handle, self.objects.get(&id)),
            (Handle::Device(_), Some(HostObject::Device))
                | (Handle::Queue(_), Some(HostObject::Queue { .. }))
                | (Handle::Routine(_), Some(HostObject::Routine { .. }))
                | (Handle::Buffer(_), Some(HostObject::Buffer { .. }))
        );
        if !kind_matches {
            return Err(LifeError::backend(OP, code));
        }
        if matches!(handle, Handle::Device(_))
            && self.objects.values().any(|obj| obj.owner() == Some(id))
        {
            return Err(LifeError::backend(OP, status::INVALID_OPERATION));
        }
        self.objects.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{HostBackend, declared_kernels};
    use crate::backend::{
        AccessMode, ComputeBackend, Handle, LIFE_ENTRY_POINT, LIFE_KERNEL_SOURCE, WorkShape,
        status,
    };
    use crate::error::LifeError;

    #[test]
    fn finds_declared_kernels() {
        let names: Vec<_> = declared_kernels(LIFE_KERNEL_SOURCE).collect();
        assert_eq!(names, vec![LIFE_ENTRY_POINT]);
        let src = "__kernel void a(int x) {} __kernel  void   b_2 (void) {} __kernel voidc() {}";
        assert_eq!(declared_kernels(src).collect::<Vec<_>>(), vec!["a", "b_2"]);
    }

    #[test]
    fn compile_rejects_bad_programs() {
        let mut backend = HostBackend::with_threads(1).unwrap();
        let dev = backend.acquire_device().unwrap();
        for (src, entry) in [
            ("", LIFE_ENTRY_POINT),
            ("__kernel void life_next_state() {", LIFE_ENTRY_POINT),
            (LIFE_KERNEL_SOURCE, "life_prev_state"),
            ("__kernel void other(uint n) {}", "other"),
        ] {
            assert!(
                matches!(backend.compile(dev, src, entry), Err(LifeError::Compile { .. })),
                "accepted {entry}"
            );
        }
        assert!(backend.compile(dev, LIFE_KERNEL_SOURCE, LIFE_ENTRY_POINT).is_ok());
    }

    #[test]
    fn dispatch_enforces_access_modes_and_arity() {
        let mut backend = HostBackend::with_threads(1).unwrap();
        let dev = backend.acquire_device().unwrap();
        let queue = backend.create_queue(dev).unwrap();
        let routine = backend
            .compile(dev, LIFE_KERNEL_SOURCE, LIFE_ENTRY_POINT)
            .unwrap();
        let write_only = backend.allocate_buffer(dev, 9, AccessMode::WriteOnly).unwrap();
        let read_only = backend.allocate_buffer(dev, 9, AccessMode::ReadOnly).unwrap();
        let shape = WorkShape { rows: 3, cols: 3 };

        let err = backend
            .enqueue_dispatch(queue, routine, &[3, 3], &[write_only, read_only], shape)
            .unwrap_err();
        assert!(matches!(err, LifeError::Backend { code: status::INVALID_KERNEL_ARGS, .. }));

        let err = backend
            .enqueue_dispatch(queue, routine, &[3], &[read_only, write_only], shape)
            .unwrap_err();
        assert!(matches!(err, LifeError::Backend { code: status::INVALID_KERNEL_ARGS, .. }));

        let err = backend
            .enqueue_dispatch(
                queue,
                routine,
                &[3, 3],
                &[read_only, write_only],
                WorkShape { rows: 3, cols: 4 },
            )
            .unwrap_err();
        assert!(matches!(err, LifeError::Backend { code: status::INVALID_GLOBAL_WORK_SIZE, .. }));

        backend
            .enqueue_dispatch(queue, routine, &[3, 3], &[read_only, write_only], shape)
            .unwrap();
        assert_eq!(backend.dispatch_count(), 1);
    }

    #[test]
    fn dispatch_rejects_non_binary_input() {
        let mut backend = HostBackend::with_threads(1).unwrap();
        let dev = backend.acquire_device().unwrap();
        let queue = backend.create_queue(dev).unwrap();
        let routine = backend
            .compile(dev, LIFE_KERNEL_SOURCE, LIFE_ENTRY_POINT)
            .unwrap();
        let input = backend.allocate_buffer(dev, 4, AccessMode::ReadOnly).unwrap();
        let output = backend.allocate_buffer(dev, 4, AccessMode::WriteOnly).unwrap();
        let shape = WorkShape { rows: 2, cols: 2 };

        backend.enqueue_upload(queue, input, &[2, 0, 0, 0]).unwrap();
        let err = backend
            .enqueue_dispatch(queue, routine, &[2, 2], &[input, output], shape)
            .unwrap_err();
        assert!(matches!(
            err,
            LifeError::Backend { op: "dispatch", code: status::INVALID_VALUE }
        ));
        assert_eq!(backend.dispatch_count(), 0);

        backend.enqueue_upload(queue, input, &[1, 0, 0, 1]).unwrap();
        backend
            .enqueue_dispatch(queue, routine, &[2, 2], &[input, output], shape)
            .unwrap();
        assert_eq!(backend.dispatch_count(), 1);
    }

    #[test]
    fn transfers_round_trip_and_check_sizes() {
        let mut backend = HostBackend::with_threads(1).unwrap();
        let dev = backend.acquire_device().unwrap();
        let queue = backend.create_queue(dev).unwrap();
        let buf = backend.allocate_buffer(dev, 4, AccessMode::ReadWrite).unwrap();
        backend.enqueue_upload(queue, buf, &[1, 0, 0, 1]).unwrap();
        let mut out = [9u8; 4];
        backend.enqueue_download(queue, buf, &mut out).unwrap();
        assert_eq!(out, [1, 0, 0, 1]);

        assert!(backend.enqueue_upload(queue, buf, &[1, 0]).is_err());
        assert!(backend.enqueue_download(queue, buf, &mut [0u8; 5]).is_err());
        assert!(backend.allocate_buffer(dev, 0, AccessMode::ReadOnly).is_err());
    }

    #[test]
    fn device_outlives_its_objects() {
        let mut backend = HostBackend::with_threads(1).unwrap();
        let dev = backend.acquire_device().unwrap();
        let buf = backend.allocate_buffer(dev, 4, AccessMode::ReadOnly).unwrap();

        let err = backend.release(Handle::Device(dev)).unwrap_err();
        assert!(matches!(err, LifeError::Backend { code: status::INVALID_OPERATION, .. }));

        backend.release(buf.into()).unwrap();
        assert!(backend.release(buf.into()).is_err());
        backend.release(dev.into()).unwrap();
        assert_eq!(backend.live_objects(), 0);
    }

    #[test]
    fn injected_fault_fires_after_budget() {
        let mut backend = HostBackend::with_threads(1).unwrap().fail_dispatch_after(1);
        let dev = backend.acquire_device().unwrap();
        let queue = backend.create_queue(dev).unwrap();
        let routine = backend
            .compile(dev, LIFE_KERNEL_SOURCE, LIFE_ENTRY_POINT)
            .unwrap();
        let input = backend.allocate_buffer(dev, 4, AccessMode::ReadOnly).unwrap();
        let output = backend.allocate_buffer(dev, 4, AccessMode::WriteOnly).unwrap();
        let shape = WorkShape { rows: 2, cols: 2 };

        backend
            .enqueue_dispatch(queue, routine, &[2, 2], &[input, output], shape)
            .unwrap();
        let err = backend
            .enqueue_dispatch(queue, routine, &[2, 2], &[input, output], shape)
            .unwrap_err();
        assert!(matches!(err, LifeError::Backend { code: status::OUT_OF_RESOURCES, .. }));
    }
}
